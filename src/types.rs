use chrono::{DateTime, TimeZone, Utc};
use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Complex-valued SAR data type (I + jQ)
pub type SarComplex = Complex<f32>;

/// Real-valued intensity or amplitude data
pub type SarReal = f32;

/// 2D complex SAR data array (azimuth x range)
pub type SarImage = Array2<SarComplex>;

/// 2D real SAR data array (azimuth x range)
pub type SarRealImage = Array2<SarReal>;

/// Polarization channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

/// Physical unit of a raster band as delivered by the product reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandUnit {
    /// Envelope-detected amplitude (DN)
    Amplitude,
    /// Detected intensity (DN^2)
    Intensity,
    /// Real part of a complex sample; always paired with an Imaginary band
    Real,
    /// Imaginary part of a complex sample; always paired with a Real band
    Imaginary,
    /// Amplitude expressed in dB
    AmplitudeDb,
    /// Intensity expressed in dB
    IntensityDb,
    /// Interferometric phase; calibration is a pass-through copy
    Phase,
}

impl std::fmt::Display for BandUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BandUnit::Amplitude => "amplitude",
            BandUnit::Intensity => "intensity",
            BandUnit::Real => "real",
            BandUnit::Imaginary => "imaginary",
            BandUnit::AmplitudeDb => "amplitude_db",
            BandUnit::IntensityDb => "intensity_db",
            BandUnit::Phase => "phase",
        };
        write!(f, "{}", s)
    }
}

/// Orbit state vector, ordered by time within an orbit sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitStateVector {
    /// Zero Doppler time in days since 2000-01-01T00:00:00 UTC
    pub time_mjd: f64,
    /// ECEF position [x, y, z] in meters
    pub position: [f64; 3],
}

impl OrbitStateVector {
    /// Distance from the Earth centre to the platform, in meters
    pub fn radius(&self) -> f64 {
        let [x, y, z] = self.position;
        (x * x + y * y + z * z).sqrt()
    }
}

/// Convert a UTC timestamp to days since 2000-01-01T00:00:00 UTC (MJD2000),
/// the time axis used throughout the calibration engine.
pub fn datetime_to_mjd(time: &DateTime<Utc>) -> f64 {
    let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let delta = *time - epoch;
    delta.num_milliseconds() as f64 / 86_400_000.0
}

/// Error types for the calibration engine
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported band unit: {0}")]
    Unit(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for calibration operations
pub type SarResult<T> = Result<T, SarError>;
