//! sarcal: A Fast, Modular SAR Radiometric Calibration Engine
//!
//! This library converts raw SAR digital numbers into calibrated backscatter
//! (sigma nought, beta nought, gamma nought or calibrated DN) using the
//! sensor's annotation: orbit state vectors, antenna elevation patterns,
//! calibration vector grids, or a single absolute constant. Processing is
//! tile based and the calibration tables are immutable, so tiles can be
//! computed concurrently.

pub mod core;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    datetime_to_mjd, BandUnit, OrbitStateVector, Polarization, SarComplex, SarError, SarImage,
    SarRealImage, SarResult,
};

pub use core::{
    calibrate_tile, calibrate_tile_complex, remove_calibration, remove_thermal_noise,
    AntennaPatternSet, CalibrationConfig, CalibrationLut, CalibrationType, CalibrationVector,
    Calibrator, ConstantCalibrator, ElevationPattern, GeometryModel, LutCalibrator, NoiseLut,
    PatternCalibrator, Rectangle, SrgrCoefficients, TiePointGrid, TileSource,
};

#[cfg(feature = "parallel")]
pub use core::calibrate_image_parallel;
