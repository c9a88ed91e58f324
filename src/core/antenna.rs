use crate::types::{SarError, SarResult};
use serde::{Deserialize, Serialize};

/// Nominal number of gain samples per swath and polarization in the
/// auxiliary pattern files (ref angle +/- 5 degrees at 0.05 degree steps).
pub const NUM_GAIN_SAMPLES: usize = 201;

/// Angular step between two gain samples, degrees
const GAIN_STEP_DEG: f64 = 0.05;

/// Half width of the pattern domain around the reference angle, degrees
const HALF_DOMAIN_DEG: f64 = 5.0;

/// Antenna elevation pattern for one swath (or sub-swath) and polarization:
/// a reference elevation angle and a gain curve stored in dB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationPattern {
    /// Reference elevation angle, degrees
    pub ref_elevation_angle: f64,
    /// Gain samples in dB, spanning ref +/- 5 degrees at 0.05 degree steps
    pub gains_db: Vec<f32>,
}

impl ElevationPattern {
    pub fn new(ref_elevation_angle: f64, gains_db: Vec<f32>) -> SarResult<Self> {
        if gains_db.len() < 2 {
            return Err(SarError::Configuration(format!(
                "Antenna pattern requires at least 2 gain samples, got {}",
                gains_db.len()
            )));
        }
        Ok(Self {
            ref_elevation_angle,
            gains_db,
        })
    }

    /// Antenna pattern gain in linear scale for the given elevation angle,
    /// linearly interpolated between the two bracketing dB samples. Angles
    /// outside the table domain clamp to the first/last sample pair.
    pub fn gain(&self, elev_angle_deg: f64) -> f64 {
        let n = self.gains_db.len();
        let offset = (elev_angle_deg - self.ref_elevation_angle + HALF_DOMAIN_DEG) / GAIN_STEP_DEG;
        let k0 = if offset <= 0.0 {
            0
        } else {
            (offset as usize).min(n - 2)
        };

        let theta0 = self.ref_elevation_angle - HALF_DOMAIN_DEG + k0 as f64 * GAIN_STEP_DEG;
        let gain0 = 10f64.powf(self.gains_db[k0] as f64 / 10.0);
        let gain1 = 10f64.powf(self.gains_db[k0 + 1] as f64 / 10.0);
        let mu = (elev_angle_deg - theta0) / GAIN_STEP_DEG;

        gain0 + (gain1 - gain0) * mu
    }
}

/// Pick the sub-swath whose reference elevation angle is nearest to the
/// given elevation angle (ties broken by first occurrence). Equivalent to
/// using the mid-point of the overlap of two adjacent sub-swaths as their
/// boundary, without explicit overlap geometry.
pub fn select_sub_swath(elev_angle_deg: f64, ref_angles: &[f64]) -> usize {
    let mut idx = 0;
    let mut min = f64::INFINITY;
    for (i, &ref_angle) in ref_angles.iter().enumerate() {
        let d = (elev_angle_deg - ref_angle).abs();
        if d < min {
            min = d;
            idx = i;
        }
    }
    idx
}

/// A collection of elevation patterns: indexed by polarization slot for
/// single-swath products, or by sub-swath for wide-swath products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntennaPatternSet {
    pub patterns: Vec<ElevationPattern>,
    ref_angles: Vec<f64>,
}

impl AntennaPatternSet {
    pub fn new(patterns: Vec<ElevationPattern>) -> SarResult<Self> {
        if patterns.is_empty() {
            return Err(SarError::Configuration(
                "Antenna pattern set is empty".to_string(),
            ));
        }
        let ref_angles = patterns.iter().map(|p| p.ref_elevation_angle).collect();
        Ok(Self {
            patterns,
            ref_angles,
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Reference elevation angles of all member patterns, in order
    pub fn ref_angles(&self) -> &[f64] {
        &self.ref_angles
    }

    /// Gain at the pattern with the given index
    pub fn gain(&self, index: usize, elev_angle_deg: f64) -> f64 {
        self.patterns[index.min(self.patterns.len() - 1)].gain(elev_angle_deg)
    }

    /// Sub-swath index for the given elevation angle
    pub fn sub_swath_for(&self, elev_angle_deg: f64) -> usize {
        select_sub_swath(elev_angle_deg, &self.ref_angles)
    }
}
