use crate::types::{SarError, SarResult};
use serde::{Deserialize, Serialize};

/// One slant-range-to-ground-range polynomial record, valid around a single
/// azimuth time. A product carries a sequence of these ordered by time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrgrCoefficients {
    /// Zero Doppler time of the record, in days (MJD2000)
    pub time_mjd: f64,
    /// Ground range of the first pixel, in meters
    pub ground_range_origin: f64,
    /// Polynomial coefficients, lowest order first
    pub coefficients: Vec<f64>,
}

impl SrgrCoefficients {
    /// Evaluate the polynomial at the given ground range (Horner scheme),
    /// returning slant range in meters.
    pub fn ground_to_slant(&self, ground_range: f64) -> f64 {
        let mut acc = 0.0;
        for &c in self.coefficients.iter().rev() {
            acc = acc * ground_range + c;
        }
        acc
    }
}

/// Interpolate the SRGR record for the given zero Doppler time.
///
/// A single record is returned unchanged regardless of query time. Otherwise
/// the bracketing pair is interpolated linearly, coefficient by coefficient;
/// queries at or beyond the last record use the last two records with the
/// extrapolated weight.
pub fn interpolate(records: &[SrgrCoefficients], time_mjd: f64) -> SarResult<SrgrCoefficients> {
    if records.is_empty() {
        return Err(SarError::Configuration(
            "SRGR coefficient sequence is empty".to_string(),
        ));
    }
    if records.len() == 1 {
        return Ok(records[0].clone());
    }

    let mut idx = 0;
    for (i, rec) in records.iter().enumerate() {
        if time_mjd >= rec.time_mjd {
            idx = i;
        } else {
            break;
        }
    }
    if idx == records.len() - 1 {
        idx -= 1;
    }

    let r0 = &records[idx];
    let r1 = &records[idx + 1];
    let mu = (time_mjd - r0.time_mjd) / (r1.time_mjd - r0.time_mjd);

    let n = r0.coefficients.len().min(r1.coefficients.len());
    let mut coefficients = Vec::with_capacity(n);
    for i in 0..n {
        coefficients.push(lerp(r0.coefficients[i], r1.coefficients[i], mu));
    }

    Ok(SrgrCoefficients {
        time_mjd,
        ground_range_origin: lerp(r0.ground_range_origin, r1.ground_range_origin, mu),
        coefficients,
    })
}

#[inline]
fn lerp(a: f64, b: f64, mu: f64) -> f64 {
    a + (b - a) * mu
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(time: f64, origin: f64, coeffs: &[f64]) -> SrgrCoefficients {
        SrgrCoefficients {
            time_mjd: time,
            ground_range_origin: origin,
            coefficients: coeffs.to_vec(),
        }
    }

    #[test]
    fn test_horner_evaluation() {
        // 2 + 3g + 0.5g^2 at g = 4
        let rec = record(0.0, 0.0, &[2.0, 3.0, 0.5]);
        assert_relative_eq!(rec.ground_to_slant(4.0), 2.0 + 12.0 + 8.0);
    }

    #[test]
    fn test_single_record_returned_unchanged() {
        let recs = vec![record(5.0, 100.0, &[1.0, 2.0])];
        let out = interpolate(&recs, 123.0).unwrap();
        assert_relative_eq!(out.ground_range_origin, 100.0);
        assert_relative_eq!(out.coefficients[1], 2.0);
    }

    #[test]
    fn test_bracketing_interpolation() {
        let recs = vec![
            record(0.0, 0.0, &[10.0, 1.0]),
            record(10.0, 100.0, &[20.0, 3.0]),
        ];
        let out = interpolate(&recs, 5.0).unwrap();
        assert_relative_eq!(out.ground_range_origin, 50.0);
        assert_relative_eq!(out.coefficients[0], 15.0);
        assert_relative_eq!(out.coefficients[1], 2.0);
    }

    #[test]
    fn test_extrapolation_beyond_last_record() {
        let recs = vec![
            record(0.0, 0.0, &[10.0]),
            record(10.0, 0.0, &[20.0]),
            record(20.0, 0.0, &[30.0]),
        ];
        // mu = 1.5 over the last pair
        let out = interpolate(&recs, 35.0).unwrap();
        assert_relative_eq!(out.coefficients[0], 45.0);
    }

    #[test]
    fn test_empty_sequence_is_configuration_error() {
        assert!(interpolate(&[], 0.0).is_err());
    }
}
