use crate::types::{Polarization, SarError, SarResult};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Output normalization of a calibrated backscatter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationType {
    /// Radar cross section per unit ground area
    Sigma0,
    /// Radar brightness (slant range plane)
    Beta0,
    /// Backscatter normalized to the plane perpendicular to the slant range
    Gamma0,
    /// Digital numbers, absolute-calibration free
    Dn,
}

/// Calibration vector: one azimuth line of the sparse calibration grid
/// with value curves for every output normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationVector {
    /// Azimuth time of the vector, in days (MJD2000)
    pub time_mjd: f64,
    /// Image line the vector is attached to
    pub line: usize,
    /// Strictly increasing range sample indices
    pub pixels: Vec<usize>,
    pub sigma_nought: Vec<f32>,
    pub beta_nought: Vec<f32>,
    pub gamma: Vec<f32>,
    pub dn: Vec<f32>,
}

impl CalibrationVector {
    pub fn values(&self, cal_type: CalibrationType) -> &[f32] {
        match cal_type {
            CalibrationType::Sigma0 => &self.sigma_nought,
            CalibrationType::Beta0 => &self.beta_nought,
            CalibrationType::Gamma0 => &self.gamma,
            CalibrationType::Dn => &self.dn,
        }
    }

    pub fn validate(&self) -> SarResult<()> {
        if self.pixels.is_empty() {
            return Err(SarError::Configuration(format!(
                "Calibration vector at line {} has no pixels",
                self.line
            )));
        }
        validate_strictly_increasing(&self.pixels, self.line)?;
        let n = self.pixels.len();
        if self.sigma_nought.len() != n
            || self.beta_nought.len() != n
            || self.gamma.len() != n
            || self.dn.len() != n
        {
            return Err(SarError::Configuration(format!(
                "Calibration vector at line {} has mismatched array lengths",
                self.line
            )));
        }
        Ok(())
    }
}

/// Thermal noise vector: same sparse layout as a calibration vector with a
/// single noise power curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseVector {
    pub time_mjd: f64,
    pub line: usize,
    pub pixels: Vec<usize>,
    pub noise_lut: Vec<f32>,
}

impl NoiseVector {
    pub fn validate(&self) -> SarResult<()> {
        if self.pixels.is_empty() || self.noise_lut.len() != self.pixels.len() {
            return Err(SarError::Configuration(format!(
                "Noise vector at line {} has mismatched array lengths",
                self.line
            )));
        }
        validate_strictly_increasing(&self.pixels, self.line)
    }
}

fn validate_strictly_increasing(pixels: &[usize], line: usize) -> SarResult<()> {
    for w in pixels.windows(2) {
        if w[1] <= w[0] {
            return Err(SarError::Configuration(format!(
                "Pixel indices not strictly increasing in vector at line {}",
                line
            )));
        }
    }
    Ok(())
}

/// Bracketing vector pair for an image line and the azimuth interpolation
/// weight between them. With one vector, or beyond the last vector's line,
/// both brackets coincide and the weight is zero.
#[derive(Debug, Clone, Copy)]
pub struct LineBracket {
    pub i0: usize,
    pub i1: usize,
    pub mu_y: f64,
}

/// Dense 2-D calibration table sampled on the sparse azimuth-time x
/// range-pixel vector grid of one (sub-swath, polarization) pair.
#[derive(Debug, Clone)]
pub struct CalibrationLut {
    pub sub_swath: String,
    pub polarization: Polarization,
    /// Zero Doppler time of line 0, days
    pub first_line_time_mjd: f64,
    /// Line time interval, days
    pub line_time_interval: f64,
    vectors: Vec<CalibrationVector>,
}

impl CalibrationLut {
    pub fn new(
        sub_swath: impl Into<String>,
        polarization: Polarization,
        first_line_time_mjd: f64,
        line_time_interval: f64,
        mut vectors: Vec<CalibrationVector>,
    ) -> SarResult<Self> {
        if vectors.is_empty() {
            return Err(SarError::Configuration(
                "Calibration vector sequence is empty".to_string(),
            ));
        }
        vectors.sort_by_key(|v| v.line);
        for v in &vectors {
            v.validate()?;
        }
        log::debug!(
            "Calibration LUT with {} vectors, lines {}..{}",
            vectors.len(),
            vectors[0].line,
            vectors[vectors.len() - 1].line
        );
        Ok(Self {
            sub_swath: sub_swath.into(),
            polarization,
            first_line_time_mjd,
            line_time_interval,
            vectors,
        })
    }

    pub fn vectors(&self) -> &[CalibrationVector] {
        &self.vectors
    }

    /// Locate the bracketing vectors for image line `y`
    pub fn line_bracket(&self, y: usize) -> LineBracket {
        let n = self.vectors.len();
        if n == 1 || y >= self.vectors[n - 1].line {
            let last = n - 1;
            return LineBracket {
                i0: last,
                i1: last,
                mu_y: 0.0,
            };
        }

        let mut i0 = 0;
        for (i, v) in self.vectors.iter().enumerate() {
            if v.line <= y {
                i0 = i;
            } else {
                break;
            }
        }
        let i0 = i0.min(n - 2);
        let i1 = i0 + 1;

        let az_time = self.first_line_time_mjd + y as f64 * self.line_time_interval;
        let t0 = self.vectors[i0].time_mjd;
        let t1 = self.vectors[i1].time_mjd;
        let mu_y = if t1 != t0 {
            (az_time - t0) / (t1 - t0)
        } else {
            0.0
        };
        LineBracket { i0, i1, mu_y }
    }

    /// Bilinearly interpolated LUT value at pixel `(x, y)`
    pub fn value_at(&self, x: usize, y: usize, cal_type: CalibrationType) -> f64 {
        let b = self.line_bracket(y);
        let v0 = interp_in_curve(
            &self.vectors[b.i0].pixels,
            self.vectors[b.i0].values(cal_type),
            x,
            &mut 0,
        );
        if b.i0 == b.i1 {
            return v0;
        }
        let v1 = interp_in_curve(
            &self.vectors[b.i1].pixels,
            self.vectors[b.i1].values(cal_type),
            x,
            &mut 0,
        );
        lerp(v0, v1, b.mu_y)
    }

    /// Fill one dense row of LUT values for columns `x0..x0+out.len()`.
    /// Amortizes the bracket search: the pixel index scan is incremental
    /// because `x` increases monotonically across the row.
    pub fn row_values(&self, y: usize, x0: usize, cal_type: CalibrationType, out: &mut [f64]) {
        let b = self.line_bracket(y);
        let vec0 = &self.vectors[b.i0];
        let values0 = vec0.values(cal_type);
        let single = b.i0 == b.i1;
        let vec1 = &self.vectors[b.i1];
        let values1 = vec1.values(cal_type);

        let mut j0 = 0;
        let mut j1 = 0;
        for (k, v) in out.iter_mut().enumerate() {
            let x = x0 + k;
            let v0 = interp_in_curve(&vec0.pixels, values0, x, &mut j0);
            *v = if single {
                v0
            } else {
                let v1 = interp_in_curve(&vec1.pixels, values1, x, &mut j1);
                lerp(v0, v1, b.mu_y)
            };
        }
    }
}

/// Thermal noise table with the same bilinear interpolation semantics as
/// the calibration LUT.
#[derive(Debug, Clone)]
pub struct NoiseLut {
    pub first_line_time_mjd: f64,
    pub line_time_interval: f64,
    vectors: Vec<NoiseVector>,
}

impl NoiseLut {
    pub fn new(
        first_line_time_mjd: f64,
        line_time_interval: f64,
        mut vectors: Vec<NoiseVector>,
    ) -> SarResult<Self> {
        if vectors.is_empty() {
            return Err(SarError::Configuration(
                "Noise vector sequence is empty".to_string(),
            ));
        }
        vectors.sort_by_key(|v| v.line);
        for v in &vectors {
            v.validate()?;
        }
        Ok(Self {
            first_line_time_mjd,
            line_time_interval,
            vectors,
        })
    }

    fn line_bracket(&self, y: usize) -> LineBracket {
        let n = self.vectors.len();
        if n == 1 || y >= self.vectors[n - 1].line {
            let last = n - 1;
            return LineBracket {
                i0: last,
                i1: last,
                mu_y: 0.0,
            };
        }
        let mut i0 = 0;
        for (i, v) in self.vectors.iter().enumerate() {
            if v.line <= y {
                i0 = i;
            } else {
                break;
            }
        }
        let i0 = i0.min(n - 2);
        let az_time = self.first_line_time_mjd + y as f64 * self.line_time_interval;
        let t0 = self.vectors[i0].time_mjd;
        let t1 = self.vectors[i0 + 1].time_mjd;
        let mu_y = if t1 != t0 {
            (az_time - t0) / (t1 - t0)
        } else {
            0.0
        };
        LineBracket {
            i0,
            i1: i0 + 1,
            mu_y,
        }
    }

    /// Interpolated noise power at pixel `(x, y)`
    pub fn value_at(&self, x: usize, y: usize) -> f64 {
        let b = self.line_bracket(y);
        let v0 = interp_in_curve(
            &self.vectors[b.i0].pixels,
            &self.vectors[b.i0].noise_lut,
            x,
            &mut 0,
        );
        if b.i0 == b.i1 {
            return v0;
        }
        let v1 = interp_in_curve(
            &self.vectors[b.i1].pixels,
            &self.vectors[b.i1].noise_lut,
            x,
            &mut 0,
        );
        lerp(v0, v1, b.mu_y)
    }

    /// Fill one dense row of noise values for columns `x0..x0+out.len()`
    pub fn row_values(&self, y: usize, x0: usize, out: &mut [f64]) {
        let b = self.line_bracket(y);
        let vec0 = &self.vectors[b.i0];
        let single = b.i0 == b.i1;
        let vec1 = &self.vectors[b.i1];
        let mut j0 = 0;
        let mut j1 = 0;
        for (k, v) in out.iter_mut().enumerate() {
            let x = x0 + k;
            let v0 = interp_in_curve(&vec0.pixels, &vec0.noise_lut, x, &mut j0);
            *v = if single {
                v0
            } else {
                let v1 = interp_in_curve(&vec1.pixels, &vec1.noise_lut, x, &mut j1);
                lerp(v0, v1, b.mu_y)
            };
        }
    }
}

/// One-dimensional range-indexed LUT for sensors whose calibration table
/// does not vary with azimuth time. A raw lookup is rescaled with a
/// divisive gain and an additive offset per the sensor's stated formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeLut {
    pub pixels: Vec<usize>,
    pub values: Vec<f32>,
    /// Divisive gain applied to the interpolated raw value
    pub gain: f64,
    /// Additive offset applied after the gain
    pub offset: f64,
}

impl RangeLut {
    pub fn new(pixels: Vec<usize>, values: Vec<f32>, gain: f64, offset: f64) -> SarResult<Self> {
        if pixels.is_empty() || pixels.len() != values.len() {
            return Err(SarError::Configuration(
                "Range LUT pixel/value arrays are empty or mismatched".to_string(),
            ));
        }
        validate_strictly_increasing(&pixels, 0)?;
        if gain == 0.0 {
            return Err(SarError::Configuration(
                "Range LUT gain must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            pixels,
            values,
            gain,
            offset,
        })
    }

    /// Rescaled LUT value at range sample `x`
    pub fn value_at(&self, x: usize) -> f64 {
        let raw = interp_in_curve(&self.pixels, &self.values, x, &mut 0);
        raw / self.gain + self.offset
    }

    /// Fill one dense row for columns `x0..x0+out.len()`
    pub fn row_values(&self, x0: usize, out: &mut [f64]) {
        let mut j = 0;
        for (k, v) in out.iter_mut().enumerate() {
            let raw = interp_in_curve(&self.pixels, &self.values, x0 + k, &mut j);
            *v = raw / self.gain + self.offset;
        }
    }
}

/// Linear interpolation within one sparse curve. `last` carries the pixel
/// bracket between calls so monotonically increasing queries scan
/// incrementally; out-of-order queries fall back to a binary search.
fn interp_in_curve(pixels: &[usize], values: &[f32], x: usize, last: &mut usize) -> f64 {
    let n = pixels.len();
    if n == 1 {
        return values[0] as f64;
    }

    let j = bracket_pixels(pixels, x, *last);
    *last = j;

    let p0 = pixels[j] as f64;
    let p1 = pixels[j + 1] as f64;
    let mu = (x as f64 - p0) / (p1 - p0);
    lerp(values[j] as f64, values[j + 1] as f64, mu)
}

fn bracket_pixels(pixels: &[usize], x: usize, last: usize) -> usize {
    let n = pixels.len();
    if last < n - 1 && pixels[last] <= x && x < pixels[last + 1] {
        return last;
    }
    if last + 1 < n - 1 && pixels[last + 1] <= x && x < pixels[last + 2] {
        return last + 1;
    }
    match pixels.binary_search(&x) {
        Ok(j) => j.min(n - 2),
        Err(j) => j.saturating_sub(1).min(n - 2),
    }
}

#[inline]
fn lerp<T: Float>(a: T, b: T, mu: T) -> T {
    a + (b - a) * mu
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_vector(time: f64, line: usize, base: f32) -> CalibrationVector {
        let pixels: Vec<usize> = vec![0, 100, 200, 300];
        let sigma: Vec<f32> = pixels.iter().map(|&p| base + p as f32 / 100.0).collect();
        CalibrationVector {
            time_mjd: time,
            line,
            pixels: pixels.clone(),
            sigma_nought: sigma.clone(),
            beta_nought: sigma.clone(),
            gamma: sigma.clone(),
            dn: sigma,
        }
    }

    fn two_vector_lut() -> CalibrationLut {
        CalibrationLut::new(
            "IW1",
            Polarization::VV,
            0.0,
            0.001,
            vec![ramp_vector(0.0, 0, 100.0), ramp_vector(1.0, 1000, 200.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_bilinear_reduces_to_linear_on_vector_line() {
        let lut = two_vector_lut();
        // y = 0 coincides with the first vector: muY == 0
        let v = lut.value_at(50, 0, CalibrationType::Sigma0);
        assert_relative_eq!(v, 100.5, epsilon = 1e-6);
    }

    #[test]
    fn test_bilinear_midpoint_is_corner_mean() {
        let lut = CalibrationLut::new(
            "IW1",
            Polarization::VV,
            0.0,
            0.001,
            vec![
                CalibrationVector {
                    time_mjd: 0.0,
                    line: 0,
                    pixels: vec![0, 10000],
                    sigma_nought: vec![100.0, 200.0],
                    beta_nought: vec![100.0, 200.0],
                    gamma: vec![100.0, 200.0],
                    dn: vec![100.0, 200.0],
                },
                CalibrationVector {
                    time_mjd: 1.0,
                    line: 1000,
                    pixels: vec![0, 10000],
                    sigma_nought: vec![300.0, 400.0],
                    beta_nought: vec![300.0, 400.0],
                    gamma: vec![300.0, 400.0],
                    dn: vec![300.0, 400.0],
                },
            ],
        )
        .unwrap();
        let v = lut.value_at(5000, 500, CalibrationType::Sigma0);
        assert_relative_eq!(v, 250.0, epsilon = 1e-6);
    }

    #[test]
    fn test_clamp_beyond_last_vector() {
        let lut = two_vector_lut();
        let v = lut.value_at(0, 5000, CalibrationType::Sigma0);
        assert_relative_eq!(v, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_vector_skips_azimuth_interpolation() {
        let lut = CalibrationLut::new(
            "S1",
            Polarization::HH,
            0.0,
            0.001,
            vec![ramp_vector(0.0, 0, 10.0)],
        )
        .unwrap();
        let v = lut.value_at(150, 999, CalibrationType::Gamma0);
        assert_relative_eq!(v, 11.5, epsilon = 1e-6);
    }

    #[test]
    fn test_row_values_match_point_lookup() {
        let lut = two_vector_lut();
        let mut row = vec![0.0; 64];
        lut.row_values(321, 17, CalibrationType::Beta0, &mut row);
        for (k, &v) in row.iter().enumerate() {
            let expected = lut.value_at(17 + k, 321, CalibrationType::Beta0);
            assert_relative_eq!(v, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_invalid_pixels_rejected() {
        let mut vec = ramp_vector(0.0, 0, 1.0);
        vec.pixels = vec![0, 100, 100, 300];
        assert!(vec.validate().is_err());
    }

    #[test]
    fn test_noise_lut_interpolation() {
        let lut = NoiseLut::new(
            0.0,
            0.001,
            vec![
                NoiseVector {
                    time_mjd: 0.0,
                    line: 0,
                    pixels: vec![0, 100],
                    noise_lut: vec![2.0, 4.0],
                },
                NoiseVector {
                    time_mjd: 1.0,
                    line: 1000,
                    pixels: vec![0, 100],
                    noise_lut: vec![6.0, 8.0],
                },
            ],
        )
        .unwrap();
        assert_relative_eq!(lut.value_at(50, 0), 3.0, epsilon = 1e-6);
        assert_relative_eq!(lut.value_at(50, 500), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_range_lut_rescaling() {
        let lut = RangeLut::new(vec![0, 10], vec![10.0, 30.0], 2.0, 1.0).unwrap();
        // raw value at x=5 is 20; rescaled: 20/2 + 1
        assert_relative_eq!(lut.value_at(5), 11.0, epsilon = 1e-9);

        let mut row = vec![0.0; 3];
        lut.row_values(0, &mut row);
        assert_relative_eq!(row[0], 6.0, epsilon = 1e-9);
    }
}
