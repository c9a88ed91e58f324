use crate::core::calibrate::{sample_to_intensity, to_db, Calibrator, RowScratch};
use crate::core::lut::NoiseLut;
use crate::types::{BandUnit, SarComplex, SarError, SarImage, SarRealImage, SarResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use ndarray::Axis;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Noise-subtracted intensities never drop below this value
pub const NOISE_FLOOR: f64 = 0.012_345_678_9;

/// Image-space tile rectangle in global pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Raw samples backing one tile: a single detected band, or the I/Q pair
/// of a complex product. Arrays are tile-local, `height x width`.
#[derive(Debug, Clone)]
pub enum TileSource<'a> {
    Real(ArrayView2<'a, f32>),
    Complex {
        i: ArrayView2<'a, f32>,
        q: ArrayView2<'a, f32>,
    },
}

impl<'a> TileSource<'a> {
    fn validate(&self, rect: &Rectangle) -> SarResult<()> {
        let expected = (rect.height, rect.width);
        let ok = match self {
            TileSource::Real(v) => v.dim() == expected,
            TileSource::Complex { i, q } => i.dim() == expected && q.dim() == expected,
        };
        if ok {
            Ok(())
        } else {
            Err(SarError::Processing(format!(
                "Tile source does not match rectangle {}x{}",
                rect.height, rect.width
            )))
        }
    }

    fn at(&self, row: usize, col: usize) -> (f64, f64) {
        match self {
            TileSource::Real(v) => (v[[row, col]] as f64, 0.0),
            TileSource::Complex { i, q } => (i[[row, col]] as f64, q[[row, col]] as f64),
        }
    }
}

/// Calibrate one tile of detected samples to backscatter.
///
/// Row factors are computed once per line into caller-local scratch and
/// applied across the columns; phase bands pass through untouched.
pub fn calibrate_tile(
    calibrator: &Calibrator,
    rect: Rectangle,
    unit: BandUnit,
    pol_index: usize,
    source: &TileSource,
) -> SarResult<SarRealImage> {
    source.validate(&rect)?;
    log::debug!(
        "Calibrating tile x0={} y0={} {}x{} ({})",
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        unit
    );

    let mut out: SarRealImage = Array2::zeros((rect.height, rect.width));

    if unit == BandUnit::Phase {
        for row in 0..rect.height {
            for col in 0..rect.width {
                out[[row, col]] = source.at(row, col).0 as f32;
            }
        }
        return Ok(out);
    }

    let cfg = calibrator.config();
    let sub_swaths = calibrator.tile_sub_swaths(rect.y, rect.x, rect.width);
    let mut scratch = RowScratch::default();
    let mut factors = vec![0.0; rect.width];

    for row in 0..rect.height {
        let y = rect.y + row;
        calibrator.row_factors(
            y,
            rect.x,
            pol_index,
            sub_swaths.as_deref(),
            &mut scratch,
            &mut factors,
        );
        for col in 0..rect.width {
            let (v, q) = source.at(row, col);
            let sigma = sample_to_intensity(unit, v, q)? * factors[col];
            out[[row, col]] = if cfg.output_db {
                to_db(sigma, cfg.underflow_floor) as f32
            } else {
                sigma as f32
            };
        }
    }
    Ok(out)
}

/// Calibrate one tile of a complex product while keeping its phase: each
/// sample is scaled by the square root of the sigma factor.
pub fn calibrate_tile_complex(
    calibrator: &Calibrator,
    rect: Rectangle,
    pol_index: usize,
    source: ArrayView2<SarComplex>,
) -> SarResult<SarImage> {
    if source.dim() != (rect.height, rect.width) {
        return Err(SarError::Processing(format!(
            "Tile source does not match rectangle {}x{}",
            rect.height, rect.width
        )));
    }

    let mut out: SarImage = Array2::zeros((rect.height, rect.width));
    let sub_swaths = calibrator.tile_sub_swaths(rect.y, rect.x, rect.width);
    let mut scratch = RowScratch::default();
    let mut factors = vec![0.0; rect.width];

    for row in 0..rect.height {
        let y = rect.y + row;
        calibrator.row_factors(
            y,
            rect.x,
            pol_index,
            sub_swaths.as_deref(),
            &mut scratch,
            &mut factors,
        );
        for col in 0..rect.width {
            let scale = factors[col].max(0.0).sqrt() as f32;
            out[[row, col]] = source[[row, col]] * scale;
        }
    }
    Ok(out)
}

/// Strip a previously applied pattern gain and range spreading loss from a
/// ground range tile, leaving the samples in their native unit. Products
/// without an applied pattern calibration pass through unchanged.
pub fn remove_calibration(
    calibrator: &Calibrator,
    rect: Rectangle,
    unit: BandUnit,
    pol_index: usize,
    source: ArrayView2<f32>,
) -> SarResult<SarRealImage> {
    if source.dim() != (rect.height, rect.width) {
        return Err(SarError::Processing(format!(
            "Tile source does not match rectangle {}x{}",
            rect.height, rect.width
        )));
    }

    let pattern = match calibrator {
        Calibrator::Pattern(c) if c.geometry.ground_range => c,
        _ => return Ok(source.to_owned()),
    };

    let cfg = calibrator.config();
    let p = cfg.range_spread_power;
    let mut out: SarRealImage = Array2::zeros((rect.height, rect.width));
    let mut gains = vec![0.0; rect.width];
    let mut slant_ranges = vec![0.0; rect.width];

    for row in 0..rect.height {
        let y = rect.y + row;
        pattern.row_remove_factors(y, rect.x, pol_index, &mut gains, &mut slant_ranges);
        for col in 0..rect.width {
            let v = source[[row, col]] as f64;
            let spread = cfg.reference_slant_range / slant_ranges[col];
            let gain = gains[col];
            let r = match unit {
                BandUnit::Amplitude => v * gain.sqrt() * spread.powf(0.5 * p),
                BandUnit::AmplitudeDb => {
                    10.0 * (10f64.powf(v / 10.0) * gain.sqrt() * spread.powf(0.5 * p)).log10()
                }
                BandUnit::Intensity => v * gain * spread.powf(p),
                BandUnit::IntensityDb => {
                    10.0 * (10f64.powf(v / 10.0) * gain * spread.powf(p)).log10()
                }
                _ => {
                    return Err(SarError::Unit(format!(
                        "Cannot remove calibration from a {} band",
                        unit
                    )));
                }
            };
            out[[row, col]] = r as f32;
        }
    }
    Ok(out)
}

/// Subtract interpolated thermal noise power from one tile, returning
/// detected intensity floored at [`NOISE_FLOOR`].
pub fn remove_thermal_noise(
    rect: Rectangle,
    unit: BandUnit,
    source: &TileSource,
    noise: &NoiseLut,
) -> SarResult<SarRealImage> {
    source.validate(&rect)?;

    let mut out: SarRealImage = Array2::zeros((rect.height, rect.width));
    let mut noise_row = vec![0.0; rect.width];

    for row in 0..rect.height {
        noise.row_values(rect.y + row, rect.x, &mut noise_row);
        for col in 0..rect.width {
            let (v, q) = source.at(row, col);
            let cleaned = sample_to_intensity(unit, v, q)? - noise_row[col];
            out[[row, col]] = if cleaned < 0.0 {
                NOISE_FLOOR as f32
            } else {
                cleaned as f32
            };
        }
    }
    Ok(out)
}

/// Calibrate a whole detected image by splitting it into horizontal bands
/// processed on the rayon pool. Calibration tables are immutable, so the
/// bands share the calibrator without locking.
#[cfg(feature = "parallel")]
pub fn calibrate_image_parallel(
    calibrator: &Calibrator,
    unit: BandUnit,
    pol_index: usize,
    image: ArrayView2<f32>,
    band_height: usize,
) -> SarResult<SarRealImage> {
    let (height, width) = image.dim();
    if height == 0 || width == 0 || band_height == 0 {
        return Err(SarError::Processing(
            "Empty image or zero band height".to_string(),
        ));
    }

    let bands: Vec<usize> = (0..height).step_by(band_height).collect();
    log::info!(
        "Calibrating {}x{} image in {} bands of {} lines",
        height,
        width,
        bands.len(),
        band_height
    );

    let results: Vec<SarRealImage> = bands
        .par_iter()
        .map(|&y0| {
            let h = band_height.min(height - y0);
            let rect = Rectangle::new(0, y0, width, h);
            let view = image.slice(ndarray::s![y0..y0 + h, ..]);
            calibrate_tile(calibrator, rect, unit, pol_index, &TileSource::Real(view))
        })
        .collect::<SarResult<Vec<_>>>()?;

    let views: Vec<_> = results.iter().map(|a| a.view()).collect();
    ndarray::concatenate(Axis(0), &views)
        .map_err(|e| SarError::Processing(format!("Failed to assemble image bands: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibrate::{CalibrationConfig, LutCalibrator, LutTable};
    use crate::core::lut::{CalibrationLut, CalibrationType, CalibrationVector, NoiseVector};
    use crate::types::Polarization;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn flat_lut_calibrator(lut_value: f32, output_db: bool) -> Calibrator {
        let vector = CalibrationVector {
            time_mjd: 0.0,
            line: 0,
            pixels: vec![0, 1000],
            sigma_nought: vec![lut_value; 2],
            beta_nought: vec![lut_value; 2],
            gamma: vec![lut_value; 2],
            dn: vec![lut_value; 2],
        };
        let lut = CalibrationLut::new("IW1", Polarization::VV, 0.0, 0.001, vec![vector]).unwrap();
        Calibrator::Lut(LutCalibrator {
            table: LutTable::Grid(lut),
            cal_type: CalibrationType::Sigma0,
            retro_type: None,
            config: CalibrationConfig {
                output_db,
                ..CalibrationConfig::default()
            },
        })
    }

    #[test]
    fn test_calibrate_tile_amplitude() {
        let cal = flat_lut_calibrator(10.0, false);
        let data = Array2::from_elem((4, 8), 20.0f32);
        let rect = Rectangle::new(0, 0, 8, 4);
        let out = calibrate_tile(
            &cal,
            rect,
            BandUnit::Amplitude,
            0,
            &TileSource::Real(data.view()),
        )
        .unwrap();
        // sigma = 20^2 / 10^2
        for &v in out.iter() {
            assert_relative_eq!(v, 4.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_calibrate_tile_db_output() {
        let cal = flat_lut_calibrator(1.0, true);
        let data = Array2::from_elem((2, 2), 10.0f32);
        let rect = Rectangle::new(0, 0, 2, 2);
        let out = calibrate_tile(
            &cal,
            rect,
            BandUnit::Amplitude,
            0,
            &TileSource::Real(data.view()),
        )
        .unwrap();
        // 10 log10(100) = 20 dB
        assert_relative_eq!(out[[0, 0]], 20.0, epsilon = 1e-5);
    }

    #[test]
    fn test_phase_band_copied_verbatim() {
        let cal = flat_lut_calibrator(10.0, false);
        let data = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f32);
        let rect = Rectangle::new(0, 0, 3, 3);
        let out = calibrate_tile(
            &cal,
            rect,
            BandUnit::Phase,
            0,
            &TileSource::Real(data.view()),
        )
        .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_complex_pair_intensity() {
        let cal = flat_lut_calibrator(1.0, false);
        let i = Array2::from_elem((2, 2), 3.0f32);
        let q = Array2::from_elem((2, 2), 4.0f32);
        let rect = Rectangle::new(0, 0, 2, 2);
        let out = calibrate_tile(
            &cal,
            rect,
            BandUnit::Real,
            0,
            &TileSource::Complex {
                i: i.view(),
                q: q.view(),
            },
        )
        .unwrap();
        assert_relative_eq!(out[[1, 1]], 25.0, epsilon = 1e-6);
    }

    #[test]
    fn test_complex_tile_preserves_phase() {
        let cal = flat_lut_calibrator(2.0, false);
        let data = Array2::from_elem((2, 2), SarComplex::new(3.0, 4.0));
        let rect = Rectangle::new(0, 0, 2, 2);
        let out = calibrate_tile_complex(&cal, rect, 0, data.view()).unwrap();

        // factor = 1/4, scale = 1/2: magnitude halves, phase unchanged
        let z = out[[0, 0]];
        assert_relative_eq!(z.re, 1.5, epsilon = 1e-6);
        assert_relative_eq!(z.im, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mismatched_tile_rejected() {
        let cal = flat_lut_calibrator(1.0, false);
        let data = Array2::from_elem((2, 2), 1.0f32);
        let rect = Rectangle::new(0, 0, 8, 4);
        let r = calibrate_tile(
            &cal,
            rect,
            BandUnit::Intensity,
            0,
            &TileSource::Real(data.view()),
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_thermal_noise_subtraction_and_floor() {
        let noise = NoiseLut::new(
            0.0,
            0.001,
            vec![NoiseVector {
                time_mjd: 0.0,
                line: 0,
                pixels: vec![0, 10],
                noise_lut: vec![50.0, 50.0],
            }],
        )
        .unwrap();

        let data = Array2::from_elem((1, 2), 10.0f32);
        let rect = Rectangle::new(0, 0, 2, 1);
        let out = remove_thermal_noise(
            rect,
            BandUnit::Amplitude,
            &TileSource::Real(data.view()),
            &noise,
        )
        .unwrap();
        // 10^2 - 50 = 50
        assert_relative_eq!(out[[0, 0]], 50.0, epsilon = 1e-6);

        let dim = Array2::from_elem((1, 2), 5.0f32);
        let out = remove_thermal_noise(
            rect,
            BandUnit::Amplitude,
            &TileSource::Real(dim.view()),
            &noise,
        )
        .unwrap();
        // 25 - 50 < 0: floored
        assert_relative_eq!(out[[0, 0]], NOISE_FLOOR as f32, epsilon = 1e-9);
    }

    #[test]
    fn test_remove_calibration_passthrough_for_lut_variant() {
        let cal = flat_lut_calibrator(1.0, false);
        let data = Array2::from_shape_fn((2, 2), |(r, c)| (r + c) as f32);
        let rect = Rectangle::new(0, 0, 2, 2);
        let out = remove_calibration(&cal, rect, BandUnit::Amplitude, 0, data.view()).unwrap();
        assert_eq!(out, data);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_serial() {
        let cal = flat_lut_calibrator(5.0, false);
        let image = Array2::from_shape_fn((37, 16), |(r, c)| (r * 16 + c) as f32 + 1.0);

        let parallel =
            calibrate_image_parallel(&cal, BandUnit::Amplitude, 0, image.view(), 10).unwrap();
        let serial = calibrate_tile(
            &cal,
            Rectangle::new(0, 0, 16, 37),
            BandUnit::Amplitude,
            0,
            &TileSource::Real(image.view()),
        )
        .unwrap();

        assert_eq!(parallel.dim(), serial.dim());
        for (a, b) in parallel.iter().zip(serial.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
