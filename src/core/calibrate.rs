use crate::core::antenna::AntennaPatternSet;
use crate::core::geometry::{elevation_angle, GeometryModel, InterpMode, TiePointGrid};
use crate::core::geometry::REF_SLANT_RANGE_800KM;
use crate::core::lut::{CalibrationLut, CalibrationType, RangeLut};
use crate::types::{BandUnit, SarError, SarRealImage, SarResult};
use serde::{Deserialize, Serialize};

/// Options and constants for one calibration run. Immutable once the
/// calibrator is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Emit sigma nought in dB instead of linear scale
    pub output_db: bool,
    pub apply_antenna_pattern: bool,
    pub apply_range_spreading: bool,
    /// Undo the calibration already applied by the processing facility
    pub retro_calibration: bool,
    /// Multilooked input with prior elevation correction: constant and
    /// incidence angle corrections only
    pub multilook: bool,
    /// Absolute calibration constants, one per polarization slot
    pub calibration_constants: Vec<f64>,
    pub rescaling_factor: f64,
    /// Range spreading loss exponent: 3.0 nominal, 4.0 for some product types
    pub range_spread_power: f64,
    pub reference_slant_range: f64,
    /// Values below this floor map to `-floor` in dB output
    pub underflow_floor: f64,
    /// Product type identifier, checked against the selected variant's
    /// supported set when present
    pub product_type: Option<String>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            output_db: false,
            apply_antenna_pattern: true,
            apply_range_spreading: true,
            retro_calibration: false,
            multilook: false,
            calibration_constants: vec![1.0],
            rescaling_factor: 1.0,
            range_spread_power: 3.0,
            reference_slant_range: REF_SLANT_RANGE_800KM,
            underflow_floor: 1.0e-30,
            product_type: None,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> SarResult<()> {
        if self.calibration_constants.is_empty() {
            return Err(SarError::Configuration(
                "No calibration constants given".to_string(),
            ));
        }
        if self.calibration_constants.iter().any(|&k| k == 0.0) {
            return Err(SarError::Configuration(
                "Calibration constant must be non-zero".to_string(),
            ));
        }
        if self.reference_slant_range <= 0.0 {
            return Err(SarError::Configuration(
                "Reference slant range must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn constant_for(&self, pol_index: usize) -> f64 {
        let idx = pol_index.min(self.calibration_constants.len() - 1);
        self.calibration_constants[idx]
    }
}

/// Convert one raw sample to detected intensity. `q` is only read for
/// real/imaginary bands, where the companion channel completes the pair.
pub fn sample_to_intensity(unit: BandUnit, v: f64, q: f64) -> SarResult<f64> {
    match unit {
        BandUnit::Amplitude => Ok(v * v),
        BandUnit::Intensity => Ok(v),
        BandUnit::Real | BandUnit::Imaginary => Ok(v * v + q * q),
        BandUnit::IntensityDb => Ok(10f64.powf(v / 10.0)),
        BandUnit::AmplitudeDb => Ok(10f64.powf(v / 5.0)),
        BandUnit::Phase => Err(SarError::Unit(
            "Phase band carries no intensity".to_string(),
        )),
    }
}

/// Detected product families handled by the radar-equation chain
const PATTERN_PRODUCT_TYPES: &[&str] = &["IMP", "IMS", "IMG", "APP", "APS", "APG", "WSM", "WSS"];

/// Level-1 families that ship dense calibration annotation
const LUT_PRODUCT_TYPES: &[&str] = &["SLC", "GRD"];

/// Families calibrated with a single absolute constant
const CONSTANT_PRODUCT_TYPES: &[&str] = &["SCS", "MGD", "GEC", "GTC"];

/// Check a product type string against the set a calibrator variant
/// supports. Each sensor recognizes a fixed family of type identifiers.
pub fn validate_product_type(product_type: &str, supported: &[&str]) -> SarResult<()> {
    if supported.iter().any(|s| product_type.contains(s)) {
        Ok(())
    } else {
        Err(SarError::Configuration(format!(
            "Product type {} cannot be calibrated by this sensor model",
            product_type
        )))
    }
}

/// dB conversion with the underflow floor applied
pub fn to_db(sigma: f64, floor: f64) -> f64 {
    if sigma < floor {
        -floor
    } else {
        10.0 * sigma.log10()
    }
}

/// Reused per-row buffers for the tile pipeline, owned by the caller so the
/// calibrator itself stays immutable and shareable across threads.
#[derive(Debug, Default)]
pub struct RowScratch {
    lut: Vec<f64>,
    retro: Vec<f64>,
}

impl RowScratch {
    fn resize(&mut self, len: usize) {
        self.lut.resize(len, 0.0);
        self.retro.resize(len, 0.0);
    }
}

/// Calibrator for envelope-detected sensors whose sigma nought comes from
/// an explicit radar-equation correction chain: incidence angle and
/// absolute constant, range spreading loss, antenna elevation gain.
#[derive(Debug, Clone)]
pub struct PatternCalibrator {
    pub geometry: GeometryModel,
    /// One pattern per polarization slot (single swath) or per sub swath
    /// (wide swath)
    pub new_patterns: AntennaPatternSet,
    /// Patterns applied by the processing facility, undone on retro runs
    pub old_patterns: Option<AntennaPatternSet>,
    pub wide_swath: bool,
    pub config: CalibrationConfig,
}

impl PatternCalibrator {
    pub fn validate(&self) -> SarResult<()> {
        self.config.validate()?;
        if let Some(pt) = &self.config.product_type {
            validate_product_type(pt, PATTERN_PRODUCT_TYPES)?;
        }
        self.geometry.validate()?;
        if self.new_patterns.is_empty() {
            return Err(SarError::Configuration(
                "Antenna pattern set is empty".to_string(),
            ));
        }
        if self.config.retro_calibration {
            match &self.old_patterns {
                Some(old) if !old.is_empty() => {}
                _ => {
                    return Err(SarError::Configuration(
                        "Retro calibration requires the previously applied antenna patterns"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn pattern_index(&self, pol_index: usize, sub_swath: usize) -> usize {
        let idx = if self.wide_swath { sub_swath } else { pol_index };
        idx.min(self.new_patterns.len() - 1)
    }

    fn elevation_at(&self, x: usize, y: usize) -> (f64, f64) {
        let srgr = self.geometry.srgr_for_line(y);
        let sr = self.geometry.slant_range(x, y, srgr.as_ref());
        (sr, self.geometry.elevation_angle_at(x, y, sr))
    }

    /// Per-column sub swath indices for one image row. Sub swath membership
    /// is constant along azimuth, so one row serves a whole tile.
    pub fn sub_swath_indices(&self, y: usize, x0: usize, width: usize, out: &mut Vec<usize>) {
        out.clear();
        out.reserve(width);
        let sat_height = self.geometry.satellite_height_at_line(y);
        let srgr = self.geometry.srgr_for_line(y);
        for k in 0..width {
            let x = x0 + k;
            let sr = self.geometry.slant_range(x, y, srgr.as_ref());
            let centre = self.geometry.avg_scene_height + self.geometry.earth_radius(x, y);
            let elev = elevation_angle(sr, sat_height, centre);
            out.push(self.new_patterns.sub_swath_for(elev));
        }
    }

    /// Multiplicative sigma-nought factors for one row: applied to detected
    /// intensity they produce linear-scale sigma nought.
    pub fn row_factors(
        &self,
        y: usize,
        x0: usize,
        pol_index: usize,
        sub_swaths: Option<&[usize]>,
        out: &mut [f64],
    ) {
        let cfg = &self.config;
        let k = cfg.constant_for(pol_index);
        let constant_and_incidence_only = cfg.multilook && cfg.apply_antenna_pattern;

        let sat_height = self.geometry.satellite_height_at_line(y);
        let srgr = self.geometry.srgr_for_line(y);

        for (i, f) in out.iter_mut().enumerate() {
            let x = x0 + i;
            let inc = self
                .geometry
                .incidence_angle
                .sample(x as f64, y as f64, InterpMode::Quadratic);
            let mut factor = inc.to_radians().abs().sin() / k;

            if !constant_and_incidence_only {
                let sr = self.geometry.slant_range(x, y, srgr.as_ref());
                let centre = self.geometry.avg_scene_height + self.geometry.earth_radius(x, y);
                let elev = elevation_angle(sr, sat_height, centre);

                if cfg.retro_calibration {
                    if let Some(old) = &self.old_patterns {
                        let old_idx = if self.wide_swath {
                            old.sub_swath_for(elev)
                        } else {
                            pol_index.min(old.len() - 1)
                        };
                        factor *= old.gain(old_idx, elev)
                            * (cfg.reference_slant_range / sr).powf(cfg.range_spread_power);
                    }
                }
                if cfg.apply_range_spreading {
                    factor *= (sr / cfg.reference_slant_range).powf(cfg.range_spread_power);
                }
                if cfg.apply_antenna_pattern {
                    let swath = match sub_swaths {
                        Some(s) => s[i],
                        None if self.wide_swath => self.new_patterns.sub_swath_for(elev),
                        None => 0,
                    };
                    factor /= self
                        .new_patterns
                        .gain(self.pattern_index(pol_index, swath), elev);
                }
            }
            *f = factor;
        }
    }

    /// Undo the facility-applied pattern gain and range spreading loss for
    /// one sample in its native unit.
    pub fn apply_retro_calibration(
        &self,
        x: usize,
        y: usize,
        v: f64,
        pol_index: usize,
        unit: BandUnit,
    ) -> SarResult<f64> {
        if !self.config.retro_calibration {
            return Ok(v);
        }
        let old = match &self.old_patterns {
            Some(old) => old,
            None => return Ok(v),
        };

        let (sr, elev) = self.elevation_at(x, y);
        let old_idx = if self.wide_swath {
            old.sub_swath_for(elev)
        } else {
            pol_index.min(old.len() - 1)
        };
        let gain = old.gain(old_idx, elev);
        let p = self.config.range_spread_power;
        let spread = self.config.reference_slant_range / sr;

        match unit {
            BandUnit::Amplitude => Ok(v * gain.sqrt() * spread.powf(0.5 * p)),
            BandUnit::AmplitudeDb => {
                Ok(10.0 * (10f64.powf(v / 10.0) * gain.sqrt() * spread.powf(0.5 * p)).log10())
            }
            BandUnit::Intensity | BandUnit::Real | BandUnit::Imaginary => {
                Ok(v * gain * spread.powf(p))
            }
            BandUnit::IntensityDb => {
                Ok(10.0 * (10f64.powf(v / 10.0) * gain * spread.powf(p)).log10())
            }
            BandUnit::Phase => Err(SarError::Unit(
                "Cannot retro-calibrate a phase band".to_string(),
            )),
        }
    }

    /// Old-pattern gain and slant range rows for stripping an applied
    /// calibration from ground range products.
    pub fn row_remove_factors(
        &self,
        y: usize,
        x0: usize,
        pol_index: usize,
        gains: &mut [f64],
        slant_ranges: &mut [f64],
    ) {
        let old = self.old_patterns.as_ref().unwrap_or(&self.new_patterns);
        let sat_height = self.geometry.satellite_height_at_line(y);
        let srgr = self.geometry.srgr_for_line(y);
        for i in 0..gains.len() {
            let x = x0 + i;
            let sr = self.geometry.slant_range(x, y, srgr.as_ref());
            let centre = self.geometry.avg_scene_height + self.geometry.earth_radius(x, y);
            let elev = elevation_angle(sr, sat_height, centre);
            let idx = if self.wide_swath {
                old.sub_swath_for(elev)
            } else {
                pol_index.min(old.len() - 1)
            };
            gains[i] = old.gain(idx, elev);
            slant_ranges[i] = sr;
        }
    }
}

/// Calibration table source for vector-LUT sensors
#[derive(Debug, Clone)]
pub enum LutTable {
    /// Azimuth-time by range-pixel grid of sparse vectors
    Grid(CalibrationLut),
    /// Range-only table for azimuth-invariant sensors
    Range(RangeLut),
}

/// Calibrator for sensors that ship dense calibration annotation:
/// `sigma = dn^2 / lut^2`, with an optional numerator LUT when undoing a
/// calibration already applied to the input.
#[derive(Debug, Clone)]
pub struct LutCalibrator {
    pub table: LutTable,
    pub cal_type: CalibrationType,
    /// LUT of the calibration baked into the input, removed on retro runs
    pub retro_type: Option<CalibrationType>,
    pub config: CalibrationConfig,
}

impl LutCalibrator {
    pub fn validate(&self) -> SarResult<()> {
        self.config.validate()?;
        if let Some(pt) = &self.config.product_type {
            validate_product_type(pt, LUT_PRODUCT_TYPES)?;
        }
        if let (Some(_), LutTable::Range(_)) = (&self.retro_type, &self.table) {
            return Err(SarError::Configuration(
                "Retro calibration needs the full vector grid".to_string(),
            ));
        }
        Ok(())
    }

    fn factor_from(lut: f64, retro: f64) -> f64 {
        (retro * retro) / (lut * lut)
    }

    pub fn factor_at(&self, x: usize, y: usize) -> f64 {
        match &self.table {
            LutTable::Grid(grid) => {
                let lut = grid.value_at(x, y, self.cal_type);
                let retro = match self.retro_type {
                    Some(t) => grid.value_at(x, y, t),
                    None => 1.0,
                };
                Self::factor_from(lut, retro)
            }
            LutTable::Range(range) => {
                let lut = range.value_at(x);
                Self::factor_from(lut, 1.0)
            }
        }
    }

    pub fn row_factors(&self, y: usize, x0: usize, scratch: &mut RowScratch, out: &mut [f64]) {
        scratch.resize(out.len());
        match &self.table {
            LutTable::Grid(grid) => {
                grid.row_values(y, x0, self.cal_type, &mut scratch.lut);
                match self.retro_type {
                    Some(t) => {
                        grid.row_values(y, x0, t, &mut scratch.retro);
                        for i in 0..out.len() {
                            out[i] = Self::factor_from(scratch.lut[i], scratch.retro[i]);
                        }
                    }
                    None => {
                        for i in 0..out.len() {
                            out[i] = Self::factor_from(scratch.lut[i], 1.0);
                        }
                    }
                }
            }
            LutTable::Range(range) => {
                range.row_values(x0, &mut scratch.lut);
                for i in 0..out.len() {
                    out[i] = Self::factor_from(scratch.lut[i], 1.0);
                }
            }
        }
    }
}

/// Local incidence angle source for constant-calibrated sensors
#[derive(Debug, Clone)]
pub enum IncidenceSource {
    /// Coarse tie-point grid in degrees
    Grid(TiePointGrid),
    /// Full-resolution raster of rescaled integer angles
    Raster {
        data: SarRealImage,
        rescale: f64,
        offset: f64,
    },
}

impl IncidenceSource {
    fn angle_deg(&self, x: usize, y: usize) -> f64 {
        match self {
            IncidenceSource::Grid(grid) => grid.sample(x as f64, y as f64, InterpMode::Quadratic),
            IncidenceSource::Raster {
                data,
                rescale,
                offset,
            } => {
                let j = y.min(data.nrows() - 1);
                let i = x.min(data.ncols() - 1);
                data[[j, i]] as f64 * rescale - offset
            }
        }
    }
}

/// Calibrator for sensors whose annotation reduces to a single absolute
/// constant: `sigma = k * dn^2 * sin(incidence)` with
/// `k = rescaling^2 * constant`, folded once at construction.
#[derive(Debug, Clone)]
pub struct ConstantCalibrator {
    factor: f64,
    pub incidence: IncidenceSource,
    pub config: CalibrationConfig,
}

impl ConstantCalibrator {
    /// `cell_size` divides the folded factor for high-resolution modes whose
    /// constant is normalized per unit area.
    pub fn new(
        calibration_constant: f64,
        rescaling_factor: f64,
        cell_size: Option<f64>,
        incidence: IncidenceSource,
        config: CalibrationConfig,
    ) -> SarResult<Self> {
        config.validate()?;
        if let Some(pt) = &config.product_type {
            validate_product_type(pt, CONSTANT_PRODUCT_TYPES)?;
        }
        if calibration_constant == 0.0 {
            return Err(SarError::Configuration(
                "Calibration constant must be non-zero".to_string(),
            ));
        }
        // Some products store the constant, others its reciprocal
        let k = if calibration_constant > 1.0 {
            1.0 / calibration_constant
        } else {
            calibration_constant
        };
        let mut factor = rescaling_factor * rescaling_factor * k;
        if let Some(cell) = cell_size {
            if cell <= 0.0 {
                return Err(SarError::Configuration(
                    "Cell size must be positive".to_string(),
                ));
            }
            factor /= cell;
        }
        Ok(Self {
            factor,
            incidence,
            config,
        })
    }

    pub fn validate(&self) -> SarResult<()> {
        self.config.validate()?;
        if let Some(pt) = &self.config.product_type {
            validate_product_type(pt, CONSTANT_PRODUCT_TYPES)?;
        }
        Ok(())
    }

    pub fn factor_at(&self, x: usize, y: usize) -> f64 {
        self.factor * self.incidence.angle_deg(x, y).to_radians().abs().sin()
    }

    pub fn row_factors(&self, y: usize, x0: usize, out: &mut [f64]) {
        for (i, f) in out.iter_mut().enumerate() {
            *f = self.factor_at(x0 + i, y);
        }
    }
}

/// Per-sensor calibration strategy. All variants reduce a pixel to
/// `sigma = intensity * factor(x, y)`, which keeps the tile pipeline and
/// the complex output path uniform.
#[derive(Debug, Clone)]
pub enum Calibrator {
    Pattern(PatternCalibrator),
    Lut(LutCalibrator),
    Constant(ConstantCalibrator),
}

impl Calibrator {
    /// Validate tables and constants before the first tile
    pub fn initialize(&self) -> SarResult<()> {
        match self {
            Calibrator::Pattern(c) => c.validate()?,
            Calibrator::Lut(c) => c.validate()?,
            Calibrator::Constant(c) => c.validate()?,
        }
        log::info!(
            "Calibrator ready: {} variant, output {}",
            match self {
                Calibrator::Pattern(_) => "antenna-pattern",
                Calibrator::Lut(_) => "vector-LUT",
                Calibrator::Constant(_) => "constant",
            },
            if self.config().output_db {
                "dB"
            } else {
                "linear"
            }
        );
        Ok(())
    }

    pub fn config(&self) -> &CalibrationConfig {
        match self {
            Calibrator::Pattern(c) => &c.config,
            Calibrator::Lut(c) => &c.config,
            Calibrator::Constant(c) => &c.config,
        }
    }

    /// Sub swath index per column, computed once per tile from its first
    /// row. Only wide swath pattern products need it.
    pub fn tile_sub_swaths(&self, y: usize, x0: usize, width: usize) -> Option<Vec<usize>> {
        match self {
            Calibrator::Pattern(c) if c.wide_swath && c.config.apply_antenna_pattern => {
                let mut out = Vec::new();
                c.sub_swath_indices(y, x0, width, &mut out);
                Some(out)
            }
            _ => None,
        }
    }

    /// Fill `out` with the multiplicative sigma factors for one image row
    pub fn row_factors(
        &self,
        y: usize,
        x0: usize,
        pol_index: usize,
        sub_swaths: Option<&[usize]>,
        scratch: &mut RowScratch,
        out: &mut [f64],
    ) {
        match self {
            Calibrator::Pattern(c) => c.row_factors(y, x0, pol_index, sub_swaths, out),
            Calibrator::Lut(c) => c.row_factors(y, x0, scratch, out),
            Calibrator::Constant(c) => c.row_factors(y, x0, out),
        }
    }

    /// Sigma factor for a single pixel; slower than the row path but exact
    /// for spot checks and resampling kernels.
    pub fn factor_at(&self, x: usize, y: usize, pol_index: usize) -> f64 {
        match self {
            Calibrator::Pattern(c) => {
                let mut out = [0.0];
                c.row_factors(y, x, pol_index, None, &mut out);
                out[0]
            }
            Calibrator::Lut(c) => c.factor_at(x, y),
            Calibrator::Constant(c) => c.factor_at(x, y),
        }
    }

    /// Calibrate one sample given its native unit. `q` is the companion
    /// channel for real/imaginary bands and ignored otherwise.
    pub fn calibrate_point(
        &self,
        v: f64,
        q: f64,
        x: usize,
        y: usize,
        pol_index: usize,
        unit: BandUnit,
    ) -> SarResult<f64> {
        let intensity = sample_to_intensity(unit, v, q)?;
        let sigma = intensity * self.factor_at(x, y, pol_index);
        let cfg = self.config();
        Ok(if cfg.output_db {
            to_db(sigma, cfg.underflow_floor)
        } else {
            sigma
        })
    }

    /// Undo a previously applied calibration for one sample. Only the
    /// pattern variant distinguishes this from the factor itself; the other
    /// variants fold retro into their LUT ratio and pass samples through.
    pub fn apply_retro_calibration(
        &self,
        x: usize,
        y: usize,
        v: f64,
        pol_index: usize,
        unit: BandUnit,
    ) -> SarResult<f64> {
        match self {
            Calibrator::Pattern(c) => c.apply_retro_calibration(x, y, v, pol_index, unit),
            _ => Ok(v),
        }
    }
}
