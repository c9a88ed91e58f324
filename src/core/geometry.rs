use crate::core::srgr::{self, SrgrCoefficients};
use crate::types::{OrbitStateVector, SarError, SarResult};

/// Speed of light in vacuum, m/s
pub const LIGHT_SPEED: f64 = 299_792_458.0;

/// Half the speed of light, m/s (one-way range from two-way travel time)
pub const HALF_LIGHT_SPEED: f64 = LIGHT_SPEED / 2.0;

/// Mean Earth radius, m
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.7714;

/// Reference slant range used by range spreading loss compensation, m
pub const REF_SLANT_RANGE_800KM: f64 = 800_000.0;

const WGS84_A: f64 = 6_378_137.0; // semi-major axis
const WGS84_E2: f64 = 0.006_694_379_990_14; // first eccentricity squared

/// Interpolation mode for tie-point grid sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpMode {
    /// Nearest grid sample; numerically stable near subset boundaries
    Nearest,
    /// Quadratic in range combined with linear in azimuth
    Quadratic,
}

/// Coarse, regularly sampled raster (incidence angle, slant range time,
/// latitude) interpolated to full resolution on demand.
#[derive(Debug, Clone)]
pub struct TiePointGrid {
    width: usize,
    height: usize,
    offset_x: f64,
    offset_y: f64,
    sub_sampling_x: f64,
    sub_sampling_y: f64,
    data: Vec<f32>,
}

impl TiePointGrid {
    pub fn new(
        width: usize,
        height: usize,
        offset_x: f64,
        offset_y: f64,
        sub_sampling_x: f64,
        sub_sampling_y: f64,
        data: Vec<f32>,
    ) -> SarResult<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(SarError::Configuration(format!(
                "Tie-point grid dimensions {}x{} do not match {} samples",
                width, height,
                data.len()
            )));
        }
        if sub_sampling_x <= 0.0 || sub_sampling_y <= 0.0 {
            return Err(SarError::Configuration(
                "Tie-point grid sub-sampling must be positive".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            offset_x,
            offset_y,
            sub_sampling_x,
            sub_sampling_y,
            data,
        })
    }

    /// Uniform grid covering a full scene of the given size
    pub fn spanning(
        scene_width: usize,
        scene_height: usize,
        grid_width: usize,
        grid_height: usize,
        data: Vec<f32>,
    ) -> SarResult<Self> {
        let ssx = if grid_width > 1 {
            (scene_width.max(2) - 1) as f64 / (grid_width - 1) as f64
        } else {
            scene_width.max(1) as f64
        };
        let ssy = if grid_height > 1 {
            (scene_height.max(2) - 1) as f64 / (grid_height - 1) as f64
        } else {
            scene_height.max(1) as f64
        };
        Self::new(grid_width, grid_height, 0.0, 0.0, ssx, ssy, data)
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        let i = i.min(self.width - 1);
        let j = j.min(self.height - 1);
        self.data[j * self.width + i] as f64
    }

    /// Sample the grid at full-resolution pixel coordinates
    pub fn sample(&self, x: f64, y: f64, mode: InterpMode) -> f64 {
        let fi = (x - self.offset_x) / self.sub_sampling_x;
        let fj = (y - self.offset_y) / self.sub_sampling_y;

        match mode {
            InterpMode::Nearest => {
                let i = clamp_index(fi + 0.5, self.width);
                let j = clamp_index(fj + 0.5, self.height);
                self.at(i, j)
            }
            InterpMode::Quadratic => {
                let j0 = clamp_index(fj, self.height.saturating_sub(1).max(1));
                let j1 = (j0 + 1).min(self.height - 1);
                let wj = (fj - j0 as f64).clamp(0.0, 1.0);
                let v0 = self.quadratic_in_range(fi, j0);
                let v1 = self.quadratic_in_range(fi, j1);
                v0 * (1.0 - wj) + v1 * wj
            }
        }
    }

    /// Fill one output row with interpolated samples
    pub fn sample_row(&self, x0: usize, y: usize, mode: InterpMode, out: &mut [f64]) {
        for (k, v) in out.iter_mut().enumerate() {
            *v = self.sample((x0 + k) as f64, y as f64, mode);
        }
    }

    // Lagrange interpolation through three grid columns bracketing fi,
    // clamped so degenerate grids fall back to lower orders.
    fn quadratic_in_range(&self, fi: f64, j: usize) -> f64 {
        if self.width < 3 {
            let i0 = clamp_index(fi, self.width.saturating_sub(1).max(1));
            let i1 = (i0 + 1).min(self.width - 1);
            let wi = (fi - i0 as f64).clamp(0.0, 1.0);
            return self.at(i0, j) * (1.0 - wi) + self.at(i1, j) * wi;
        }
        let ic = clamp_index(fi + 0.5, self.width);
        let ic = ic.clamp(1, self.width - 2);
        let (x0, x1, x2) = ((ic - 1) as f64, ic as f64, (ic + 1) as f64);
        let (y0, y1, y2) = (self.at(ic - 1, j), self.at(ic, j), self.at(ic + 1, j));
        let t = fi;
        y0 * (t - x1) * (t - x2) / ((x0 - x1) * (x0 - x2))
            + y1 * (t - x0) * (t - x2) / ((x1 - x0) * (x1 - x2))
            + y2 * (t - x0) * (t - x1) / ((x2 - x0) * (x2 - x1))
    }
}

fn clamp_index(f: f64, len: usize) -> usize {
    if f <= 0.0 {
        0
    } else {
        (f as usize).min(len - 1)
    }
}

/// Distance from the satellite to the Earth centre at the given zero Doppler
/// time, using the state vector with the largest `time <= query` (the last
/// vector if the query exceeds all times).
pub fn satellite_height(time_mjd: f64, orbit: &[OrbitStateVector]) -> f64 {
    let mut idx = 0;
    for (i, sv) in orbit.iter().enumerate() {
        if time_mjd >= sv.time_mjd {
            idx = i;
        } else {
            break;
        }
    }
    orbit[idx].radius()
}

/// Elevation angle in degrees from the law of cosines over the triangle
/// sensor / Earth centre / backscatter element.
pub fn elevation_angle(slant_range: f64, satellite_height: f64, scene_to_earth_centre: f64) -> f64 {
    ((slant_range * slant_range + satellite_height * satellite_height
        - scene_to_earth_centre * scene_to_earth_centre)
        / (2.0 * slant_range * satellite_height))
        .acos()
        .to_degrees()
}

/// Convert geodetic coordinates to ECEF, WGS84 ellipsoid
pub fn latlon_to_ecef(lat: f64, lon: f64, elevation: f64) -> [f64; 3] {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();

    let n = WGS84_A / (1.0 - WGS84_E2 * lat_rad.sin().powi(2)).sqrt();

    let x = (n + elevation) * lat_rad.cos() * lon_rad.cos();
    let y = (n + elevation) * lat_rad.cos() * lon_rad.sin();
    let z = (n * (1.0 - WGS84_E2) + elevation) * lat_rad.sin();

    [x, y, z]
}

fn earth_radius_at(lat: f64) -> f64 {
    let [x, y, z] = latlon_to_ecef(lat, 0.0, 0.0);
    (x * x + y * y + z * z).sqrt()
}

/// Earth radius indexed by a latitude step covering the scene extent.
/// Built once per product and read-only thereafter.
#[derive(Debug, Clone)]
pub struct EarthRadiusTable {
    lat_max: f64,
    del_lat: f64,
    radii: Vec<f64>,
}

impl EarthRadiusTable {
    /// Build the table from the scene latitude extent and pixel spacings
    pub fn new(
        lat_min: f64,
        lat_max: f64,
        range_spacing: f64,
        azimuth_spacing: f64,
    ) -> SarResult<Self> {
        if lat_max < lat_min {
            return Err(SarError::Configuration(format!(
                "Invalid latitude extent [{}, {}]",
                lat_min, lat_max
            )));
        }
        let min_spacing = range_spacing.min(azimuth_spacing);
        if min_spacing <= 0.0 {
            return Err(SarError::Configuration(
                "Pixel spacing must be positive".to_string(),
            ));
        }

        let min_abs_lat = if lat_min * lat_max > 0.0 {
            lat_min.abs().min(lat_max.abs()).to_radians()
        } else {
            0.0
        };
        let del_lat_candidate = (min_spacing / MEAN_EARTH_RADIUS).to_degrees();
        let del_lon = (min_spacing / (MEAN_EARTH_RADIUS * min_abs_lat.cos())).to_degrees();
        let del_lat = del_lat_candidate.min(del_lon);

        let h = ((lat_max - lat_min) / del_lat) as usize + 1;
        let mut radii = Vec::with_capacity(h + 1);
        for i in 0..=h {
            radii.push(earth_radius_at(lat_max - i as f64 * del_lat));
        }

        log::debug!(
            "Earth radius table: {} entries, delLat = {:.6} deg",
            radii.len(),
            del_lat
        );

        Ok(Self {
            lat_max,
            del_lat,
            radii,
        })
    }

    /// Earth radius in meters at the given latitude, clamped to table bounds
    pub fn radius(&self, lat: f64) -> f64 {
        let i = ((self.lat_max - lat) / self.del_lat + 0.5) as i64;
        let i = i.clamp(0, self.radii.len() as i64 - 1) as usize;
        self.radii[i]
    }

    pub fn del_lat(&self) -> f64 {
        self.del_lat
    }
}

/// Acquisition geometry for one product: orbit, timing, tie-point grids and
/// the precomputed Earth radius table. Immutable for the calibration run.
#[derive(Debug, Clone)]
pub struct GeometryModel {
    pub orbit: Vec<OrbitStateVector>,
    pub earth_radius: EarthRadiusTable,
    pub latitude: TiePointGrid,
    pub incidence_angle: TiePointGrid,
    /// Two-way slant range time in nanoseconds; required for slant range products
    pub slant_range_time: Option<TiePointGrid>,
    /// SRGR polynomial records; required for ground range detected products
    pub srgr: Vec<SrgrCoefficients>,
    /// True when the product is ground range detected
    pub ground_range: bool,
    /// Zero Doppler time of the first line, in days (MJD2000)
    pub first_line_time_mjd: f64,
    /// Line time interval, in days
    pub line_time_interval: f64,
    pub range_spacing: f64,
    pub azimuth_spacing: f64,
    /// Average scene height above the ellipsoid, in meters
    pub avg_scene_height: f64,
}

impl GeometryModel {
    /// Check the invariants required before any per-pixel geometry query
    pub fn validate(&self) -> SarResult<()> {
        if self.orbit.is_empty() {
            return Err(SarError::Configuration(
                "Orbit state vector sequence is empty".to_string(),
            ));
        }
        if self.ground_range {
            if self.srgr.is_empty() {
                return Err(SarError::Configuration(
                    "Ground range product without SRGR coefficient records".to_string(),
                ));
            }
        } else if self.slant_range_time.is_none() {
            return Err(SarError::Configuration(
                "Slant range product without slant range time tie-point grid".to_string(),
            ));
        }
        if self.line_time_interval <= 0.0 {
            return Err(SarError::Configuration(
                "Line time interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Zero Doppler time of image line `y`, in days
    pub fn zero_doppler_time(&self, y: usize) -> f64 {
        self.first_line_time_mjd + y as f64 * self.line_time_interval
    }

    pub fn satellite_height_at_line(&self, y: usize) -> f64 {
        satellite_height(self.zero_doppler_time(y), &self.orbit)
    }

    /// SRGR record interpolated for the given line, for ground range products
    pub fn srgr_for_line(&self, y: usize) -> Option<SrgrCoefficients> {
        if !self.ground_range {
            return None;
        }
        srgr::interpolate(&self.srgr, self.zero_doppler_time(y)).ok()
    }

    /// Earth radius for the given pixel; latitude sampled with nearest mode
    /// for numerical stability near subset boundaries.
    pub fn earth_radius(&self, x: usize, y: usize) -> f64 {
        let lat = self.latitude.sample(x as f64, y as f64, InterpMode::Nearest);
        self.earth_radius.radius(lat)
    }

    /// Slant range in meters for the given pixel. Ground range products
    /// evaluate the SRGR polynomial; slant range products sample the
    /// two-way travel time.
    pub fn slant_range(&self, x: usize, y: usize, srgr: Option<&SrgrCoefficients>) -> f64 {
        if let Some(coeffs) = srgr {
            coeffs.ground_to_slant(x as f64 * self.range_spacing + coeffs.ground_range_origin)
        } else if let Some(grid) = &self.slant_range_time {
            let time_ns = grid.sample(x as f64, y as f64, InterpMode::Quadratic);
            time_ns / 1.0e9 * HALF_LIGHT_SPEED
        } else {
            0.0
        }
    }

    /// Elevation angle in degrees for the given pixel and slant range
    pub fn elevation_angle_at(&self, x: usize, y: usize, slant_range: f64) -> f64 {
        let sat_height = self.satellite_height_at_line(y);
        let scene_to_centre = self.avg_scene_height + self.earth_radius(x, y);
        elevation_angle(slant_range, sat_height, scene_to_centre)
    }
}
