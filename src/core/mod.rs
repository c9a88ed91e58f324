//! Core radiometric calibration modules

pub mod antenna;
pub mod calibrate;
pub mod geometry;
pub mod lut;
pub mod srgr;
pub mod tile;

// Re-export main types
pub use antenna::{select_sub_swath, AntennaPatternSet, ElevationPattern};
pub use calibrate::{
    sample_to_intensity, to_db, validate_product_type, CalibrationConfig, Calibrator,
    ConstantCalibrator, IncidenceSource, LutCalibrator, LutTable, PatternCalibrator, RowScratch,
};
pub use geometry::{
    elevation_angle, satellite_height, EarthRadiusTable, GeometryModel, InterpMode, TiePointGrid,
};
pub use lut::{
    CalibrationLut, CalibrationType, CalibrationVector, NoiseLut, NoiseVector, RangeLut,
};
pub use srgr::SrgrCoefficients;
pub use tile::{
    calibrate_tile, calibrate_tile_complex, remove_calibration, remove_thermal_noise, Rectangle,
    TileSource,
};

#[cfg(feature = "parallel")]
pub use tile::calibrate_image_parallel;
