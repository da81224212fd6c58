// Domain layer: raster/time models, ROI geometry and ports. No I/O here.

pub mod model;
pub mod ports;
pub mod roi;
