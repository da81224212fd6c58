// Adapters layer: concrete implementations of the domain ports (raster sources, storage).

pub mod file_raster;
pub mod http_raster;
pub mod storage;

pub use file_raster::FileRasterSource;
pub use http_raster::HttpRasterSource;
pub use storage::LocalStorage;
