pub mod aggregate;
pub mod engine;
pub mod extract;
pub mod hydraulics;
pub mod table;
pub mod water_balance;

pub use crate::domain::ports::{Pipeline, RasterSource, Storage};
pub use crate::utils::error::Result;
