pub mod aggregate;
pub mod builder;
pub mod chart;
pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod sunburst;
pub mod tiling;
pub mod transition;
pub mod treemap;

pub use chart::*;
pub use config::*;
pub use error::*;
pub use model::*;
