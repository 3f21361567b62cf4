//! Parameter parsing that happens outside, or late in, the pipeline.

mod addressit;
mod geometries;
mod ids;

pub use addressit::{AddressitAnalyzer, DeferToAddressit};
pub use geometries::{GeometrySet, parse_geometries};
pub use ids::parse_ids;
