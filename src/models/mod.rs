//! Data models for the FIS geodata client.

mod collection;
mod session;

pub use collection::{GeoRecord, GeomValue, ObjectCollection};
pub use session::ServiceSession;
