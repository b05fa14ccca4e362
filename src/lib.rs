//! Client for the geodata service of the Rijkswaterstaat Fairway
//! Information Services (vaarweginformatie.nl).
//!
//! The service exposes geographic object collections ("geotypes": bridges,
//! locks, chambers, fairway sections, ...) versioned by a generation
//! identifier and paginated by offset. [`GeoDataClient`] discovers the
//! current generation at construction, fetches collections page by page,
//! parses WKT geometry, and caches each collection for the lifetime of the
//! client. On top of the cache it offers value and spatial queries, joins
//! between related geotypes, and export to spreadsheet or CSV.
//!
//! ```no_run
//! use fisgeo::GeoDataClient;
//!
//! # fn main() -> fisgeo::Result<()> {
//! let mut fis = GeoDataClient::connect()?;
//! let bridges = fis.collection("bridge")?;
//! println!("{} bridges in generation {}", bridges.len(), fis.session().generation);
//!
//! let pairs = fis.merge_geotypes("bridge", "opening", None, None)?;
//! # let _ = pairs;
//! # Ok(())
//! # }
//! ```
//!
//! All I/O is synchronous and blocking; a client instance is meant to be
//! used from one thread.

pub use geo;

mod client;
mod error;
mod export;
mod geometry;
mod http;
mod models;
mod wire;

pub use client::{
    GeoDataClient, GeoDataClientBuilder, Listing, Payload, PolygonQuery, DEFAULT_BASE_URL,
};
pub use error::{Error, Result};
pub use export::{ExportFormat, ExportOptions};
pub use geometry::{parse_wkt, CoordSystem, GeometryMode};
pub use models::{GeoRecord, GeomValue, ObjectCollection, ServiceSession};
pub use wire::{PageEnvelope, Row, WirePayload};
