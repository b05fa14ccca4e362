//! Discovery state captured at client construction.

/// Session state discovered from the `geogeneration` endpoint.
///
/// Built once when the client connects and immutable afterwards. The
/// generation identifier is prefixed on every per-object-type request path.
#[derive(Debug, Clone)]
pub struct ServiceSession {
    /// Base URL of the data service.
    pub base_url: String,
    /// Identifier of the geodata snapshot currently served.
    pub generation: String,
    /// Publication date of the snapshot, as reported by the service.
    pub publication_date: String,
    /// Coordinate reference system geometries arrive in.
    pub service_crs: String,
    /// Optional coordinate reference system to reproject geometries to.
    pub export_crs: Option<String>,
}
