//! Error types for the FIS geodata client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to or exporting from the service.
#[derive(Debug, Error)]
pub enum Error {
    /// The discovery handshake at construction time failed: the endpoint was
    /// unreachable or the response lacked the expected generation keys.
    #[error("Service discovery failed: {reason}")]
    Discovery { reason: String },

    /// A page request returned a non-success HTTP status. Carries the failing
    /// URL and the raw response body for diagnosis.
    #[error("Request failed: {url} returned status {status}: {body}")]
    Request {
        url: String,
        status: u16,
        body: String,
    },

    /// Geometry parsing failed for a collection. Only surfaced in
    /// [`GeometryMode::Strict`](crate::GeometryMode::Strict); the default
    /// best-effort mode logs a warning and keeps the raw WKT instead.
    #[error("Failed to parse geometry for geotype '{geotype}': {message}")]
    GeometryParse { geotype: String, message: String },

    /// A collection operation was applied to a geotype whose endpoint
    /// returned a non-tabular payload.
    #[error("Geotype '{0}' returned a non-tabular payload")]
    NonTabular(String),

    /// Coordinate-system lookup or reprojection failed.
    #[error("Projection error: {message}")]
    Projection { message: String },

    /// The requested export format is not supported.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// The export destination already exists and `force` was not set.
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Transport-level HTTP failure.
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The base URL or a composed request URL was invalid.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A response body could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
