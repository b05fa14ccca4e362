//! Wire-format decoding for service responses.
//!
//! The service answers every GET with one of three JSON shapes. They are
//! distinguished once, here, into a tagged union instead of re-inspecting
//! keys at each call site:
//!
//! 1. `{"Result": [...], "Offset": n, "Count": n, "TotalCount": n}` — one
//!    page of a paginated listing;
//! 2. an object carrying a `Geometry` key — a single full object;
//! 3. anything else — an opaque scalar/catalog payload.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Row type for listing records: a flat JSON object.
pub type Row = Map<String, Value>;

/// One page of a paginated listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEnvelope {
    /// Records in this page.
    #[serde(rename = "Result")]
    pub result: Vec<Row>,
    /// Offset at which this page starts.
    #[serde(rename = "Offset")]
    pub offset: u64,
    /// Number of records in this page.
    #[serde(rename = "Count")]
    pub count: u64,
    /// Total number of records available across all pages.
    #[serde(rename = "TotalCount")]
    pub total_count: u64,
}

impl PageEnvelope {
    /// Whether more pages follow this one.
    pub fn has_more(&self) -> bool {
        self.offset + self.count < self.total_count
    }
}

/// A decoded response body.
#[derive(Debug, Clone)]
pub enum WirePayload {
    /// One page of a multi-page listing.
    Page(PageEnvelope),
    /// A single object, to be wrapped as a one-record collection.
    Single(Row),
    /// A non-tabular payload, passed through untouched.
    Opaque(Value),
}

/// Decode a raw response body into its wire shape.
pub fn decode(body: Value) -> Result<WirePayload, serde_json::Error> {
    let is_page = body
        .as_object()
        .is_some_and(|map| map.contains_key("Result"));
    if is_page {
        return Ok(WirePayload::Page(serde_json::from_value(body)?));
    }
    match body {
        Value::Object(map) if map.contains_key("Geometry") => Ok(WirePayload::Single(map)),
        other => Ok(WirePayload::Opaque(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_page() {
        let body = json!({
            "Result": [{"Id": 1, "Name": "a"}, {"Id": 2, "Name": "b"}],
            "Offset": 0,
            "Count": 2,
            "TotalCount": 5
        });
        match decode(body).unwrap() {
            WirePayload::Page(page) => {
                assert_eq!(page.result.len(), 2);
                assert_eq!(page.total_count, 5);
                assert!(page.has_more());
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_final_page() {
        let body = json!({
            "Result": [{"Id": 3}],
            "Offset": 4,
            "Count": 1,
            "TotalCount": 5
        });
        match decode(body).unwrap() {
            WirePayload::Page(page) => assert!(!page.has_more()),
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_single_object() {
        let body = json!({"Id": 7, "Geometry": "POINT (5.0 52.0)", "Name": "x"});
        match decode(body).unwrap() {
            WirePayload::Single(row) => {
                assert_eq!(row["Id"], json!(7));
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_opaque_array() {
        let body = json!(["bridge", "lock", "chamber"]);
        match decode(body).unwrap() {
            WirePayload::Opaque(Value::Array(names)) => assert_eq!(names.len(), 3),
            other => panic!("expected opaque array, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_opaque_object_without_markers() {
        let body = json!({"GeoGeneration": 421, "PublicationDate": "2019-09-24"});
        assert!(matches!(decode(body).unwrap(), WirePayload::Opaque(_)));
    }
}
