//! Object collections: in-memory tables of geo-tagged records.

use geo::Geometry;
use serde_json::Value;
use wkt::ToWkt;

use crate::wire::Row;

/// The geometry carried by a record.
///
/// `Raw` holds the unparsed WKT string when best-effort parsing fell back
/// for the whole collection.
#[derive(Debug, Clone, PartialEq)]
pub enum GeomValue {
    /// Parsed geometry in the collection's coordinate system.
    Parsed(Geometry<f64>),
    /// Unparsed well-known text, kept verbatim.
    Raw(String),
}

impl GeomValue {
    /// The parsed geometry, if parsing succeeded.
    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Self::Parsed(g) => Some(g),
            Self::Raw(_) => None,
        }
    }

    /// WKT representation: re-serialized for parsed geometry, verbatim for raw.
    pub fn to_wkt_string(&self) -> String {
        match self {
            Self::Parsed(g) => g.wkt_string(),
            Self::Raw(s) => s.clone(),
        }
    }
}

/// One geo-tagged record: arbitrary scalar fields plus an optional geometry.
#[derive(Debug, Clone)]
pub struct GeoRecord {
    /// Scalar attribute fields. The wire `Geometry` field is moved out of
    /// this map into [`GeoRecord::geometry`] during normalization.
    pub fields: Row,
    /// Canonical geometry slot.
    pub geometry: Option<GeomValue>,
}

impl GeoRecord {
    /// Look up a scalar field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A named, typed set of geo-tagged records for one geotype.
///
/// Within a collection the `Id` field is unique. Collections are cached by
/// geotype for the lifetime of the client and never refreshed: a client that
/// outlives a service generation keeps serving the data it fetched first.
#[derive(Debug, Clone)]
pub struct ObjectCollection {
    /// Name of the geotype these records belong to.
    pub geotype: String,
    /// The records, in service order.
    pub records: Vec<GeoRecord>,
}

impl ObjectCollection {
    /// Number of records in the collection.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose `field` equals `value` exactly.
    pub fn filter_by_field(&self, field: &str, value: &Value) -> Vec<GeoRecord> {
        self.records
            .iter()
            .filter(|r| r.field(field) == Some(value))
            .cloned()
            .collect()
    }

    /// Column names in first-seen order across all records, with the
    /// canonical `geometry` column last when any record carries one.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in &self.records {
            for key in record.fields.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        if self.records.iter().any(|r| r.geometry.is_some()) {
            names.push("geometry".to_string());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> GeoRecord {
        match fields {
            Value::Object(map) => GeoRecord {
                fields: map,
                geometry: None,
            },
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_filter_by_field_exact_match() {
        let collection = ObjectCollection {
            geotype: "bridge".to_string(),
            records: vec![
                record(json!({"Id": 1, "Name": "Waalbrug"})),
                record(json!({"Id": 2, "Name": "Spoorbrug"})),
                record(json!({"Id": 3, "Name": "Waalbrug"})),
            ],
        };

        let hits = collection.filter_by_field("Name", &json!("Waalbrug"));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].field("Id"), Some(&json!(1)));

        // Exact, case-sensitive: no fuzzy matching.
        assert!(collection.filter_by_field("Name", &json!("waalbrug")).is_empty());
        assert!(collection.filter_by_field("Name", &json!("Waal")).is_empty());
    }

    #[test]
    fn test_column_names_keep_wire_order() {
        // Fields arrive in whatever order the service sends them; columns
        // must not be re-sorted.
        let collection = ObjectCollection {
            geotype: "bridge".to_string(),
            records: vec![record(json!({"Zeta": 1, "Alpha": 2, "Mid": 3}))],
        };
        assert_eq!(collection.column_names(), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_column_names_order_and_geometry_last() {
        let mut first = record(json!({"Id": 1, "Name": "a"}));
        first.geometry = Some(GeomValue::Raw("POINT (1 2)".to_string()));
        let second = record(json!({"Id": 2, "Width": 12.5}));
        let collection = ObjectCollection {
            geotype: "bridge".to_string(),
            records: vec![first, second],
        };
        assert_eq!(collection.column_names(), vec!["Id", "Name", "Width", "geometry"]);
    }
}
