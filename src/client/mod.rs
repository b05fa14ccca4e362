//! The geodata client: discovery, paginated fetching, caching, and the
//! query operations layered on top of the cached collections.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use geo::{Closest, ClosestPoint, Contains, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::export::{self, ExportOptions};
use crate::geometry::{self, CoordSystem, GeometryMode};
use crate::http::{self, HttpClient, DEFAULT_TIMEOUT};
use crate::models::{GeoRecord, GeomValue, ObjectCollection, ServiceSession};
use crate::wire::{self, Row, WirePayload};

/// Public endpoint of the Rijkswaterstaat fairway information data service.
pub const DEFAULT_BASE_URL: &str = "https://www.vaarweginformatie.nl/wfswms/dataservice/1.3";

/// Number of records requested per page. This is also the service maximum.
const DEFAULT_PAGE_SIZE: u64 = 500;

/// Result of a single-object lookup: either a normalized collection or an
/// opaque payload, depending on the response shape.
#[derive(Debug, Clone)]
pub enum Payload {
    Collection(ObjectCollection),
    Opaque(Value),
}

/// Result of a listing: a reference into the per-geotype cache, or an opaque
/// payload passed through untouched (and never cached).
#[derive(Debug)]
pub enum Listing<'a> {
    Collection(&'a ObjectCollection),
    Opaque(Value),
}

/// A polygon query argument: a ready-made polygon, or an ordered ring of
/// (longitude, latitude) pairs, closed or unclosed.
#[derive(Debug, Clone)]
pub enum PolygonQuery {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl PolygonQuery {
    fn contains(&self, geometry: &Geometry<f64>) -> bool {
        match self {
            Self::Polygon(p) => p.contains(geometry),
            // Containment in any member polygon is containment in the multi.
            Self::MultiPolygon(m) => m.iter().any(|p| p.contains(geometry)),
        }
    }
}

impl From<Polygon<f64>> for PolygonQuery {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for PolygonQuery {
    fn from(polygons: MultiPolygon<f64>) -> Self {
        Self::MultiPolygon(polygons)
    }
}

impl From<Vec<(f64, f64)>> for PolygonQuery {
    fn from(ring: Vec<(f64, f64)>) -> Self {
        // Polygon::new closes an unclosed ring.
        Self::Polygon(Polygon::new(LineString::from(ring), vec![]))
    }
}

impl From<&[(f64, f64)]> for PolygonQuery {
    fn from(ring: &[(f64, f64)]) -> Self {
        ring.to_vec().into()
    }
}

/// Rows accumulated by the pagination loop, or an opaque body.
enum Fetched {
    Rows(Vec<Row>),
    Opaque(Value),
}

/// Builder for [`GeoDataClient`]. `connect()` performs the discovery
/// handshake and returns the ready client.
#[derive(Debug, Clone)]
pub struct GeoDataClientBuilder {
    base_url: String,
    page_size: u64,
    export_crs: Option<String>,
    geometry_mode: GeometryMode,
    timeout: Duration,
}

impl Default for GeoDataClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            export_crs: None,
            geometry_mode: GeometryMode::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeoDataClientBuilder {
    /// Override the service endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the page size used by the pagination loop.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reproject geometries to this coordinate system (e.g. `EPSG:28992`)
    /// after fetching. By default geometries stay in the service system.
    pub fn export_crs(mut self, crs: impl Into<String>) -> Self {
        self.export_crs = Some(crs.into());
        self
    }

    /// Set the geometry parse-failure policy.
    pub fn geometry_mode(mut self, mode: GeometryMode) -> Self {
        self.geometry_mode = mode;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect: issue the `geogeneration` discovery request and capture the
    /// session state. Fails with [`Error::Discovery`] if the endpoint is
    /// unreachable or the response lacks the expected keys.
    pub fn connect(self) -> Result<GeoDataClient> {
        let discovery = |e: Error| Error::Discovery {
            reason: e.to_string(),
        };

        let base = Url::parse(&self.base_url).map_err(|e| Error::Discovery {
            reason: format!("invalid base URL '{}': {e}", self.base_url),
        })?;
        let http = HttpClient::new(self.timeout).map_err(discovery)?;

        let url = http::join_url(&base, &["geogeneration"]).map_err(discovery)?;
        let body = http.get_json(&url).map_err(discovery)?;
        let generation = discovery_field(&body, "GeoGeneration")?;
        let publication_date = discovery_field(&body, "PublicationDate")?;
        info!(%generation, %publication_date, "connected to geodata service");

        let service_crs = "EPSG:4326".to_string();
        let reprojection = match &self.export_crs {
            Some(name) => Some((
                CoordSystem::from_epsg(&service_crs)?,
                CoordSystem::from_epsg(name)?,
            )),
            None => None,
        };

        Ok(GeoDataClient {
            http,
            base,
            page_size: self.page_size,
            geometry_mode: self.geometry_mode,
            reprojection,
            session: ServiceSession {
                base_url: self.base_url,
                generation,
                publication_date,
                service_crs,
                export_crs: self.export_crs,
            },
            cache: HashMap::new(),
        })
    }
}

fn discovery_field(body: &Value, key: &str) -> Result<String> {
    match body.get(key) {
        Some(Value::Null) | None => Err(Error::Discovery {
            reason: format!("discovery response lacks '{key}'"),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

/// Synchronous client for the fairway-information geodata service.
///
/// Owns the discovered session and a per-geotype cache of fetched
/// collections. The cache is never refreshed: collections are served as
/// fetched for the lifetime of the client. All methods block; callers
/// sharing a client across threads must serialize access themselves.
pub struct GeoDataClient {
    http: HttpClient,
    base: Url,
    page_size: u64,
    geometry_mode: GeometryMode,
    reprojection: Option<(CoordSystem, CoordSystem)>,
    session: ServiceSession,
    cache: HashMap<String, ObjectCollection>,
}

impl std::fmt::Debug for GeoDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDataClient")
            .field("base", &self.base.as_str())
            .field("page_size", &self.page_size)
            .field("geometry_mode", &self.geometry_mode)
            .field("session", &self.session)
            .field("cached_geotypes", &self.cache.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl GeoDataClient {
    /// Builder with the public endpoint and default settings.
    pub fn builder() -> GeoDataClientBuilder {
        GeoDataClientBuilder::default()
    }

    /// Connect to the public endpoint with default settings.
    pub fn connect() -> Result<Self> {
        Self::builder().connect()
    }

    /// The session state discovered at construction.
    pub fn session(&self) -> &ServiceSession {
        &self.session
    }

    /// Whether a collection for `geotype` is already cached.
    pub fn is_cached(&self, geotype: &str) -> bool {
        self.cache.contains_key(geotype)
    }

    /// All object-type names supported by the service. Catalog metadata,
    /// fetched fresh on every call.
    pub fn list_geotypes(&self) -> Result<Vec<String>> {
        let body = self.catalog(&["geotype"])?;
        Ok(serde_json::from_value(body)?)
    }

    /// Relation names declared for one geotype. Not all relations are
    /// explicitly specified by the service.
    pub fn list_relations(&self, geotype: &str) -> Result<Value> {
        self.catalog(&[geotype, "relations"])
    }

    /// All objects of one geotype.
    ///
    /// Served from the cache when present (zero network requests);
    /// otherwise fetched page by page, normalized, and cached. A
    /// non-tabular body is returned as [`Listing::Opaque`] and not cached.
    pub fn list_objects(&mut self, geotype: &str) -> Result<Listing<'_>> {
        if self.cache.contains_key(geotype) {
            debug!(geotype, "serving collection from cache");
            return Ok(Listing::Collection(&self.cache[geotype]));
        }

        let generation = self.session.generation.clone();
        match self.request(&[&generation, geotype])? {
            Fetched::Rows(rows) => {
                let collection = self.finalize_collection(geotype, rows)?;
                self.cache.insert(geotype.to_string(), collection);
                Ok(Listing::Collection(&self.cache[geotype]))
            }
            Fetched::Opaque(value) => Ok(Listing::Opaque(value)),
        }
    }

    /// Load the collections of every known geotype, sequentially. The first
    /// per-type failure aborts the sweep and propagates.
    pub fn list_all_objects(&mut self) -> Result<()> {
        for geotype in self.list_geotypes()? {
            self.list_objects(&geotype)?;
        }
        Ok(())
    }

    /// All data of one object. Bypasses the cache; issues exactly one
    /// request. The identifier is coerced to its string form for the path.
    pub fn get_object(&self, geotype: &str, objectid: impl ToString) -> Result<Payload> {
        let id = objectid.to_string();
        let generation = &self.session.generation;
        self.fetch_payload(geotype, &[generation, geotype, &id])
    }

    /// Related sub-objects of one object, e.g. the openings of a bridge.
    /// Bypasses the cache; issues exactly one request.
    pub fn get_object_subobjects(
        &self,
        geotype: &str,
        objectid: impl ToString,
        geotype2: &str,
    ) -> Result<Payload> {
        let id = objectid.to_string();
        let generation = &self.session.generation;
        self.fetch_payload(geotype2, &[generation, geotype, &id, geotype2])
    }

    /// Records whose `Name` field equals `name` exactly.
    pub fn find_object_by_name(&mut self, geotype: &str, name: &str) -> Result<Vec<GeoRecord>> {
        self.find_object_by_value(geotype, "Name", &Value::String(name.to_string()))
    }

    /// Records whose `field` equals `value` exactly (case-sensitive, no
    /// fuzzy matching). Loads the collection if not yet cached.
    pub fn find_object_by_value(
        &mut self,
        geotype: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<GeoRecord>> {
        let collection = self.collection(geotype)?;
        Ok(collection.filter_by_field(field, value))
    }

    /// Records whose geometry lies strictly within the polygon. Boundary
    /// points are excluded (containment, not intersection).
    pub fn find_object_by_polygon(
        &mut self,
        geotype: &str,
        polygon: impl Into<PolygonQuery>,
    ) -> Result<Vec<GeoRecord>> {
        let query = polygon.into();
        let collection = self.collection(geotype)?;
        Ok(collection
            .records
            .iter()
            .filter(|record| match parsed_geometry(record) {
                Some(geometry) => query.contains(geometry),
                None => false,
            })
            .cloned()
            .collect())
    }

    /// Records whose geometry coincides with the point of the collection
    /// nearest to `point`.
    ///
    /// The nearest point is computed over all record geometries; records are
    /// then matched by exact geometry equality. When the nearest point lies
    /// on a segment interior rather than on a record's own point geometry,
    /// this legitimately returns zero records.
    pub fn find_closest_object(
        &mut self,
        geotype: &str,
        point: impl Into<Point<f64>>,
    ) -> Result<Vec<GeoRecord>> {
        let point: Point<f64> = point.into();
        let collection = self.collection(geotype)?;

        let mut nearest: Option<Point<f64>> = None;
        let mut nearest_distance = f64::INFINITY;
        for record in &collection.records {
            let Some(geometry) = parsed_geometry(record) else {
                continue;
            };
            let candidate = match geometry.closest_point(&point) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => p,
                Closest::Indeterminate => continue,
            };
            let distance = (candidate.x() - point.x()).hypot(candidate.y() - point.y());
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest = Some(candidate);
            }
        }

        let Some(nearest) = nearest else {
            return Ok(Vec::new());
        };
        let target = Geometry::Point(nearest);
        Ok(collection
            .records
            .iter()
            .filter(|record| parsed_geometry(record) == Some(&target))
            .cloned()
            .collect())
    }

    /// Inner join of two collections.
    ///
    /// When the join keys are not supplied they are inferred: if the right
    /// collection declares a `ParentGeoType`, join `(GeoType, Id)` against
    /// `(ParentGeoType, ParentId)`; otherwise `Id` against `ParentId`.
    /// Right-side column names already present on the left are suffixed
    /// `_{right_geotype}`. Geometry values are re-serialized as WKT.
    pub fn merge_geotypes(
        &mut self,
        left_geotype: &str,
        right_geotype: &str,
        left_on: Option<&[&str]>,
        right_on: Option<&[&str]>,
    ) -> Result<Vec<Row>> {
        self.collection(left_geotype)?;
        self.collection(right_geotype)?;
        let left = &self.cache[left_geotype];
        let right = &self.cache[right_geotype];

        let (left_keys, right_keys): (Vec<String>, Vec<String>) = match (left_on, right_on) {
            (Some(l), Some(r)) => (
                l.iter().map(|s| s.to_string()).collect(),
                r.iter().map(|s| s.to_string()).collect(),
            ),
            _ => {
                let has_parent_type = right
                    .records
                    .iter()
                    .any(|record| record.fields.contains_key("ParentGeoType"));
                if has_parent_type {
                    (
                        vec!["GeoType".to_string(), "Id".to_string()],
                        vec!["ParentGeoType".to_string(), "ParentId".to_string()],
                    )
                } else {
                    (vec!["Id".to_string()], vec!["ParentId".to_string()])
                }
            }
        };

        let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in right.records.iter().enumerate() {
            if let Some(key) = join_key(record, &right_keys) {
                right_index.entry(key).or_default().push(i);
            }
        }

        let mut rows = Vec::new();
        for left_record in &left.records {
            let Some(key) = join_key(left_record, &left_keys) else {
                continue;
            };
            let Some(matches) = right_index.get(&key) else {
                continue;
            };
            for &i in matches {
                let right_record = &right.records[i];
                let mut row = left_record.fields.clone();
                if let Some(g) = &left_record.geometry {
                    row.insert("geometry".to_string(), Value::String(g.to_wkt_string()));
                }
                for (name, value) in &right_record.fields {
                    let column = if row.contains_key(name) {
                        format!("{name}_{right_geotype}")
                    } else {
                        name.clone()
                    };
                    row.insert(column, value.clone());
                }
                if let Some(g) = &right_record.geometry {
                    let column = if row.contains_key("geometry") {
                        format!("geometry_{right_geotype}")
                    } else {
                        "geometry".to_string()
                    };
                    row.insert(column, Value::String(g.to_wkt_string()));
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Export collections to a workbook or to delimited-text files.
    /// See [`ExportOptions`] for format, force, and geotype selection.
    pub fn export(&mut self, path: impl AsRef<Path>, options: ExportOptions) -> Result<()> {
        export::export(self, path.as_ref(), options)
    }

    /// The cached collection for `geotype`, fetching it first if needed.
    /// Fails with [`Error::NonTabular`] when the endpoint yields an opaque
    /// payload instead of a listing.
    pub fn collection(&mut self, geotype: &str) -> Result<&ObjectCollection> {
        match self.list_objects(geotype)? {
            Listing::Collection(collection) => Ok(collection),
            Listing::Opaque(_) => Err(Error::NonTabular(geotype.to_string())),
        }
    }

    /// Single non-paginated request for catalog metadata.
    fn catalog(&self, components: &[&str]) -> Result<Value> {
        let url = http::join_url(&self.base, components)?;
        info!("Reading: {}", components.join("/"));
        self.http.get_json(&url)
    }

    /// Paginated request loop.
    ///
    /// Pages are fetched strictly sequentially at offsets 0, N, 2N, ...
    /// while `offset + count < total_count`. A single-object body is
    /// wrapped as one row; an opaque body ends the loop immediately.
    fn request(&self, components: &[&str]) -> Result<Fetched> {
        let url = http::join_url(&self.base, components)?;
        info!("Reading: {}", components.join("/"));

        let mut rows: Vec<Row> = Vec::new();
        let mut offset: u64 = 0;
        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("offset", &offset.to_string())
                .append_pair("count", &self.page_size.to_string());

            let body = self.http.get_json(&page_url)?;
            match wire::decode(body)? {
                WirePayload::Page(page) => {
                    let has_more = page.has_more();
                    rows.extend(page.result);
                    if has_more {
                        offset += self.page_size;
                    } else {
                        return Ok(Fetched::Rows(rows));
                    }
                }
                WirePayload::Single(row) => return Ok(Fetched::Rows(vec![row])),
                WirePayload::Opaque(value) => return Ok(Fetched::Opaque(value)),
            }
        }
    }

    fn fetch_payload(&self, geotype: &str, components: &[&str]) -> Result<Payload> {
        match self.request(components)? {
            Fetched::Rows(rows) => Ok(Payload::Collection(
                self.finalize_collection(geotype, rows)?,
            )),
            Fetched::Opaque(value) => Ok(Payload::Opaque(value)),
        }
    }

    /// Turn accumulated rows into a collection: move the wire `Geometry`
    /// field into the canonical geometry slot, parse the WKT, and reproject
    /// when an export system is configured.
    ///
    /// Parse failures follow the configured [`GeometryMode`]: best-effort
    /// keeps the whole collection's geometries raw and logs one warning.
    fn finalize_collection(&self, geotype: &str, rows: Vec<Row>) -> Result<ObjectCollection> {
        let has_geometry = rows.iter().any(|row| row.contains_key("Geometry"));

        let mut records: Vec<GeoRecord> = rows
            .into_iter()
            .map(|mut fields| {
                // shift_remove keeps the remaining fields in wire order.
                let geometry = match fields.shift_remove("Geometry") {
                    Some(Value::String(s)) => Some(GeomValue::Raw(s)),
                    Some(Value::Null) | None => None,
                    Some(other) => Some(GeomValue::Raw(other.to_string())),
                };
                GeoRecord { fields, geometry }
            })
            .collect();

        if has_geometry {
            match parse_geometries(&records) {
                Ok(mut parsed) => {
                    if let Some((from, to)) = &self.reprojection {
                        for slot in parsed.iter_mut() {
                            if let Some(GeomValue::Parsed(geometry)) = slot {
                                *geometry = geometry::reproject(geometry, from, to)?;
                            }
                        }
                    }
                    for (record, geometry) in records.iter_mut().zip(parsed) {
                        record.geometry = geometry;
                    }
                }
                Err(message) => match self.geometry_mode {
                    GeometryMode::BestEffort => {
                        warn!(geotype, %message, "geometry parse failed; keeping raw WKT");
                    }
                    GeometryMode::Strict => {
                        return Err(Error::GeometryParse {
                            geotype: geotype.to_string(),
                            message,
                        });
                    }
                },
            }
        }

        Ok(ObjectCollection {
            geotype: geotype.to_string(),
            records,
        })
    }
}

/// Parse all raw geometries, or report the first parse failure.
fn parse_geometries(records: &[GeoRecord]) -> std::result::Result<Vec<Option<GeomValue>>, String> {
    let mut parsed = Vec::with_capacity(records.len());
    for record in records {
        match &record.geometry {
            Some(GeomValue::Raw(s)) => {
                parsed.push(Some(GeomValue::Parsed(geometry::parse_wkt(s)?)));
            }
            other => parsed.push(other.clone()),
        }
    }
    Ok(parsed)
}

fn parsed_geometry(record: &GeoRecord) -> Option<&Geometry<f64>> {
    record.geometry.as_ref().and_then(GeomValue::as_geometry)
}

/// Serialize the key values of a record for hash-join lookup. A missing or
/// null key field means the record cannot match.
fn join_key(record: &GeoRecord, keys: &[String]) -> Option<String> {
    let values: Vec<&Value> = keys
        .iter()
        .map(|key| record.field(key).filter(|v| !v.is_null()))
        .collect::<Option<_>>()?;
    serde_json::to_string(&values).ok()
}
