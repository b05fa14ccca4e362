//! Geometry parsing and coordinate-system handling.
//!
//! Geometries arrive as well-known-text strings in the service coordinate
//! system. Parsing is governed by [`GeometryMode`]: the default best-effort
//! mode degrades to raw WKT on failure, strict mode fails the request.

use geo::{Geometry, MapCoords};
use proj4rs::Proj;

use crate::error::{Error, Result};

/// Policy for geometry parse failures within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryMode {
    /// Log a warning and return the collection with unparsed raw WKT values.
    #[default]
    BestEffort,
    /// Fail the request with [`Error::GeometryParse`](crate::Error::GeometryParse).
    Strict,
}

/// Parse a well-known-text string into a geometry.
pub fn parse_wkt(s: &str) -> std::result::Result<Geometry<f64>, String> {
    use wkt::TryFromWkt;
    Geometry::try_from_wkt_str(s).map_err(|e| e.to_string())
}

/// A coordinate reference system resolved from an `EPSG:<code>` identifier.
pub struct CoordSystem {
    name: String,
    proj: Proj,
    is_latlong: bool,
}

impl CoordSystem {
    /// Resolve an identifier such as `EPSG:4326` or `EPSG:28992`.
    pub fn from_epsg(name: &str) -> Result<Self> {
        let code: u16 = name
            .to_ascii_uppercase()
            .strip_prefix("EPSG:")
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| Error::Projection {
                message: format!("unrecognized coordinate system identifier '{name}'"),
            })?;
        let def = crs_definitions::from_code(code).ok_or_else(|| Error::Projection {
            message: format!("unknown EPSG code {code}"),
        })?;
        let proj = Proj::from_proj_string(def.proj4).map_err(|e| Error::Projection {
            message: format!("failed to initialize {name}: {e}"),
        })?;
        let is_latlong = proj.is_latlong();
        Ok(Self {
            name: name.to_string(),
            proj,
            is_latlong,
        })
    }

    /// The identifier this system was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reproject every coordinate of a geometry from one system to another.
///
/// proj4rs works in radians for geographic systems, so degrees are converted
/// on the way in and out as needed.
pub fn reproject(
    geometry: &Geometry<f64>,
    from: &CoordSystem,
    to: &CoordSystem,
) -> Result<Geometry<f64>> {
    geometry.try_map_coords(|coord| {
        let mut point = (coord.x, coord.y);
        if from.is_latlong {
            point.0 = point.0.to_radians();
            point.1 = point.1.to_radians();
        }
        proj4rs::transform::transform(&from.proj, &to.proj, &mut point).map_err(|e| {
            Error::Projection {
                message: format!(
                    "transform {} -> {} failed: {e}",
                    from.name, to.name
                ),
            }
        })?;
        if to.is_latlong {
            point.0 = point.0.to_degrees();
            point.1 = point.1.to_degrees();
        }
        Ok(geo::Coord {
            x: point.0,
            y: point.1,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_parse_wkt_point() {
        let geom = parse_wkt("POINT (5.774 51.898)").unwrap();
        assert_eq!(geom, Geometry::Point(Point::new(5.774, 51.898)));
    }

    #[test]
    fn test_parse_wkt_polygon() {
        let geom = parse_wkt("POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))").unwrap();
        assert!(matches!(geom, Geometry::Polygon(_)));
    }

    #[test]
    fn test_parse_wkt_garbage() {
        assert!(parse_wkt("POINT OF NO RETURN").is_err());
        assert!(parse_wkt("").is_err());
    }

    #[test]
    fn test_coord_system_rejects_unknown_identifier() {
        assert!(CoordSystem::from_epsg("RD-NEW").is_err());
        assert!(CoordSystem::from_epsg("EPSG:0").is_err());
    }

    #[test]
    fn test_reproject_wgs84_to_rd() {
        let wgs84 = CoordSystem::from_epsg("EPSG:4326").unwrap();
        let rd = CoordSystem::from_epsg("EPSG:28992").unwrap();

        // Onze Lieve Vrouwetoren, Amersfoort: the RD origin region.
        let geom = Geometry::Point(Point::new(5.387_2, 52.155_2));
        let out = reproject(&geom, &wgs84, &rd).unwrap();
        match out {
            Geometry::Point(p) => {
                // RD coordinates of the tower are roughly (155000, 463000).
                assert!((p.x() - 155_000.0).abs() < 200.0, "x = {}", p.x());
                assert!((p.y() - 463_000.0).abs() < 200.0, "y = {}", p.y());
            }
            other => panic!("expected point, got {other:?}"),
        }
    }
}
