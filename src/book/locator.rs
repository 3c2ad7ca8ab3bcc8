// Precinct resolution: trusted columns, or containment in boundary polygons.

use std::collections::HashMap;

use geo::{BoundingRect, Contains, Coord, MapCoords, MultiPolygon, Point};
use log::{info, warn};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use rstar::{RTree, RTreeObject, AABB};
use shapefile::dbase::FieldValue;
use snafu::prelude::*;

use precinct_ranges::WardPrecinct;

use crate::book::config_reader::BoundariesConfig;
use crate::book::io_addresses::AddressRow;
use crate::book::{BookResult, BookSettings, OpeningShapefileSnafu};

pub enum PrecinctResolver {
    /// Trust the WARD and PRECINCT_WARD columns of the address list.
    Columns { code_fixes: HashMap<String, String> },
    /// Ignore the columns and locate each address inside the precinct
    /// boundary polygons.
    Geometric { index: PrecinctIndex },
}

impl PrecinctResolver {
    pub fn from_settings(settings: &BookSettings) -> BookResult<PrecinctResolver> {
        match settings.boundaries {
            Some(ref config) => {
                let boundaries = read_boundaries(config)?;
                Ok(PrecinctResolver::Geometric {
                    index: PrecinctIndex::build(boundaries),
                })
            }
            None => Ok(PrecinctResolver::Columns {
                code_fixes: settings.fixes.precinct_codes.clone(),
            }),
        }
    }

    /// Resolves one address row. `None` means the row has already been
    /// warned about and should be skipped.
    pub fn resolve(&self, row: &AddressRow, error_key: &str) -> Option<WardPrecinct> {
        match self {
            PrecinctResolver::Columns { code_fixes } => {
                resolve_columns(row, code_fixes, error_key)
            }
            PrecinctResolver::Geometric { index } => resolve_point(row, index, error_key),
        }
    }
}

fn resolve_columns(
    row: &AddressRow,
    code_fixes: &HashMap<String, String>,
    error_key: &str,
) -> Option<WardPrecinct> {
    if row.ward.is_empty() {
        warn!("{} has no ward", error_key);
        return None;
    }
    if row.precinct_ward.is_empty() {
        warn!("{} has no precinct", error_key);
        return None;
    }
    let ward = match row.ward.parse::<u32>() {
        Ok(w) => w,
        Err(_) => {
            warn!("{} has bad ward value {:?}", error_key, row.ward);
            return None;
        }
    };
    let code = code_fixes
        .get(&row.precinct_ward)
        .cloned()
        .unwrap_or_else(|| row.precinct_ward.clone());
    // The PRECINCT_WARD column holds the precinct plus one hundred times
    // the ward.
    let precinct = match code.parse::<i64>() {
        Ok(pw) => pw - (ward as i64) * 100,
        Err(_) => {
            warn!("{} has bad precinct value {:?}", error_key, code);
            return None;
        }
    };
    if precinct < 0 {
        warn!("{} has precinct value {} below its ward", error_key, code);
        return None;
    }
    Some(WardPrecinct {
        ward,
        precinct: precinct as u32,
    })
}

fn resolve_point(row: &AddressRow, index: &PrecinctIndex, error_key: &str) -> Option<WardPrecinct> {
    let lon = row.longitude.parse::<f64>();
    let lat = row.latitude.parse::<f64>();
    let (lon, lat) = match (lon, lat) {
        (Ok(lon), Ok(lat)) => (lon, lat),
        _ => {
            warn!("{} has no usable coordinates", error_key);
            return None;
        }
    };
    match index.locate(lon, lat) {
        Some(wp) => Some(wp),
        None => {
            warn!("{} is outside every precinct boundary", error_key);
            None
        }
    }
}

/// A single precinct polygon with its ward/precinct.
pub struct PrecinctBoundary {
    pub ward_precinct: WardPrecinct,
    pub geometry: MultiPolygon<f64>,
}

/// Wrapper for R-tree indexing of precinct boundaries.
struct IndexedBoundary {
    boundary: PrecinctBoundary,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    fn new(boundary: PrecinctBoundary) -> Option<IndexedBoundary> {
        let rect = boundary.geometry.bounding_rect()?;
        Some(IndexedBoundary {
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
            boundary,
        })
    }
}

/// Spatial index over the precinct polygons.
pub struct PrecinctIndex {
    tree: RTree<IndexedBoundary>,
}

impl PrecinctIndex {
    pub fn build(boundaries: Vec<PrecinctBoundary>) -> PrecinctIndex {
        info!("Building spatial index for {} precinct boundaries", boundaries.len());
        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .filter_map(IndexedBoundary::new)
            .collect();
        PrecinctIndex {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Envelope intersection narrows the candidates, exact containment picks
    /// the precinct. Precinct polygons do not overlap, so the first hit wins.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<WardPrecinct> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .find(|ib| ib.boundary.geometry.contains(&point))
            .map(|ib| ib.boundary.ward_precinct)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

pub fn read_boundaries(config: &BoundariesConfig) -> BookResult<Vec<PrecinctBoundary>> {
    let path = &config.file_path;
    info!("Attempting to read precinct boundaries {:?}", path);
    let mut reader =
        shapefile::Reader::from_path(path).context(OpeningShapefileSnafu { path: path.clone() })?;
    let ward_field = config.ward_field.clone().unwrap_or_else(|| "WARD".to_string());
    let precinct_field = config
        .precinct_field
        .clone()
        .unwrap_or_else(|| "PRECINCT".to_string());
    let reproject = match config.proj4.as_deref() {
        Some(proj4) => Some(LonLatTransform::new(proj4)?),
        None => None,
    };

    let mut res: Vec<PrecinctBoundary> = Vec::new();
    for shape_record in reader.iter_shapes_and_records() {
        let (shape, record) =
            shape_record.context(OpeningShapefileSnafu { path: path.clone() })?;
        let ward = match numeric_field(&record, &ward_field) {
            Some(w) => w,
            None => {
                warn!("Boundary record without a usable {} field", ward_field);
                continue;
            }
        };
        let precinct = match numeric_field(&record, &precinct_field) {
            Some(p) => p,
            None => {
                warn!("Boundary record without a usable {} field", precinct_field);
                continue;
            }
        };
        let geometry = match shape {
            shapefile::Shape::Polygon(p) => shape_to_geo(&p),
            x => {
                warn!("Skipping non-polygon boundary shape {}", x);
                continue;
            }
        };
        let geometry = match reproject {
            Some(ref t) => t.apply(&geometry),
            None => geometry,
        };
        res.push(PrecinctBoundary {
            ward_precinct: WardPrecinct { ward, precinct },
            geometry,
        });
    }
    info!("Read {} precinct boundaries from {}", res.len(), path);
    Ok(res)
}

fn numeric_field(record: &shapefile::dbase::Record, name: &str) -> Option<u32> {
    match record.get(name) {
        Some(FieldValue::Numeric(Some(v))) => Some(*v as u32),
        Some(FieldValue::Character(Some(s))) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Convert a shapefile polygon to a geo multi-polygon. Shapefiles store each
/// outer ring followed by the holes that belong to it.
fn shape_to_geo(p: &shapefile::Polygon) -> MultiPolygon<f64> {
    fn ring_coords(points: &[shapefile::Point]) -> geo::LineString<f64> {
        let mut coords: Vec<Coord<f64>> =
            points.iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        geo::LineString::from(coords)
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut exterior: Option<geo::LineString<f64>> = None;
    let mut holes: Vec<geo::LineString<f64>> = Vec::new();
    for ring in p.rings() {
        match ring {
            shapefile::PolygonRing::Outer(points) => {
                if let Some(ext) = exterior.take() {
                    polys.push(geo::Polygon::new(ext, holes));
                    holes = Vec::new();
                }
                exterior = Some(ring_coords(points));
            }
            shapefile::PolygonRing::Inner(points) => {
                holes.push(ring_coords(points));
            }
        }
    }
    if let Some(ext) = exterior {
        polys.push(geo::Polygon::new(ext, holes));
    }
    MultiPolygon(polys)
}

/// Reprojects boundary coordinates from the shapefile's CRS to lon/lat.
struct LonLatTransform {
    from: Proj,
    to: Proj,
}

impl LonLatTransform {
    fn new(proj4: &str) -> BookResult<LonLatTransform> {
        let from = match Proj::from_proj_string(proj4) {
            Ok(p) => p,
            Err(e) => {
                whatever!("Failed to build source PROJ.4 {:?}: {:?}", proj4, e)
            }
        };
        let to = match Proj::from_proj_string("+proj=longlat +datum=WGS84 +no_defs") {
            Ok(p) => p,
            Err(e) => {
                whatever!("Failed to build target PROJ.4: {:?}", e)
            }
        };
        Ok(LonLatTransform { from, to })
    }

    fn apply(&self, mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        // Raw CRS units in, radians out of the lon/lat projection.
        mp.map_coords(|coord: Coord<f64>| {
            let mut point = (coord.x, coord.y, 0.0);
            transform(&self.from, &self.to, &mut point).expect("CRS transform failed");
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(ward: u32, precinct: u32) -> WardPrecinct {
        WardPrecinct { ward, precinct }
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![geo::Polygon::new(
            geo::LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )])
    }

    fn test_index() -> PrecinctIndex {
        PrecinctIndex::build(vec![
            PrecinctBoundary {
                ward_precinct: wp(1, 1),
                geometry: square(0.0, 0.0, 2.0, 2.0),
            },
            PrecinctBoundary {
                ward_precinct: wp(1, 2),
                geometry: square(2.0, 0.0, 4.0, 2.0),
            },
        ])
    }

    #[test]
    fn locate_picks_the_containing_precinct() {
        let index = test_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index.locate(1.0, 1.0), Some(wp(1, 1)));
        assert_eq!(index.locate(3.0, 1.0), Some(wp(1, 2)));
        assert_eq!(index.locate(5.0, 1.0), None);
        assert_eq!(index.locate(1.0, -1.0), None);
    }

    #[test]
    fn geometric_resolution_uses_the_coordinates() {
        let resolver = PrecinctResolver::Geometric { index: test_index() };
        let row = AddressRow {
            longitude: "3.0".to_string(),
            latitude: "0.5".to_string(),
            ..AddressRow::default()
        };
        assert_eq!(resolver.resolve(&row, "test"), Some(wp(1, 2)));

        let bad = AddressRow::default();
        assert_eq!(resolver.resolve(&bad, "test"), None);
    }

    #[test]
    fn column_resolution_splits_the_combined_code() {
        let row = AddressRow {
            ward: "19".to_string(),
            precinct_ward: "1910".to_string(),
            ..AddressRow::default()
        };
        assert_eq!(
            resolve_columns(&row, &HashMap::new(), "test"),
            Some(wp(19, 10))
        );
    }

    #[test]
    fn precinct_code_fix_is_applied_before_parsing() {
        let mut fixes = HashMap::new();
        fixes.insert("0502A".to_string(), "0502".to_string());
        let row = AddressRow {
            ward: "5".to_string(),
            precinct_ward: "0502A".to_string(),
            ..AddressRow::default()
        };
        assert_eq!(resolve_columns(&row, &fixes, "test"), Some(wp(5, 2)));
        // Without the fix the row is unusable and skipped.
        assert_eq!(resolve_columns(&row, &HashMap::new(), "test"), None);
    }

    #[test]
    fn missing_columns_are_skipped() {
        let row = AddressRow {
            ward: "".to_string(),
            precinct_ward: "1910".to_string(),
            ..AddressRow::default()
        };
        assert_eq!(resolve_columns(&row, &HashMap::new(), "test"), None);
        let row = AddressRow {
            ward: "19".to_string(),
            precinct_ward: "".to_string(),
            ..AddressRow::default()
        };
        assert_eq!(resolve_columns(&row, &HashMap::new(), "test"), None);
    }

    #[test]
    fn shapefile_rings_become_polygons_with_holes() {
        let outer = vec![
            shapefile::Point::new(0.0, 0.0),
            shapefile::Point::new(0.0, 10.0),
            shapefile::Point::new(10.0, 10.0),
            shapefile::Point::new(10.0, 0.0),
            shapefile::Point::new(0.0, 0.0),
        ];
        let inner = vec![
            shapefile::Point::new(4.0, 4.0),
            shapefile::Point::new(6.0, 4.0),
            shapefile::Point::new(6.0, 6.0),
            shapefile::Point::new(4.0, 6.0),
            shapefile::Point::new(4.0, 4.0),
        ];
        let polygon = shapefile::Polygon::with_rings(vec![
            shapefile::PolygonRing::Outer(outer),
            shapefile::PolygonRing::Inner(inner),
        ]);
        let geometry = shape_to_geo(&polygon);
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.0[0].interiors().len(), 1);
        let point_in_hole = Point::new(5.0, 5.0);
        assert!(!geometry.contains(&point_in_hole));
        assert!(geometry.contains(&Point::new(2.0, 2.0)));
    }
}
