//! Geometry reprojection between coordinate reference systems.
//!
//! The [`Reproject`] trait is the seam the rest of the workspace talks to;
//! [`ProjReprojector`] implements it with `proj4rs` (pure Rust, no libproj).
//! EPSG codes are resolved through a small table of PROJ definitions
//! covering the systems used by common vector and elevation datasets.

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj4rs::proj::Proj;

use super::CRS;
use crate::error::{Error, Result};

/// Reprojects geometries from one CRS to another.
pub trait Reproject {
    /// Return `geometry` expressed in `to`. Coordinates are interpreted in `from`.
    fn reproject(&self, geometry: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>>;
}

/// `proj4rs`-backed reprojection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjReprojector;

impl Reproject for ProjReprojector {
    fn reproject(&self, geometry: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
        if from.is_equivalent(to) {
            return Ok(geometry.clone());
        }
        let transformer = Transformer::new(from, to)?;
        geometry.try_map_coords(|coord| transformer.apply(coord))
    }
}

/// A resolved source/target projection pair.
struct Transformer {
    source: Proj,
    target: Proj,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl Transformer {
    fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let source_def = proj_definition(from)
            .ok_or_else(|| Error::Reprojection(format!("no PROJ definition for {}", from)))?;
        let target_def = proj_definition(to)
            .ok_or_else(|| Error::Reprojection(format!("no PROJ definition for {}", to)))?;

        let source = Proj::from_proj_string(&source_def)
            .map_err(|e| Error::Reprojection(format!("invalid source projection {}: {:?}", from, e)))?;
        let target = Proj::from_proj_string(&target_def)
            .map_err(|e| Error::Reprojection(format!("invalid target projection {}: {:?}", to, e)))?;

        Ok(Self {
            source,
            target,
            source_is_geographic: is_longlat(&source_def),
            target_is_geographic: is_longlat(&target_def),
        })
    }

    /// proj4rs works in radians for geographic systems.
    fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.source_is_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| Error::Reprojection(format!("({}, {}): {:?}", coord.x, coord.y, e)))?;

        if self.target_is_geographic {
            Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
        } else {
            Ok(Coord { x: point.0, y: point.1 })
        }
    }
}

fn is_longlat(def: &str) -> bool {
    def.contains("+proj=longlat") || def.contains("+proj=latlong")
}

/// PROJ definition for a CRS: its own PROJ string if present, else the
/// built-in EPSG table.
pub fn proj_definition(crs: &CRS) -> Option<String> {
    if let Some(proj) = crs.proj() {
        return Some(proj.to_string());
    }
    epsg_definition(crs.epsg()?)
}

fn epsg_definition(code: u32) -> Option<String> {
    let def = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs",
        4269 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
        4258 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
        // CONUS Albers
        5070 => "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        // ETRS89 / LAEA Europe
        3035 => "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        // RGF93 / Lambert-93
        2154 => "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        _ => {
            let (zone, north) = parse_utm_epsg(code)?;
            let south = if north { "" } else { " +south" };
            return Some(format!(
                "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
                zone, south
            ));
        }
    };
    Some(def.to_string())
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}
