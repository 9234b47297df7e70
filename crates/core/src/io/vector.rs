//! Vector sources: Shapefile, GeoJSON, zip archives and remote archives.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use serde::{Deserialize, Serialize};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info, warn};

use super::archive::extract_single;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureSet};

/// Options for [`open_vector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSourceOptions {
    /// Extension of the archive member to load, without the dot.
    pub extension: String,
    /// Parent directory for the temporary extraction directory.
    /// `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Timeout for remote downloads.
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,
    /// Do not log a warning when a source carries no CRS.
    pub suppress_warnings: bool,
}

impl Default for VectorSourceOptions {
    fn default() -> Self {
        Self {
            extension: "shp".to_string(),
            scratch_dir: None,
            fetch_timeout: Duration::from_secs(60),
            suppress_warnings: false,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Load a feature set from a local file, a local `.zip` archive or an
/// `http(s)` URL of a zip archive.
///
/// Archives are unpacked into a temporary directory that is removed before
/// this function returns, whatever the outcome.
pub fn open_vector(location: &str, options: &VectorSourceOptions) -> Result<FeatureSet> {
    if is_remote(location) {
        return open_archive(location, options);
    }

    let path = Path::new(location);
    if !path.exists() {
        return Err(Error::unavailable(location, "no such file"));
    }
    match extension_of(path).as_str() {
        "zip" => open_archive(location, options),
        _ => read_vector_file(path, location, options),
    }
}

fn open_archive(location: &str, options: &VectorSourceOptions) -> Result<FeatureSet> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("geoverlay-");
    let scratch = match &options.scratch_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .map_err(|e| Error::unavailable(location, e))?;
    debug!(dir = %scratch.path().display(), "created scratch directory");

    let archive_path = if is_remote(location) {
        fetch_archive(location, scratch.path(), options.fetch_timeout)?
    } else {
        PathBuf::from(location)
    };

    let extract_dir = scratch.path().join("extracted");
    fs::create_dir(&extract_dir).map_err(|e| Error::unavailable(location, e))?;

    let member = extract_single(&archive_path, &extract_dir, &options.extension, location)?;
    info!(archive = location, member = %member.display(), "reading archive member");

    read_vector_file(&member, location, options)
}

#[cfg(feature = "remote")]
fn fetch_archive(url: &str, dir: &Path, timeout: Duration) -> Result<PathBuf> {
    let dest = dir.join("download.zip");
    info!(url, "downloading vector archive");
    super::fetch::download(url, &dest, timeout)?;
    Ok(dest)
}

#[cfg(not(feature = "remote"))]
fn fetch_archive(url: &str, _dir: &Path, _timeout: Duration) -> Result<PathBuf> {
    Err(Error::unavailable(url, "built without the `remote` feature"))
}

fn read_vector_file(path: &Path, label: &str, options: &VectorSourceOptions) -> Result<FeatureSet> {
    let (features, crs) = match extension_of(path).as_str() {
        "shp" => read_shapefile(path).map_err(|e| Error::unavailable(label, e))?,
        "geojson" | "json" => read_geojson(path).map_err(|e| Error::unavailable(label, e))?,
        other => {
            return Err(Error::unavailable(
                label,
                format!("unsupported vector format '.{}'", other),
            ))
        }
    };

    let crs = match crs {
        Some(crs) => crs,
        None => {
            if !options.suppress_warnings {
                warn!(source = label, "no CRS information, assuming EPSG:4326");
            }
            CRS::wgs84()
        }
    };

    debug!(source = label, features = features.len(), crs = %crs, "vector source loaded");
    Ok(FeatureSet::from_features(features, crs))
}

// ---------------------------------------------------------------------------
// Shapefile
// ---------------------------------------------------------------------------

fn read_shapefile(path: &Path) -> std::result::Result<(Vec<Feature>, Option<CRS>), String> {
    let mut reader = shapefile::Reader::from_path(path).map_err(|e| e.to_string())?;

    let mut features = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.map_err(|e| e.to_string())?;
        let fields: HashMap<String, FieldValue> = record.into();

        let mut feature = match shape_to_geometry(shape)? {
            Some(geometry) => Feature::new(geometry),
            None => Feature::empty(),
        };
        feature.id = Some(index.to_string());
        for (name, value) in fields {
            feature.set_property(name, field_to_attribute(value));
        }
        features.push(feature);
    }

    let prj = path.with_extension("prj");
    let crs = fs::read_to_string(&prj).ok().map(|wkt| crs_from_prj(&wkt));
    Ok((features, crs))
}

fn xy<P>(points: &[P], get: impl Fn(&P) -> (f64, f64)) -> Vec<Coord<f64>> {
    points
        .iter()
        .map(|p| {
            let (x, y) = get(p);
            Coord { x, y }
        })
        .collect()
}

/// Outer rings start a new polygon; inner rings attach to the last one.
fn rings_to_geometry<P>(
    rings: &[PolygonRing<P>],
    get: impl Fn(&P) -> (f64, f64) + Copy,
) -> std::result::Result<Geometry<f64>, String> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                polygons.push((LineString::new(xy(points, get)), Vec::new()));
            }
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(LineString::new(xy(points, get))),
                None => return Err("polygon hole without an outer ring".to_string()),
            },
        }
    }

    let mut polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();
    Ok(if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    })
}

fn parts_to_geometry<P>(parts: &[Vec<P>], get: impl Fn(&P) -> (f64, f64) + Copy) -> Geometry<f64> {
    let mut lines: Vec<LineString<f64>> =
        parts.iter().map(|part| LineString::new(xy(part, get))).collect();
    if lines.len() == 1 {
        Geometry::LineString(lines.remove(0))
    } else {
        Geometry::MultiLineString(MultiLineString::new(lines))
    }
}

fn shape_to_geometry(shape: Shape) -> std::result::Result<Option<Geometry<f64>>, String> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::MultipointM(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::MultipointZ(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::Polyline(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::PolylineM(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::PolylineZ(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::Polygon(poly) => rings_to_geometry(poly.rings(), |p| (p.x, p.y))?,
        Shape::PolygonM(poly) => rings_to_geometry(poly.rings(), |p| (p.x, p.y))?,
        Shape::PolygonZ(poly) => rings_to_geometry(poly.rings(), |p| (p.x, p.y))?,
        Shape::Multipatch(_) => return Err("multipatch shapes are not supported".to_string()),
    };
    Ok(Some(geometry))
}

fn field_to_attribute(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::String(s.trim_end().to_string()),
        FieldValue::Memo(s) => AttributeValue::String(s),
        FieldValue::Numeric(Some(v)) | FieldValue::Double(v) | FieldValue::Currency(v) => {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                AttributeValue::Int(v as i64)
            } else {
                AttributeValue::Float(v)
            }
        }
        FieldValue::Float(Some(v)) => AttributeValue::Float(v as f64),
        FieldValue::Integer(i) => AttributeValue::Int(i as i64),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
        _ => AttributeValue::Null,
    }
}

/// CRS from the WKT of a `.prj` file.
///
/// The EPSG code comes from the outermost `AUTHORITY["EPSG",…]` clause or,
/// for Esri-flavoured WKT without one, from a few well-known names.
pub fn crs_from_prj(wkt: &str) -> CRS {
    let wkt = wkt.trim();
    let crs = CRS::from_wkt(wkt);
    match epsg_from_wkt(wkt) {
        Some(code) => crs.with_epsg(code),
        None => crs,
    }
}

fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    const MARKER: &str = "AUTHORITY[\"EPSG\",";
    if let Some(pos) = wkt.rfind(MARKER) {
        let digits: String = wkt[pos + MARKER.len()..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    let name = wkt_name(wkt)?;
    match name.as_str() {
        "GCS_WGS_1984" | "WGS 84" | "WGS84" => Some(4326),
        "GCS_North_American_1983" | "NAD83" => Some(4269),
        "GCS_ETRS_1989" | "ETRS89" => Some(4258),
        "WGS_1984_Web_Mercator_Auxiliary_Sphere" | "WGS 84 / Pseudo-Mercator" => Some(3857),
        "RGF_1993_Lambert_93" | "RGF93 / Lambert-93" => Some(2154),
        _ => utm_from_name(&name),
    }
}

/// Name of the outermost WKT node, e.g. `GCS_WGS_1984`.
fn wkt_name(wkt: &str) -> Option<String> {
    let start = wkt.find("[\"")? + 2;
    let len = wkt[start..].find('"')?;
    Some(wkt[start..start + len].to_string())
}

/// `WGS_1984_UTM_Zone_33N` / `WGS 84 / UTM zone 33N`
fn utm_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    if !lower.starts_with("wgs_1984_utm_zone_") && !lower.starts_with("wgs 84 / utm zone ") {
        return None;
    }
    let tail = &lower[18..];
    let zone: u32 = tail.trim_end_matches(['n', 's']).parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    match tail.chars().last()? {
        'n' => Some(32600 + zone),
        's' => Some(32700 + zone),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

fn read_geojson(path: &Path) -> std::result::Result<(Vec<Feature>, Option<CRS>), String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let parsed: geojson::GeoJson = text.parse().map_err(|e: geojson::Error| e.to_string())?;

    let (raw, crs_member) = match parsed {
        geojson::GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(|m| m.get("crs").cloned());
            (fc.features, crs)
        }
        geojson::GeoJson::Feature(f) => (vec![f], None),
        geojson::GeoJson::Geometry(g) => (vec![geojson::Feature::from(g)], None),
    };

    let features = raw
        .into_iter()
        .map(geojson_feature)
        .collect::<std::result::Result<Vec<_>, String>>()?;

    // Without a crs member GeoJSON is WGS 84 by definition.
    let crs = crs_member
        .as_ref()
        .and_then(crs_from_geojson_member)
        .unwrap_or_else(CRS::wgs84);
    Ok((features, Some(crs)))
}

fn geojson_feature(f: geojson::Feature) -> std::result::Result<Feature, String> {
    let mut feature = match f.geometry {
        Some(g) => Feature::new(
            Geometry::<f64>::try_from(g.value).map_err(|e| e.to_string())?,
        ),
        None => Feature::empty(),
    };
    feature.id = f.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });
    for (key, value) in f.properties.unwrap_or_default() {
        feature.set_property(key, json_to_attribute(value));
    }
    Ok(feature)
}

fn json_to_attribute(value: serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Bool(b) => AttributeValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        serde_json::Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::Null => serde_json::Value::Null,
        AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
        AttributeValue::Int(i) => serde_json::Value::from(*i),
        AttributeValue::Float(v) => serde_json::Number::from_f64(*v)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        AttributeValue::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}`
fn crs_from_geojson_member(member: &serde_json::Value) -> Option<CRS> {
    let name = member.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    let code = name.rsplit(':').next()?.parse().ok()?;
    Some(CRS::from_epsg(code))
}

/// Write a feature set as a GeoJSON FeatureCollection.
///
/// A CRS other than EPSG:4326 is recorded in a legacy `crs` member.
pub fn write_geojson<P: AsRef<Path>>(set: &FeatureSet, path: P) -> Result<()> {
    let features = set
        .iter()
        .map(|f| geojson::Feature {
            bbox: None,
            geometry: f
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: f.id.clone().map(geojson::feature::Id::String),
            properties: Some(
                f.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = match set.crs().epsg() {
        Some(4326) => None,
        Some(code) => {
            let mut members = serde_json::Map::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({
                    "type": "name",
                    "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
                }),
            );
            Some(members)
        }
        None => None,
    };

    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    let text = serde_json::to_string(&collection).map_err(|e| Error::Other(e.to_string()))?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}
