//! Vector features and feature sets

use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use std::collections::HashMap;
use std::fmt;

use crate::crs::CRS;

/// Attribute value types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value. Strings are parsed; `Null` has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality used for feature selection. Symmetric.
    ///
    /// Two strings compare exactly, so `"75"` does not match `"75.0"`.
    /// When at least one side is an integer or a float, both sides compare
    /// by numeric value and a string side must parse to that number: the
    /// query `"724"` matches the attribute `724` and the query `75` matches
    /// the attribute `"75"`. Anything else compares structurally.
    pub fn matches(&self, query: &AttributeValue) -> bool {
        use AttributeValue::*;
        match (self, query) {
            (String(a), String(b)) => a == b,
            (Int(_) | Float(_), Int(_) | Float(_) | String(_))
            | (String(_), Int(_) | Float(_)) => match (self.as_f64(), query.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref().and_then(|g| g.bounding_rect())
    }
}

/// An ordered collection of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    features: Vec<Feature>,
    crs: CRS,
}

impl FeatureSet {
    pub fn new(crs: CRS) -> Self {
        Self {
            features: Vec::new(),
            crs,
        }
    }

    pub fn from_features(features: Vec<Feature>, crs: CRS) -> Self {
        Self { features, crs }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Replace the CRS label without touching coordinates.
    pub fn set_crs(&mut self, crs: CRS) {
        self.crs = crs;
    }

    /// Split into features and CRS.
    pub fn into_parts(self) -> (Vec<Feature>, CRS) {
        (self.features, self.crs)
    }

    /// First feature whose `attribute` matches `value`, in feature order.
    ///
    /// A missing attribute or no match gives `None`.
    pub fn select(&self, attribute: &str, value: impl Into<AttributeValue>) -> Option<&Feature> {
        let query = value.into();
        self.features.iter().find(|f| {
            f.get_property(attribute)
                .map_or(false, |v| v.matches(&query))
        })
    }

    /// Owning form of [`FeatureSet::select`].
    pub fn into_selected(
        self,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Option<Feature> {
        let query = value.into();
        self.features.into_iter().find(|f| {
            f.get_property(attribute)
                .map_or(false, |v| v.matches(&query))
        })
    }

    /// Combined bounds (min_x, min_y, max_x, max_y) of all geometries.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.features
            .iter()
            .filter_map(Feature::bounding_rect)
            .fold(None, |acc, r| {
                let (min, max) = (r.min(), r.max());
                Some(match acc {
                    None => (min.x, min.y, max.x, max.y),
                    Some((a, b, c, d)) => (a.min(min.x), b.min(min.y), c.max(max.x), d.max(max.y)),
                })
            })
    }
}

impl IntoIterator for FeatureSet {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon};

    fn countries() -> FeatureSet {
        let square = |x0: f64| {
            Geometry::Polygon(polygon![
                (x: x0, y: 0.0),
                (x: x0 + 1.0, y: 0.0),
                (x: x0 + 1.0, y: 1.0),
                (x: x0, y: 1.0),
            ])
        };
        FeatureSet::from_features(
            vec![
                Feature::new(square(0.0)).with_property("ADMIN", "Spain").with_property("POP", 47i64),
                Feature::new(square(2.0)).with_property("ADMIN", "France").with_property("POP", 68i64),
                Feature::new(square(4.0)).with_property("ADMIN", "France"),
            ],
            CRS::wgs84(),
        )
    }

    #[test]
    fn test_select_first_match() {
        let set = countries();
        let hit = set.select("ADMIN", "France").unwrap();
        assert_eq!(hit.get_property("POP"), Some(&AttributeValue::Int(68)));
    }

    #[test]
    fn test_select_is_exact() {
        let set = countries();
        assert!(set.select("ADMIN", "france").is_none());
        assert!(set.select("ADMIN", "Atlantis").is_none());
        assert!(set.select("NAME", "France").is_none());
    }

    #[test]
    fn test_select_numeric() {
        let set = countries();
        assert!(set.select("POP", 47i64).is_some());
        assert!(set.select("POP", "68").is_some());
        assert!(set.select("POP", 68.5).is_none());
    }

    #[test]
    fn test_matches_is_symmetric() {
        let values = [
            AttributeValue::from("75"),
            AttributeValue::from(" 75 "),
            AttributeValue::from("75.0"),
            AttributeValue::from("France"),
            AttributeValue::Int(75),
            AttributeValue::Float(75.0),
            AttributeValue::Float(75.5),
            AttributeValue::Bool(true),
            AttributeValue::Null,
        ];
        for a in &values {
            for b in &values {
                assert_eq!(a.matches(b), b.matches(a), "{:?} vs {:?}", a, b);
            }
        }

        let code = AttributeValue::from("75");
        assert!(code.matches(&AttributeValue::Int(75)));
        assert!(code.matches(&AttributeValue::Float(75.0)));
        assert!(!code.matches(&AttributeValue::from("75.0")));
        assert!(!AttributeValue::from("France").matches(&AttributeValue::Int(0)));
    }

    #[test]
    fn test_into_selected() {
        let feature = countries().into_selected("ADMIN", "Spain").unwrap();
        assert_eq!(feature.bounding_rect().unwrap().min().x, 0.0);
    }

    #[test]
    fn test_bounds() {
        let mut set = countries();
        set.push(Feature::empty());
        set.push(Feature::new(Geometry::Point(point!(x: -1.0, y: 3.0))));
        assert_eq!(set.bounds(), Some((-1.0, 0.0, 5.0, 3.0)));
        assert_eq!(FeatureSet::new(CRS::wgs84()).bounds(), None);
    }

    #[test]
    fn test_attribute_as_f64() {
        assert_eq!(AttributeValue::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(AttributeValue::Null.as_f64(), None);
        assert_eq!(AttributeValue::Bool(true).as_f64(), Some(1.0));
    }
}
