//! Bring a feature set into the raster's CRS.
//!
//! Reprojection is one-directional: features move to the grid's CRS, the
//! grid is never resampled.

use geoverlay_core::{Feature, FeatureSet, Reproject, Result, CRS};
use tracing::{debug, info};

/// Whether `features` has to be reprojected to match `target`.
pub fn needs_reprojection(features: &FeatureSet, target: &CRS) -> bool {
    !features.crs().is_equivalent(target)
}

/// Return `features` expressed in `target`.
///
/// An already matching set is returned as is. Otherwise every geometry is
/// reprojected through `reprojector` and the set is relabelled with `target`.
pub fn harmonize(features: FeatureSet, target: &CRS, reprojector: &dyn Reproject) -> Result<FeatureSet> {
    if !needs_reprojection(&features, target) {
        debug!(crs = %target, "vector CRS already matches raster");
        return Ok(features);
    }

    let (items, source) = features.into_parts();
    info!(from = %source, to = %target, features = items.len(), "reprojecting features");

    let reprojected = items
        .into_iter()
        .map(|feature| {
            let geometry = feature
                .geometry
                .as_ref()
                .map(|g| reprojector.reproject(g, &source, target))
                .transpose()?;
            Ok(Feature { geometry, ..feature })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureSet::from_features(reprojected, target.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, MapCoords};
    use geo_types::{Geometry, Rect};
    use geoverlay_core::{AttributeValue, Error, ProjReprojector};

    /// Shifts x by a fixed offset; enough to observe that reprojection ran.
    struct Shift(f64);

    impl Reproject for Shift {
        fn reproject(&self, geometry: &Geometry<f64>, _from: &CRS, _to: &CRS) -> Result<Geometry<f64>> {
            Ok(geometry.map_coords(|c| Coord { x: c.x + self.0, y: c.y }))
        }
    }

    struct Refuse;

    impl Reproject for Refuse {
        fn reproject(&self, _: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
            Err(Error::Reprojection(format!("{} -> {}", from, to)))
        }
    }

    fn square_set(crs: CRS) -> FeatureSet {
        FeatureSet::from_features(
            vec![
                Feature::new(Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0))))
                    .with_property("ADMIN", "A"),
                Feature::empty().with_property("ADMIN", "B"),
            ],
            crs,
        )
    }

    #[test]
    fn test_matching_crs_is_noop() {
        let set = square_set(CRS::from_epsg(3035));
        let out = harmonize(set.clone(), &CRS::from_epsg(3035), &Refuse).unwrap();
        assert_eq!(out, set);
    }

    #[test]
    fn test_reprojects_and_relabels() {
        let target = CRS::from_epsg(3035);
        let out = harmonize(square_set(CRS::wgs84()), &target, &Shift(10.0)).unwrap();

        assert!(out.crs().is_equivalent(&target));
        assert!(!needs_reprojection(&out, &target));
        let rect = out.features()[0].bounding_rect().unwrap();
        assert_eq!(rect.min().x, 10.0);
        assert!(out.features()[1].geometry.is_none());
        assert_eq!(out.features()[1].get_property("ADMIN"), Some(&AttributeValue::from("B")));
    }

    #[test]
    fn test_failure_propagates() {
        let err = harmonize(square_set(CRS::wgs84()), &CRS::from_epsg(3035), &Refuse).unwrap_err();
        assert!(matches!(err, Error::Reprojection(_)));
    }

    #[test]
    fn test_proj_reprojector_to_albers() {
        let target = CRS::from_epsg(5070);
        let out = harmonize(square_set(CRS::wgs84()), &target, &ProjReprojector).unwrap();
        assert_eq!(out.crs().epsg(), Some(5070));
        // (0, 0) in lon/lat is far east of the CONUS Albers origin
        let rect = out.features()[0].bounding_rect().unwrap();
        assert!(rect.min().x > 1_000_000.0);
    }
}
