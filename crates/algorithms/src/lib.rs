//! # geoverlay algorithms
//!
//! Analysis built on `geoverlay-core`.
//!
//! ## Modules
//!
//! - **overlay**: CRS harmonization, raster clipping by polygon, zonal
//!   statistics and the end-to-end overlay pipeline
//! - **rasterize**: burn points, lines and polygons into a grid
//! - **spatial**: k-d tree, convex hull, Delaunay, Voronoi, pairwise distances

mod maybe_rayon;

pub mod overlay;
pub mod rasterize;
pub mod spatial;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::overlay::{
        clip_raster, harmonize, zonal_mean, zonal_stats, OverlayConfig, OverlayOutcome,
        OverlayPipeline, OverlayReport, PipelineError, SourceSummary, Stage, ZonalResult,
    };
    pub use crate::rasterize::{rasterize, MergeFunction, Rasterize, RasterizeParams};
    pub use crate::spatial::{
        convex_hull, pdist, reproject_points, squareform, ConvexHull, KdTree, Triangulation,
        Voronoi,
    };
    pub use geoverlay_core::prelude::*;
}
