//! Raster-vector overlay: harmonize CRSs, pick a feature, clip, aggregate.

mod clip;
mod harmonize;
mod mask;
mod pipeline;
mod zonal;

pub use clip::{clip_raster, MaskClipper, RasterClipper};
pub use harmonize::{harmonize, needs_reprojection};
pub use mask::cell_mask;
pub use pipeline::{
    OverlayConfig, OverlayOutcome, OverlayPipeline, OverlayReport, PipelineError, SourceSummary,
    Stage,
};
pub use zonal::{zonal_mean, zonal_stats, zonal_values, CellCenterMean, ZonalAggregator, ZonalResult};

pub(crate) use mask::{polygon_rings, scanline_fill};
