//! The raster-vector overlay pipeline.
//!
//! `Load → Harmonize → Select → Clip → Aggregate → Done`, each stage at
//! most once and in that order. When selection finds nothing the pipeline
//! stops after `Select` and reports [`OverlayOutcome::NotSelected`].

use std::fmt;
use std::path::Path;

use geoverlay_core::io::{open_raster, open_vector, VectorSourceOptions};
use geoverlay_core::{Error, FeatureSet, ProjReprojector, Raster, Reproject, CRS};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{debug, info};

use super::clip::{MaskClipper, RasterClipper};
use super::harmonize::{harmonize, needs_reprojection};
use super::zonal::{CellCenterMean, ZonalAggregator};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Harmonize,
    Select,
    Clip,
    Aggregate,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Harmonize => "harmonize",
            Stage::Select => "select",
            Stage::Clip => "clip",
            Stage::Aggregate => "aggregate",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A failure, tagged with the stage it happened in.
#[derive(Debug, ThisError)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(Error) -> Self {
        move |source| PipelineError { stage, source }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Attribute used to pick the feature
    pub attribute: String,
    /// Value the attribute must equal
    pub value: String,
    /// 1-based raster band
    pub band: usize,
    /// What the raster measures, for the summary line
    pub label: String,
    pub unit: String,
    #[serde(flatten)]
    pub vector: VectorSourceOptions,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            attribute: "ADMIN".to_string(),
            value: "France".to_string(),
            band: 1,
            label: "elevation".to_string(),
            unit: "meters".to_string(),
            vector: VectorSourceOptions::default(),
        }
    }
}

/// What the load and harmonize stages learned about the two sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub raster_crs: Option<CRS>,
    /// (rows, cols)
    pub raster_shape: (usize, usize),
    /// (min_x, min_y, max_x, max_y)
    pub raster_bounds: (f64, f64, f64, f64),
    /// CRS of the vector source as loaded
    pub vector_crs: CRS,
    pub feature_count: usize,
    /// Whether the features were reprojected to the raster CRS
    pub reprojected: bool,
}

/// Everything a completed run learned.
#[derive(Debug, Clone)]
pub struct OverlayReport {
    pub sources: SourceSummary,
    pub attribute: String,
    pub value: String,
    pub label: String,
    pub unit: String,
    pub mean: f64,
    pub clipped: Raster<f64>,
    /// Stages run, ending with [`Stage::Done`]
    pub stages: Vec<Stage>,
}

impl OverlayReport {
    /// `Mean elevation in France: 545.32 meters`
    pub fn summary(&self) -> String {
        format!(
            "Mean {} in {}: {:.2} {}",
            self.label, self.value, self.mean, self.unit
        )
    }
}

/// Result of a run that did not fail.
#[derive(Debug, Clone)]
pub enum OverlayOutcome {
    Completed(OverlayReport),
    /// No feature matched; nothing was clipped or aggregated.
    NotSelected {
        sources: SourceSummary,
        attribute: String,
        value: String,
    },
}

impl OverlayOutcome {
    pub fn report(&self) -> Option<&OverlayReport> {
        match self {
            OverlayOutcome::Completed(report) => Some(report),
            OverlayOutcome::NotSelected { .. } => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        self.report().map(|r| r.mean)
    }

    /// Source metadata, present whether or not a feature was selected.
    pub fn sources(&self) -> &SourceSummary {
        match self {
            OverlayOutcome::Completed(report) => &report.sources,
            OverlayOutcome::NotSelected { sources, .. } => sources,
        }
    }
}

/// Runs the overlay stages against pluggable reprojection, clipping and
/// aggregation.
pub struct OverlayPipeline {
    config: OverlayConfig,
    reprojector: Box<dyn Reproject>,
    clipper: Box<dyn RasterClipper>,
    aggregator: Box<dyn ZonalAggregator>,
}

impl OverlayPipeline {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            reprojector: Box::new(ProjReprojector),
            clipper: Box::new(MaskClipper),
            aggregator: Box::new(CellCenterMean),
        }
    }

    pub fn with_reprojector(mut self, reprojector: impl Reproject + 'static) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    pub fn with_clipper(mut self, clipper: impl RasterClipper + 'static) -> Self {
        self.clipper = Box::new(clipper);
        self
    }

    pub fn with_aggregator(mut self, aggregator: impl ZonalAggregator + 'static) -> Self {
        self.aggregator = Box::new(aggregator);
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Load both sources, then run the remaining stages.
    pub fn run(
        &self,
        raster_path: impl AsRef<Path>,
        vector_location: &str,
    ) -> Result<OverlayOutcome, PipelineError> {
        info!(stage = %Stage::Load, raster = %raster_path.as_ref().display(), vector = vector_location);
        let raster = open_raster(raster_path, self.config.band).map_err(PipelineError::at(Stage::Load))?;
        let features =
            open_vector(vector_location, &self.config.vector).map_err(PipelineError::at(Stage::Load))?;
        self.run_loaded(raster, features)
    }

    /// Run from `Harmonize` on, with sources already in memory.
    pub fn run_loaded(
        &self,
        raster: Raster<f64>,
        features: FeatureSet,
    ) -> Result<OverlayOutcome, PipelineError> {
        let mut stages = vec![Stage::Load];
        let raster_crs = raster.crs().cloned();
        let raster_shape = raster.shape();
        let raster_bounds = raster.bounds();
        let vector_crs = features.crs().clone();
        let feature_count = features.len();
        debug!(
            raster_crs = ?raster_crs.as_ref().map(CRS::identifier),
            ?raster_shape,
            ?raster_bounds,
            vector_crs = %vector_crs,
            feature_count,
            "sources loaded"
        );

        stages.push(Stage::Harmonize);
        let target = raster_crs
            .clone()
            .ok_or_else(|| Error::UnknownCrs("raster".into()))
            .map_err(PipelineError::at(Stage::Harmonize))?;
        let reprojected = needs_reprojection(&features, &target);
        info!(stage = %Stage::Harmonize, reprojected, target = %target);
        let features = harmonize(features, &target, self.reprojector.as_ref())
            .map_err(PipelineError::at(Stage::Harmonize))?;
        let sources = SourceSummary {
            raster_crs,
            raster_shape,
            raster_bounds,
            vector_crs,
            feature_count,
            reprojected,
        };

        stages.push(Stage::Select);
        let OverlayConfig { attribute, value, label, unit, .. } = &self.config;
        let selected = match features.into_selected(attribute, value.as_str()) {
            Some(feature) => feature,
            None => {
                info!(stage = %Stage::Select, attribute = %attribute, value = %value, "no matching feature");
                return Ok(OverlayOutcome::NotSelected {
                    sources,
                    attribute: attribute.clone(),
                    value: value.clone(),
                });
            }
        };
        let geometry = selected
            .geometry
            .ok_or_else(|| Error::EmptyClipResult(format!("{} = {} has no geometry", attribute, value)))
            .map_err(PipelineError::at(Stage::Select))?;
        info!(stage = %Stage::Select, attribute = %attribute, value = %value, "feature selected");

        stages.push(Stage::Clip);
        let clipped = self
            .clipper
            .clip(&raster, &geometry, &target)
            .map_err(PipelineError::at(Stage::Clip))?;
        info!(stage = %Stage::Clip, shape = ?clipped.shape());

        stages.push(Stage::Aggregate);
        let mean = self
            .aggregator
            .aggregate(&clipped, &geometry)
            .map_err(PipelineError::at(Stage::Aggregate))?;
        info!(stage = %Stage::Aggregate, mean);

        stages.push(Stage::Done);
        Ok(OverlayOutcome::Completed(OverlayReport {
            sources,
            attribute: attribute.clone(),
            value: value.clone(),
            label: label.clone(),
            unit: unit.clone(),
            mean,
            clipped,
            stages,
        }))
    }
}
