//! geoverlay CLI - raster/vector overlay and point-set geometry

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geo::{Coord, Geometry, Point};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geoverlay_algorithms::overlay::{OverlayConfig, OverlayOutcome, OverlayPipeline};
use geoverlay_algorithms::rasterize::{rasterize, GridSpec, MergeFunction, RasterizeParams};
use geoverlay_algorithms::spatial::{
    convex_hull, pdist, reproject_points, squareform, KdTree, Triangulation, Voronoi,
};
use geoverlay_core::io::{
    download, open_raster, open_vector, write_geojson, write_geotiff, write_geotiff_as,
    VectorSourceOptions,
};
use geoverlay_core::{DataType, Feature, FeatureSet, ProjReprojector, Raster, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geoverlay")]
#[command(author, version, about = "Raster/vector overlay and point-set geometry", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
        /// 1-based band
        #[arg(short, long, default_value = "1")]
        band: usize,
    },
    /// Mean raster value inside one selected vector feature
    Overlay {
        /// Input raster (GeoTIFF)
        raster: PathBuf,
        /// Vector source: .shp, .geojson, .zip or an http(s) URL of a zip
        vector: String,
        /// JSON file with overlay settings; flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Attribute used to select the feature [default: ADMIN]
        #[arg(short, long)]
        attribute: Option<String>,
        /// Attribute value to select [default: France]
        #[arg(long)]
        value: Option<String>,
        /// 1-based raster band [default: 1]
        #[arg(short, long)]
        band: Option<usize>,
        /// What the raster measures [default: elevation]
        #[arg(long)]
        label: Option<String>,
        /// Unit of the raster values [default: meters]
        #[arg(long)]
        unit: Option<String>,
        /// Archive member extension [default: shp]
        #[arg(long)]
        extension: Option<String>,
        /// Parent directory for temporary archive extraction
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
        /// Do not warn about vector sources without a CRS
        #[arg(short, long)]
        quiet: bool,
        /// Write the clipped raster here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Burn vector features into a new raster
    Rasterize {
        /// Vector source: .shp, .geojson, .zip or an http(s) URL of a zip
        input: String,
        /// Output GeoTIFF
        output: PathBuf,
        /// Cell size as "X,Y" or a single value
        #[arg(long, conflicts_with_all = ["shape", "like"])]
        res: Option<String>,
        /// Output shape as "ROWS,COLS"
        #[arg(long, conflicts_with = "like")]
        shape: Option<String>,
        /// Use the grid of an existing raster
        #[arg(long)]
        like: Option<PathBuf>,
        /// Extent as "MINX,MINY,MAXX,MAXY" [default: feature bounds]
        #[arg(long, allow_hyphen_values = true)]
        extent: Option<String>,
        /// Numeric attribute to burn
        #[arg(short, long)]
        field: Option<String>,
        /// Constant value to burn when no field is given
        #[arg(long, allow_hyphen_values = true)]
        burn: Option<f64>,
        /// Merge function: sum, first, last, min, max, count, any
        #[arg(long, default_value = "last")]
        fun: String,
        /// Value for cells no feature touches [default: NaN]
        #[arg(long, allow_hyphen_values = true)]
        background: Option<f64>,
        /// Output sample type: uint8, uint16, int16, int32, uint32, float32, float64
        #[arg(long, default_value = "float32")]
        dtype: String,
        /// Archive member extension
        #[arg(long, default_value = "shp")]
        extension: String,
    },
    /// Nearest neighbours, hull, triangulation, Voronoi and distances of a city table
    Spatial {
        /// CSV file or http(s) URL with one point per row
        input: String,
        /// Number of leading rows in the distance matrix
        #[arg(short, long, default_value = "10")]
        rank: usize,
        /// Also measure in this CRS, e.g. 5070 or EPSG:5070
        #[arg(long)]
        reproject: Option<String>,
        /// Write points, hull and bounded Voronoi cells as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Longitude column
        #[arg(long, default_value = "lon")]
        lon: String,
        /// Latitude column
        #[arg(long, default_value = "lat")]
        lat: String,
        /// Comma-separated columns joined into each point's name
        #[arg(long, default_value = "City,State")]
        name: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path, band: usize) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = open_raster(path, band).context("Failed to read raster");
    pb.finish_and_clear();
    let raster = raster?;
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let written = write_geotiff(raster, path).context("Failed to write output");
    pb.finish_and_clear();
    written
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_list<T: FromStr>(s: &str, name: &str) -> Result<Vec<T>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("invalid {} component '{}' in '{}'", name, part, s))
        })
        .collect()
}

fn parse_pair<T: FromStr + Copy>(s: &str, name: &str) -> Result<(T, T)> {
    match parse_list::<T>(s, name)?.as_slice() {
        [v] => Ok((*v, *v)),
        [a, b] => Ok((*a, *b)),
        _ => bail!("{} expects one or two comma-separated values, got '{}'", name, s),
    }
}

fn parse_extent(s: &str) -> Result<(f64, f64, f64, f64)> {
    match parse_list::<f64>(s, "extent")?.as_slice() {
        [a, b, c, d] => Ok((*a, *b, *c, *d)),
        _ => bail!("extent expects MINX,MINY,MAXX,MAXY, got '{}'", s),
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ─── Overlay ────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn overlay_config(
    config: Option<PathBuf>,
    attribute: Option<String>,
    value: Option<String>,
    band: Option<usize>,
    label: Option<String>,
    unit: Option<String>,
    extension: Option<String>,
    scratch_dir: Option<PathBuf>,
    quiet: bool,
) -> Result<OverlayConfig> {
    let mut cfg = match config {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => OverlayConfig::default(),
    };

    if let Some(v) = attribute {
        cfg.attribute = v;
    }
    if let Some(v) = value {
        cfg.value = v;
    }
    if let Some(v) = band {
        cfg.band = v;
    }
    if let Some(v) = label {
        cfg.label = v;
    }
    if let Some(v) = unit {
        cfg.unit = v;
    }
    if let Some(v) = extension {
        cfg.vector.extension = v;
    }
    if scratch_dir.is_some() {
        cfg.vector.scratch_dir = scratch_dir;
    }
    cfg.vector.suppress_warnings |= quiet;
    debug!(?cfg, "overlay configuration");
    Ok(cfg)
}

fn print_raster_summary(out: &mut impl Write, raster: &Raster<f64>) -> io::Result<()> {
    let (rows, cols) = raster.shape();
    let b = raster.bounds();
    match raster.crs() {
        Some(crs) => writeln!(out, "Raster CRS: {}", crs)?,
        None => writeln!(out, "Raster CRS: unknown")?,
    }
    writeln!(out, "Raster shape: {} x {}", rows, cols)?;
    writeln!(out, "Raster bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", b.0, b.1, b.2, b.3)
}

fn print_vector_summary(out: &mut impl Write, features: &FeatureSet) -> io::Result<()> {
    writeln!(out, "Vector CRS: {}", features.crs())?;
    writeln!(out, "Features: {}", features.len())
}

fn print_outcome(out: &mut impl Write, outcome: &OverlayOutcome) -> io::Result<()> {
    let sources = outcome.sources();
    if sources.reprojected {
        if let Some(crs) = &sources.raster_crs {
            writeln!(out, "Reprojected vector features to {}", crs)?;
        }
    }
    match outcome {
        OverlayOutcome::Completed(report) => writeln!(out, "{}", report.summary()),
        OverlayOutcome::NotSelected { attribute, value, .. } => {
            writeln!(out, "No feature with {} = {} found; nothing to aggregate", attribute, value)
        }
    }
}

/// Load both sources and run the overlay, writing each stage's metadata to
/// `out` as soon as that stage finishes.
fn run_overlay(
    raster: &Path,
    vector: &str,
    cfg: OverlayConfig,
    out: &mut impl Write,
) -> Result<OverlayOutcome> {
    let grid = read_raster(raster, cfg.band)?;
    print_raster_summary(out, &grid)?;

    let pb = spinner("Reading features...");
    let features = open_vector(vector, &cfg.vector);
    pb.finish_and_clear();
    let features = features.context("Failed to read vector source")?;
    print_vector_summary(out, &features)?;

    let outcome = OverlayPipeline::new(cfg)
        .run_loaded(grid, features)
        .context("Overlay failed")?;
    print_outcome(out, &outcome)?;
    Ok(outcome)
}

// ─── Spatial ────────────────────────────────────────────────────────────

/// Named points loaded from a CSV table.
struct PointTable {
    names: Vec<String>,
    coords: Vec<Coord<f64>>,
}

fn load_points(input: &str, lon: &str, lat: &str, name: &str) -> Result<PointTable> {
    // the temp dir holding a downloaded table lives until parsing is done
    let (path, _scratch) = if is_url(input) {
        let dir = tempfile::tempdir().context("Failed to create a temporary directory")?;
        let dest = dir.path().join("points.csv");
        let pb = spinner("Downloading table...");
        let fetched = download(input, &dest, std::time::Duration::from_secs(60));
        pb.finish_and_clear();
        let bytes = fetched.with_context(|| format!("Failed to download {}", input))?;
        info!("File is downloaded from {} ({} bytes)", input, bytes);
        (dest, Some(dir))
    } else {
        (PathBuf::from(input), None)
    };

    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim() == wanted)
            .with_context(|| format!("column '{}' not found in {}", wanted, input))
    };
    let lon_idx = column(lon)?;
    let lat_idx = column(lat)?;
    let name_idx: Vec<usize> = name
        .split(',')
        .filter_map(|n| headers.iter().position(|h| h.trim() == n.trim()))
        .collect();

    let mut table = PointTable {
        names: Vec::new(),
        coords: Vec::new(),
    };
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", row + 1))?;
        let x = record.get(lon_idx).and_then(|v| v.trim().parse::<f64>().ok());
        let y = record.get(lat_idx).and_then(|v| v.trim().parse::<f64>().ok());
        let (Some(x), Some(y)) = (x, y) else {
            warn!(row = row + 1, "skipping row without numeric coordinates");
            continue;
        };
        let label = if name_idx.is_empty() {
            format!("#{}", row + 1)
        } else {
            name_idx
                .iter()
                .filter_map(|&i| record.get(i))
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.names.push(label);
        table.coords.push(Coord { x, y });
    }

    if table.coords.is_empty() {
        bail!("no points with numeric '{}'/'{}' columns in {}", lon, lat, input);
    }
    info!("Loaded {} points", table.coords.len());
    Ok(table)
}

fn distance_units(crs: &CRS) -> &'static str {
    if crs.is_geographic() {
        "degrees"
    } else {
        "meters"
    }
}

/// Nearest neighbour of the first point and the leading distance matrix.
fn report_distances(names: &[String], coords: &[Coord<f64>], crs: &CRS, rank: usize) -> Result<()> {
    let units = distance_units(crs);
    let tree = KdTree::build(coords);
    if let Some(hit) = tree.k_nearest(coords[0], 2).get(1) {
        println!(
            "The nearest neighbor to {} is {} at a distance of {:.4} {} ({})",
            names[0],
            names[hit.index],
            hit.distance(),
            units,
            crs
        );
    }

    let rank = rank.min(coords.len());
    let matrix = squareform(&pdist(&coords[..rank]))?;
    println!("\nPairwise distance matrix between the first {} points (in {}):", rank, units);
    let short = |s: &str| s.chars().take(14).collect::<String>();
    print!("{:>16}", "");
    for name in &names[..rank] {
        print!(" {:>14}", short(name.as_str()));
    }
    println!();
    for (i, row) in matrix.rows().into_iter().enumerate() {
        print!("{:>16}", short(names[i].as_str()));
        for d in row {
            print!(" {:>14.4}", d);
        }
        println!();
    }
    Ok(())
}

fn spatial_features(table: &PointTable, crs: &CRS) -> Result<FeatureSet> {
    let mut set = FeatureSet::new(crs.clone());
    for (name, c) in table.names.iter().zip(&table.coords) {
        set.push(
            Feature::new(Geometry::Point(Point::from(*c)))
                .with_property("kind", "point")
                .with_property("name", name.as_str()),
        );
    }

    let hull = convex_hull(&table.coords)?;
    set.push(
        Feature::new(Geometry::Polygon(hull.polygon(&table.coords)))
            .with_property("kind", "hull")
            .with_property("area", hull.area),
    );

    let voronoi = Voronoi::new(&table.coords)?;
    for (site, name) in table.names.iter().enumerate() {
        if let Some(cell) = voronoi.region_polygon(site) {
            set.push(
                Feature::new(Geometry::Polygon(cell))
                    .with_property("kind", "voronoi")
                    .with_property("name", name.as_str()),
            );
        }
    }
    Ok(set)
}

fn run_spatial(
    input: &str,
    rank: usize,
    reproject: Option<String>,
    geojson: Option<PathBuf>,
    lon: &str,
    lat: &str,
    name: &str,
) -> Result<()> {
    let table = load_points(input, lon, lat, name)?;
    let wgs84 = CRS::wgs84();
    let start = Instant::now();

    report_distances(&table.names, &table.coords, &wgs84, rank)?;

    let hull = convex_hull(&table.coords).context("Failed to compute convex hull")?;
    println!(
        "\nConvex hull: {} vertices, area {:.4}, perimeter {:.4}",
        hull.vertices.len(),
        hull.area,
        hull.perimeter
    );

    let tri = Triangulation::new(&table.coords).context("Failed to triangulate")?;
    println!("Delaunay triangulation: {} triangles", tri.simplices().len());
    if !tri.duplicates().is_empty() {
        println!("  {} duplicate points skipped", tri.duplicates().len());
    }

    let voronoi = Voronoi::from_triangulation(&tri).context("Failed to build Voronoi diagram")?;
    let finite = voronoi.ridges().iter().filter(|r| r.is_finite()).count();
    let bounded = (0..table.coords.len()).filter(|&s| voronoi.is_bounded(s)).count();
    println!(
        "Voronoi diagram: {} vertices, {} ridges ({} finite), {} bounded regions",
        voronoi.vertices().len(),
        voronoi.ridges().len(),
        finite,
        bounded
    );

    if let Some(target) = reproject {
        let target: CRS = target.parse().context("Invalid --reproject CRS")?;
        let pb = spinner("Reprojecting points...");
        let projected = reproject_points(&table.coords, &wgs84, &target, &ProjReprojector);
        pb.finish_and_clear();
        let projected = projected.with_context(|| format!("Failed to reproject to {}", target))?;
        println!();
        report_distances(&table.names, &projected, &target, rank)?;
    }

    if let Some(path) = geojson {
        let set = spatial_features(&table, &wgs84)?;
        write_geojson(&set, &path).context("Failed to write GeoJSON")?;
        println!("\nGeoJSON saved to: {} ({} features)", path.display(), set.len());
    }

    println!("\n  Processing time: {:.2?}", start.elapsed());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, band } => {
            let raster = read_raster(&input, band)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: unknown"),
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Overlay ──────────────────────────────────────────────────
        Commands::Overlay {
            raster,
            vector,
            config,
            attribute,
            value,
            band,
            label,
            unit,
            extension,
            scratch_dir,
            quiet,
            output,
        } => {
            let cfg = overlay_config(
                config, attribute, value, band, label, unit, extension, scratch_dir, quiet,
            )?;
            let start = Instant::now();
            let outcome = run_overlay(&raster, &vector, cfg, &mut io::stdout().lock())?;
            let elapsed = start.elapsed();

            if let (Some(path), Some(report)) = (output, outcome.report()) {
                write_result(&report.clipped, &path)?;
                done("Clipped raster", &path, elapsed);
            }
        }

        // ── Rasterize ────────────────────────────────────────────────
        Commands::Rasterize {
            input,
            output,
            res,
            shape,
            like,
            extent,
            field,
            burn,
            fun,
            background,
            dtype,
            extension,
        } => {
            let fun = MergeFunction::from_str(&fun).context("Invalid --fun")?;
            let dtype = DataType::from_str(&dtype).context("Invalid --dtype")?;
            let like = match like {
                Some(path) => Some(GridSpec::of(&read_raster(&path, 1)?)),
                None => None,
            };
            if like.is_none() && res.is_none() && shape.is_none() {
                bail!("one of --res, --shape or --like is required");
            }

            let mut params = RasterizeParams {
                like,
                field,
                burn,
                fun,
                dtype,
                ..RasterizeParams::default()
            };
            if let Some(res) = res {
                params.resolution = Some(parse_pair::<f64>(&res, "res")?);
            }
            if let Some(shape) = shape {
                params.out_shape = Some(parse_pair::<usize>(&shape, "shape")?);
            }
            if let Some(extent) = extent {
                params.extent = Some(parse_extent(&extent)?);
            }
            if let Some(bg) = background {
                params.background = bg;
            }

            let options = VectorSourceOptions {
                extension,
                ..VectorSourceOptions::default()
            };
            let pb = spinner("Reading features...");
            let features = open_vector(&input, &options);
            pb.finish_and_clear();
            let features = features.context("Failed to read vector source")?;
            info!("Features: {} ({})", features.len(), features.crs());

            let start = Instant::now();
            let result = rasterize(&features, &params).context("Failed to rasterize")?;
            let elapsed = start.elapsed();
            let pb = spinner("Writing output...");
            let written = write_geotiff_as(&result, &output, dtype).context("Failed to write output");
            pb.finish_and_clear();
            written?;
            done("Rasterized grid", &output, elapsed);
        }

        // ── Spatial ──────────────────────────────────────────────────
        Commands::Spatial {
            input,
            rank,
            reproject,
            geojson,
            lon,
            lat,
            name,
        } => run_spatial(&input, rank, reproject, geojson, &lon, &lat, &name)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoverlay_core::GeoTransform;
    use ndarray::Array2;
    use std::fs;
    use tempfile::TempDir;

    fn write_grid(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("grid.tif");
        let grid = Raster::from_array(Array2::from_elem((4, 4), 100.0))
            .with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0))
            .with_crs(CRS::from_epsg(4326));
        write_geotiff(&grid, &path).unwrap();
        path
    }

    #[test]
    fn test_raster_metadata_printed_before_vector_load() {
        let dir = TempDir::new().unwrap();
        let raster = write_grid(&dir);
        let missing = dir.path().join("missing.geojson");

        let mut out = Vec::new();
        let result = run_overlay(
            &raster,
            missing.to_str().unwrap(),
            OverlayConfig::default(),
            &mut out,
        );
        assert!(result.is_err());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Raster CRS: EPSG:4326"));
        assert!(text.contains("Raster shape: 4 x 4"));
        assert!(!text.contains("Vector CRS"));
    }

    #[test]
    fn test_stage_lines_in_order_when_not_selected() {
        let dir = TempDir::new().unwrap();
        let raster = write_grid(&dir);
        let vector = dir.path().join("zones.geojson");
        fs::write(
            &vector,
            r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
                "properties": {"ADMIN": "Andorra"},
                "geometry": {"type": "Polygon",
                    "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]}}]}"#,
        )
        .unwrap();

        let mut out = Vec::new();
        let outcome = run_overlay(
            &raster,
            vector.to_str().unwrap(),
            OverlayConfig::default(),
            &mut out,
        )
        .unwrap();
        assert!(outcome.report().is_none());

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Raster CRS: EPSG:4326",
                "Raster shape: 4 x 4",
                "Raster bounds: (0.000000, 0.000000) - (4.000000, 4.000000)",
                "Vector CRS: EPSG:4326",
                "Features: 1",
                "No feature with ADMIN = France found; nothing to aggregate",
            ]
        );
    }
}
