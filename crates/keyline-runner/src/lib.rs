//! # keyline-runner
//!
//! Command-line front end for the keyline contour pipeline.
//!
//! ```text
//! keyline contours --bbox "2600000,1200000,2600500,1200500" --interval 2
//! keyline contours --geojson field.geojson --crs wgs84 --no-dem
//! ```
//!
//! ## Configuration
//!
//! - `KEYLINE_CACHE_DIR` - cache root (default `~/.cache/keyline-planner`)
//! - `KEYLINE_DOWNLOAD_TIMEOUT` - network timeout in seconds (default 120)
//! - `KEYLINE_STAC_URL` - STAC API base URL
//! - `RUST_LOG` - log filter, overridden to `debug` by `-v`

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyline_cache::{CacheConfig, CacheError, HttpTransport, TileCache};
use keyline_geometry::{AoiSource, GeometryError, GeometryNormalizer, SwissTransform};
use keyline_index::{IndexError, StacClient};
use keyline_model::{CoordinateSystem, ErrorKind, ModelError, ProcessingParameters, Resolution};
use keyline_pipeline::{Pipeline, PipelineError, PipelineRequest, ProcessingResult};
use keyline_raster::{GdalEngine, RasterError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contour lines for Swiss areas of interest from swissALTI3D.
#[derive(Debug, Parser)]
#[command(name = "keyline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate contour lines for an area of interest
    Contours(ContoursArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionArg {
    /// 2 m tiles
    Standard,
    /// 0.5 m tiles
    High,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Standard => Resolution::Standard,
            ResolutionArg::High => Resolution::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CrsArg {
    /// Swiss LV95 (EPSG:2056)
    Lv95,
    /// WGS84 longitude/latitude (EPSG:4326)
    Wgs84,
}

impl From<CrsArg> for CoordinateSystem {
    fn from(arg: CrsArg) -> Self {
        match arg {
            CrsArg::Lv95 => CoordinateSystem::Lv95,
            CrsArg::Wgs84 => CoordinateSystem::Wgs84,
        }
    }
}

#[derive(Debug, Args)]
pub struct ContoursArgs {
    /// Bounding box as "xmin,ymin,xmax,ymax"
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<[f64; 4]>,

    /// GeoJSON file holding a Polygon or MultiPolygon
    #[arg(long)]
    pub geojson: Option<PathBuf>,

    /// Contour interval in metres
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// DEM resolution tier
    #[arg(long, value_enum, default_value_t = ResolutionArg::Standard)]
    pub resolution: ResolutionArg,

    /// Coordinate system of --bbox / --geojson
    #[arg(long, value_enum, default_value_t = CrsArg::Lv95)]
    pub crs: CrsArg,

    /// Douglas-Peucker tolerance in metres (0 disables)
    #[arg(short, long, default_value_t = 0.0)]
    pub simplify: f64,

    /// Output directory (default: fingerprint directory in the cache)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Cache root
    #[arg(long, env = "KEYLINE_CACHE_DIR")]
    pub cache: Option<PathBuf>,

    /// Discard the clipped DEM once contours are written
    #[arg(long)]
    pub no_dem: bool,
}

impl ContoursArgs {
    /// The AOI source; exactly one of `--bbox` and `--geojson` must be set.
    pub fn source(&self) -> Result<AoiSource> {
        let geometry = self.geojson.as_deref().map(load_geojson).transpose()?;
        Ok(AoiSource::from_options(geometry, self.bbox)?)
    }

    pub fn params(&self) -> Result<ProcessingParameters> {
        Ok(ProcessingParameters::new(
            self.interval,
            ProcessingParameters::DEFAULT_ATTRIBUTE,
            self.simplify,
            self.resolution.into(),
        )?)
    }

    pub fn request(&self) -> Result<PipelineRequest> {
        let mut request = PipelineRequest::new(self.source()?, self.params()?)
            .with_crs(self.crs.into())
            .with_keep_clipped_dem(!self.no_dem);
        if let Some(dir) = &self.output {
            request = request.with_output_dir(dir);
        }
        Ok(request)
    }

    /// Cache configuration from the environment, with `--cache` taking
    /// precedence for the root.
    pub fn cache_config(&self) -> CacheConfig {
        let config = CacheConfig::from_env();
        match &self.cache {
            Some(root) => CacheConfig::new(root).with_download_timeout(config.download_timeout),
            None => config,
        }
    }
}

/// Parse `"xmin,ymin,xmax,ymax"`.
pub fn parse_bbox(raw: &str) -> std::result::Result<[f64; 4], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!(
            "expected 4 comma-separated numbers, got {}",
            parts.len()
        ));
    }
    let mut bbox = [0.0; 4];
    for (slot, part) in bbox.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("invalid number '{part}'"))?;
    }
    Ok(bbox)
}

/// Read a GeoJSON document from disk.
pub fn load_geojson(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing GeoJSON in {}", path.display()))
}

/// Wire the production collaborators and run one contour request.
pub fn execute(args: &ContoursArgs) -> Result<ProcessingResult> {
    let request = args.request()?;
    let config = args.cache_config();
    let timeout = config.download_timeout;
    info!(cache = %config.root.display(), "Using tile cache");

    let transport = HttpTransport::new(timeout).context("creating HTTP client")?;
    let index = StacClient::from_env(timeout).context("creating STAC client")?;
    let pipeline = Pipeline::new(
        GeometryNormalizer::new(SwissTransform::new()),
        Box::new(index),
        TileCache::new(config, Box::new(transport)),
        Box::new(GdalEngine::new()),
    );
    Ok(pipeline.run(&request)?)
}

/// Error kind behind a failed command.
///
/// Covers errors from every pipeline crate. Failures reading or decoding the
/// AOI file count as caller input errors.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::kind)
        .or_else(|| err.downcast_ref::<GeometryError>().map(GeometryError::kind))
        .or_else(|| err.downcast_ref::<CacheError>().map(CacheError::kind))
        .or_else(|| err.downcast_ref::<IndexError>().map(IndexError::kind))
        .or_else(|| err.downcast_ref::<RasterError>().map(RasterError::kind))
        .or_else(|| err.downcast_ref::<ModelError>().map(|_| ErrorKind::InvalidInput))
        .or_else(|| {
            let aoi_file = err.downcast_ref::<std::io::Error>().is_some()
                || err.downcast_ref::<serde_json::Error>().is_some();
            aoi_file.then_some(ErrorKind::InvalidInput)
        })
}

/// Human-readable run summary.
pub fn summary(result: &ProcessingResult) -> String {
    let mut lines = vec![
        format!("AOI hash:        {}", result.aoi_hash),
        format!("Tiles:           {}", result.tile_ids.len()),
        format!(
            "Elevation range: {:.1} - {:.1} m",
            result.elevation_range.0, result.elevation_range.1
        ),
        format!(
            "Contours:        {} (interval {} m)",
            result.contour_count,
            result.params.interval()
        ),
        format!("Output:          {}", result.contours_path.display()),
    ];
    if let Some(dem) = &result.clipped_dem_path {
        lines.push(format!("Clipped DEM:     {}", dem.display()));
    }
    lines.push(result.attribution.clone());
    lines.join("\n")
}
