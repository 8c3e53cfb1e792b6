//! The contour pipeline state machine.

use crate::canonical::{canonicalize, elevation_range, write_atomic, write_contours};
use crate::{PipelineError, Result};
use keyline_cache::{DerivedLock, TileCache};
use keyline_geometry::{aoi_fingerprint, AoiSource, GeometryNormalizer};
use keyline_index::{TileIndex, SWISSALTI3D_COLLECTION};
use keyline_model::{CoordinateSystem, ProcessingParameters, ProvenanceManifest, ATTRIBUTION};
use keyline_raster::{RasterEngine, DEFAULT_NODATA};
use std::fmt;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub const MOSAIC_FILE_NAME: &str = "mosaic.vrt";
pub const CLIPPED_DEM_FILE_NAME: &str = "dem_clip.tif";
pub const CONTOURS_FILE_NAME: &str = "contours.geojson";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Stages of a run, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Start,
    AoiNormalized,
    TilesDiscovered,
    TilesCached,
    MosaicBuilt,
    Clipped,
    ContoursGenerated,
    ManifestWritten,
    Done,
}

impl PipelineState {
    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::AoiNormalized => "aoi_normalized",
            PipelineState::TilesDiscovered => "tiles_discovered",
            PipelineState::TilesCached => "tiles_cached",
            PipelineState::MosaicBuilt => "mosaic_built",
            PipelineState::Clipped => "clipped",
            PipelineState::ContoursGenerated => "contours_generated",
            PipelineState::ManifestWritten => "manifest_written",
            PipelineState::Done => "done",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks and logs the linear state progression of one run.
#[derive(Debug)]
struct Progress {
    state: PipelineState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: PipelineState::Start,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(next > self.state, "state went backwards: {} -> {}", self.state, next);
        info!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }
}

/// What to process and where to put it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub source: AoiSource,
    /// Coordinate system of `source`.
    pub crs: CoordinateSystem,
    pub params: ProcessingParameters,
    /// Output directory; the fingerprint-derived cache directory when `None`.
    pub output_dir: Option<PathBuf>,
    /// Keep `dem_clip.tif` after contours are generated.
    pub keep_clipped_dem: bool,
}

impl PipelineRequest {
    pub fn new(source: AoiSource, params: ProcessingParameters) -> Self {
        Self {
            source,
            crs: CoordinateSystem::CANONICAL,
            params,
            output_dir: None,
            keep_clipped_dem: true,
        }
    }

    pub fn with_crs(mut self, crs: CoordinateSystem) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_keep_clipped_dem(mut self, keep: bool) -> Self {
        self.keep_clipped_dem = keep;
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub contours_path: PathBuf,
    /// `None` when the clipped DEM was discarded.
    pub clipped_dem_path: Option<PathBuf>,
    pub mosaic_path: PathBuf,
    pub manifest_path: PathBuf,
    pub contour_count: usize,
    /// (min, max) elevation of the clipped DEM.
    pub elevation_range: (f64, f64),
    /// (min, max) contour value, `None` when no contour was produced.
    pub contour_range: Option<(f64, f64)>,
    pub aoi_hash: String,
    pub params: ProcessingParameters,
    pub tile_ids: Vec<String>,
    pub attribution: String,
}

/// Sequences normaliser, tile index, tile cache and raster engine.
///
/// A run either ends with `manifest.json` written as its final step, or
/// fails with the collaborator's error and leaves no manifest behind.
/// Intermediate files from a failed run stay in place.
pub struct Pipeline {
    normalizer: GeometryNormalizer,
    index: Box<dyn TileIndex>,
    cache: TileCache,
    engine: Box<dyn RasterEngine>,
    collection: String,
    nodata: f64,
}

impl Pipeline {
    pub fn new(
        normalizer: GeometryNormalizer,
        index: Box<dyn TileIndex>,
        cache: TileCache,
        engine: Box<dyn RasterEngine>,
    ) -> Self {
        Self {
            normalizer,
            index,
            cache,
            engine,
            collection: SWISSALTI3D_COLLECTION.to_string(),
            nodata: DEFAULT_NODATA,
        }
    }

    /// Search a different tile collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Execute one run to completion.
    pub fn run(&self, request: &PipelineRequest) -> Result<ProcessingResult> {
        let started = Instant::now();
        let mut progress = Progress::new();
        let params = &request.params;

        let aoi = self.normalizer.normalize(&request.source, request.crs)?;
        let aoi_hash = aoi_fingerprint(&aoi);
        info!(aoi_hash = %aoi_hash, area_m2 = aoi.bbox().area(), "AOI normalised");
        progress.advance(PipelineState::AoiNormalized);

        let output_dir = match &request.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| PipelineError::storage(dir, e))?;
                dir.clone()
            }
            None => self.cache.derived_directory(&aoi_hash, params)?,
        };
        let _lock = DerivedLock::acquire(&output_dir)?;
        let manifest_path = output_dir.join(MANIFEST_FILE_NAME);
        // A manifest from an earlier run must not vouch for files this run
        // is about to overwrite.
        remove_if_present(&manifest_path)?;

        let search_bbox = self
            .normalizer
            .reproject_bbox(aoi.bbox(), self.index.coordinate_system())?;
        let tiles = self
            .index
            .search(&self.collection, &search_bbox, params.resolution())?;
        if tiles.is_empty() {
            return Err(PipelineError::NoData {
                collection: self.collection.clone(),
                bbox: search_bbox.as_array(),
                gsd: params.resolution().gsd(),
            });
        }
        let tile_ids: Vec<String> = tiles.iter().map(|t| t.item_id().to_string()).collect();
        info!("Found {} tile(s): {:?}", tiles.len(), tile_ids);
        progress.advance(PipelineState::TilesDiscovered);

        let tile_paths = self.cache.fetch_all(&tiles)?;
        progress.advance(PipelineState::TilesCached);

        let mosaic_path = self
            .engine
            .build_mosaic(&tile_paths, &output_dir.join(MOSAIC_FILE_NAME))?;
        progress.advance(PipelineState::MosaicBuilt);

        let clip_path = output_dir.join(CLIPPED_DEM_FILE_NAME);
        let dem_stats = self.engine.clip(&mosaic_path, &aoi, self.nodata, &clip_path)?;
        info!("DEM elevation range: {:.1} - {:.1} m", dem_stats.min, dem_stats.max);
        progress.advance(PipelineState::Clipped);

        let features = canonicalize(self.engine.extract_contours(&clip_path, params)?);
        let contours_path = output_dir.join(CONTOURS_FILE_NAME);
        write_contours(&contours_path, &features, params.attribute_name())?;
        info!("Generated {} contour features -> {}", features.len(), contours_path.display());
        progress.advance(PipelineState::ContoursGenerated);

        let clipped_dem_path = if request.keep_clipped_dem {
            Some(clip_path)
        } else {
            remove_if_present(&clip_path)?;
            None
        };

        let elapsed = started.elapsed().as_secs_f64();
        let manifest = ProvenanceManifest::new(
            aoi_hash.clone(),
            params.clone(),
            tile_ids.clone(),
            dem_stats.clone(),
            features.len(),
            elapsed,
        );
        let text = manifest
            .to_json_pretty()
            .map_err(|e| PipelineError::storage(&manifest_path, e.into()))?;
        write_atomic(&manifest_path, &text)?;
        debug!("Wrote manifest: {}", manifest_path.display());
        progress.advance(PipelineState::ManifestWritten);

        info!(
            "Pipeline complete: {} contours in {:.1}s -> {}",
            features.len(),
            elapsed,
            output_dir.display()
        );
        progress.advance(PipelineState::Done);

        Ok(ProcessingResult {
            contours_path,
            clipped_dem_path,
            mosaic_path,
            manifest_path,
            contour_count: features.len(),
            elevation_range: (dem_stats.min, dem_stats.max),
            contour_range: elevation_range(&features),
            aoi_hash,
            params: params.clone(),
            tile_ids,
            attribution: ATTRIBUTION.to_string(),
        })
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::storage(path, e)),
    }
}
