//! Raster engine backed by the GDAL command-line utilities.

use crate::contours::parse_contour_collection;
use crate::stats::raster_stats;
use crate::{RasterEngine, RasterError, Result};
use keyline_geometry::SwissTransform;
use keyline_model::{Aoi, AoiGeometry, ContourFeature, CoordinateSystem, ProcessingParameters, RasterStats};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const GDALBUILDVRT: &str = "gdalbuildvrt";
pub const GDALWARP: &str = "gdalwarp";
pub const GDAL_CONTOUR: &str = "gdal_contour";

/// Shells out to `gdalbuildvrt`, `gdalwarp` and `gdal_contour`.
///
/// The binaries are looked up on `PATH` unless a directory is configured
/// with [`GdalEngine::with_tool_dir`].
#[derive(Debug, Clone, Default)]
pub struct GdalEngine {
    transform: SwissTransform,
    tool_dir: Option<PathBuf>,
}

impl GdalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the GDAL binaries from `dir` instead of `PATH`.
    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.tool_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    /// Write the AOI, reprojected to WGS84 as GeoJSON requires, to a scratch
    /// file usable as a cutline. The file is removed when the handle drops.
    fn write_cutline(&self, aoi: &Aoi) -> Result<tempfile::NamedTempFile> {
        let collection = cutline_collection(&self.transform, aoi);
        let mut file = tempfile::Builder::new()
            .prefix("keyline_cutline_")
            .suffix(".geojson")
            .tempfile()
            .map_err(|e| RasterError::io(std::env::temp_dir(), e))?;
        let path = file.path().to_path_buf();
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, &collection)
                .map_err(|e| RasterError::io(&path, e.into()))?;
            writer.flush().map_err(|e| RasterError::io(&path, e))?;
        }
        Ok(file)
    }
}

impl RasterEngine for GdalEngine {
    fn build_mosaic(&self, tiles: &[PathBuf], dest: &Path) -> Result<PathBuf> {
        if tiles.is_empty() {
            return Err(RasterError::NoTiles);
        }
        info!("Building VRT: {} tiles -> {}", tiles.len(), dest.display());
        run_tool(&self.program(GDALBUILDVRT), &buildvrt_args(tiles, dest))?;
        Ok(dest.to_path_buf())
    }

    fn clip(&self, mosaic: &Path, aoi: &Aoi, nodata: f64, dest: &Path) -> Result<RasterStats> {
        let cutline = self.write_cutline(aoi)?;
        info!("Clipping DEM to AOI -> {}", dest.display());
        run_tool(
            &self.program(GDALWARP),
            &warp_args(cutline.path(), nodata, mosaic, dest),
        )?;
        raster_stats(dest)
    }

    fn extract_contours(&self, raster: &Path, params: &ProcessingParameters) -> Result<Vec<ContourFeature>> {
        // The GeoJSON driver refuses to overwrite, so target a fresh path
        // inside a scratch directory.
        let scratch = tempfile::Builder::new()
            .prefix("keyline_contours_")
            .tempdir()
            .map_err(|e| RasterError::io(std::env::temp_dir(), e))?;
        let raw_path = scratch.path().join("raw.geojson");

        info!(
            "Generating contours: interval={:.1}, attr={}",
            params.interval(),
            params.attribute_name()
        );
        run_tool(&self.program(GDAL_CONTOUR), &contour_args(params, raster, &raw_path))?;

        let text = fs::read_to_string(&raw_path).map_err(|e| RasterError::io(&raw_path, e))?;
        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| RasterError::InvalidContours(format!("{}: {e}", raw_path.display())))?;
        let features = parse_contour_collection(&raw, params.attribute_name(), params.simplify_tolerance())?;
        debug!("Parsed {} contour lines from {}", features.len(), raw_path.display());
        Ok(features)
    }
}

/// `gdalbuildvrt -overwrite <dest> <tiles...>`
pub fn buildvrt_args(tiles: &[PathBuf], dest: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-overwrite".into(), dest.into()];
    args.extend(tiles.iter().map(OsString::from));
    args
}

/// `gdalwarp` arguments for a cutline clip to a tiled, LZW-compressed GeoTIFF.
pub fn warp_args(cutline: &Path, nodata: f64, src: &Path, dest: &Path) -> Vec<OsString> {
    vec![
        "-overwrite".into(),
        "-cutline".into(),
        cutline.into(),
        "-crop_to_cutline".into(),
        "-dstnodata".into(),
        nodata.to_string().into(),
        "-of".into(),
        "GTiff".into(),
        "-co".into(),
        "COMPRESS=LZW".into(),
        "-co".into(),
        "TILED=YES".into(),
        src.into(),
        dest.into(),
    ]
}

/// `gdal_contour -i <interval> -a <attr> -f GeoJSON <src> <dest>`
pub fn contour_args(params: &ProcessingParameters, src: &Path, dest: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        params.interval().to_string().into(),
        "-a".into(),
        params.attribute_name().into(),
        "-f".into(),
        "GeoJSON".into(),
        src.into(),
        dest.into(),
    ]
}

fn cutline_collection(transform: &SwissTransform, aoi: &Aoi) -> Value {
    let from = CoordinateSystem::CANONICAL;
    let to = CoordinateSystem::Wgs84;
    let geometry = match aoi.geometry() {
        AoiGeometry::Polygon(p) => AoiGeometry::Polygon(transform.reproject(p, from, to)),
        AoiGeometry::MultiPolygon(mp) => AoiGeometry::MultiPolygon(transform.reproject(mp, from, to)),
    };
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": geometry.to_geojson(),
            "properties": {},
        }],
    })
}

/// Run one tool to completion, capturing its output.
pub(crate) fn run_tool(program: &Path, args: &[OsString]) -> Result<()> {
    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    debug!("Running {} {:?}", program.display(), args);

    let output = Command::new(program).args(args).output().map_err(|source| {
        if source.kind() == IoErrorKind::NotFound {
            RasterError::ToolUnavailable { tool: tool.clone(), source }
        } else {
            RasterError::io(program, source)
        }
    })?;

    if output.status.success() {
        return Ok(());
    }
    Err(RasterError::ToolFailed {
        tool,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use keyline_model::{ErrorKind, Resolution};

    fn aoi() -> Aoi {
        let square = polygon![
            (x: 2_600_000.0, y: 1_200_000.0),
            (x: 2_600_500.0, y: 1_200_000.0),
            (x: 2_600_500.0, y: 1_200_500.0),
            (x: 2_600_000.0, y: 1_200_500.0),
            (x: 2_600_000.0, y: 1_200_000.0),
        ];
        Aoi::new(AoiGeometry::Polygon(square), CoordinateSystem::Lv95).unwrap()
    }

    #[test]
    fn test_buildvrt_args() {
        let tiles = vec![PathBuf::from("/c/a.tif"), PathBuf::from("/c/b.tif")];
        let args = buildvrt_args(&tiles, Path::new("/d/mosaic.vrt"));
        assert_eq!(args, ["-overwrite", "/d/mosaic.vrt", "/c/a.tif", "/c/b.tif"].map(OsString::from));
    }

    #[test]
    fn test_warp_args() {
        let args = warp_args(Path::new("/t/cut.geojson"), -9999.0, Path::new("m.vrt"), Path::new("dem_clip.tif"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[1..3], ["-cutline", "/t/cut.geojson"]);
        assert!(args.contains(&"-crop_to_cutline".to_string()));
        let nd = args.iter().position(|a| a == "-dstnodata").unwrap();
        assert_eq!(args[nd + 1], "-9999");
        assert_eq!(args[args.len() - 2..], ["m.vrt", "dem_clip.tif"]);
    }

    #[test]
    fn test_contour_args() {
        let params = ProcessingParameters::new(2.5, "elev", 0.0, Resolution::Standard).unwrap();
        let args = contour_args(&params, Path::new("dem.tif"), Path::new("out.geojson"));
        assert_eq!(
            args,
            ["-i", "2.5", "-a", "elev", "-f", "GeoJSON", "dem.tif", "out.geojson"].map(OsString::from)
        );
    }

    #[test]
    fn test_cutline_is_wgs84() {
        let collection = cutline_collection(&SwissTransform::new(), &aoi());
        let geometry = &collection["features"][0]["geometry"];
        assert_eq!(geometry["type"], "Polygon");
        let first = &geometry["coordinates"][0][0];
        let lon = first[0].as_f64().unwrap();
        let lat = first[1].as_f64().unwrap();
        assert!((7.0..8.0).contains(&lon), "lon {lon}");
        assert!((46.0..47.5).contains(&lat), "lat {lat}");
    }

    #[test]
    fn test_write_cutline_file() {
        let engine = GdalEngine::new();
        let file = engine.write_cutline(&aoi()).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert!(file.path().extension().is_some_and(|e| e == "geojson"));
    }

    #[test]
    fn test_mosaic_requires_tiles() {
        let err = GdalEngine::new().build_mosaic(&[], Path::new("m.vrt")).unwrap_err();
        assert!(matches!(err, RasterError::NoTiles));
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let engine = GdalEngine::new().with_tool_dir("/nonexistent/gdal/bin");
        let err = engine
            .build_mosaic(&[PathBuf::from("a.tif")], Path::new("m.vrt"))
            .unwrap_err();
        assert!(matches!(err, RasterError::ToolUnavailable { ref tool, .. } if tool == GDALBUILDVRT));
        assert_eq!(err.kind(), ErrorKind::Raster);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_reports_status() {
        let err = run_tool(Path::new("false"), &[]).unwrap_err();
        match err {
            RasterError::ToolFailed { tool, .. } => assert_eq!(tool, "false"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
