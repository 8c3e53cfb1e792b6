//! Summary statistics of single-band GeoTIFF elevation rasters.

use crate::{RasterError, Result};
use keyline_model::RasterStats;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// GDAL_NODATA tag, stored as an ASCII string.
const GDAL_NODATA_TAG: u16 = 42113;

/// GeoKeyDirectoryTag.
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;

/// ProjectedCSTypeGeoKey.
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// GeographicTypeGeoKey.
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;

/// Reported CRS when the raster carries no usable GeoKeys.
pub const UNKNOWN_CRS: &str = "unknown";

/// Read a GeoTIFF and compute min/max/mean/population std over valid pixels.
///
/// Pixels equal to the GDAL nodata value, and NaNs, are excluded. A raster
/// with no valid pixel is [`RasterError::EmptyRaster`].
pub fn raster_stats(path: &Path) -> Result<RasterStats> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    let tiff_err = |source| RasterError::TiffDecode {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;

    // swissALTI3D 0.5 m tiles are 2000 x 2000 f32; mosaicked clips can be
    // much larger.
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let nodata = read_nodata_value(&mut decoder);
    let crs = read_epsg_code(&mut decoder)
        .map(|code| format!("EPSG:{code}"))
        .unwrap_or_else(|| UNKNOWN_CRS.to_string());
    let data = decode_elevation_data(&mut decoder).map_err(tiff_err)?;

    let summary = summarize(&data, nodata).ok_or_else(|| RasterError::EmptyRaster {
        path: path.to_path_buf(),
    })?;

    Ok(RasterStats {
        min: summary.min,
        max: summary.max,
        mean: summary.mean,
        std: summary.std,
        nodata,
        width,
        height,
        crs,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Summary {
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
}

/// Two-pass statistics over values that are neither NaN nor nodata.
fn summarize(data: &[f64], nodata: Option<f64>) -> Option<Summary> {
    let is_valid = |v: &&f64| !v.is_nan() && nodata.map_or(true, |nd| **v != nd);

    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in data.iter().filter(is_valid) {
        count += 1;
        sum += v;
        min = min.min(*v);
        max = max.max(*v);
    }
    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let variance = data
        .iter()
        .filter(is_valid)
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    Some(Summary {
        min,
        max,
        mean,
        std: variance.sqrt(),
    })
}

/// Decode the first band as f64, whatever the stored sample type.
fn decode_elevation_data<R: Read + Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Vec<f64>> {
    let result = decoder.read_image()?;

    Ok(match result {
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
    })
}

fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA_TAG))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
}

/// EPSG code from the GeoKey directory: projected CRS first, then geographic.
fn read_epsg_code<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let directory = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY_TAG))
        .ok()?;
    epsg_from_geokeys(&directory)
}

/// Parse `[version, revision, minor, count, (key, location, count, value)*]`.
///
/// Only inline SHORT values (`location == 0`) can carry an EPSG code.
fn epsg_from_geokeys(directory: &[u16]) -> Option<u32> {
    let header = directory.get(..4)?;
    let count = usize::from(header[3]);
    let entries: Vec<&[u16]> = directory[4..].chunks_exact(4).take(count).collect();

    let lookup = |wanted: u16| {
        entries
            .iter()
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| u32::from(e[3]))
            .filter(|code| *code != 0 && *code != 32767)
    };
    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}
