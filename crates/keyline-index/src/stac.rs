//! STAC API client for the swisstopo data catalogue.
//!
//! Source: https://data.geo.admin.ch/api/stac/v0.9
//!
//! Only the subset of STAC needed for tile discovery is modelled: item
//! search by collection and bbox, `rel="next"` pagination, and the asset
//! fields swisstopo publishes (`gsd`/`eo:gsd`, `file:checksum`, `proj:epsg`).

use crate::{IndexError, Result, TileIndex};
use keyline_model::{BoundingBox, CoordinateSystem, Resolution, TileDescriptor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Swiss federal STAC API endpoint.
pub const STAC_API_URL: &str = "https://data.geo.admin.ch/api/stac/v0.9";

/// swissALTI3D collection id.
pub const SWISSALTI3D_COLLECTION: &str = "ch.swisstopo.swissalti3d";

/// Environment variable overriding the STAC endpoint.
pub const STAC_URL_ENV: &str = "KEYLINE_STAC_URL";

/// Items requested per page.
pub const PAGE_LIMIT: usize = 100;

/// Upper bound on followed `next` links.
pub const MAX_PAGES: usize = 1000;

/// Default EPSG code when neither item nor asset declares one.
const DEFAULT_EPSG: u32 = 2056;

/// One page of a STAC item search.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl ItemCollection {
    /// The `rel="next"` link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// Hypermedia link.
#[derive(Debug, Clone, Deserialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// A STAC item. Assets are kept in key order so selection is deterministic.
#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

/// A STAC asset with its extension fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StacAsset {
    fn is_geotiff(&self, key: &str) -> bool {
        let media = self.media_type.as_deref().unwrap_or_default().to_ascii_lowercase();
        media.contains("tiff") || key.ends_with(".tif")
    }

    fn gsd(&self) -> Option<f64> {
        ["gsd", "eo:gsd"]
            .iter()
            .find_map(|k| self.extra.get(*k).and_then(Value::as_f64))
    }
}

fn epsg_of(fields: &Map<String, Value>) -> Option<u32> {
    fields
        .get("proj:epsg")
        .and_then(Value::as_u64)
        .and_then(|code| u32::try_from(code).ok())
}

/// Turn an item into a descriptor for the first GeoTIFF asset at `target_gsd`.
///
/// Assets that declare no GSD are accepted. Returns `None` when no asset
/// qualifies.
pub fn parse_item(item: &StacItem, target_gsd: f64, default_collection: &str) -> Option<TileDescriptor> {
    let (_, asset) = item.assets.iter().find(|(key, asset)| {
        asset.is_geotiff(key) && asset.gsd().map_or(true, |gsd| gsd == target_gsd)
    })?;

    let collection = item.collection.as_deref().unwrap_or(default_collection);
    let epsg = epsg_of(&item.properties)
        .or_else(|| epsg_of(&asset.extra))
        .unwrap_or(DEFAULT_EPSG);

    let mut tile = TileDescriptor::new(item.id.clone(), collection, asset.href.clone())
        .with_gsd(target_gsd)
        .with_epsg(epsg);

    if let Some(checksum) = asset.extra.get("file:checksum").and_then(Value::as_str) {
        tile = tile.with_checksum(checksum);
    }
    if let Some(bbox) = item.bbox.as_deref().and_then(planar_bbox) {
        tile = tile.with_bbox(bbox);
    }
    let updated = ["updated", "datetime"]
        .iter()
        .find_map(|k| item.properties.get(*k).and_then(Value::as_str));
    if let Some(updated) = updated {
        tile = tile.with_updated(updated);
    }
    Some(tile)
}

/// 2D extent of a 4- or 6-element STAC bbox.
fn planar_bbox(bbox: &[f64]) -> Option<[f64; 4]> {
    match *bbox {
        [xmin, ymin, xmax, ymax] => Some([xmin, ymin, xmax, ymax]),
        [xmin, ymin, _, xmax, ymax, _] => Some([xmin, ymin, xmax, ymax]),
        _ => None,
    }
}

/// Request for one page of results.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PageRequest {
    Get(String),
    Post { url: String, body: Value },
}

impl PageRequest {
    fn url(&self) -> &str {
        match self {
            PageRequest::Get(url) | PageRequest::Post { url, .. } => url,
        }
    }

    fn from_link(link: &StacLink) -> Self {
        match (link.method.as_deref(), &link.body) {
            (Some(m), Some(body)) if m.eq_ignore_ascii_case("POST") => PageRequest::Post {
                url: link.href.clone(),
                body: body.clone(),
            },
            _ => PageRequest::Get(link.href.clone()),
        }
    }
}

/// Walk `next` links from `first`, collecting descriptors in page order.
pub(crate) fn collect_pages<F>(
    first: PageRequest,
    target_gsd: f64,
    collection: &str,
    mut fetch: F,
) -> Result<Vec<TileDescriptor>>
where
    F: FnMut(&PageRequest) -> Result<ItemCollection>,
{
    let mut tiles = Vec::new();
    let mut seen = HashSet::new();
    let mut request = Some(first);
    let mut pages = 0;

    while let Some(current) = request.take() {
        if !seen.insert(format!("{current:?}")) {
            debug!(url = current.url(), "Pagination revisited a page, stopping");
            break;
        }
        pages += 1;
        if pages > MAX_PAGES {
            return Err(IndexError::TooManyPages(MAX_PAGES));
        }

        let page = fetch(&current)?;
        debug!(url = current.url(), items = page.features.len(), "Fetched STAC page");
        tiles.extend(
            page.features
                .iter()
                .filter_map(|item| parse_item(item, target_gsd, collection)),
        );
        request = page.next_link().map(PageRequest::from_link);
    }

    Ok(tiles)
}

/// Blocking STAC API client.
#[derive(Debug, Clone)]
pub struct StacClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl StacClient {
    /// Client for `base_url` whose requests time out after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keyline-planner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexError::Transport {
                url: base_url.clone(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { base_url, client })
    }

    /// Endpoint from `KEYLINE_STAC_URL`, falling back to [`STAC_API_URL`].
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let url = std::env::var(STAC_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| STAC_API_URL.to_string());
        Self::new(url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the first search page.
    pub fn search_url(&self, collection: &str, bbox: &BoundingBox) -> String {
        let [xmin, ymin, xmax, ymax] = bbox.as_array();
        format!(
            "{}/search?collections={collection}&bbox={xmin},{ymin},{xmax},{ymax}&limit={PAGE_LIMIT}",
            self.base_url
        )
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<ItemCollection> {
        let url = request.url();
        let transport_err = |e: reqwest::Error| IndexError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = match request {
            PageRequest::Get(url) => self.client.get(url).send(),
            PageRequest::Post { url, body } => self.client.post(url).json(body).send(),
        }
        .map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(IndexError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let text = response.text().map_err(transport_err)?;
        serde_json::from_str(&text).map_err(|e| IndexError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl TileIndex for StacClient {
    fn coordinate_system(&self) -> CoordinateSystem {
        CoordinateSystem::Wgs84
    }

    fn search(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        resolution: Resolution,
    ) -> Result<Vec<TileDescriptor>> {
        let target_gsd = resolution.gsd();
        info!(
            collection,
            bbox = ?bbox.as_array(),
            gsd = target_gsd,
            "Discovering tiles"
        );

        let first = PageRequest::Get(self.search_url(collection, bbox));
        let tiles = collect_pages(first, target_gsd, collection, |req| self.fetch_page(req))?;

        info!(count = tiles.len(), "Discovered tiles for AOI");
        Ok(tiles)
    }
}
