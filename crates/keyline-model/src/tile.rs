//! Remote tile descriptors.

use serde::{Deserialize, Serialize};

/// Metadata for one swissALTI3D tile discovered through the tile index.
///
/// Serialises to the side-car `metadata.json` stored next to cached tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDescriptor {
    item_id: String,
    collection_id: String,
    asset_href: String,
    checksum: Option<String>,
    gsd: f64,
    epsg: u32,
    bbox: Option<[f64; 4]>,
    updated: Option<String>,
}

impl TileDescriptor {
    /// Create a descriptor with the required identity fields.
    ///
    /// Optional metadata defaults to: no checksum, 2 m GSD, EPSG:2056,
    /// no bbox, no timestamp.
    pub fn new(
        item_id: impl Into<String>,
        collection_id: impl Into<String>,
        asset_href: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            collection_id: collection_id.into(),
            asset_href: asset_href.into(),
            checksum: None,
            gsd: 2.0,
            epsg: 2056,
            bbox: None,
            updated: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_gsd(mut self, gsd: f64) -> Self {
        self.gsd = gsd;
        self
    }

    pub fn with_epsg(mut self, epsg: u32) -> Self {
        self.epsg = epsg;
        self
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_updated(mut self, updated: impl Into<String>) -> Self {
        self.updated = Some(updated.into());
        self
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Download URL of the GeoTIFF asset.
    pub fn asset_href(&self) -> &str {
        &self.asset_href
    }

    /// Integrity checksum as published by the index (plain hex or multihash).
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn gsd(&self) -> f64 {
        self.gsd
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn bbox(&self) -> Option<[f64; 4]> {
        self.bbox
    }

    pub fn updated(&self) -> Option<&str> {
        self.updated.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tile = TileDescriptor::new("t1", "c1", "https://example.com/t1.tif");
        assert_eq!(tile.checksum(), None);
        assert_eq!(tile.gsd(), 2.0);
        assert_eq!(tile.epsg(), 2056);
    }

    #[test]
    fn test_serialized_keys() {
        let tile = TileDescriptor::new("t1", "c1", "https://example.com/t1.tif")
            .with_checksum("1220abcd")
            .with_bbox([7.0, 46.0, 7.1, 46.1]);
        let value = serde_json::to_value(&tile).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["asset_href", "bbox", "checksum", "collection_id", "epsg", "gsd", "item_id", "updated"]
        );
        assert_eq!(value["updated"], serde_json::Value::Null);
    }
}
