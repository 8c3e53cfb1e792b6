//! Parsing of a recorded swisstopo STAC search page.

use keyline_index::{parse_item, ItemCollection, SWISSALTI3D_COLLECTION};

fn fixture() -> ItemCollection {
    let text = include_str!("fixtures/search_page.json");
    serde_json::from_str(text).unwrap()
}

#[test]
fn test_recorded_page_decodes() {
    let page = fixture();
    assert_eq!(page.features.len(), 1);
    let next = page.next_link().unwrap();
    assert!(next.href.contains("cursor="));
}

#[test]
fn test_recorded_item_standard_resolution() {
    let page = fixture();
    let tile = parse_item(&page.features[0], 2.0, SWISSALTI3D_COLLECTION).unwrap();
    assert_eq!(tile.item_id(), "swissalti3d_2019_2600-1199");
    assert_eq!(tile.collection_id(), SWISSALTI3D_COLLECTION);
    assert!(tile.asset_href().ends_with("_2_2056_5728.tif"));
    assert!(tile.checksum().unwrap().starts_with("1220"));
    assert_eq!(tile.updated(), Some("2021-02-10T17:07:46.651573Z"));
}

#[test]
fn test_recorded_item_high_resolution() {
    let page = fixture();
    let tile = parse_item(&page.features[0], 0.5, SWISSALTI3D_COLLECTION).unwrap();
    assert!(tile.asset_href().ends_with("_0.5_2056_5728.tif"));
    assert_eq!(tile.gsd(), 0.5);
}
