//! Content-addressed tile cache.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!     raw/<collection_id>/<item_id>/<filename>     # downloaded asset
//!     raw/<collection_id>/<item_id>/metadata.json  # descriptor side-car
//!     derived/<aoi_key>/<params_key>/              # per-run outputs
//! ```
//!
//! ## Thread Safety
//!
//! `TileCache` is `Sync`:
//! - Different tiles can be downloaded in parallel
//! - Threads requesting a tile that is already being downloaded wait for that
//!   download instead of starting a second one
//! - Cached tiles are served immediately without blocking
//!
//! Bytes only ever reach their final path through an atomic rename of a
//! fully written, verified temporary file in the same directory.

use crate::{CacheConfig, CacheError, Result, Transport};
use keyline_geometry::params_fingerprint;
use keyline_model::{ProcessingParameters, TileDescriptor};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Streaming buffer size for downloads.
const CHUNK_SIZE: usize = 8192;

/// Side-car file written next to every cached tile.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Multihash prefix for SHA-256 (`0x12` = sha2-256, `0x20` = 32 bytes).
const MULTIHASH_SHA256_PREFIX: &str = "1220";

/// Result of comparing an advertised checksum against the computed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    /// Checksum understood and matching.
    Verified,
    /// Checksum encoding not recognised; the download is accepted as is.
    Unverifiable,
}

/// Compare an advertised checksum with the SHA-256 hex digest of the bytes.
///
/// Accepted forms are a bare hex digest and a `1220`-prefixed multihash.
/// Both fail with [`CacheError::Integrity`] on mismatch. Anything else is
/// logged and reported as [`ChecksumOutcome::Unverifiable`].
pub fn verify_checksum(item_id: &str, expected: &str, actual_sha256: &str) -> Result<ChecksumOutcome> {
    let expected_lower = expected.trim().to_ascii_lowercase();
    let actual = actual_sha256.to_ascii_lowercase();

    if expected_lower == actual {
        return Ok(ChecksumOutcome::Verified);
    }

    let mismatch = |expected_hex: &str| CacheError::Integrity {
        item_id: item_id.to_string(),
        expected: expected_hex.to_string(),
        actual: actual.clone(),
    };

    if let Some(expected_hex) = expected_lower.strip_prefix(MULTIHASH_SHA256_PREFIX) {
        if expected_hex == actual {
            return Ok(ChecksumOutcome::Verified);
        }
        return Err(mismatch(expected_hex));
    }

    if expected_lower.len() == actual.len() && expected_lower.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(mismatch(&expected_lower));
    }

    let shown: String = expected.chars().take(20).collect();
    warn!(
        item_id,
        expected = %shown,
        "Cannot verify checksum format, skipping verification"
    );
    Ok(ChecksumOutcome::Unverifiable)
}

/// Download statistics for a cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of tiles downloaded this session.
    pub tiles_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Local cache of raw tiles plus the derived-output address space.
pub struct TileCache {
    config: CacheConfig,
    transport: Box<dyn Transport>,
    /// Final paths of downloads currently in flight.
    in_flight: Mutex<HashSet<PathBuf>>,
    download_complete: Condvar,
    tiles_downloaded: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("root", &self.config.root)
            .field("download_timeout", &self.config.download_timeout)
            .finish()
    }
}

impl TileCache {
    /// Create a cache over `config.root`, downloading through `transport`.
    ///
    /// Directories are created lazily on first write.
    pub fn new(config: CacheConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            in_flight: Mutex::new(HashSet::new()),
            download_complete: Condvar::new(),
            tiles_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Directory holding raw tiles.
    pub fn raw_dir(&self) -> PathBuf {
        self.config.root.join("raw")
    }

    /// Directory holding derived output bundles.
    pub fn derived_root(&self) -> PathBuf {
        self.config.root.join("derived")
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            tiles_downloaded: self.tiles_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// Reset download statistics.
    pub fn reset_download_stats(&self) {
        self.tiles_downloaded.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
    }

    /// Where `tile` lives on disk.
    ///
    /// Depends only on collection id, item id and the asset filename, so
    /// metadata changes never move a tile.
    pub fn locate(&self, tile: &TileDescriptor) -> Result<PathBuf> {
        let filename = asset_filename(tile.asset_href())?;
        Ok(self
            .raw_dir()
            .join(safe_segment(tile.collection_id(), "collection id")?)
            .join(safe_segment(tile.item_id(), "item id")?)
            .join(filename))
    }

    /// Whether `tile` is already present in the cache.
    pub fn has(&self, tile: &TileDescriptor) -> Result<bool> {
        Ok(self.locate(tile)?.is_file())
    }

    /// Return the cached path for `tile`, downloading it first if needed.
    pub fn fetch(&self, tile: &TileDescriptor) -> Result<PathBuf> {
        let dest = self.locate(tile)?;

        // Fast path: no locking needed for an existence check
        if dest.is_file() {
            debug!(item_id = tile.item_id(), path = %dest.display(), "Cache hit");
            return Ok(dest);
        }

        // Wait if another thread is already downloading this tile. A waiter
        // that finds no file afterwards downloads it itself.
        loop {
            let mut tracker = self.tracker()?;
            if tracker.contains(&dest) {
                let _guard = self
                    .download_complete
                    .wait(tracker)
                    .map_err(|_| CacheError::TrackerPoisoned)?;
                continue;
            }
            if dest.is_file() {
                return Ok(dest);
            }
            tracker.insert(dest.clone());
            break;
        }

        let result = self.download(tile, &dest);

        self.tracker()?.remove(&dest);
        self.download_complete.notify_all();

        result
    }

    /// Fetch every tile in order; the first failure aborts the batch.
    pub fn fetch_all(&self, tiles: &[TileDescriptor]) -> Result<Vec<PathBuf>> {
        tiles.iter().map(|tile| self.fetch(tile)).collect()
    }

    /// `<root>/derived/<aoi_key>/<params_key>`, created if absent.
    pub fn derived_directory(&self, aoi_key: &str, params: &ProcessingParameters) -> Result<PathBuf> {
        let dir = self
            .derived_root()
            .join(safe_segment(aoi_key, "AOI key")?)
            .join(params_fingerprint(params));
        fs::create_dir_all(&dir).map_err(|e| CacheError::storage(&dir, e))?;
        Ok(dir)
    }

    fn tracker(&self) -> Result<MutexGuard<'_, HashSet<PathBuf>>> {
        self.in_flight.lock().map_err(|_| CacheError::TrackerPoisoned)
    }

    /// Stream `tile` into a temp file, verify it, then rename into place.
    ///
    /// The side-car is written before the tile is promoted, so a cached tile
    /// always has its metadata next to it.
    fn download(&self, tile: &TileDescriptor, dest: &Path) -> Result<PathBuf> {
        let dir = dest
            .parent()
            .ok_or_else(|| CacheError::InvalidDescriptor(format!("no parent for {}", dest.display())))?;
        fs::create_dir_all(dir).map_err(|e| CacheError::storage(dir, e))?;

        info!(item_id = tile.item_id(), dest = %dest.display(), "Downloading tile");

        // Dropping the temp file on any early return removes it.
        let mut tmp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| CacheError::storage(dir, e))?;

        let url = tile.asset_href();
        let mut body = self.transport.open(url)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK_SIZE];
        let mut total: u64 = 0;
        loop {
            let n = body.read(&mut buf).map_err(|e| CacheError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            tmp.write_all(&buf[..n])
                .map_err(|e| CacheError::storage(tmp.path(), e))?;
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::storage(tmp.path(), e))?;

        let digest = hex::encode(hasher.finalize());
        if let Some(expected) = tile.checksum() {
            verify_checksum(tile.item_id(), expected, &digest)?;
        }

        write_metadata(tile, dir)?;
        tmp.persist(dest).map_err(|e| CacheError::storage(dest, e.error))?;

        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(total, Ordering::Relaxed);

        info!(
            item_id = tile.item_id(),
            size_mb = total as f64 / 1_048_576.0,
            "Cached tile"
        );
        Ok(dest.to_path_buf())
    }
}

/// Write the descriptor side-car as pretty JSON with sorted keys, through a
/// temp file renamed into place.
fn write_metadata(tile: &TileDescriptor, dir: &Path) -> Result<()> {
    let path = dir.join(METADATA_FILE_NAME);
    let value = serde_json::to_value(tile)
        .map_err(|e| CacheError::InvalidDescriptor(format!("cannot serialise descriptor: {e}")))?;
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| CacheError::InvalidDescriptor(format!("cannot serialise descriptor: {e}")))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".metadata-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CacheError::storage(dir, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| CacheError::storage(tmp.path(), e))?;
    tmp.persist(&path).map_err(|e| CacheError::storage(&path, e.error))?;
    Ok(())
}

/// Last path segment of the asset URL, ignoring query and fragment.
fn asset_filename(href: &str) -> Result<String> {
    let url = reqwest::Url::parse(href)
        .map_err(|e| CacheError::InvalidDescriptor(format!("invalid asset URL {href:?}: {e}")))?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    safe_segment(name, "asset filename").map(str::to_string)
}

/// Reject values that would escape or collapse a path level.
fn safe_segment<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains('\0');
    if bad {
        return Err(CacheError::InvalidDescriptor(format!("unsafe {what}: {value:?}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    /// Serves fixed bodies and counts requests.
    struct FakeTransport {
        bodies: HashMap<String, Vec<u8>>,
        requests: Arc<AtomicUsize>,
    }

    impl FakeTransport {
        fn new(bodies: &[(&str, &[u8])]) -> (Self, Arc<AtomicUsize>) {
            let requests = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                bodies: bodies.iter().map(|(u, b)| (u.to_string(), b.to_vec())).collect(),
                requests: Arc::clone(&requests),
            };
            (transport, requests)
        }
    }

    impl Transport for FakeTransport {
        fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            match self.bodies.get(url) {
                Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
                None => Err(CacheError::Transport {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                }),
            }
        }
    }

    const URL_A: &str = "https://data.example/swissalti3d/a/tile_a.tif?sig=1";
    const URL_B: &str = "https://data.example/swissalti3d/b/tile_b.tif";

    fn sha(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn cache(root: &Path, bodies: &[(&str, &[u8])]) -> (TileCache, Arc<AtomicUsize>) {
        let (transport, requests) = FakeTransport::new(bodies);
        (TileCache::new(CacheConfig::new(root), Box::new(transport)), requests)
    }

    fn tile_a() -> TileDescriptor {
        TileDescriptor::new("item-a", "ch.swisstopo.swissalti3d", URL_A)
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_locate_layout() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[]);
        let path = cache.locate(&tile_a()).unwrap();
        assert_eq!(
            path,
            root.path()
                .join("raw/ch.swisstopo.swissalti3d/item-a/tile_a.tif")
        );
    }

    #[test]
    fn test_locate_ignores_other_metadata() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[]);
        let other = tile_a().with_checksum("abc").with_gsd(0.5).with_updated("2024-01-01");
        assert_eq!(cache.locate(&tile_a()).unwrap(), cache.locate(&other).unwrap());
    }

    #[test]
    fn test_locate_rejects_unsafe_ids() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[]);
        for tile in [
            TileDescriptor::new("..", "coll", URL_A),
            TileDescriptor::new("a/b", "coll", URL_A),
            TileDescriptor::new("item", "", URL_A),
            TileDescriptor::new("item", "coll", "https://data.example/"),
            TileDescriptor::new("item", "coll", "not a url"),
        ] {
            let err = cache.locate(&tile).unwrap_err();
            assert!(matches!(err, CacheError::InvalidDescriptor(_)), "{tile:?}");
        }
    }

    #[test]
    fn test_fetch_downloads_once() {
        let root = tempfile::tempdir().unwrap();
        let body = b"tile-bytes".as_slice();
        let (cache, requests) = cache(root.path(), &[(URL_A, body)]);
        let tile = tile_a().with_checksum(sha(body));

        assert!(!cache.has(&tile).unwrap());
        let path = cache.fetch(&tile).unwrap();
        assert_eq!(fs::read(&path).unwrap(), body);
        assert!(cache.has(&tile).unwrap());

        let again = cache.fetch(&tile).unwrap();
        assert_eq!(again, path);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.download_stats(),
            DownloadStats {
                tiles_downloaded: 1,
                bytes_downloaded: body.len() as u64
            }
        );
    }

    #[test]
    fn test_metadata_sidecar() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"x")]);
        let path = cache.fetch(&tile_a()).unwrap();

        let text = fs::read_to_string(path.parent().unwrap().join(METADATA_FILE_NAME)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["item_id"], "item-a");
        assert_eq!(value["asset_href"], URL_A);
        assert!(value["checksum"].is_null());
        assert!(text.find("\"asset_href\"").unwrap() < text.find("\"updated\"").unwrap());
    }

    #[test]
    fn test_multihash_checksum_accepted() {
        let root = tempfile::tempdir().unwrap();
        let body = b"multihash".as_slice();
        let (cache, _) = cache(root.path(), &[(URL_A, body)]);
        let tile = tile_a().with_checksum(format!("1220{}", sha(body)));
        assert!(cache.fetch(&tile).is_ok());
    }

    #[test]
    fn test_checksum_mismatch_not_promoted() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"corrupted")]);
        let tile = tile_a().with_checksum(format!("1220{}", sha(b"original")));

        let err = cache.fetch(&tile).unwrap_err();
        assert!(matches!(err, CacheError::Integrity { .. }));
        assert_eq!(err.kind(), keyline_model::ErrorKind::Integrity);

        let dest = cache.locate(&tile).unwrap();
        assert!(!dest.exists());
        assert_eq!(leftover_temp_files(dest.parent().unwrap()), 0);
        assert_eq!(cache.download_stats().tiles_downloaded, 0);
    }

    #[test]
    fn test_plain_hex_mismatch_fails() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"corrupted")]);
        let tile = tile_a().with_checksum(sha(b"original"));
        assert!(matches!(cache.fetch(&tile), Err(CacheError::Integrity { .. })));
    }

    #[test]
    fn test_unknown_checksum_format_accepted() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"bytes")]);
        let tile = tile_a().with_checksum("md5:0123456789");
        assert!(cache.fetch(&tile).is_ok());
    }

    #[test]
    fn test_verify_checksum_outcomes() {
        let digest = sha(b"abc");
        assert_eq!(verify_checksum("t", &digest, &digest).unwrap(), ChecksumOutcome::Verified);
        assert_eq!(
            verify_checksum("t", &digest.to_uppercase(), &digest).unwrap(),
            ChecksumOutcome::Verified
        );
        assert_eq!(
            verify_checksum("t", &format!("1220{digest}"), &digest).unwrap(),
            ChecksumOutcome::Verified
        );
        assert_eq!(
            verify_checksum("t", "etag-12345", &digest).unwrap(),
            ChecksumOutcome::Unverifiable
        );
        assert!(verify_checksum("t", "1220deadbeef", &digest).is_err());
    }

    #[test]
    fn test_transport_failure_leaves_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[]);
        let err = cache.fetch(&tile_a()).unwrap_err();
        assert_eq!(err.kind(), keyline_model::ErrorKind::Transport);
        assert!(!cache.has(&tile_a()).unwrap());
    }

    #[test]
    fn test_fetch_all_preserves_order_and_aborts() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"a"), (URL_B, b"b")]);
        let tile_b = TileDescriptor::new("item-b", "coll", URL_B);
        let paths = cache.fetch_all(&[tile_b.clone(), tile_a()]).unwrap();
        assert!(paths[0].ends_with("item-b/tile_b.tif"));
        assert!(paths[1].ends_with("item-a/tile_a.tif"));

        let missing = TileDescriptor::new("item-c", "coll", "https://data.example/c.tif");
        let err = cache.fetch_all(&[tile_b, missing]).unwrap_err();
        assert!(matches!(err, CacheError::Transport { .. }));
    }

    #[test]
    fn test_concurrent_fetch_same_tile() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"shared")]);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.fetch(&tile_a()).unwrap())
            })
            .collect();
        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.download_stats().tiles_downloaded, 1);
        assert!(cache.tracker().unwrap().is_empty());
    }

    #[test]
    fn test_tracker_empty_after_each_fetch() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[(URL_A, b"a")]);

        cache.fetch(&tile_a()).unwrap();
        assert!(cache.tracker().unwrap().is_empty());

        let missing = TileDescriptor::new("item-c", "coll", "https://data.example/c.tif");
        assert!(cache.fetch(&missing).is_err());
        assert!(cache.tracker().unwrap().is_empty());
    }

    #[test]
    fn test_derived_directory() {
        let root = tempfile::tempdir().unwrap();
        let (cache, _) = cache(root.path(), &[]);
        let params = ProcessingParameters::default();
        let dir = cache.derived_directory("0123456789abcdef", &params).unwrap();
        assert!(dir.is_dir());
        assert_eq!(
            dir,
            root.path()
                .join("derived/0123456789abcdef")
                .join(params_fingerprint(&params))
        );
        assert_eq!(cache.derived_directory("0123456789abcdef", &params).unwrap(), dir);
    }
}
