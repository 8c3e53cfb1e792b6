//! # keyline-cache
//!
//! Local, content-addressed storage for swissALTI3D tiles and derived outputs.
//!
//! ## Overview
//!
//! - [`TileCache`]: maps tile descriptors to stable paths under
//!   `<root>/raw/`, downloads missing tiles through a [`Transport`], verifies
//!   checksums and promotes verified files atomically
//! - [`TileCache::derived_directory`]: the deterministic output directory for
//!   an (AOI, parameters) pair
//! - [`DerivedLock`]: advisory lock so only one run writes a given output
//!   directory at a time
//! - [`CacheConfig`]: cache root and download timeout, optionally from the
//!   environment
//!
//! ## Example
//!
//! ```no_run
//! use keyline_cache::{CacheConfig, HttpTransport, TileCache};
//! use keyline_model::TileDescriptor;
//!
//! let config = CacheConfig::from_env();
//! let transport = HttpTransport::new(config.download_timeout)?;
//! let cache = TileCache::new(config, Box::new(transport));
//!
//! let tile = TileDescriptor::new(
//!     "swissalti3d_2019_2600-1200",
//!     "ch.swisstopo.swissalti3d",
//!     "https://data.geo.admin.ch/ch.swisstopo.swissalti3d/swissalti3d_2019_2600-1200/swissalti3d_2019_2600-1200_2_2056_5728.tif",
//! );
//! let path = cache.fetch(&tile)?;
//! println!("cached at {}", path.display());
//! # Ok::<(), keyline_cache::CacheError>(())
//! ```

mod cache;
mod config;
mod error;
mod lock;
mod transport;

pub use cache::{verify_checksum, ChecksumOutcome, DownloadStats, TileCache, METADATA_FILE_NAME};
pub use config::{
    default_cache_root, parse_download_timeout, CacheConfig, CACHE_DIR_ENV, DEFAULT_DOWNLOAD_TIMEOUT,
    DOWNLOAD_TIMEOUT_ENV,
};
pub use error::CacheError;
pub use lock::{DerivedLock, LOCK_FILE_NAME};
pub use transport::{HttpTransport, Transport};

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
