pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod metadata;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod storage;
pub mod version;

pub use config::AppConfig;
pub use engine::{ReconcileEngine, ReconcileReport};
pub use error::Error;
pub use hasher::Fingerprint;
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::models::{ContentRecord, PathRecord};
pub use storage::Database;
pub use version::{ScanVersion, SCAN_VERSION, THUMBNAIL_VERSION};

use std::path::Path;

/// Bring the index under `root` in line with the files on disk, using the
/// default configuration for that root.
pub fn reconcile(root: &Path) -> Result<ReconcileReport, Error> {
    ReconcileEngine::new(AppConfig::for_root(root)).reconcile(&SilentReporter)
}
