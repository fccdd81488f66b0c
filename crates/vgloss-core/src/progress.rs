/// Trait for reporting reconciliation progress.
///
/// The CLI implements it with indicatif bars; library callers use
/// [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_walk_start(&self) {}
    fn on_walk_progress(&self, _paths_seen: usize, _current_path: &str) {}
    fn on_walk_complete(&self, _paths_seen: usize, _changed: usize, _duration_secs: f64) {}
    fn on_apply_start(&self) {}
    fn on_apply_complete(&self, _rows: usize, _duration_secs: f64) {}
    fn on_metadata_start(&self, _total: usize) {}
    fn on_metadata_progress(&self, _scanned: usize, _total: usize) {}
    fn on_metadata_complete(&self, _scanned: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
