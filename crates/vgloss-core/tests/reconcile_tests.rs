use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tempfile::tempdir;
use vgloss_core::config::load_configuration;
use vgloss_core::metadata::{HeaderProbe, MetadataDocument, MetadataExtractor, MetadataValue};
use vgloss_core::storage::Database;
use vgloss_core::{
    AppConfig, ContentRecord, Error, Fingerprint, PathRecord, ProgressReporter, ReconcileEngine,
    ScanVersion, SilentReporter, SCAN_VERSION,
};

/// Minimal baseline JPEG: SOI, APP0, SOF0, EOI.
fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\0");
    data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x03, 0x01, 0x11, 0x00, 0x02, 0x11, 0x00, 0x03, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// Layout:
///   root/
///     a.jpg   (black square)
///     b.jpg   (byte-identical copy of a.jpg)
///     c.txt   (text)
fn create_basic_gallery(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("a.jpg"), jpeg(100, 100)).unwrap();
    fs::copy(root.join("a.jpg"), root.join("b.jpg")).unwrap();
    fs::write(root.join("c.txt"), "not an image\n").unwrap();
}

fn engine(root: &Path) -> ReconcileEngine {
    ReconcileEngine::new(AppConfig::for_root(root))
}

fn open_index(root: &Path) -> Database {
    Database::open(AppConfig::for_root(root).database_path()).unwrap()
}

fn content_of(db: &Database, path: &str) -> ContentRecord {
    let record = db.get_path(path).unwrap().expect("path record");
    db.get_content(&record.content_ref).unwrap().expect("content record")
}

fn snapshot(db: &Database) -> (Vec<ContentRecord>, Vec<PathRecord>) {
    (db.list_contents().unwrap(), db.paths_under_folder("").unwrap())
}

fn paths_of(records: Vec<PathRecord>) -> Vec<String> {
    records.into_iter().map(|p| p.path).collect()
}

fn orphan_count(db: &Database) -> i64 {
    db.connection()
        .query_row(
            "SELECT COUNT(*) FROM content_record \
             WHERE fingerprint NOT IN (SELECT content_ref FROM path_record)",
            [],
            |row| row.get(0),
        )
        .unwrap()
}

fn set_mtime(path: &Path, mtime: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

#[test]
fn test_fresh_gallery() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);

    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_created, 3);
    assert_eq!(report.contents_created, 2);
    assert_eq!(report.contents_scanned, 2);
    assert_eq!(report.scan_failures, 0);

    let db = open_index(&root);
    assert_eq!(db.count_contents().unwrap(), 2);
    assert_eq!(db.count_paths().unwrap(), 3);

    let a = db.get_path("a.jpg").unwrap().unwrap();
    let b = db.get_path("b.jpg").unwrap().unwrap();
    assert_eq!(a.content_ref, b.content_ref);

    let text = content_of(&db, "c.txt");
    assert_eq!(text.mime_type.as_deref(), Some("text/plain"));
    assert!(text.metadata.is_empty());
    assert!(!text.is_image());
    assert_eq!(text.scan_version, Some(SCAN_VERSION));

    let image = content_of(&db, "a.jpg");
    assert_eq!(image.mime_type.as_deref(), Some("image/jpeg"));
    assert!(image.is_image());
    assert_eq!(image.display_name.as_deref(), Some("a.jpg"));
    assert_eq!(image.metadata["BitsPerSample"], MetadataValue::Integer(8));
    assert_eq!(image.metadata["ColorComponents"], MetadataValue::Integer(3));
    assert_eq!(image.scan_version, Some(SCAN_VERSION));
    assert!(image.timestamp.is_some());
    assert_eq!(image.thumbnail_version, None);
}

#[test]
fn test_data_dir_is_not_indexed() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    let data = AppConfig::for_root(&root).data_path();
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("stray.jpg"), jpeg(1, 1)).unwrap();

    engine(&root).reconcile(&SilentReporter).unwrap();

    let db = open_index(&root);
    assert_eq!(
        paths_of(db.paths_under_folder("").unwrap()),
        vec!["a.jpg", "b.jpg", "c.txt"]
    );
}

#[test]
fn test_second_pass_is_idempotent() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    fs::create_dir_all(root.join("dir1/dir2")).unwrap();
    fs::write(root.join("dir1/dir2/d.txt"), "deep").unwrap();

    engine(&root).reconcile(&SilentReporter).unwrap();
    let before = snapshot(&open_index(&root));

    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.mutations(), 0, "second pass mutated: {report:?}");
    assert_eq!(report.paths_unchanged, 4);
    assert_eq!(snapshot(&open_index(&root)), before);
}

#[test]
fn test_deleting_one_copy_keeps_shared_content() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    engine(&root).reconcile(&SilentReporter).unwrap();
    let shared = content_of(&open_index(&root), "a.jpg");

    fs::remove_file(root.join("b.jpg")).unwrap();
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_deleted, 1);
    assert_eq!(report.contents_purged, 0);

    let db = open_index(&root);
    assert!(db.get_path("b.jpg").unwrap().is_none());
    assert_eq!(db.get_content(&shared.fingerprint).unwrap(), Some(shared));
}

#[test]
fn test_deleting_every_copy_purges_content() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    engine(&root).reconcile(&SilentReporter).unwrap();
    let shared = content_of(&open_index(&root), "a.jpg").fingerprint;

    fs::remove_file(root.join("a.jpg")).unwrap();
    fs::remove_file(root.join("b.jpg")).unwrap();
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_deleted, 2);
    assert_eq!(report.contents_purged, 1);

    let db = open_index(&root);
    assert!(db.get_content(&shared).unwrap().is_none());
    assert_eq!(db.count_contents().unwrap(), 1);
    assert_eq!(content_of(&db, "c.txt").mime_type.as_deref(), Some("text/plain"));
    assert_eq!(orphan_count(&db), 0);
}

#[test]
fn test_rename_preserves_content() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.jpg"), jpeg(64, 32)).unwrap();
    fs::write(root.join("c.txt"), "text").unwrap();
    engine(&root).reconcile(&SilentReporter).unwrap();
    let before = content_of(&open_index(&root), "a.jpg");

    fs::create_dir_all(root.join("dir1")).unwrap();
    fs::rename(root.join("a.jpg"), root.join("dir1/a.jpg")).unwrap();
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_created, 1);
    assert_eq!(report.paths_deleted, 1);
    assert_eq!(report.contents_created, 0);
    assert_eq!(report.contents_purged, 0);
    assert_eq!(report.contents_scanned, 0);

    let db = open_index(&root);
    assert!(db.get_path("a.jpg").unwrap().is_none());
    let moved = db.get_path("dir1/a.jpg").unwrap().unwrap();
    assert_eq!(moved.folder, "dir1");
    assert_eq!(moved.filename, "a.jpg");
    assert_eq!(content_of(&db, "dir1/a.jpg"), before);
    let referencing: Vec<String> = db
        .paths_for_content(&before.fingerprint)
        .unwrap()
        .into_iter()
        .map(|p| p.path)
        .collect();
    assert_eq!(referencing, vec!["dir1/a.jpg"]);
}

#[test]
fn test_identical_bytes_share_one_content() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    for dir in ["", "x", "x/y", "z"] {
        fs::create_dir_all(root.join(dir)).unwrap();
        fs::write(root.join(dir).join("copy.bin"), vec![0xAAu8; 4096]).unwrap();
        fs::write(root.join(dir).join("other.bin"), dir.as_bytes()).unwrap();
    }

    engine(&root).reconcile(&SilentReporter).unwrap();

    let db = open_index(&root);
    let expected = Fingerprint::from_hex(blake3::hash(&[0xAAu8; 4096]).to_hex().to_string());
    let copies = db.paths_for_content(&expected).unwrap();
    assert_eq!(copies.len(), 4);
    assert!(copies.iter().all(|p| p.filename == "copy.bin"));
    // 1 shared + 4 distinct "other.bin" contents
    assert_eq!(db.count_contents().unwrap(), 5);
    assert_eq!(orphan_count(&db), 0);
}

#[test]
fn test_same_mtime_rewrite_is_not_detected() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    fs::create_dir_all(&root).unwrap();
    let file = root.join("note.txt");
    let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fs::write(&file, "first version").unwrap();
    set_mtime(&file, t0);

    engine(&root).reconcile(&SilentReporter).unwrap();
    let original = open_index(&root).get_path("note.txt").unwrap().unwrap();

    // Out-of-band rewrite that preserves the mtime: a known staleness window.
    fs::write(&file, "second version").unwrap();
    set_mtime(&file, t0);
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.mutations(), 0);
    assert_eq!(
        open_index(&root).get_path("note.txt").unwrap().unwrap(),
        original
    );

    // Once the mtime advances the new bytes are picked up.
    set_mtime(&file, t0 + Duration::from_secs(1));
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_updated, 1);
    assert_eq!(report.contents_created, 1);
    assert_eq!(report.contents_purged, 1);
    let db = open_index(&root);
    let updated = db.get_path("note.txt").unwrap().unwrap();
    assert_ne!(updated.content_ref, original.content_ref);
    assert_eq!(updated.mod_time_ns, original.mod_time_ns + 1_000_000_000);
    assert!(db.get_content(&original.content_ref).unwrap().is_none());
    assert_eq!(orphan_count(&db), 0);
}

#[test]
fn test_update_to_existing_content_reuses_it() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    set_mtime(&root.join("c.txt"), t0);
    engine(&root).reconcile(&SilentReporter).unwrap();
    let image = content_of(&open_index(&root), "a.jpg");

    // c.txt becomes another copy of the image.
    fs::copy(root.join("a.jpg"), root.join("c.txt")).unwrap();
    set_mtime(&root.join("c.txt"), t0 + Duration::from_secs(10));
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.paths_updated, 1);
    assert_eq!(report.contents_created, 0);
    assert_eq!(report.contents_purged, 1);

    let db = open_index(&root);
    assert_eq!(db.count_contents().unwrap(), 1);
    assert_eq!(content_of(&db, "c.txt"), image);
}

/// Wraps the header probe and counts invocations.
struct CountingExtractor(Arc<AtomicUsize>);

impl MetadataExtractor for CountingExtractor {
    fn extract(&self, path: &Path, mime_type: &str) -> Result<MetadataDocument, Error> {
        self.0.fetch_add(1, Ordering::SeqCst);
        HeaderProbe.extract(path, mime_type)
    }
}

#[test]
fn test_version_bump_rescans_everything() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    fs::create_dir_all(&root).unwrap();
    for i in 1..=4u16 {
        fs::write(root.join(format!("img{i}.jpg")), jpeg(i, i)).unwrap();
    }

    let v = ScanVersion(7);
    let calls = Arc::new(AtomicUsize::new(0));
    let report = engine(&root)
        .with_scan_version(v)
        .with_extractor(Box::new(CountingExtractor(calls.clone())))
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.contents_scanned, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Same version, nothing to do.
    let report = engine(&root)
        .with_scan_version(v)
        .with_extractor(Box::new(CountingExtractor(calls.clone())))
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.mutations(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Bumped version, no filesystem change.
    let report = engine(&root)
        .with_scan_version(v.next())
        .with_extractor(Box::new(CountingExtractor(calls.clone())))
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.contents_scanned, 4);
    assert_eq!(report.paths_created + report.paths_updated + report.paths_deleted, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 8);

    let db = open_index(&root);
    assert!(db
        .list_contents()
        .unwrap()
        .iter()
        .all(|c| c.scan_version == Some(v.next())));
}

#[test]
fn test_newer_stored_version_is_rescanned() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    engine(&root)
        .with_scan_version(ScanVersion(9))
        .reconcile(&SilentReporter)
        .unwrap();

    let report = engine(&root)
        .with_scan_version(ScanVersion(3))
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.contents_scanned, 2);
    assert!(open_index(&root)
        .list_contents()
        .unwrap()
        .iter()
        .all(|c| c.scan_version == Some(ScanVersion(3))));
}

/// Fails for any file whose name starts with "bad".
struct PickyExtractor;

impl MetadataExtractor for PickyExtractor {
    fn extract(&self, path: &Path, mime_type: &str) -> Result<MetadataDocument, Error> {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.starts_with("bad") {
            return Err(Error::extraction(path, "refused"));
        }
        HeaderProbe.extract(path, mime_type)
    }
}

#[test]
fn test_failed_scan_stays_stale_without_blocking_others() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("good.jpg"), jpeg(10, 10)).unwrap();
    fs::write(root.join("bad.jpg"), jpeg(20, 20)).unwrap();
    fs::write(root.join("notes.txt"), "text").unwrap();

    let report = engine(&root)
        .with_extractor(Box::new(PickyExtractor))
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.paths_created, 3);
    assert_eq!(report.contents_scanned, 2);
    assert_eq!(report.scan_failures, 1);

    let db = open_index(&root);
    let bad = content_of(&db, "bad.jpg");
    assert_eq!(bad.scan_version, None);
    assert_eq!(bad.mime_type, None);
    assert!(bad.metadata.is_empty());
    assert_eq!(content_of(&db, "good.jpg").scan_version, Some(SCAN_VERSION));
    drop(db);

    // Retried on the next pass.
    let report = engine(&root).reconcile(&SilentReporter).unwrap();
    assert_eq!(report.contents_scanned, 1);
    assert_eq!(report.scan_failures, 0);
    let bad = content_of(&open_index(&root), "bad.jpg");
    assert_eq!(bad.scan_version, Some(SCAN_VERSION));
    assert_eq!(bad.metadata["ImageWidth"], MetadataValue::Integer(20));
}

/// Deletes a file the moment the walk reaches it.
struct DeleteOnSight(PathBuf, &'static str);

impl ProgressReporter for DeleteOnSight {
    fn on_walk_progress(&self, _paths_seen: usize, current_path: &str) {
        if current_path == self.1 {
            fs::remove_file(self.0.join(current_path)).unwrap();
        }
    }
}

#[test]
fn test_file_vanishing_mid_walk_is_treated_as_absent() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    fs::write(root.join("d.txt"), "soon gone").unwrap();

    // New file vanishes: never indexed.
    let report = engine(&root)
        .reconcile(&DeleteOnSight(root.clone(), "d.txt"))
        .unwrap();
    assert_eq!(report.paths_created, 3);
    assert!(open_index(&root).get_path("d.txt").unwrap().is_none());

    // Known file vanishes: its record is deleted.
    let report = engine(&root)
        .reconcile(&DeleteOnSight(root.clone(), "c.txt"))
        .unwrap();
    assert_eq!(report.paths_deleted, 1);
    assert_eq!(report.contents_purged, 1);
    let db = open_index(&root);
    assert!(db.get_path("c.txt").unwrap().is_none());
    assert_eq!(orphan_count(&db), 0);
}

/// Swaps a file for a directory of the same name once the walk has listed it.
#[cfg(target_os = "linux")]
struct SwapForDirectory(PathBuf, &'static str);

#[cfg(target_os = "linux")]
impl ProgressReporter for SwapForDirectory {
    fn on_walk_progress(&self, _paths_seen: usize, current_path: &str) {
        if current_path == self.1 {
            let path = self.0.join(current_path);
            fs::remove_file(&path).unwrap();
            fs::create_dir(&path).unwrap();
        }
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_io_failure_aborts_pass_without_partial_commit() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    engine(&root).reconcile(&SilentReporter).unwrap();
    let before = snapshot(&open_index(&root));

    fs::write(root.join("a_new.txt"), "would be created").unwrap();
    fs::write(root.join("z_trouble.txt"), "turns into a directory").unwrap();
    fs::remove_file(root.join("b.jpg")).unwrap();

    let err = engine(&root)
        .reconcile(&SwapForDirectory(root.clone(), "z_trouble.txt"))
        .unwrap_err();
    assert!(!err.is_vanished(), "unexpected error: {err}");
    assert_eq!(snapshot(&open_index(&root)), before);
}

#[test]
fn test_concurrent_pass_is_rejected() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);
    engine(&root).reconcile(&SilentReporter).unwrap();

    let holder = open_index(&root);
    let pass = holder.begin_pass().unwrap();

    let mut config = AppConfig::for_root(&root);
    config.busy_timeout_ms = 0;
    let err = ReconcileEngine::new(config.clone())
        .reconcile(&SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)), "unexpected error: {err}");

    drop(pass);
    ReconcileEngine::new(config).reconcile(&SilentReporter).unwrap();
}

#[test]
fn test_missing_root_fails() {
    let tmp = tempdir().unwrap();
    let err = engine(&tmp.path().join("nope"))
        .reconcile(&SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::RootNotFound { .. }), "unexpected error: {err}");
    assert!(!err.is_vanished());
}

#[test]
fn test_oversized_busy_timeout_is_accepted() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);

    let mut config = AppConfig::for_root(&root);
    config.busy_timeout_ms = 3_000_000_000;
    let report = ReconcileEngine::new(config)
        .reconcile(&SilentReporter)
        .unwrap();
    assert_eq!(report.paths_created, 3);
}

#[test]
fn test_gallery_config_cannot_expose_data_dir() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    fs::create_dir_all(root.join(".vgloss")).unwrap();
    fs::write(root.join(".vgloss/config.toml"), "data_dir = \"meta\"\n").unwrap();
    fs::write(root.join("a.txt"), "text").unwrap();

    let config = load_configuration(Some(&root)).unwrap();
    assert_eq!(config.data_path(), root.join(".vgloss"));
    ReconcileEngine::new(config)
        .reconcile(&SilentReporter)
        .unwrap();

    let db = open_index(&root);
    assert_eq!(paths_of(db.paths_under_folder("").unwrap()), vec!["a.txt"]);
    assert!(!root.join("meta").exists());
}

#[test]
fn test_free_function_entry_point() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("gallery");
    create_basic_gallery(&root);

    let report = vgloss_core::reconcile(&root).unwrap();
    assert_eq!(report.paths_created, 3);
    assert!(AppConfig::for_root(&root).database_path().is_file());
    assert_eq!(vgloss_core::reconcile(&root).unwrap().mutations(), 0);
}

#[test]
fn test_ensure_initialized() {
    let tmp = tempdir().unwrap();
    let config = AppConfig::for_root(tmp.path());
    assert!(matches!(
        vgloss_core::engine::ensure_initialized(&config),
        Err(Error::NotInitialized { .. })
    ));
    vgloss_core::engine::init_gallery(&config).unwrap();
    vgloss_core::engine::ensure_initialized(&config).unwrap();
}
