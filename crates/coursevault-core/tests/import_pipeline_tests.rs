use std::fs;
use std::path::Path;
use std::time::Duration;

use coursevault_core::hasher::{self, HashCache};
use coursevault_core::probe::MediaProbe;
use coursevault_core::scanner::CatalogScanner;
use coursevault_core::storage::{CourseState, Database};
use coursevault_core::Importer;
use tempfile::tempdir;

fn default_extensions() -> Vec<String> {
    ["mp4", "mkv", "webm", "mov"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Importer over a temp uploads tree, in-memory catalog, ffmpeg disabled.
fn make_importer(uploads: &Path, cache_dir: &Path) -> Importer {
    let scanner = CatalogScanner::new(uploads, &default_extensions());
    let cache = HashCache::new(cache_dir, uploads);
    let probe = MediaProbe::new(cache_dir, false, Duration::from_secs(5));
    let db = Database::open_in_memory().unwrap();
    Importer::new(scanner, cache, probe, db)
}

fn write_lesson(uploads: &Path, rel: &str, content: &[u8]) {
    let path = uploads.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Layout used by most tests:
///   rust/jane-doe/ownership/basics/01-intro.mp4
///   rust/jane-doe/ownership/basics/02-borrowing.mp4
///   rust/jane-doe/ownership/advanced/01-lifetimes.mp4
fn create_course_tree(uploads: &Path) {
    write_lesson(uploads, "rust/jane-doe/ownership/basics/01-intro.mp4", b"intro bytes");
    write_lesson(
        uploads,
        "rust/jane-doe/ownership/basics/02-borrowing.mp4",
        b"borrowing bytes",
    );
    write_lesson(
        uploads,
        "rust/jane-doe/ownership/advanced/01-lifetimes.mp4",
        b"lifetimes bytes",
    );
}

#[test]
fn test_incremental_import_builds_hierarchy() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let result = importer.import_incremental();

    assert!(result.success, "logs: {:?}", result.logs);
    assert_eq!(result.stats.files_processed, 3);
    assert_eq!(result.stats.files_imported, 3);
    assert_eq!(result.stats.topics_created, 1);
    assert_eq!(result.stats.instructors_created, 1);
    assert_eq!(result.stats.courses_created, 1);
    assert_eq!(result.stats.lessons_created, 3);
    assert_eq!(result.stats.lessons_updated, 0);
    assert_eq!(result.stats.errors, 0);

    let counts = importer.database().counts().unwrap();
    assert_eq!(counts.topics, 1);
    assert_eq!(counts.instructors, 1);
    assert_eq!(counts.courses, 1);
    assert_eq!(counts.sections, 3);
    assert_eq!(counts.lessons, 3);
}

#[test]
fn test_second_run_imports_nothing() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let first = importer.import_incremental();
    assert_eq!(first.stats.files_imported, 3);
    let counts_after_first = importer.database().counts().unwrap();

    let second = importer.import_incremental();
    assert!(second.success);
    assert_eq!(second.stats.files_processed, 0);
    assert_eq!(second.stats.files_imported, 0);

    let counts_after_second = importer.database().counts().unwrap();
    assert_eq!(counts_after_first.sections, counts_after_second.sections);
    assert_eq!(counts_after_first.lessons, counts_after_second.lessons);
}

#[test]
fn test_mtime_touch_does_not_mark_changed() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    importer.import_incremental();

    // Rewrite identical bytes; only the modification time moves.
    write_lesson(&uploads, "rust/jane-doe/ownership/basics/01-intro.mp4", b"intro bytes");

    let second = importer.import_incremental();
    assert!(second.success);
    assert_eq!(second.stats.files_imported, 0);
}

#[test]
fn test_content_change_updates_lesson_in_place() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    importer.import_incremental();

    write_lesson(
        &uploads,
        "rust/jane-doe/ownership/basics/01-intro.mp4",
        b"intro bytes, re-encoded",
    );

    let second = importer.import_incremental();
    assert!(second.success);
    assert_eq!(second.stats.files_imported, 1);
    assert_eq!(second.stats.lessons_updated, 1);
    assert_eq!(second.stats.lessons_created, 0);

    let lesson = importer
        .database()
        .find_lesson_by_path("rust/jane-doe/ownership/basics/01-intro.mp4")
        .unwrap()
        .expect("lesson should exist");
    assert_eq!(lesson.file_size, b"intro bytes, re-encoded".len() as i64);

    // Known quirk: a re-imported file with a section segment appends a new
    // section row instead of reusing the one with the same name.
    let counts = importer.database().counts().unwrap();
    assert_eq!(counts.lessons, 3);
    assert_eq!(counts.sections, 4);
}

#[test]
fn test_shallow_file_is_skipped_without_error() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    write_lesson(&uploads, "stray.mp4", b"no hierarchy here");

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let result = importer.import_incremental();

    assert!(result.success);
    assert_eq!(result.stats.errors, 0);
    assert_eq!(result.stats.files_processed, 1);

    let counts = importer.database().counts().unwrap();
    assert_eq!(counts.topics, 0);
    assert_eq!(counts.courses, 0);
    assert_eq!(counts.lessons, 0);

    // The skip is remembered: the file is not reprocessed next run.
    let second = importer.import_incremental();
    assert_eq!(second.stats.files_processed, 0);
}

#[test]
fn test_rebuild_soft_deletes_vanished_courses() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    write_lesson(&uploads, "rust/jane/course-a/s1/l1.mp4", b"course a");
    write_lesson(&uploads, "rust/jane/course-b/s1/l1.mp4", b"course b");

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let first = importer.import_incremental();
    assert_eq!(first.stats.courses_created, 2);

    fs::remove_dir_all(uploads.join("rust/jane/course-b")).unwrap();

    let rebuild = importer.import_rebuild();
    assert!(rebuild.success, "logs: {:?}", rebuild.logs);
    assert_eq!(rebuild.stats.courses_soft_deleted, 2);

    let course_a = importer
        .database()
        .find_course_by_slug("course-a")
        .unwrap()
        .expect("course-a should exist");
    assert_eq!(course_a.state, CourseState::Active);

    let course_b = importer
        .database()
        .find_course_by_slug("course-b")
        .unwrap()
        .expect("course-b row should survive");
    assert_eq!(course_b.state, CourseState::Deleted);
}

#[test]
fn test_degraded_probe_still_creates_lessons() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    // ffmpeg disabled in make_importer: every probe degrades.
    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let result = importer.import_incremental();

    assert!(result.success);
    assert_eq!(result.stats.lessons_created, 3);
    assert_eq!(result.stats.media_processed, 0);

    let lesson = importer
        .database()
        .find_lesson_by_path("rust/jane-doe/ownership/basics/01-intro.mp4")
        .unwrap()
        .unwrap();
    assert_eq!(lesson.duration_seconds, 0.0);
    assert_eq!(lesson.thumb_path, None);
}

#[test]
fn test_duplicate_detection_groups_identical_content() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    write_lesson(&uploads, "rust/jane/course-a/s1/copy.mp4", b"same exact bytes");
    write_lesson(&uploads, "python/bob/course-c/s2/other.mp4", b"same exact bytes");
    write_lesson(&uploads, "rust/jane/course-a/s1/unique.mp4", b"different bytes");

    let scanner = CatalogScanner::new(&uploads, &default_extensions());
    let scan = scanner.scan();
    assert_eq!(scan.total_files, 3);

    let groups = hasher::find_duplicates(&scan.files);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 2);
}

#[test]
fn test_missing_root_fails_run_without_panicking() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("does-not-exist");

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let result = importer.import_incremental();

    assert!(!result.success);
    assert_eq!(result.stats.errors, 1);
    assert_eq!(result.stats.files_processed, 0);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdir_is_isolated() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);
    let locked = uploads.join("locked");
    fs::create_dir_all(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        // Running privileged; the permission bits don't bite, so there is
        // nothing to observe here.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    let result = importer.import_incremental();

    // The unreadable subtree is one error; the readable files still land.
    assert!(!result.success);
    assert!(result.stats.errors >= 1);
    assert_eq!(result.stats.files_imported, 3);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_per_file_failure_does_not_abort_batch() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    write_lesson(&uploads, "rust/jane/course-a/s1/l1.mp4", b"first");
    write_lesson(&uploads, "rust/jane/course-a/s1/l2.mp4", b"second");

    // A directory squatting on the cache file makes every hash flush fail
    // after the file's catalog rows were written.
    let cache_dir = tmp.path().join("cache");
    fs::create_dir_all(cache_dir.join("hash_cache.json")).unwrap();

    let mut importer = make_importer(&uploads, &cache_dir);
    let result = importer.import_incremental();

    assert!(!result.success);
    assert_eq!(result.stats.errors, 2);
    assert_eq!(result.stats.files_processed, 2);
    assert_eq!(result.stats.files_imported, 0);

    // Each failure stays scoped to its file; the catalog rows still land.
    let counts = importer.database().counts().unwrap();
    assert_eq!(counts.courses, 1);
    assert_eq!(counts.lessons, 2);
}

#[test]
fn test_system_info_reflects_last_run() {
    let tmp = tempdir().unwrap();
    let uploads = tmp.path().join("uploads");
    create_course_tree(&uploads);

    let mut importer = make_importer(&uploads, &tmp.path().join("cache"));
    importer.import_incremental();

    let info = importer.system_info().unwrap();
    assert_eq!(info.scanner.total_files, 3);
    assert_eq!(info.scanner.topics_count, 1);
    assert_eq!(info.hasher.total_cached_files, 3);
    assert!(!info.probe.available);
    assert_eq!(info.database.lessons, 3);
}
