use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::{CacheStats, HashCache};
use crate::probe::{FfmpegInfo, MediaProbe};
use crate::scanner::{CatalogScanner, FileDescriptor, ScanOutcome, ScanStats};
use crate::storage::{CatalogCounts, Database};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const DEFAULT_THUMB_OFFSET_SECS: f64 = 10.0;

/// Counters for one import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub files_processed: usize,
    pub files_imported: usize,
    pub topics_created: usize,
    pub instructors_created: usize,
    pub courses_created: usize,
    pub sections_created: usize,
    pub lessons_created: usize,
    pub lessons_updated: usize,
    pub media_processed: usize,
    pub courses_soft_deleted: usize,
    pub errors: usize,
}

/// What an import run produced. Always returned, never thrown: partial
/// failure shows up as `errors > 0` and `success = false`, with the log
/// trail explaining which files were involved.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub stats: ImportStats,
    pub logs: Vec<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub scanner: ScanStats,
    pub hasher: CacheStats,
    pub probe: FfmpegInfo,
    pub database: CatalogCounts,
}

/// Drives scan → diff → hierarchy upsert → media enrichment → cache
/// update. One importer instance is one run context; callers must not run
/// two imports against the same catalog concurrently.
pub struct Importer {
    scanner: CatalogScanner,
    cache: HashCache,
    probe: MediaProbe,
    db: Database,
    stats: ImportStats,
    logs: Vec<String>,
    last_scan: Option<ScanOutcome>,
}

impl Importer {
    pub fn new(
        scanner: CatalogScanner,
        cache: HashCache,
        probe: MediaProbe,
        db: Database,
    ) -> Self {
        Self {
            scanner,
            cache,
            probe,
            db,
            stats: ImportStats::default(),
            logs: Vec::new(),
            last_scan: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let uploads = Path::new(&config.uploads_path);
        let cache_dir = Path::new(&config.cache_path);

        let scanner = CatalogScanner::new(uploads, &config.video_extensions);
        let cache = HashCache::new(cache_dir, uploads);
        let probe = MediaProbe::new(
            cache_dir,
            config.use_ffmpeg,
            Duration::from_secs(config.probe_timeout_secs),
        );
        let db = Database::open(Path::new(&config.db_path))?;

        Ok(Self::new(scanner, cache, probe, db))
    }

    /// Import only the files whose content hash differs from the cached
    /// one. A run with zero changed files (or zero files at all) completes
    /// with `success = true`.
    pub fn import_incremental(&mut self) -> RunResult {
        self.reset();
        self.log("Starting incremental import".to_string());

        let scan = self.scanner.scan();
        self.record_scan_errors(&scan);
        self.log(format!("Scanned {} files", scan.total_files));

        if scan.files.is_empty() {
            self.log("No files found to import".to_string());
            self.last_scan = Some(scan);
            return self.result();
        }

        let changed: Vec<&FileDescriptor> = scan
            .files
            .iter()
            .filter(|file| {
                self.cache
                    .cached_hash(&file.full_path)
                    .map_or(true, |cached| *cached != file.hash.hex)
            })
            .collect();
        self.log(format!(
            "{} of {} files changed since last run",
            changed.len(),
            scan.total_files
        ));

        self.import_files(&changed);
        self.clean_stale_hashes();
        self.log("Incremental import finished".to_string());

        self.last_scan = Some(scan);
        self.result()
    }

    /// Invalidate the whole catalog, then re-derive it from a full scan.
    /// Every course is soft-deleted up front and reactivated as its files
    /// are re-imported; courses whose directories vanished stay deleted.
    pub fn import_rebuild(&mut self) -> RunResult {
        self.reset();
        self.log("Starting full rebuild".to_string());

        match self.db.soft_delete_all_courses() {
            Ok(count) => {
                self.stats.courses_soft_deleted = count;
                self.log(format!("Marked {} existing courses as deleted", count));
            }
            Err(err) => {
                self.log(format!("Could not soft-delete courses: {}", err));
                self.stats.errors += 1;
            }
        }

        let scan = self.scanner.scan();
        self.record_scan_errors(&scan);
        self.log(format!("Scanned {} files", scan.total_files));

        if scan.files.is_empty() {
            self.log("No files found to import".to_string());
            self.last_scan = Some(scan);
            return self.result();
        }

        let all: Vec<&FileDescriptor> = scan.files.iter().collect();
        self.import_files(&all);
        self.clean_stale_hashes();
        self.log("Full rebuild finished".to_string());

        self.last_scan = Some(scan);
        self.result()
    }

    /// Per-file loop. A failing file is logged and counted; the batch
    /// always continues to the next one.
    fn import_files(&mut self, files: &[&FileDescriptor]) {
        let total = files.len();
        for (index, file) in files.iter().enumerate() {
            self.stats.files_processed += 1;
            self.log(format!(
                "Processing file {}/{}: {}",
                index + 1,
                total,
                file.relative_path
            ));

            match self.import_file(file) {
                Ok(()) => match self.cache.update(&file.full_path, &file.hash.hex) {
                    Ok(()) => self.stats.files_imported += 1,
                    Err(err) => {
                        self.log(format!(
                            "Could not update hash cache for {}: {}",
                            file.relative_path, err
                        ));
                        self.stats.errors += 1;
                    }
                },
                Err(err) => {
                    self.log(format!(
                        "Error processing {}: {}",
                        file.relative_path, err
                    ));
                    self.stats.errors += 1;
                }
            }
        }
    }

    fn import_file(&mut self, file: &FileDescriptor) -> Result<(), Error> {
        let parsed = file.parsed.clone();
        let (Some(topic), Some(instructor), Some(course)) =
            (parsed.topic, parsed.instructor, parsed.course)
        else {
            // Too shallow to place in the hierarchy. Informational only;
            // this is not an import error.
            self.log(format!(
                "Invalid directory structure for {}, skipping",
                file.relative_path
            ));
            return Ok(());
        };

        let (topic_id, topic_created) = self.db.upsert_topic(&topic)?;
        if topic_created {
            self.stats.topics_created += 1;
        }

        let (instructor_id, instructor_created) = self.db.upsert_instructor(&instructor)?;
        if instructor_created {
            self.stats.instructors_created += 1;
        }

        let (course_id, course_created) =
            self.db.upsert_course(&course, topic_id, instructor_id)?;
        if course_created {
            self.stats.courses_created += 1;
        }

        let mut section_id = None;
        if let Some(section) = parsed.section {
            section_id = Some(self.db.create_section(&section, course_id)?);
            self.stats.sections_created += 1;
        }

        if let (Some(lesson), Some(section_id)) = (parsed.lesson, section_id) {
            self.import_lesson(file, &lesson, section_id)?;
        }

        Ok(())
    }

    fn import_lesson(
        &mut self,
        file: &FileDescriptor,
        lesson_name: &str,
        section_id: i64,
    ) -> Result<(), Error> {
        match self.db.find_lesson_by_path(&file.relative_path)? {
            Some(existing) => {
                self.db.update_lesson_size(existing.id, file.size as i64)?;
                self.process_lesson_media(existing.id, file);
                self.stats.lessons_updated += 1;
            }
            None => {
                let lesson_id = self.db.create_lesson(
                    lesson_name,
                    section_id,
                    &file.relative_path,
                    file.size as i64,
                )?;
                self.process_lesson_media(lesson_id, file);
                self.stats.lessons_created += 1;
            }
        }
        Ok(())
    }

    /// Media enrichment is best-effort: a failed or degraded probe leaves
    /// the lesson with duration 0 and no thumbnail, and never fails the
    /// file's import.
    fn process_lesson_media(&mut self, lesson_id: i64, file: &FileDescriptor) {
        let media = self.probe.probe(&file.full_path);
        if !media.success {
            return;
        }

        if let Err(err) = self.db.update_lesson_duration(lesson_id, media.duration_secs) {
            self.log(format!(
                "Could not store duration for lesson {}: {}",
                lesson_id, err
            ));
            return;
        }

        if let Some(thumb) = self
            .probe
            .generate_thumbnail(&file.full_path, DEFAULT_THUMB_OFFSET_SECS)
        {
            if let Err(err) = self
                .db
                .update_lesson_thumbnail(lesson_id, &thumb.display().to_string())
            {
                self.log(format!(
                    "Could not store thumbnail for lesson {}: {}",
                    lesson_id, err
                ));
                return;
            }
        }

        self.stats.media_processed += 1;
    }

    fn clean_stale_hashes(&mut self) {
        match self.cache.clean_stale(self.scanner.uploads_root()) {
            Ok(0) => {}
            Ok(cleaned) => self.log(format!("Cleaned {} stale hash entries", cleaned)),
            Err(err) => {
                self.log(format!("Hash cache cleanup failed: {}", err));
                self.stats.errors += 1;
            }
        }
    }

    fn record_scan_errors(&mut self, scan: &ScanOutcome) {
        for err in &scan.errors {
            self.log(format!("Scan error: {}", err));
        }
        self.stats.errors += scan.total_errors;
    }

    fn reset(&mut self) {
        self.stats = ImportStats::default();
        self.logs.clear();
    }

    fn log(&mut self, message: String) {
        info!("{}", message);
        self.logs
            .push(format!("[{}] {}", Local::now().format("%H:%M:%S"), message));
    }

    fn result(&self) -> RunResult {
        RunResult {
            stats: self.stats.clone(),
            logs: self.logs.clone(),
            success: self.stats.errors == 0,
            timestamp: Utc::now(),
        }
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn system_info(&self) -> Result<SystemInfo, Error> {
        Ok(SystemInfo {
            scanner: self
                .last_scan
                .as_ref()
                .map(|scan| scan.stats())
                .unwrap_or_default(),
            hasher: self.cache.stats(),
            probe: self.probe.info(),
            database: self.db.counts()?,
        })
    }
}
