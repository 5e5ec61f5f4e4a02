mod walk;

use crate::hasher::FileHash;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory segments of a catalog-relative path, read positionally as
/// topic/instructor/course/section/lesson. Missing trailing segments stay
/// `None`; the importer decides what is deep enough to import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedPath {
    pub topic: Option<String>,
    pub instructor: Option<String>,
    pub course: Option<String>,
    pub section: Option<String>,
    pub lesson: Option<String>,
}

impl ParsedPath {
    /// Split a relative path on '/' and map the first five positions.
    /// The lesson segment is the filename with its extension stripped and
    /// is only present when all four directory levels exist above it.
    pub fn parse(relative_path: &str) -> Self {
        let parts: Vec<&str> = relative_path
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        let segment = |i: usize| parts.get(i).map(|s| s.to_string());

        ParsedPath {
            topic: segment(0),
            instructor: segment(1),
            course: segment(2),
            section: segment(3),
            lesson: parts.get(4).map(|name| {
                Path::new(name)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.to_string())
            }),
        }
    }
}

/// One video file found during a scan, hash included.
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    pub full_path: PathBuf,
    pub relative_path: String,
    pub filename: String,
    pub extension: String,
    pub size: u64,
    pub mtime: i64,
    pub hash: FileHash,
    pub parsed: ParsedPath,
}

/// Everything a scan produced. Partial failure is data, not an error: the
/// caller checks `total_errors` instead of matching on a `Result`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub files: Vec<FileDescriptor>,
    pub errors: Vec<String>,
    pub total_files: usize,
    pub total_errors: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub extensions: BTreeMap<String, usize>,
    pub topics_count: usize,
    pub instructors_count: usize,
    pub courses_count: usize,
    pub errors_count: usize,
}

impl ScanOutcome {
    pub fn files_by_topic(&self, topic: &str) -> Vec<&FileDescriptor> {
        self.files
            .iter()
            .filter(|f| f.parsed.topic.as_deref() == Some(topic))
            .collect()
    }

    pub fn files_by_instructor(&self, instructor: &str) -> Vec<&FileDescriptor> {
        self.files
            .iter()
            .filter(|f| f.parsed.instructor.as_deref() == Some(instructor))
            .collect()
    }

    pub fn files_by_course(&self, course: &str) -> Vec<&FileDescriptor> {
        self.files
            .iter()
            .filter(|f| f.parsed.course.as_deref() == Some(course))
            .collect()
    }

    pub fn modified_since(&self, since: i64) -> Vec<&FileDescriptor> {
        self.files.iter().filter(|f| f.mtime > since).collect()
    }

    pub fn larger_than(&self, min_size: u64) -> Vec<&FileDescriptor> {
        self.files.iter().filter(|f| f.size > min_size).collect()
    }

    pub fn stats(&self) -> ScanStats {
        let mut extensions: BTreeMap<String, usize> = BTreeMap::new();
        let mut topics: BTreeMap<&str, usize> = BTreeMap::new();
        let mut instructors: BTreeMap<&str, usize> = BTreeMap::new();
        let mut courses: BTreeMap<&str, usize> = BTreeMap::new();
        let mut total_size = 0u64;

        for file in &self.files {
            total_size += file.size;
            *extensions.entry(file.extension.clone()).or_default() += 1;
            if let Some(topic) = file.parsed.topic.as_deref() {
                *topics.entry(topic).or_default() += 1;
            }
            if let Some(instructor) = file.parsed.instructor.as_deref() {
                *instructors.entry(instructor).or_default() += 1;
            }
            if let Some(course) = file.parsed.course.as_deref() {
                *courses.entry(course).or_default() += 1;
            }
        }

        ScanStats {
            total_files: self.files.len(),
            total_size,
            total_size_formatted: format_bytes(total_size),
            extensions,
            topics_count: topics.len(),
            instructors_count: instructors.len(),
            courses_count: courses.len(),
            errors_count: self.errors.len(),
        }
    }
}

/// Human-readable byte count for status output, two decimals above 1 KB.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Read-only recursive scanner over the uploads root.
pub struct CatalogScanner {
    uploads_root: PathBuf,
    video_extensions: Vec<String>,
}

impl CatalogScanner {
    pub fn new(uploads_root: &Path, video_extensions: &[String]) -> Self {
        Self {
            uploads_root: uploads_root.to_path_buf(),
            video_extensions: video_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    /// Walk the uploads root and build descriptors (hashes computed in
    /// parallel). An unreadable root yields zero files and one root-level
    /// error; unreadable subtrees are recorded and skipped.
    pub fn scan(&self) -> ScanOutcome {
        walk::scan_root(&self.uploads_root, &self.video_extensions)
    }
}
