use super::{FileDescriptor, ParsedPath, ScanOutcome};
use crate::hasher;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

pub(super) fn scan_root(root: &Path, video_extensions: &[String]) -> ScanOutcome {
    let mut errors: Vec<String> = Vec::new();

    if !root.is_dir() {
        errors.push(format!("Uploads root does not exist: {}", root.display()));
        return ScanOutcome {
            files: Vec::new(),
            total_files: 0,
            total_errors: errors.len(),
            errors,
        };
    }

    let mut matches: Vec<(PathBuf, String)> = Vec::new();
    visit_dir(root, String::new(), video_extensions, &mut matches, &mut errors);

    // Hashing dominates scan time on large catalogs; descriptors are
    // independent per file, so build them in parallel.
    let built: Vec<Result<FileDescriptor, String>> = matches
        .par_iter()
        .map(|(path, relative)| build_descriptor(path, relative))
        .collect();

    let mut files = Vec::with_capacity(built.len());
    for result in built {
        match result {
            Ok(file) => files.push(file),
            Err(err) => errors.push(err),
        }
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    debug!(
        "Scan of {} found {} video files, {} errors",
        root.display(),
        files.len(),
        errors.len()
    );

    ScanOutcome {
        total_files: files.len(),
        total_errors: errors.len(),
        files,
        errors,
    }
}

fn visit_dir(
    dir: &Path,
    relative: String,
    video_extensions: &[String],
    matches: &mut Vec<(PathBuf, String)>,
    errors: &mut Vec<String>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            errors.push(format!("Cannot read directory {}: {}", dir.display(), err));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(format!(
                    "Cannot read entry in {}: {}",
                    dir.display(),
                    err
                ));
                continue;
            }
        };

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_relative = if relative.is_empty() {
            name
        } else {
            format!("{}/{}", relative, name)
        };

        // Symlinks are skipped entirely; following them risks loops.
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                errors.push(format!("Cannot stat {}: {}", path.display(), err));
                continue;
            }
        };

        if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            visit_dir(&path, child_relative, video_extensions, matches, errors);
        } else if file_type.is_file() && is_video(&path, video_extensions) {
            matches.push((path, child_relative));
        }
    }
}

fn is_video(path: &Path, video_extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| video_extensions.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

fn build_descriptor(path: &Path, relative: &str) -> Result<FileDescriptor, String> {
    let metadata = fs::metadata(path)
        .map_err(|err| format!("Cannot process file {}: {}", relative, err))?;

    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(FileDescriptor {
        full_path: path.to_path_buf(),
        relative_path: relative.to_string(),
        filename: path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default(),
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
        size: metadata.len(),
        mtime,
        hash: hasher::hash_file(path),
        parsed: ParsedPath::parse(relative),
    })
}
