pub mod cache;
pub mod xxhash;

pub use cache::{CacheStats, HashCache};
pub use xxhash::{hash_file, FileHash, HashSource};

use crate::scanner::FileDescriptor;
use dashmap::DashMap;
use serde::Serialize;

/// Files sharing one content hash. Only groups with more than one member
/// are reported.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub files: Vec<FileDescriptor>,
    pub count: usize,
}

/// Group scanned files by their content hash and keep the groups with
/// duplicates. Exact-content matches only; different encodes of the same
/// material hash differently and are not detected.
pub fn find_duplicates(files: &[FileDescriptor]) -> Vec<DuplicateGroup> {
    let groups: DashMap<String, Vec<FileDescriptor>> = DashMap::new();

    for file in files {
        groups
            .entry(file.hash.hex.clone())
            .or_default()
            .push(file.clone());
    }

    let mut duplicates: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(hash, files)| DuplicateGroup {
            hash,
            count: files.len(),
            files,
        })
        .collect();

    // Deterministic order.
    duplicates.sort_by(|a, b| a.hash.cmp(&b.hash));
    duplicates
}
