use serde::Serialize;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::warn;
use twox_hash::XxHash64;

/// Where a file hash came from. `Metadata` is the degraded fallback used
/// when the file contents cannot be read: two same-named files with equal
/// size and mtime but different bytes would collide under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HashSource {
    Content,
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHash {
    pub hex: String,
    pub source: HashSource,
}

/// Hash a file's full contents with XxHash64. If the contents cannot be
/// read the hash degrades to filename + size + mtime so the pipeline can
/// keep going; the degraded source is recorded on the result.
pub fn hash_file(path: &Path) -> FileHash {
    match read_full_file(path) {
        Ok(data) => FileHash {
            hex: to_hex(hash_data(&data)),
            source: HashSource::Content,
        },
        Err(e) => {
            warn!(
                "Could not read {} for hashing ({}), falling back to metadata hash",
                path.display(),
                e
            );
            metadata_hash(path)
        }
    }
}

fn metadata_hash(path: &Path) -> FileHash {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (size, mtime) = match std::fs::metadata(path) {
        Ok(meta) => (
            meta.len(),
            meta.modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
        ),
        Err(_) => (0, 0),
    };

    let key = format!("{}{}{}", filename, size, mtime);
    FileHash {
        hex: to_hex(hash_data(key.as_bytes())),
        source: HashSource::Metadata,
    }
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

fn to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

fn read_full_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}
