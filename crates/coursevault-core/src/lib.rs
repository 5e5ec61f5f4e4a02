pub mod config;
pub mod error;
pub mod hasher;
pub mod importer;
pub mod probe;
pub mod scanner;
pub mod slug;
pub mod storage;

pub use config::AppConfig;
pub use error::Error;
pub use importer::{ImportStats, Importer, RunResult, SystemInfo};
pub use scanner::{CatalogScanner, FileDescriptor, ParsedPath, ScanOutcome};
