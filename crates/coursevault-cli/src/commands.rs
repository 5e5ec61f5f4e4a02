use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "coursevault")]
#[command(about = "Catalog a directory tree of course videos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import files changed since the last run
    Import,
    /// Soft-delete every course and re-derive the catalog from a full scan
    Rebuild {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print scanner, hash cache, ffmpeg and database status as JSON
    Info,
    /// Scan the uploads root and list exact-content duplicate groups
    Duplicates,
    /// Print configuration values
    PrintConfig,
}
