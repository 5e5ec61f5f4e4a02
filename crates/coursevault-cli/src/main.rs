mod commands;
mod logging;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use coursevault_core::hasher;
use coursevault_core::{AppConfig, CatalogScanner, Importer, RunResult};
use dotenv::dotenv;
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match coursevault_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Import) => {
            if let Err(err) = run_import(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Rebuild { yes }) => {
            let confirmed = yes
                || matches!(
                    prompt_confirm(
                        "Rebuild soft-deletes every course before re-importing. Continue?",
                        Some(false),
                    ),
                    Ok(true)
                );
            if !confirmed {
                process::exit(0);
            }
            if let Err(err) = run_rebuild(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Info) => {
            if let Err(err) = run_info(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Duplicates) => {
            run_duplicates(&config);
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_import(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut importer = Importer::from_config(config)?;
    let result = importer.import_incremental();
    print_run_summary("Incremental import", &result);
    Ok(())
}

fn run_rebuild(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut importer = Importer::from_config(config)?;
    let result = importer.import_rebuild();
    print_run_summary("Rebuild", &result);
    Ok(())
}

fn run_info(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let importer = Importer::from_config(config)?;
    let info = importer.system_info()?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_duplicates(config: &AppConfig) {
    let scanner = CatalogScanner::new(Path::new(&config.uploads_path), &config.video_extensions);
    let scan = scanner.scan();
    for err in &scan.errors {
        error!("Scan error: {}", err);
    }

    let groups = hasher::find_duplicates(&scan.files);
    if groups.is_empty() {
        println!("No exact-content duplicates found across {} files", scan.total_files);
        return;
    }

    for group in &groups {
        println!(
            "{} {} files with hash {}",
            "dup".red().bold(),
            group.count,
            group.hash
        );
        for file in &group.files {
            println!("    {}", file.relative_path);
        }
    }
}

fn print_run_summary(label: &str, result: &RunResult) {
    println!();
    let status = if result.success {
        "ok".green().bold()
    } else {
        "failed".red().bold()
    };
    println!("{}: {}", label, status);
    println!(
        "  {} processed, {} imported",
        result.stats.files_processed.to_string().green(),
        result.stats.files_imported.to_string().green(),
    );
    println!(
        "  {} lessons created, {} updated, {} with media",
        result.stats.lessons_created.to_string().cyan(),
        result.stats.lessons_updated.to_string().cyan(),
        result.stats.media_processed.to_string().cyan(),
    );
    if result.stats.courses_soft_deleted > 0 {
        println!(
            "  {} courses soft-deleted",
            result.stats.courses_soft_deleted.to_string().yellow()
        );
    }
    if result.stats.errors > 0 {
        println!("  {} errors", result.stats.errors.to_string().red());
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
