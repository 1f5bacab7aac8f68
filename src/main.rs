//! QuadLabel - Quadrilateral text region annotation for document images
//!
//! Command-line entry points around the labeling library: data folder
//! preparation, dataset merging, and snapshot inspection.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quadlabel::config::{self, AppConfig};
use quadlabel::storage::{self, prepare::prepare_data_folder, snapshot};

/// QuadLabel - Annotation tooling for document text regions
#[derive(Parser, Debug)]
#[command(name = "quadlabel")]
#[command(about = "Prepare, merge, and inspect quadrilateral text annotations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a folder of source documents into a prepared images folder
    Prepare {
        /// Folder containing the source documents
        source: PathBuf,
    },
    /// Merge per-image snapshots into the aggregate dataset file
    Merge {
        /// Data root (the parent of the images folder)
        root: PathBuf,
    },
    /// Print a summary of the snapshots under a data root
    Inspect {
        /// Data root (the parent of the images folder)
        root: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let _config = load_or_create_config();

    match args.command {
        Command::Prepare { source } => {
            let summary = prepare_data_folder(&source)?;
            println!(
                "Prepared {} images ({} skipped) into {}",
                summary.prepared,
                summary.skipped,
                summary.output_dir.display()
            );
        }
        Command::Merge { root } => {
            let dataset = snapshot::merge_snapshots(&root)?;
            println!("Dataset written to {}", dataset.display());
        }
        Command::Inspect { root } => {
            inspect(&root)?;
        }
    }

    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn inspect(root: &std::path::Path) -> Result<()> {
    let dir = root.join(snapshot::SNAPSHOT_DIR);
    if !dir.is_dir() {
        println!("No snapshots under {}", root.display());
        return Ok(());
    }
    let mut images = 0usize;
    let mut regions = 0usize;
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&content)?;
        if let Some(map) = parsed.as_object() {
            for (name, entry) in map {
                let count = entry
                    .get("polygons")
                    .and_then(|p| p.as_array())
                    .map(|p| p.len())
                    .unwrap_or(0);
                println!("{name}: {count} regions");
                images += 1;
                regions += count;
            }
        }
    }
    println!("{images} images, {regions} regions total");
    Ok(())
}
