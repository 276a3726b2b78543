use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use liveconf::backend::FileStorage;
use liveconf::import::{flatten, load_document, push};
use liveconf::observability::logging;

#[derive(Parser)]
#[command(name = "kv-import")]
#[command(about = "Flatten a JSON file into keys and sync them into a file store", long_about = None)]
struct Cli {
    /// JSON file to import.
    #[arg(short, long)]
    file: PathBuf,

    /// Config name used as the key prefix. Defaults to the file stem.
    #[arg(long)]
    config_name: Option<String>,

    /// Key namespace.
    #[arg(short, long, default_value = "")]
    namespace: String,

    /// Path of the JSON file store.
    #[arg(short, long)]
    store: PathBuf,

    /// Change to this directory before resolving paths.
    #[arg(short, long)]
    workdir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&logging::directive_for("warn"));

    if let Some(dir) = &cli.workdir {
        std::env::set_current_dir(dir)?;
    }

    let config_name = match cli.config_name {
        Some(name) => name,
        None => cli
            .file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or("cannot derive a config name from the file name")?,
    };

    let doc = load_document(&cli.file)?;
    let kv = flatten(&config_name, &doc);
    let storage = FileStorage::new(&cli.store);
    let report = push(&storage, &cli.namespace, &kv).await;

    if !report.failures.is_empty() {
        println!("ERRORS:\n-----------------------------------");
        for (key, error) in &report.failures {
            println!("SYNC_ERROR: {}: {}", key, error);
        }
        println!();
    }

    if !report.changed.is_empty() {
        println!("CHANGES:\n----------------------------------");
        for (key, change) in &report.changed {
            println!("{}: {}", key, change);
        }
        println!();
    }

    println!("{} key changed and synced", report.changed.len());

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
