//! liveconf demo watcher.
//!
//! Binds a sample application config to the namespace and drivers named in a
//! settings file, prints it as JSON, and prints it again after every change
//! until Ctrl-C.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use liveconf::config::{load_settings, Settings};
use liveconf::observability::{logging, metrics};
use liveconf::{impl_reflect, DriverRegistry, Live, LiveConf, Reflect};

#[derive(Parser)]
#[command(name = "liveconf")]
#[command(about = "Watch a sample config bound to a key/value store", long_about = None)]
struct Cli {
    /// Settings file (TOML). Defaults to the in-memory drivers.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name the sample config is registered under.
    #[arg(short, long, default_value = "App")]
    name: String,
}

#[derive(Debug, Clone, Default)]
struct DbConfig {
    host: String,
    port: u16,
    pool_size: u32,
}

#[derive(Debug, Clone, Default)]
struct Limits {
    requests_per_sec: u32,
    burst: u32,
}

#[derive(Debug, Clone, Default)]
struct AppConfig {
    name: String,
    debug: bool,
    ports: Vec<u16>,
    ratio: f64,
    labels: BTreeMap<String, String>,
    db: DbConfig,
    limits: Option<Limits>,
}

impl_reflect!(DbConfig { host as "Host", port as "Port", pool_size as "PoolSize" });
impl_reflect!(Limits { requests_per_sec as "RequestsPerSec", burst as "Burst" });
impl_reflect!(AppConfig {
    name as "Name",
    debug as "Debug",
    ports as "Ports",
    ratio as "Ratio",
    labels as "Labels",
    db as "DB",
    limits as "Limits",
});

fn print_config(app: &Live<AppConfig>) -> Result<(), serde_json::Error> {
    let rendered = serde_json::to_string_pretty(&app.load().to_value().to_json())?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };

    logging::init(&logging::directive_for(&settings.log_level));
    metrics::register_metrics();

    tracing::info!(
        namespace = %settings.namespace,
        storage = %settings.storage.driver,
        monitor = %settings.monitor.driver,
        "liveconf v0.1.0 starting"
    );

    let registry = DriverRegistry::with_builtin();
    let conf = LiveConf::from_settings(&settings, &registry)?;

    let app = Live::new(AppConfig::default());
    conf.register_named(&cli.name, &app).await?;

    let mut keys = conf.keys();
    keys.sort();
    for key in &keys {
        tracing::debug!(key = %key, "Bound key");
    }
    tracing::info!(keys = keys.len(), state = %conf.state(), "Config registered");
    print_config(&app)?;

    let printer = app.clone();
    conf.subscribe(move |event| {
        tracing::info!(
            key = %event.key,
            before = %event.before,
            after = %event.after,
            "Config changed"
        );
        if let Err(e) = print_config(&printer) {
            tracing::warn!(error = %e, "Failed to render config");
        }
    });

    tokio::signal::ctrl_c().await?;
    conf.close();

    tracing::info!("Shutdown complete");
    Ok(())
}
