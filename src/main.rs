use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};

use airsentry::config::{self, AppConfig};
use airsentry::dashboard;
use airsentry::pipeline;
use airsentry::provider::OpenWeatherProvider;
use airsentry::store::open_store;

#[derive(Parser)]
#[command(name = "airsentry", version, about = "Self-correcting air-quality health risk pipeline")]
struct Cli {
    /// Directory holding the tables, settings, and model artifact
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pipeline cycle (the default when no subcommand is given)
    Run,
    /// Print the dashboard snapshot as JSON
    Dashboard,
    /// Retrain the forecast model from recorded history
    Retrain,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.data_dir)?;
    let store = open_store(config.storage_backend, &config.data_dir)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("airsentry cycle starting");
            let api_key = config::provider_api_key()?;
            let provider = OpenWeatherProvider::new(
                api_key,
                config.latitude,
                config.longitude,
                config.request_timeout,
            )?;
            if let Err(err) = pipeline::run_cycle(&provider, store.as_ref(), &config).await {
                error!("pipeline cycle failed: {err}");
                return Err(err.into());
            }
        }
        Command::Dashboard => {
            let snapshot = dashboard::build_snapshot(store.as_ref());
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Retrain => match pipeline::maybe_retrain(store.as_ref(), &config)? {
            Some(forecaster) => info!(
                "model artifact replaced ({} training rows)",
                forecaster.training_rows()
            ),
            None => info!("not enough recorded history to retrain"),
        },
    }

    Ok(())
}
