//! `twitch-clips` command-line entry point.

// std
use std::{path::PathBuf, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
// self
use twitch_clips::{
	config::{Config, Period},
	runner::Runner,
	store::SqliteClipStore,
};

#[derive(Debug, Parser)]
#[command(name = "twitch-clips", version, about = "Harvest Twitch clips into SQLite")]
struct Cli {
	/// Path to the TOML configuration file.
	#[arg(short, long, default_value = "twitch-clips.toml")]
	config: PathBuf,

	/// Repeat the harvest on this interval (e.g. `PT1H`, `1d`) instead of running once.
	#[arg(long)]
	every: Option<Period>,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let cli = Cli::parse();
	let config = Config::load(&cli.config)
		.wrap_err_with(|| format!("failed to load {}", cli.config.display()))?;
	let store = SqliteClipStore::connect(&config.store.url)
		.await
		.wrap_err_with(|| format!("failed to open clip store {}", config.store.url))?;
	let (runner, manager) = Runner::from_config(&config, Arc::new(store.clone()))?;
	let cancel = CancellationToken::new();

	tokio::spawn({
		let cancel = cancel.clone();

		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::warn!("interrupt received; cancelling harvest");
				cancel.cancel();
			}
		}
	});

	match cli.every {
		None => {
			runner.run_until(&cancel).await?;
		},
		Some(every) => {
			let mut ticker = tokio::time::interval(every.duration().unsigned_abs());

			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = cancel.cancelled() => break,
					_ = ticker.tick() => {
						runner.run_until(&cancel).await?;
					},
				}
			}
		},
	}

	tracing::info!(metrics = ?manager.metrics(), "token usage");
	store.close().await;

	Ok(())
}
