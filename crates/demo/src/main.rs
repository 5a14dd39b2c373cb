mod cli;
mod session;
mod store;

use std::time::Duration;

use anyhow::Context;
use autosave_coordinator::{CoordinatorConfig, SaveCoordinator};
use clap::Parser;
use cli::Cli;
use session::settle;
use store::FlakyStore;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let mut config = match &cli.config {
		Some(path) => CoordinatorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => CoordinatorConfig::default().interval(Duration::from_millis(500)),
	};
	if let Some(ms) = cli.interval_ms {
		config = config.interval(Duration::from_millis(ms));
	}
	info!(interval = ?config.interval, max_retries = config.max_retries, "demo.config");

	let store = FlakyStore::new(Duration::from_millis(cli.latency_ms), cli.fail_every);
	let coordinator = SaveCoordinator::builder(config)
		.on_success(|at| info!(saved_at = %at, "demo.saved"))
		.on_error(|err| tracing::error!(error = %err, "demo.unsaved"))
		.spawn()?;

	let watcher = {
		let mut states = coordinator.subscribe();
		tokio::spawn(async move {
			while let Some(state) = states.next().await {
				tracing::debug!(phase = state.phase.as_str(), dirty = state.is_dirty, queued = state.queued, retry = state.retry_count, "demo.state");
			}
		})
	};

	let mut document = String::new();
	for revision in 1..=cli.edits {
		document.push(char::from(b'a' + (revision % 26) as u8));
		let op = store.save_op(revision, document.clone());
		if cli.save_every > 0 && revision % cli.save_every == 0 {
			coordinator.save_now(op)?;
		} else {
			coordinator.schedule(op)?;
		}
		tokio::time::sleep(Duration::from_millis(cli.gap_ms)).await;
	}

	let (state, held) = settle(&coordinator).await?;

	coordinator.shutdown().await;
	let _ = watcher.await;

	println!("edits:       {}", cli.edits);
	println!("writes:      {}", store.writes());
	println!("dirty:       {}", state.is_dirty);
	println!("held:        {held}");
	println!("last saved:  {}", state.last_saved.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string()));
	println!("in sync:     {}", store.saved().as_deref() == Some(document.as_str()));
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("autosave_coordinator=debug,autosave_demo=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
