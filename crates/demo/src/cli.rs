use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "autosave-demo")]
#[command(about = "Replays a burst of edits against a flaky in-memory store")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// TOML coordinator config (defaults apply when omitted)
	#[arg(long, short = 'c')]
	pub config: Option<PathBuf>,

	/// Override the debounce interval in milliseconds
	#[arg(long)]
	pub interval_ms: Option<u64>,

	/// Number of simulated keystrokes
	#[arg(long, default_value_t = 20)]
	pub edits: usize,

	/// Pause between keystrokes in milliseconds
	#[arg(long, default_value_t = 150)]
	pub gap_ms: u64,

	/// Make every Nth write to the store fail (0 disables failures)
	#[arg(long, default_value_t = 0)]
	pub fail_every: usize,

	/// Simulated write latency in milliseconds
	#[arg(long, default_value_t = 40)]
	pub latency_ms: u64,

	/// Force an immediate save after every Nth keystroke (0 disables)
	#[arg(long, default_value_t = 0)]
	pub save_every: usize,

	/// Enable debug logging
	#[arg(long, short = 'v')]
	pub verbose: bool,
}
