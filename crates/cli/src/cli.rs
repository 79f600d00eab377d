use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sieve")]
#[command(about = "Drive a filter or selection view from stdin")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Demo configuration (TOML). Uses the built-in device list if omitted
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}
