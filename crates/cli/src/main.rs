//! Sieve demo binary.
//!
//! Reads commands from stdin, feeds them into a filter or selection view
//! over an in-memory collection and prints every view the engine derives.

mod app;
mod cli;
mod command;
mod config;

use clap::Parser;
use cli::Cli;
use config::DemoConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	setup_tracing(cli.verbose);

	let config = match &cli.config {
		Some(path) => DemoConfig::load(path)?,
		None => DemoConfig::default(),
	};
	tracing::debug!(config = ?cli.config, "sieve.config");

	app::run(config).await
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	// SIEVE_LOG wins over RUST_LOG
	let filter = EnvFilter::try_from_env("SIEVE_LOG")
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("sieve_view=trace,sieve_cli=debug,info")
			} else {
				EnvFilter::new("warn")
			}
		});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();
}
