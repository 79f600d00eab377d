//! Error types for view engines, collection sources and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a collection source.
///
/// A source error is terminal for every engine observing the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("collection source failed: {message}")]
pub struct SourceError {
	message: String,
}

impl SourceError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Terminal outcome of a view engine task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
	/// The collection source failed while the engine was live.
	#[error(transparent)]
	Source(#[from] SourceError),

	/// The engine task panicked or was aborted by the runtime.
	#[error("view engine task failed: {0}")]
	Join(String),
}

/// Errors that can occur when loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}
