use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables for one [`ViewEngine`](crate::ViewEngine).
///
/// Every field has a default, so an empty table is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	/// Idle time after the last search keystroke before the token settles.
	pub quiescence_ms: u64,
}

impl EngineConfig {
	pub const DEFAULT_QUIESCENCE_MS: u64 = 200;

	/// Quiescence window used when nothing else is configured.
	pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(Self::DEFAULT_QUIESCENCE_MS);

	/// Parses a configuration from TOML text.
	pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml(&text)
	}

	/// Returns the search quiescence window.
	pub fn quiescence(&self) -> Duration {
		Duration::from_millis(self.quiescence_ms)
	}
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			quiescence_ms: Self::DEFAULT_QUIESCENCE_MS,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_table_uses_defaults() {
		let config = EngineConfig::from_toml("").unwrap();
		assert_eq!(config, EngineConfig::default());
		assert_eq!(config.quiescence(), Duration::from_millis(200));
	}

	#[test]
	fn quiescence_is_read_in_milliseconds() {
		let config = EngineConfig::from_toml("quiescence_ms = 75").unwrap();
		assert_eq!(config.quiescence(), Duration::from_millis(75));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = EngineConfig::from_toml("debounce = 10").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)), "got {err:?}");
	}

	#[test]
	fn missing_file_reports_path() {
		let err = EngineConfig::load(Path::new("/nonexistent/sieve.toml")).unwrap_err();
		match err {
			ConfigError::Io { path, .. } => assert_eq!(path, Path::new("/nonexistent/sieve.toml")),
			other => panic!("expected I/O error, got {other:?}"),
		}
	}
}
