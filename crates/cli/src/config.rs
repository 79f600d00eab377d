use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use sieve_view::{EngineConfig, InitialKeys, ViewMode};

/// One row of the demo collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	/// Category used by filter views. Entries without one never pass a filter.
	#[serde(default)]
	pub key: Option<String>,
}

impl Entry {
	pub fn new(id: &str, name: Option<&str>, key: Option<&str>) -> Self {
		Self {
			id: id.to_string(),
			name: name.map(str::to_string),
			key: key.map(str::to_string),
		}
	}
}

/// Demo driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
	pub mode: ViewMode,
	/// Starting key set. Defaults to `all` for filter views and `none` for selections.
	pub initial: Option<InitialKeys<String>>,
	/// Keys reachable by `all`. Derived from the items when empty.
	pub universe: Vec<String>,
	/// Gate the collection behind `login`/`logout`.
	pub session: bool,
	pub engine: EngineConfig,
	/// Omitted entirely, the built-in device list is used.
	pub items: Vec<Entry>,
}

impl Default for DemoConfig {
	fn default() -> Self {
		Self {
			mode: ViewMode::Filter,
			initial: None,
			universe: Vec::new(),
			session: false,
			engine: EngineConfig::default(),
			items: vec![
				Entry::new("d1", Some("Sensor-1"), Some("temp")),
				Entry::new("d2", Some("Sensor-2"), Some("humidity")),
				Entry::new("d3", Some("Boiler"), Some("temp")),
				Entry::new("d4", Some("Front Door"), Some("door")),
			],
		}
	}
}

impl DemoConfig {
	pub fn from_toml(text: &str) -> anyhow::Result<Self> {
		toml::from_str(text).context("invalid demo configuration")
	}

	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
		Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
	}

	pub fn initial_keys(&self) -> InitialKeys<String> {
		match (&self.initial, self.mode) {
			(Some(initial), _) => initial.clone(),
			(None, ViewMode::Filter) => InitialKeys::All,
			(None, ViewMode::Select) => InitialKeys::None,
		}
	}

	/// Returns the configured universe, or the distinct keys the items carry.
	pub fn universe(&self) -> Vec<String> {
		if !self.universe.is_empty() {
			return self.universe.clone();
		}
		let mut keys: Vec<String> = Vec::new();
		for entry in &self.items {
			let key = match self.mode {
				ViewMode::Filter => entry.key.as_ref(),
				ViewMode::Select => Some(&entry.id),
			};
			if let Some(key) = key
				&& !keys.contains(key)
			{
				keys.push(key.clone());
			}
		}
		keys
	}
}
