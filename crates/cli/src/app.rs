use std::fmt::Write as _;

use anyhow::Context;
use sieve_view::{
	CollectionSource, DerivedView, EngineBuilder, MemorySession, MemoryStore, Replay, SessionGate, SourceError,
	ViewEngine, ViewMode, ViewPolicy,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::command::{Command, HELP};
use crate::config::{DemoConfig, Entry};

/// Builds the policy for `mode`: filter views key on the entry's category,
/// selection views key on its id. Both search the display name.
pub fn policy(mode: ViewMode) -> ViewPolicy<Entry, String> {
	match mode {
		ViewMode::Filter => ViewPolicy::filter(|e: &Entry| e.key.as_ref(), |e: &Entry| e.name.as_deref()),
		ViewMode::Select => ViewPolicy::select(|e: &Entry| Some(&e.id), |e: &Entry| e.name.as_deref()),
	}
}

struct App {
	mode: ViewMode,
	gated: bool,
	store: MemoryStore<Entry>,
	session: MemorySession,
	engine: ViewEngine<Entry, String>,
}

pub async fn run(config: DemoConfig) -> anyhow::Result<()> {
	let store = MemoryStore::with_items(config.items.clone());
	let session = MemorySession::new();
	let source: Box<dyn CollectionSource<Entry>> = if config.session {
		Box::new(SessionGate::new(store.clone(), session.clone()))
	} else {
		Box::new(store.clone())
	};

	let engine = EngineBuilder::new(policy(config.mode), config.initial_keys())
		.universe(config.universe())
		.config(config.engine.clone())
		.spawn(source.as_ref());
	info!(mode = ?config.mode, items = config.items.len(), gated = config.session, "sieve.start");

	let app = App {
		mode: config.mode,
		gated: config.session,
		store,
		session,
		engine,
	};
	let printer = tokio::spawn(print_views(app.engine.view(), app.mode));
	let mut status = app.engine.status();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();

	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line.context("failed to read stdin")? else {
					break;
				};
				match Command::parse(&line) {
					Ok(Some(Command::Quit)) => break,
					Ok(Some(command)) => app.apply(command),
					Ok(None) => {}
					Err(err) => eprintln!("{err}"),
				}
			}
			next = status.next() => match next {
				Some(state) if state.is_terminal() => {
					eprintln!("engine stopped: {state:?}");
					break;
				}
				Some(_) => {}
				None => break,
			}
		}
	}

	let result = app.engine.shutdown().await;
	if let Err(err) = printer.await {
		warn!(%err, "sieve.printer.failed");
	}
	result.context("view engine stopped")
}

impl App {
	fn apply(&self, command: Command) {
		let engine = &self.engine;
		match command {
			Command::Toggle(key) => {
				engine.toggle(key);
			}
			Command::On(key) => {
				engine.set(key, true);
			}
			Command::Off(key) => {
				engine.set(key, false);
			}
			Command::All => {
				engine.select_all();
			}
			Command::Clear => {
				engine.clear_all();
			}
			Command::Search(text) => {
				engine.set_search(text);
			}
			Command::Add { id, key, name } => {
				let entry = Entry { id, name, key };
				self.store.update(|items| match items.iter_mut().find(|e| e.id == entry.id) {
					Some(existing) => *existing = entry,
					None => items.push(entry),
				});
			}
			Command::Remove(id) => self.store.update(|items| items.retain(|e| e.id != id)),
			Command::Fail(message) => self.store.fail(SourceError::new(message)),
			Command::Login(user) => {
				if !self.gated {
					eprintln!("session gating is off; set `session = true` to gate the collection");
				}
				self.session.sign_in(user);
			}
			Command::Logout => self.session.sign_out(),
			Command::Show => match engine.view().latest() {
				Some(view) => println!("{}", render(&view, self.mode)),
				None => println!("(no view yet)"),
			},
			Command::Help => println!("{HELP}"),
			Command::Quit => {}
		}
	}
}

async fn print_views(mut views: Replay<DerivedView<Entry>>, mode: ViewMode) {
	while let Some(view) = views.next().await {
		println!("{}", render(&view, mode));
	}
}

/// Formats a view as a header line followed by one line per row.
pub fn render(view: &DerivedView<Entry>, mode: ViewMode) -> String {
	let mut out = format!("#{} ({} rows)", view.revision(), view.len());
	for row in view.rows() {
		let mark = match (mode, row.selected) {
			(ViewMode::Filter, _) => "",
			(ViewMode::Select, true) => "[x] ",
			(ViewMode::Select, false) => "[ ] ",
		};
		let entry = &row.item;
		let _ = write!(out, "\n  {mark}{} {}", entry.id, entry.name.as_deref().unwrap_or("-"));
		if let Some(key) = &entry.key {
			let _ = write!(out, " ({key})");
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use sieve_view::{KeySet, ViewRow};

	use super::*;

	fn entries() -> Vec<Entry> {
		vec![
			Entry::new("d1", Some("Sensor-1"), Some("temp")),
			Entry::new("d2", None, None),
		]
	}

	#[test]
	fn render_filter_view() {
		let keys: KeySet<String> = ["temp".to_string()].into_iter().collect();
		let rows = policy(ViewMode::Filter).derive(&entries(), "", &keys);
		let view = DerivedView::new(2, rows);
		assert_eq!(render(&view, ViewMode::Filter), "#2 (1 rows)\n  d1 Sensor-1 (temp)");
	}

	#[test]
	fn render_selection_marks_rows() {
		let view = DerivedView::new(1, vec![
			ViewRow {
				item: entries()[0].clone(),
				selected: false,
			},
			ViewRow {
				item: entries()[1].clone(),
				selected: true,
			},
		]);
		assert_eq!(render(&view, ViewMode::Select), "#1 (2 rows)\n  [ ] d1 Sensor-1 (temp)\n  [x] d2 -");
	}

	#[test]
	fn selection_policy_keys_on_id() {
		let keys: KeySet<String> = ["d2".to_string()].into_iter().collect();
		let rows = policy(ViewMode::Select).derive(&entries(), "", &keys);
		let picked: Vec<_> = rows.iter().filter(|row| row.selected).map(|row| row.item.id.as_str()).collect();
		assert_eq!(picked, ["d2"]);
	}
}
