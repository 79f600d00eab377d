//! Filter composition engine.
//!
//! One engine owns one task. The task folds toggle events into the active
//! key set, settles search input through a [`Debouncer`] and keeps the latest
//! collection snapshot. Whenever any of the three changes (and a snapshot is
//! present) it derives a new [`DerivedView`] and publishes it. The row count
//! is a projection of the view slot, not a second channel. Because every
//! input is handled on the same task, each view reflects one consistent
//! combination of inputs and views are totally ordered by revision.

use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::error::{EngineError, SourceError};
use crate::replay::{self, Mapped, Publisher, Replay, ReplayCell};
use crate::source::{CollectionSource, Snapshot, SourceStream};
use crate::toggle::{InitialKeys, KeySet, ToggleEvent, ToggleReducer};
use crate::view::{DerivedView, ViewPolicy};


/// Lifecycle of an engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
	/// Running, no collection snapshot received yet.
	Waiting,
	/// Running and publishing views.
	Live,
	/// The source ended cleanly; the last view stays available.
	Completed,
	/// The source failed; the last view stays available.
	Failed(SourceError),
	/// The engine was disposed by its owner.
	Disposed,
}

impl EngineStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed(_) | Self::Disposed)
	}
}

/// Result of feeding one input into an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
	/// The input was queued and will be applied in arrival order.
	Accepted,
	/// The engine is disposed or finished; the input was dropped.
	Ignored,
}

enum Input<K> {
	Toggle(ToggleEvent<K>),
	Search(String),
}

/// Builder for a [`ViewEngine`].
///
/// The initial key policy is a required argument: filter views and
/// selection views start from different sets and must say which they use.
pub struct EngineBuilder<T, K> {
	policy: ViewPolicy<T, K>,
	initial: InitialKeys<K>,
	universe: Vec<K>,
	config: EngineConfig,
}

impl<T, K> EngineBuilder<T, K>
where
	T: Clone + Send + Sync + 'static,
	K: Eq + Hash + Clone + Send + Sync + 'static,
{
	pub fn new(policy: ViewPolicy<T, K>, initial: InitialKeys<K>) -> Self {
		Self {
			policy,
			initial,
			universe: Vec::new(),
			config: EngineConfig::default(),
		}
	}

	/// Sets the key universe used by [`InitialKeys::All`] and `SelectAll`.
	#[must_use]
	pub fn universe(mut self, keys: impl IntoIterator<Item = K>) -> Self {
		self.universe = keys.into_iter().collect();
		self
	}

	#[must_use]
	pub fn config(mut self, config: EngineConfig) -> Self {
		self.config = config;
		self
	}

	/// Overrides the search quiescence window.
	#[must_use]
	pub fn quiescence(mut self, window: Duration) -> Self {
		self.config.quiescence_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
		self
	}

	/// Subscribes to `source` and starts the engine task.
	///
	/// Must be called from within a Tokio runtime. The initial key set and
	/// the empty search token are readable immediately; the first view is
	/// published once the source delivers its first snapshot.
	pub fn spawn<S>(self, source: &S) -> ViewEngine<T, K>
	where
		S: CollectionSource<T> + ?Sized,
	{
		let reducer = ToggleReducer::new(self.universe, self.initial);
		let (view_tx, view) = replay::channel();
		let (keys_tx, keys) = replay::seeded(reducer.current().clone());
		let (search_tx, search) = replay::seeded(String::new());
		let (status_tx, status) = replay::seeded(EngineStatus::Waiting);
		let (input_tx, input_rx) = mpsc::unbounded_channel();
		let cancel = CancellationToken::new();

		tracing::debug!(
			mode = ?self.policy.mode(),
			active = reducer.current().len(),
			quiescence_ms = self.config.quiescence_ms,
			"engine.spawn"
		);

		let task = EngineTask {
			policy: self.policy,
			reducer,
			debouncer: Debouncer::new(self.config.quiescence()),
			token: String::new(),
			collection: None,
			revision: 0,
			inputs: input_rx,
			source: source.subscribe(),
			cancel: cancel.clone(),
			outputs: Outputs {
				view: view_tx,
				keys: keys_tx,
				search: search_tx,
				status: status_tx,
			},
		};
		let handle = crate::task::spawn("view.engine", task.run());

		ViewEngine {
			input: input_tx,
			cancel,
			task: Mutex::new(Some(handle)),
			view,
			keys,
			search,
			status,
		}
	}
}

/// Handle to a running filter composition engine.
///
/// Dropping the handle disposes the engine.
pub struct ViewEngine<T, K> {
	input: mpsc::UnboundedSender<Input<K>>,
	cancel: CancellationToken,
	task: Mutex<Option<JoinHandle<Result<(), EngineError>>>>,
	view: ReplayCell<DerivedView<T>>,
	keys: ReplayCell<KeySet<K>>,
	search: ReplayCell<String>,
	status: ReplayCell<EngineStatus>,
}

impl<T, K> ViewEngine<T, K>
where
	T: Clone,
	K: Eq + Hash + Clone,
{
	/// Feeds one toggle event.
	pub fn send(&self, event: ToggleEvent<K>) -> InputOutcome {
		self.enqueue(Input::Toggle(event))
	}

	pub fn toggle(&self, key: K) -> InputOutcome {
		self.send(ToggleEvent::Toggle(key))
	}

	pub fn set(&self, key: K, active: bool) -> InputOutcome {
		self.send(ToggleEvent::Set { key, active })
	}

	pub fn select_all(&self) -> InputOutcome {
		self.send(ToggleEvent::SelectAll)
	}

	pub fn clear_all(&self) -> InputOutcome {
		self.send(ToggleEvent::ClearAll)
	}

	/// Feeds raw search text; it settles after the quiescence window.
	pub fn set_search(&self, text: impl Into<String>) -> InputOutcome {
		self.enqueue(Input::Search(text.into()))
	}

	fn enqueue(&self, input: Input<K>) -> InputOutcome {
		if self.cancel.is_cancelled() {
			tracing::trace!("engine.input.ignored");
			return InputOutcome::Ignored;
		}
		match self.input.send(input) {
			Ok(()) => InputOutcome::Accepted,
			Err(_) => {
				tracing::trace!("engine.input.closed");
				InputOutcome::Ignored
			}
		}
	}

	/// Subscribes to derived views. Every revision published after the
	/// latest one is delivered in order.
	pub fn view(&self) -> Replay<DerivedView<T>> {
		self.view.subscribe()
	}

	/// Subscribes to the row count of the derived view.
	///
	/// The count is read from the view slot itself, so it always equals the
	/// length of the latest view.
	pub fn count(&self) -> Mapped<DerivedView<T>, usize> {
		self.view.subscribe().map(DerivedView::len)
	}

	/// Subscribes to active key set snapshots.
	pub fn active_keys(&self) -> Replay<KeySet<K>> {
		self.keys.subscribe()
	}

	/// Subscribes to settled, normalized search tokens.
	pub fn search_token(&self) -> Replay<String> {
		self.search.subscribe()
	}

	pub fn status(&self) -> Replay<EngineStatus> {
		self.status.subscribe()
	}
}

impl<T, K> ViewEngine<T, K> {
	/// Requests disposal without waiting for the task to stop.
	///
	/// Inputs sent after this call are ignored, queued inputs are dropped
	/// and no further view is published.
	pub fn dispose(&self) {
		if !self.cancel.is_cancelled() {
			tracing::debug!("engine.dispose");
		}
		self.cancel.cancel();
	}

	pub fn is_disposed(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Disposes the engine and waits for its task to stop.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		self.dispose();
		self.join().await
	}

	/// Waits for the engine task to stop on its own.
	///
	/// Returns the source error when the engine stopped because its source
	/// failed. Only the first caller observes the task; later callers get
	/// the outcome recorded in [`status`](Self::status).
	pub async fn join(&self) -> Result<(), EngineError> {
		let handle = self.task.lock().take();
		match handle {
			Some(handle) => match handle.await {
				Ok(result) => result,
				Err(err) => Err(EngineError::Join(crate::task::join_error_message(err))),
			},
			None => match self.status.latest() {
				Some(EngineStatus::Failed(error)) => Err(EngineError::Source(error)),
				_ => Ok(()),
			},
		}
	}
}

impl<T, K> Drop for ViewEngine<T, K> {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

struct Outputs<T, K> {
	view: Publisher<DerivedView<T>>,
	keys: Publisher<KeySet<K>>,
	search: Publisher<String>,
	status: Publisher<EngineStatus>,
}

struct EngineTask<T, K> {
	policy: ViewPolicy<T, K>,
	reducer: ToggleReducer<K>,
	debouncer: Debouncer,
	token: String,
	collection: Option<Snapshot<T>>,
	revision: u64,
	inputs: mpsc::UnboundedReceiver<Input<K>>,
	source: SourceStream<T>,
	cancel: CancellationToken,
	outputs: Outputs<T, K>,
}

impl<T, K> EngineTask<T, K>
where
	T: Clone + Send + Sync + 'static,
	K: Eq + Hash + Clone + Send + Sync + 'static,
{
	async fn run(mut self) -> Result<(), EngineError> {
		loop {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => {
					self.finish(EngineStatus::Disposed);
					return Ok(());
				}
				input = self.inputs.recv() => match input {
					Some(Input::Toggle(event)) => self.on_toggle(event),
					Some(Input::Search(raw)) => self.debouncer.push(raw),
					None => {
						self.finish(EngineStatus::Disposed);
						return Ok(());
					}
				},
				() = self.debouncer.elapsed(), if self.debouncer.is_pending() => self.on_search_settled(),
				update = self.source.recv() => match update {
					Some(Ok(snapshot)) => self.on_snapshot(snapshot),
					Some(Err(error)) => {
						tracing::warn!(%error, revision = self.revision, "engine.source.failed");
						self.finish(EngineStatus::Failed(error.clone()));
						return Err(EngineError::Source(error));
					}
					None => {
						tracing::debug!(revision = self.revision, "engine.source.completed");
						self.finish(EngineStatus::Completed);
						return Ok(());
					}
				},
			}
		}
	}

	fn on_toggle(&mut self, event: ToggleEvent<K>) {
		if self.cancel.is_cancelled() {
			return;
		}
		let keys = self.reducer.apply(event);
		tracing::trace!(active = keys.len(), "engine.keys");
		self.outputs.keys.publish(keys);
		self.recompute("keys");
	}

	fn on_search_settled(&mut self) {
		let Some(token) = self.debouncer.take() else {
			return;
		};
		if self.cancel.is_cancelled() {
			return;
		}
		tracing::trace!(%token, "engine.search");
		self.token = token.clone();
		self.outputs.search.publish(token);
		self.recompute("search");
	}

	fn on_snapshot(&mut self, snapshot: Snapshot<T>) {
		if self.cancel.is_cancelled() {
			return;
		}
		if self.collection.is_none() {
			self.outputs.status.publish(EngineStatus::Live);
		}
		self.collection = Some(snapshot);
		self.recompute("collection");
	}

	fn recompute(&mut self, cause: &'static str) {
		if self.cancel.is_cancelled() {
			return;
		}
		let Some(items) = self.collection.as_deref() else {
			return;
		};
		let rows = self.policy.derive(items, &self.token, self.reducer.current());
		self.revision += 1;
		let view = DerivedView::new(self.revision, rows);
		tracing::debug!(cause, revision = self.revision, rows = view.len(), total = items.len(), "engine.recompute");
		self.outputs.view.publish(view);
	}

	fn finish(&self, status: EngineStatus) {
		tracing::debug!(?status, revision = self.revision, "engine.finish");
		self.outputs.status.publish(status);
	}
}
