use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::SourceError;

/// One full, ordered copy of a collection.
pub type Snapshot<T> = Arc<[T]>;

/// Item delivered by a [`SourceStream`].
pub type SourceUpdate<T> = Result<Snapshot<T>, SourceError>;

/// Push-based provider of collection snapshots.
///
/// Each subscription delivers the full collection every time the upstream
/// contents change. Consecutive identical snapshots are allowed. An `Err`
/// update is terminal for that subscription.
pub trait CollectionSource<T>: Send + Sync {
	/// Opens a new subscription. Dropping the stream releases it.
	fn subscribe(&self) -> SourceStream<T>;
}

impl<T, S> CollectionSource<T> for Arc<S>
where
	S: CollectionSource<T> + ?Sized,
{
	fn subscribe(&self) -> SourceStream<T> {
		(**self).subscribe()
	}
}

/// Receiving half of a collection subscription.
#[derive(Debug)]
pub struct SourceStream<T> {
	rx: mpsc::UnboundedReceiver<SourceUpdate<T>>,
}

impl<T> SourceStream<T> {
	/// Creates a connected sink/stream pair for source implementations.
	pub fn channel() -> (SourceSink<T>, SourceStream<T>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(SourceSink { tx }, SourceStream { rx })
	}

	/// Waits for the next update. `None` means the source ended cleanly.
	pub async fn recv(&mut self) -> Option<SourceUpdate<T>> {
		self.rx.recv().await
	}
}

/// Sending half of a collection subscription.
#[derive(Debug)]
pub struct SourceSink<T> {
	tx: mpsc::UnboundedSender<SourceUpdate<T>>,
}

impl<T> Clone for SourceSink<T> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<T> SourceSink<T> {
	/// Delivers a snapshot. Returns false once the subscriber is gone.
	pub fn push(&self, snapshot: Snapshot<T>) -> bool {
		self.tx.send(Ok(snapshot)).is_ok()
	}

	/// Delivers a terminal error. Returns false once the subscriber is gone.
	pub fn fail(&self, error: SourceError) -> bool {
		self.tx.send(Err(error)).is_ok()
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Resolves when the subscriber drops its stream.
	pub async fn closed(&self) {
		self.tx.closed().await;
	}
}

/// In-memory collection store.
///
/// New subscribers receive the current contents immediately (once any
/// contents exist), then every replacement.
pub struct MemoryStore<T> {
	inner: Arc<Mutex<StoreState<T>>>,
}

struct StoreState<T> {
	current: Option<Snapshot<T>>,
	sinks: Vec<SourceSink<T>>,
}

impl<T> StoreState<T> {
	fn publish(&mut self, snapshot: Snapshot<T>) {
		self.current = Some(Arc::clone(&snapshot));
		self.sinks.retain(|sink| sink.push(Arc::clone(&snapshot)));
		tracing::trace!(items = snapshot.len(), subscribers = self.sinks.len(), "store.replace");
	}
}

impl<T> Clone for MemoryStore<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for MemoryStore<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> MemoryStore<T> {
	/// Creates a store that has not loaded anything yet.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(StoreState {
				current: None,
				sinks: Vec::new(),
			})),
		}
	}

	/// Creates a store with initial contents.
	pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
		let store = Self::new();
		store.inner.lock().current = Some(items.into_iter().collect());
		store
	}

	/// Replaces the contents and publishes them to every live subscriber.
	pub fn replace(&self, items: impl IntoIterator<Item = T>) {
		self.inner.lock().publish(items.into_iter().collect());
	}

	/// Applies `f` to a copy of the current contents and publishes the result.
	///
	/// The read, the edit and the publish happen under one lock, so concurrent
	/// updates never lose each other's changes. `f` must not call back into
	/// the store.
	pub fn update(&self, f: impl FnOnce(&mut Vec<T>))
	where
		T: Clone,
	{
		let mut state = self.inner.lock();
		let mut items = state.current.as_deref().map(<[T]>::to_vec).unwrap_or_default();
		f(&mut items);
		state.publish(items.into());
	}

	/// Fails every live subscription. Later subscribers are unaffected.
	pub fn fail(&self, error: SourceError) {
		let sinks = std::mem::take(&mut self.inner.lock().sinks);
		tracing::debug!(%error, subscribers = sinks.len(), "store.fail");
		for sink in sinks {
			sink.fail(error.clone());
		}
	}

	/// Returns the current contents, if any were loaded.
	pub fn current(&self) -> Option<Snapshot<T>> {
		self.inner.lock().current.clone()
	}

	/// Returns the number of subscriptions whose stream is still alive.
	pub fn subscriber_count(&self) -> usize {
		let mut state = self.inner.lock();
		state.sinks.retain(|sink| !sink.is_closed());
		state.sinks.len()
	}
}

impl<T: Send + Sync> CollectionSource<T> for MemoryStore<T> {
	fn subscribe(&self) -> SourceStream<T> {
		let (sink, stream) = SourceStream::channel();
		let mut state = self.inner.lock();
		if let Some(current) = &state.current {
			sink.push(Arc::clone(current));
		}
		state.sinks.push(sink);
		stream
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn subscriber_gets_current_then_replacements() {
		let store = MemoryStore::with_items([1, 2]);
		let mut stream = store.subscribe();
		assert_eq!(stream.recv().await.unwrap().unwrap().to_vec(), vec![1, 2]);

		store.replace([3]);
		assert_eq!(stream.recv().await.unwrap().unwrap().to_vec(), vec![3]);
	}

	#[tokio::test]
	async fn empty_store_sends_nothing_until_loaded() {
		let store = MemoryStore::<u8>::new();
		let mut stream = store.subscribe();
		let waited = tokio::time::timeout(std::time::Duration::from_millis(10), stream.recv()).await;
		assert!(waited.is_err());

		store.replace([9]);
		assert_eq!(stream.recv().await.unwrap().unwrap().to_vec(), vec![9]);
	}

	#[tokio::test]
	async fn update_edits_a_copy_of_current() {
		let store = MemoryStore::with_items(["a", "b"]);
		let mut stream = store.subscribe();
		let _ = stream.recv().await;

		store.update(|items| items.retain(|item| *item != "a"));
		assert_eq!(stream.recv().await.unwrap().unwrap().to_vec(), vec!["b"]);
	}

	#[test]
	fn dropped_streams_release_their_subscription() {
		let store = MemoryStore::with_items([1]);
		let a = store.subscribe();
		let _b = store.subscribe();
		assert_eq!(store.subscriber_count(), 2);
		drop(a);
		assert_eq!(store.subscriber_count(), 1);
	}

	#[test]
	fn concurrent_updates_keep_every_edit() {
		let store = MemoryStore::<u32>::with_items([]);
		std::thread::scope(|scope| {
			for worker in 0..8u32 {
				let store = store.clone();
				scope.spawn(move || {
					for i in 0..100 {
						store.update(|items| items.push(worker * 1000 + i));
					}
				});
			}
		});
		assert_eq!(store.current().map(|items| items.len()), Some(800));
	}

	#[tokio::test]
	async fn fail_is_terminal_for_live_subscribers() {
		let store = MemoryStore::with_items([1]);
		let mut stream = store.subscribe();
		let _ = stream.recv().await;

		store.fail(SourceError::new("offline"));
		assert_eq!(stream.recv().await, Some(Err(SourceError::new("offline"))));
		assert_eq!(stream.recv().await, None);
		assert_eq!(store.subscriber_count(), 0);
	}
}
