//! Session-gated collection sources.
//!
//! Views over per-user data should only observe the store while a user is
//! signed in. [`SessionGate`] wraps any [`CollectionSource`] and follows a
//! [`SessionProvider`]: it holds the inner subscription while the session is
//! valid, releases it and publishes an empty collection when the session
//! ends or passes to another user, and subscribes again for the next user.

use std::sync::Arc;

use tokio::sync::watch;

use crate::source::{CollectionSource, Snapshot, SourceSink, SourceStream, SourceUpdate};

/// Validity of the current identity session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
	Invalid,
	Valid { user_id: String },
}

impl SessionState {
	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid { .. })
	}

	pub fn user_id(&self) -> Option<&str> {
		match self {
			Self::Valid { user_id } => Some(user_id),
			Self::Invalid => None,
		}
	}
}

/// Identity provider contract consumed by [`SessionGate`].
pub trait SessionProvider: Send + Sync {
	/// Returns the signed-in user, if any.
	fn current_user_id(&self) -> Option<String>;

	/// Returns a receiver that observes every validity change.
	fn watch(&self) -> watch::Receiver<SessionState>;
}

/// In-memory session provider.
#[derive(Debug, Clone)]
pub struct MemorySession {
	tx: Arc<watch::Sender<SessionState>>,
}

impl Default for MemorySession {
	fn default() -> Self {
		Self::new()
	}
}

impl MemorySession {
	/// Creates a provider with no signed-in user.
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(SessionState::Invalid);
		Self { tx: Arc::new(tx) }
	}

	pub fn sign_in(&self, user_id: impl Into<String>) {
		let user_id = user_id.into();
		tracing::debug!(%user_id, "session.valid");
		self.tx.send_replace(SessionState::Valid { user_id });
	}

	pub fn sign_out(&self) {
		tracing::debug!("session.invalid");
		self.tx.send_replace(SessionState::Invalid);
	}
}

impl SessionProvider for MemorySession {
	fn current_user_id(&self) -> Option<String> {
		self.tx.borrow().user_id().map(str::to_owned)
	}

	fn watch(&self) -> watch::Receiver<SessionState> {
		self.tx.subscribe()
	}
}

/// Collection source that only forwards snapshots while a session is valid.
pub struct SessionGate<S, P> {
	inner: Arc<S>,
	session: Arc<P>,
}

impl<S, P> Clone for SessionGate<S, P> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
			session: Arc::clone(&self.session),
		}
	}
}

impl<S, P> SessionGate<S, P> {
	pub fn new(inner: S, session: P) -> Self {
		Self {
			inner: Arc::new(inner),
			session: Arc::new(session),
		}
	}

	pub fn session(&self) -> &P {
		&self.session
	}
}

impl<T, S, P> CollectionSource<T> for SessionGate<S, P>
where
	T: Send + Sync + 'static,
	S: CollectionSource<T> + 'static,
	P: SessionProvider + 'static,
{
	/// Must be called from within a Tokio runtime; the gate runs as a task
	/// that ends when the returned stream is dropped.
	fn subscribe(&self) -> SourceStream<T> {
		let (sink, stream) = SourceStream::channel();
		let session = self.session.watch();
		crate::task::spawn("session.gate", forward(Arc::clone(&self.inner), session, sink));
		stream
	}
}

async fn forward<T, S>(inner: Arc<S>, mut session: watch::Receiver<SessionState>, sink: SourceSink<T>)
where
	S: CollectionSource<T> + ?Sized,
{
	let mut upstream: Option<SourceStream<T>> = None;
	let mut holder: Option<String> = None;
	loop {
		let user = session.borrow_and_update().user_id().map(str::to_owned);
		if user != holder {
			if upstream.take().is_some() {
				tracing::trace!(user = holder.as_deref(), "session.gate.release");
				let empty: Snapshot<T> = Arc::from(Vec::new());
				if !sink.push(empty) {
					return;
				}
			}
			if let Some(user) = &user {
				tracing::trace!(%user, "session.gate.subscribe");
				upstream = Some(inner.subscribe());
			}
			holder = user;
		}

		tokio::select! {
			biased;
			_ = sink.closed() => return,
			changed = session.changed() => {
				if changed.is_err() {
					return;
				}
			}
			update = next_update(&mut upstream) => match update {
				Some(Ok(snapshot)) => {
					if !sink.push(snapshot) {
						return;
					}
				}
				Some(Err(error)) => {
					sink.fail(error);
					return;
				}
				None => return,
			}
		}
	}
}

async fn next_update<T>(upstream: &mut Option<SourceStream<T>>) -> Option<SourceUpdate<T>> {
	match upstream {
		Some(stream) => stream.recv().await,
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::error::SourceError;
	use crate::source::MemoryStore;

	async fn recv_items(stream: &mut SourceStream<u32>) -> Vec<u32> {
		let update = tokio::time::timeout(Duration::from_secs(1), stream.recv())
			.await
			.expect("gate should forward an update");
		update.expect("stream open").expect("no source error").to_vec()
	}

	#[tokio::test]
	async fn nothing_flows_before_sign_in() {
		let store = MemoryStore::with_items([1, 2]);
		let session = MemorySession::new();
		let gate = SessionGate::new(store.clone(), session.clone());

		let mut stream = gate.subscribe();
		let waited = tokio::time::timeout(Duration::from_millis(20), stream.recv()).await;
		assert!(waited.is_err());
		assert_eq!(store.subscriber_count(), 0);

		session.sign_in("u1");
		assert_eq!(recv_items(&mut stream).await, vec![1, 2]);
		assert_eq!(gate.session().current_user_id().as_deref(), Some("u1"));
	}

	#[tokio::test]
	async fn sign_out_releases_and_clears() {
		let store = MemoryStore::with_items([1]);
		let session = MemorySession::new();
		session.sign_in("u1");
		let gate = SessionGate::new(store.clone(), session.clone());

		let mut stream = gate.subscribe();
		assert_eq!(recv_items(&mut stream).await, vec![1]);
		assert_eq!(store.subscriber_count(), 1);

		session.sign_out();
		assert_eq!(recv_items(&mut stream).await, Vec::<u32>::new());
		assert_eq!(store.subscriber_count(), 0);

		store.replace([5]);
		session.sign_in("u2");
		assert_eq!(recv_items(&mut stream).await, vec![5]);
	}

	#[tokio::test]
	async fn switching_users_resubscribes() {
		let store = MemoryStore::with_items([1]);
		let session = MemorySession::new();
		session.sign_in("u1");
		let gate = SessionGate::new(store.clone(), session.clone());

		let mut stream = gate.subscribe();
		assert_eq!(recv_items(&mut stream).await, vec![1]);

		store.replace([2]);
		assert_eq!(recv_items(&mut stream).await, vec![2]);

		session.sign_in("u2");
		assert_eq!(recv_items(&mut stream).await, Vec::<u32>::new());
		assert_eq!(recv_items(&mut stream).await, vec![2]);
		assert_eq!(store.subscriber_count(), 1);

		session.sign_in("u2");
		let waited = tokio::time::timeout(Duration::from_millis(20), stream.recv()).await;
		assert!(waited.is_err(), "same user keeps the subscription");
		assert_eq!(store.subscriber_count(), 1);
	}

	#[tokio::test]
	async fn upstream_failure_is_forwarded() {
		let store = MemoryStore::with_items([1]);
		let session = MemorySession::new();
		session.sign_in("u1");
		let gate = SessionGate::new(store.clone(), session);

		let mut stream = gate.subscribe();
		assert_eq!(recv_items(&mut stream).await, vec![1]);

		store.fail(SourceError::new("quota"));
		assert_eq!(stream.recv().await, Some(Err(SourceError::new("quota"))));
		assert_eq!(stream.recv().await, None);
	}

	#[tokio::test]
	async fn dropping_the_stream_stops_the_gate() {
		let store = MemoryStore::with_items([1]);
		let session = MemorySession::new();
		session.sign_in("u1");
		let gate = SessionGate::new(store.clone(), session);

		let mut stream = gate.subscribe();
		let _ = recv_items(&mut stream).await;
		drop(stream);

		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
		assert_eq!(store.subscriber_count(), 0);
	}
}
