use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Creates a replay slot with no value yet.
pub fn channel<T: Clone>() -> (Publisher<T>, ReplayCell<T>) {
	slot(None)
}

/// Creates a replay slot seeded with `initial`.
pub fn seeded<T: Clone>(initial: T) -> (Publisher<T>, ReplayCell<T>) {
	slot(Some(initial))
}

fn slot<T: Clone>(latest: Option<T>) -> (Publisher<T>, ReplayCell<T>) {
	let shared = Arc::new(Mutex::new(Shared {
		latest,
		subscribers: Vec::new(),
		closed: false,
	}));
	(
		Publisher {
			shared: Arc::clone(&shared),
		},
		ReplayCell { shared },
	)
}

/// Latest value plus the queue of every live subscriber.
///
/// Publishing and subscribing both hold the lock, so a new subscriber sees
/// each value exactly once: either as its replayed head or through its queue.
struct Shared<T> {
	latest: Option<T>,
	subscribers: Vec<mpsc::UnboundedSender<T>>,
	closed: bool,
}

impl<T: Clone> Shared<T> {
	fn subscribe(shared: &Arc<Mutex<Self>>) -> Replay<T> {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = shared.lock();
		let head = state.latest.clone();
		if !state.closed {
			state.subscribers.push(tx);
		}
		Replay {
			shared: Arc::clone(shared),
			head,
			rx,
		}
	}
}

/// Write side of a replay slot.
///
/// Dropping the publisher closes the slot. Subscribers drain what was
/// already queued for them and then observe the end of the stream.
pub struct Publisher<T> {
	shared: Arc<Mutex<Shared<T>>>,
}

impl<T: Clone> Publisher<T> {
	/// Stores `value` as the latest and queues it for every subscriber.
	pub fn publish(&self, value: T) {
		let mut state = self.shared.lock();
		state.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
		state.latest = Some(value);
	}

	/// Returns the number of live subscriptions.
	pub fn subscriber_count(&self) -> usize {
		let mut state = self.shared.lock();
		state.subscribers.retain(|tx| !tx.is_closed());
		state.subscribers.len()
	}
}

impl<T> Drop for Publisher<T> {
	fn drop(&mut self) {
		let mut state = self.shared.lock();
		state.closed = true;
		state.subscribers.clear();
	}
}

impl<T> fmt::Debug for Publisher<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Publisher").finish_non_exhaustive()
	}
}

/// Read-only handle to a replay slot.
///
/// Holding a cell does not queue anything; call [`subscribe`](Self::subscribe)
/// to receive values.
pub struct ReplayCell<T> {
	shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for ReplayCell<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T: Clone> ReplayCell<T> {
	/// Opens a subscription that starts from the latest value.
	pub fn subscribe(&self) -> Replay<T> {
		Shared::subscribe(&self.shared)
	}

	pub fn latest(&self) -> Option<T> {
		self.shared.lock().latest.clone()
	}
}

/// One subscription to a replay slot.
///
/// A fresh subscription (including one made by `clone`) yields the latest
/// value from its first [`next`](Self::next) call, then every later value in
/// publish order.
pub struct Replay<T> {
	shared: Arc<Mutex<Shared<T>>>,
	head: Option<T>,
	rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Clone> Clone for Replay<T> {
	fn clone(&self) -> Self {
		Shared::subscribe(&self.shared)
	}
}

impl<T> fmt::Debug for Replay<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Replay").field("queued", &self.rx.len()).finish_non_exhaustive()
	}
}

impl<T: Clone> Replay<T> {
	/// Returns the latest published value without waiting.
	///
	/// This reads the slot, not this subscription's position in the queue.
	pub fn latest(&self) -> Option<T> {
		self.shared.lock().latest.clone()
	}

	/// Waits for the next value this subscription has not yielded yet.
	///
	/// Returns `None` once the publisher is gone and the queue is drained.
	pub async fn next(&mut self) -> Option<T> {
		if let Some(head) = self.head.take() {
			return Some(head);
		}
		self.rx.recv().await
	}

	/// Projects every value through `f`, reading the same slot.
	pub fn map<U>(self, f: fn(&T) -> U) -> Mapped<T, U> {
		Mapped { inner: self, f }
	}
}

impl<T> Replay<T> {
	/// Returns true when the publisher has been dropped.
	pub fn is_closed(&self) -> bool {
		self.shared.lock().closed
	}
}

/// A [`Replay`] seen through a projection.
///
/// `latest` and `next` derive from the source slot, so a projection can never
/// disagree with the value it was computed from.
pub struct Mapped<T, U> {
	inner: Replay<T>,
	f: fn(&T) -> U,
}

impl<T: Clone, U> Mapped<T, U> {
	pub fn latest(&self) -> Option<U> {
		self.inner.latest().map(|value| (self.f)(&value))
	}

	pub async fn next(&mut self) -> Option<U> {
		let value = self.inner.next().await?;
		Some((self.f)(&value))
	}

	pub fn is_closed(&self) -> bool {
		self.inner.is_closed()
	}
}

impl<T: Clone, U> Clone for Mapped<T, U> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			f: self.f,
		}
	}
}
