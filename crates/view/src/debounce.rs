use std::time::Duration;

use tokio::time::Instant;

// Roughly 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Lower-cases raw search input.
///
/// No trimming is applied; `" Temp"` normalizes to `" temp"`.
pub fn normalize(raw: &str) -> String {
	raw.to_lowercase()
}

/// Resettable deadline over the most recent raw search input.
///
/// Each [`push`](Self::push) replaces the pending value and moves the
/// deadline to `now + window`, so a burst of inputs settles exactly once, on
/// its trailing value.
#[derive(Debug)]
pub struct Debouncer {
	window: Duration,
	pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
	raw: String,
	deadline: Instant,
}

impl Debouncer {
	pub fn new(window: Duration) -> Self {
		Self { window, pending: None }
	}

	pub fn window(&self) -> Duration {
		self.window
	}

	/// Records a raw input, cancelling any pending emission.
	///
	/// A window too large to represent as an instant never settles.
	pub fn push(&mut self, raw: impl Into<String>) {
		let now = Instant::now();
		let deadline = now.checked_add(self.window).unwrap_or_else(|| now + FAR_FUTURE);
		self.pending = Some(Pending { raw: raw.into(), deadline });
	}

	pub fn is_pending(&self) -> bool {
		self.pending.is_some()
	}

	/// Resolves once the pending deadline has passed.
	///
	/// Never resolves while nothing is pending. Cancel-safe: dropping the
	/// future leaves the pending value in place.
	pub async fn elapsed(&self) {
		match &self.pending {
			Some(pending) => tokio::time::sleep_until(pending.deadline).await,
			None => std::future::pending().await,
		}
	}

	/// Takes the settled value, normalized, if its deadline has passed.
	pub fn take(&mut self) -> Option<String> {
		let due = self.pending.as_ref().is_some_and(|pending| pending.deadline <= Instant::now());
		if !due {
			return None;
		}
		self.pending.take().map(|pending| normalize(&pending.raw))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const WINDOW: Duration = Duration::from_millis(200);

	#[test]
	fn normalize_only_folds_case() {
		assert_eq!(normalize("Sensor-1"), "sensor-1");
		assert_eq!(normalize("  MiXed "), "  mixed ");
	}

	#[tokio::test(start_paused = true)]
	async fn burst_collapses_to_trailing_value() {
		let mut debouncer = Debouncer::new(WINDOW);
		debouncer.push("a");
		tokio::time::sleep(Duration::from_millis(50)).await;
		debouncer.push("aB");
		tokio::time::sleep(Duration::from_millis(50)).await;
		debouncer.push("ABC");

		assert_eq!(debouncer.take(), None);
		debouncer.elapsed().await;
		assert_eq!(debouncer.take().as_deref(), Some("abc"));
		assert!(!debouncer.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_restarts_on_every_push() {
		let mut debouncer = Debouncer::new(WINDOW);
		let start = Instant::now();
		debouncer.push("a");
		tokio::time::sleep(Duration::from_millis(150)).await;
		debouncer.push("ab");
		debouncer.elapsed().await;
		let waited = start.elapsed();
		assert!(waited >= Duration::from_millis(350) && waited < Duration::from_millis(400), "waited {waited:?}");
		assert_eq!(debouncer.take().as_deref(), Some("ab"));
	}

	#[tokio::test(start_paused = true)]
	async fn unrepresentable_window_stays_pending() {
		let mut debouncer = Debouncer::new(Duration::MAX);
		debouncer.push("a");
		let waited = tokio::time::timeout(Duration::from_secs(3600), debouncer.elapsed()).await;
		assert!(waited.is_err());
		assert_eq!(debouncer.take(), None);
		assert!(debouncer.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn idle_debouncer_never_elapses() {
		let debouncer = Debouncer::new(WINDOW);
		let waited = tokio::time::timeout(Duration::from_secs(5), debouncer.elapsed()).await;
		assert!(waited.is_err());
	}
}
