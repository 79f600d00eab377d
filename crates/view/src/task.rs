use std::future::Future;

use tokio::task::JoinError;
use tokio::task::JoinHandle;

/// Spawns one named engine-side task on the current runtime.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn<F>(name: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(task = name, "sieve.spawn");
	tokio::spawn(fut)
}

/// Renders a join failure for error reporting.
pub(crate) fn join_error_message(err: JoinError) -> String {
	if err.is_cancelled() {
		return "task was cancelled".to_string();
	}
	let payload = err.into_panic();
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return (*msg).to_string();
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return msg.clone();
	}
	"task panicked".to_string()
}
