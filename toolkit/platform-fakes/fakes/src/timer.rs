//! Timer scheduling accessors.
//!
//! The [SetTimeout] contract takes a callback and an optional delay and returns a handle
//! identifying the scheduled timer. Extra arguments for the callback are captured by the
//! boxed closure itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// Work scheduled by a timer
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled timer
pub type TimerHandle = u64;

/// Handle returned by [no_callback_timeout]
pub const NO_CALLBACK_TIMER_HANDLE: TimerHandle = 1;

/// The timer scheduling contract.
pub trait SetTimeout: Send + Sync {
	/// Schedules `callback` to run once after `delay`. A missing delay means zero.
	fn set_timeout(&self, callback: TimerCallback, delay: Option<Duration>) -> TimerHandle;
}

impl<F> SetTimeout for F
where
	F: Fn(TimerCallback, Option<Duration>) -> TimerHandle + Send + Sync,
{
	fn set_timeout(&self, callback: TimerCallback, delay: Option<Duration>) -> TimerHandle {
		self(callback, delay)
	}
}

/// Drops `callback` without running or scheduling it and returns [NO_CALLBACK_TIMER_HANDLE].
pub fn no_callback_timeout(_callback: TimerCallback, delay: Option<Duration>) -> TimerHandle {
	log::debug!("discarding timer callback scheduled after {delay:?}");
	NO_CALLBACK_TIMER_HANDLE
}

/// Timer running callbacks on a tokio runtime.
///
/// Handles are assigned in increasing order, starting at 1.
pub struct TokioTimer {
	runtime: Handle,
	next_handle: AtomicU64,
}

impl TokioTimer {
	pub fn new(runtime: Handle) -> Self {
		Self { runtime, next_handle: AtomicU64::new(1) }
	}

	/// Binds the timer to the runtime of the calling context, if there is one
	pub fn current() -> Option<Self> {
		Handle::try_current().ok().map(Self::new)
	}
}

impl SetTimeout for TokioTimer {
	fn set_timeout(&self, callback: TimerCallback, delay: Option<Duration>) -> TimerHandle {
		let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
		let delay = delay.unwrap_or_default();
		self.runtime.spawn(async move {
			tokio::time::sleep(delay).await;
			callback();
		});
		handle
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::AtomicBool;

	fn flag_callback(flag: &Arc<AtomicBool>) -> TimerCallback {
		let flag = flag.clone();
		Box::new(move || flag.store(true, Ordering::SeqCst))
	}

	#[test]
	fn no_callback_timeout_returns_fixed_handle_without_calling_back() {
		let called = Arc::new(AtomicBool::new(false));
		let handle = no_callback_timeout(flag_callback(&called), Some(Duration::from_millis(1000)));
		assert_eq!(handle, 1);
		assert_eq!(no_callback_timeout(flag_callback(&called), None), 1);
		std::thread::sleep(Duration::from_millis(20));
		assert!(!called.load(Ordering::SeqCst));
	}

	#[test]
	fn functions_are_timer_accessors() {
		let timer: Arc<dyn SetTimeout> = Arc::new(no_callback_timeout);
		assert_eq!(timer.set_timeout(Box::new(|| {}), None), NO_CALLBACK_TIMER_HANDLE);
	}

	#[tokio::test(start_paused = true)]
	async fn tokio_timer_runs_callback_after_delay() {
		let timer = TokioTimer::current().unwrap();
		let called = Arc::new(AtomicBool::new(false));

		let first = timer.set_timeout(flag_callback(&called), Some(Duration::from_secs(5)));
		let second = timer.set_timeout(Box::new(|| {}), None);
		assert_eq!((first, second), (1, 2));

		tokio::time::sleep(Duration::from_secs(4)).await;
		assert!(!called.load(Ordering::SeqCst));
		tokio::time::sleep(Duration::from_secs(2)).await;
		assert!(called.load(Ordering::SeqCst));
	}

	#[test]
	fn tokio_timer_needs_a_runtime() {
		assert!(TokioTimer::current().is_none());
	}
}
