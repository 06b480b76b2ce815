//! Process exit accessors.
//!
//! The exit contract is [ExitFn]: it takes an exit code and never returns.
//! [process_exit] terminates the process, [do_not_exit] panics instead so that
//! test harnesses keep control and can assert on the attempted exit.

use std::any::Any;
use std::panic::{UnwindSafe, catch_unwind, resume_unwind, set_hook, take_hook};

/// The exit contract
pub type ExitFn = fn(i32) -> !;

const EXIT_MESSAGE_PREFIX: &str = "Exit function was called with code ";

/// An intercepted call of [do_not_exit]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Exit function was called with code {code}")]
pub struct ExitAttempt {
	pub code: i32,
}

impl ExitAttempt {
	fn from_panic_payload(payload: &(dyn Any + Send)) -> Option<Self> {
		let message = payload
			.downcast_ref::<String>()
			.map(String::as_str)
			.or_else(|| payload.downcast_ref::<&str>().copied())?;
		let code = message.strip_prefix(EXIT_MESSAGE_PREFIX)?.parse().ok()?;
		Some(Self { code })
	}
}

/// Terminates the current process with `code`.
pub fn process_exit(code: i32) -> ! {
	log::info!("exiting with code {code}");
	std::process::exit(code)
}

/// Panics with `Exit function was called with code {code}` instead of terminating.
pub fn do_not_exit(code: i32) -> ! {
	log::warn!("intercepted exit with code {code}");
	panic!("{}", ExitAttempt { code })
}

/// Runs `f`, turning a [do_not_exit] call inside it into `Err(ExitAttempt)`.
///
/// Panics unrelated to exit attempts are resumed.
pub fn catch_exit<R>(f: impl FnOnce() -> R + UnwindSafe) -> Result<R, ExitAttempt> {
	catch_unwind(f).map_err(|payload| {
		let attempt = ExitAttempt::from_panic_payload(&*payload);
		attempt.unwrap_or_else(|| resume_unwind(payload))
	})
}

/// Like [catch_exit], but without reporting the intercepted panic through the panic hook.
///
/// The hook installed before the call is reinstated afterwards.
pub fn catch_exit_silently<R>(f: impl FnOnce() -> R + UnwindSafe) -> Result<R, ExitAttempt> {
	let previous_hook = take_hook();
	set_hook(Box::new(|_| {}));
	let result = catch_unwind(f);
	set_hook(previous_hook);
	result.map_err(|payload| {
		let attempt = ExitAttempt::from_panic_payload(&*payload);
		attempt.unwrap_or_else(|| resume_unwind(payload))
	})
}
