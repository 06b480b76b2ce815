//! # Platform fakes
//!
//! Injectable accessors for ambient platform functions, together with deterministic
//! substitutes for tests:
//!
//! | contract        | real accessor          | substitutes                                   |
//! |-----------------|------------------------|-----------------------------------------------|
//! | [Clock]         | [SystemClock]          | [FixedClock], [TEST_CLOCK]                    |
//! | [Fetch]         | supplied by the caller | [FixedResponseFetch] fixtures, [timeout_fetch] |
//! | [ExitFn]        | [process_exit]         | [do_not_exit]                                 |
//! | [SetTimeout]    | [TokioTimer]           | [no_callback_timeout]                         |
//!
//! Code depending on a platform function takes the contract as a parameter, and tests pass
//! one of the substitutes:
//! ```rust
//! use platform_fakes::*;
//!
//! fn greeting(clock: &impl Clock) -> String {
//!     format!("Generated at {}", clock.now())
//! }
//!
//! assert_eq!(greeting(&TEST_CLOCK), "Generated at 1001-01-01T00:00:00.000Z");
//! ```
//!
//! [Ambient] bundles one accessor per contract and can be configured from the environment.

pub mod ambient;
pub mod clock;
pub mod exit;
pub mod fetch;
pub mod schema;
pub mod timer;

pub use ambient::{Ambient, AmbientConfig, AmbientError};
pub use clock::{
	Clock, FixedClock, SystemClock, TEST_CLOCK, TEST_DATE, Timestamp, fixed_clock, now_clock,
};
pub use exit::{
	ExitAttempt, ExitFn, catch_exit, catch_exit_silently, do_not_exit, process_exit,
};
pub use fetch::{
	Body, Fetch, FetchError, FetchResult, FixedResponseFetch, Headers, Request, RequestInit,
	RequestTarget, Response, ResponseFuture, ResponseInit, aggregate_error_fetch,
	bad_request_fetch, fixed_response_fetch, introspection_disabled_fetch, invalid_schema_fetch,
	malformed_json_fetch, not_found_fetch, server_error_fetch, timeout_fetch,
	unknown_content_type_fetch, unrecognized_payload_fetch,
};
pub use schema::{SchemaLoadError, SchemaSource, load_schema};
pub use timer::{
	NO_CALLBACK_TIMER_HANDLE, SetTimeout, TimerCallback, TimerHandle, TokioTimer,
	no_callback_timeout,
};
