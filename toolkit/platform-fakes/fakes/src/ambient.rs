//! Wiring of one accessor per contract, for tests or from environment configuration.

use crate::{
	clock::{Clock, SystemClock, TEST_CLOCK, Timestamp, fixed_clock},
	exit::{ExitFn, do_not_exit, process_exit},
	fetch::{Fetch, timeout_fetch},
	timer::{SetTimeout, TokioTimer, no_callback_timeout},
};
use figment::{Figment, providers::Env};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AmbientError {
	#[error("Could not read ambient configuration: {0}")]
	Config(#[from] figment::Error),
	#[error("Fixed date '{0}' is not a valid date")]
	InvalidFixedDate(String),
	#[error("Timers need a tokio runtime, set AMBIENT__DISABLE_TIMERS=true to run without one")]
	NoRuntime,
}

/// Selects the accessors wired by [Ambient::from_config]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmbientConfig {
	/// Date returned by the clock. The system clock is used when absent.
	#[serde(default)]
	pub fixed_date: Option<String>,
	/// Intercept exits with [do_not_exit] instead of terminating the process
	#[serde(default)]
	pub simulate_exit: bool,
	/// Discard timer callbacks with [no_callback_timeout]
	#[serde(default)]
	pub disable_timers: bool,
}

impl AmbientConfig {
	/// Reads the configuration from environment variables
	///
	/// Environment variables:
	/// - `AMBIENT__FIXED_DATE`
	/// - `AMBIENT__SIMULATE_EXIT`
	/// - `AMBIENT__DISABLE_TIMERS`
	pub fn read_from_env() -> figment::error::Result<Self> {
		Figment::new().merge(Env::prefixed("AMBIENT__")).extract()
	}
}

/// One accessor per platform contract
#[derive(Clone)]
pub struct Ambient {
	pub clock: Arc<dyn Clock>,
	pub fetch: Arc<dyn Fetch>,
	pub exit: ExitFn,
	pub set_timeout: Arc<dyn SetTimeout>,
}

impl Ambient {
	/// Deterministic accessors for tests: [TEST_CLOCK], [timeout_fetch], [do_not_exit]
	/// and [no_callback_timeout].
	pub fn testing() -> Self {
		Self {
			clock: Arc::new(TEST_CLOCK),
			fetch: Arc::new(timeout_fetch),
			exit: do_not_exit,
			set_timeout: Arc::new(no_callback_timeout),
		}
	}

	/// Wires accessors according to `config`. Fetching is always provided by the caller.
	///
	/// Real timers are bound to the tokio runtime of the calling context.
	pub fn from_config(
		config: &AmbientConfig,
		fetch: Arc<dyn Fetch>,
	) -> Result<Self, AmbientError> {
		let clock: Arc<dyn Clock> = match &config.fixed_date {
			Some(date) if !Timestamp::parse(date).is_valid() => {
				return Err(AmbientError::InvalidFixedDate(date.clone()));
			},
			Some(date) => Arc::new(fixed_clock(date)),
			None => Arc::new(SystemClock),
		};
		let exit: ExitFn = if config.simulate_exit { do_not_exit } else { process_exit };
		let set_timeout: Arc<dyn SetTimeout> = if config.disable_timers {
			Arc::new(no_callback_timeout)
		} else {
			Arc::new(TokioTimer::current().ok_or(AmbientError::NoRuntime)?)
		};
		log::info!(
			"ambient accessors: fixed date {:?}, simulate exit {}, timers disabled {}",
			config.fixed_date,
			config.simulate_exit,
			config.disable_timers
		);
		Ok(Self { clock, fetch, exit, set_timeout })
	}

	/// Reads [AmbientConfig] from the environment and wires accessors accordingly
	pub fn from_env(fetch: Arc<dyn Fetch>) -> Result<Self, AmbientError> {
		Self::from_config(&AmbientConfig::read_from_env()?, fetch)
	}

	pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
		Self { clock: Arc::new(clock), ..self }
	}

	pub fn with_fetch(self, fetch: impl Fetch + 'static) -> Self {
		Self { fetch: Arc::new(fetch), ..self }
	}

	pub fn with_exit(self, exit: ExitFn) -> Self {
		Self { exit, ..self }
	}

	pub fn with_set_timeout(self, set_timeout: impl SetTimeout + 'static) -> Self {
		Self { set_timeout: Arc::new(set_timeout), ..self }
	}
}
