//! Command line runner for the platform fakes.
//!
//! Runs the clock, fetch, exit and timer accessors and prints what callers would observe.

use clap::Parser;
use platform_fakes::*;
use serde_json::{Map, Value, json};
use std::time::Duration;

#[tokio::main]
async fn main() {
	env_logger::builder().filter_level(log::LevelFilter::Info).init();
	match Command::parse().run().await {
		Ok(output) => println!("{output}"),
		Err(err) => {
			log::error!("{err:#}");
			process_exit(1)
		},
	}
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Scenario {
	NotFound,
	BadRequest,
	ServerError,
	MalformedJson,
	UnknownContentType,
	AggregateError,
	IntrospectionDisabled,
	InvalidSchema,
	UnrecognizedPayload,
	Timeout,
}

impl Scenario {
	fn accessor(self) -> Box<dyn Fetch> {
		match self {
			Scenario::NotFound => Box::new(not_found_fetch()),
			Scenario::BadRequest => Box::new(bad_request_fetch()),
			Scenario::ServerError => Box::new(server_error_fetch()),
			Scenario::MalformedJson => Box::new(malformed_json_fetch()),
			Scenario::UnknownContentType => Box::new(unknown_content_type_fetch()),
			Scenario::AggregateError => Box::new(aggregate_error_fetch()),
			Scenario::IntrospectionDisabled => Box::new(introspection_disabled_fetch()),
			Scenario::InvalidSchema => Box::new(invalid_schema_fetch()),
			Scenario::UnrecognizedPayload => Box::new(unrecognized_payload_fetch()),
			Scenario::Timeout => Box::new(timeout_fetch),
		}
	}
}

#[derive(Debug, clap::Parser)]
#[command(name = "platform-fakes", about = "Runs platform accessors and their fakes")]
enum Command {
	/// Prints the time read from the system clock
	Now,
	/// Prints the time returned by a clock fixed at DATE
	FixedClock { date: String },
	/// Prints status, headers and body answered by a fetch fixture
	Fetch {
		#[arg(value_enum)]
		scenario: Scenario,
		#[arg(long, default_value = "http://localhost:4000/graphql")]
		url: String,
	},
	/// Loads a GraphQL schema through a fetch fixture
	LoadSchema {
		#[arg(value_enum)]
		scenario: Scenario,
		#[arg(long, default_value = "http://localhost:4000/graphql")]
		url: String,
	},
	/// Calls the exit accessor that does not terminate the process
	Exit { code: i32 },
	/// Schedules a callback with the timer that never calls back
	SetTimeout { delay_ms: Option<u64> },
}

impl Command {
	async fn run(self) -> anyhow::Result<String> {
		match self {
			Command::Now => Ok(now_clock().now().to_string()),
			Command::FixedClock { date } => Ok(fixed_clock(&date).now().to_string()),
			Command::Fetch { scenario, url } => {
				describe_fetch(scenario.accessor().as_ref(), &url).await
			},
			Command::LoadSchema { scenario, url } => {
				match load_schema(scenario.accessor().as_ref(), &url).await {
					Ok(SchemaSource::Introspection(schema)) => {
						Ok(serde_json::to_string_pretty(&json!({ "introspection": schema }))?)
					},
					Ok(SchemaSource::Sdl(sdl)) => Ok(sdl),
					Err(err) => Ok(format!("schema loading failed: {err}")),
				}
			},
			Command::Exit { code } => {
				let attempt = catch_exit_silently(|| {
					do_not_exit(code);
				});
				match attempt {
					Err(attempt) => Ok(attempt.to_string()),
					Ok(()) => Err(anyhow::anyhow!("exit accessor returned")),
				}
			},
			Command::SetTimeout { delay_ms } => {
				let handle = no_callback_timeout(
					Box::new(|| log::error!("timer callback must not run")),
					delay_ms.map(Duration::from_millis),
				);
				Ok(handle.to_string())
			},
		}
	}
}

async fn describe_fetch(fetch: &dyn Fetch, url: &str) -> anyhow::Result<String> {
	let pending = match fetch.fetch(url.into(), None) {
		Ok(pending) => pending,
		Err(err) => return Ok(format!("fetch failed before sending: {err}")),
	};
	let response = pending.await?;
	let headers: Map<String, Value> = response
		.headers()
		.iter()
		.map(|(name, value)| (name.to_string(), Value::String(value)))
		.collect();
	let description = json!({
		"ok": response.ok(),
		"status": response.status().as_u16(),
		"headers": headers,
		"body": response.text().await?,
	});
	Ok(serde_json::to_string_pretty(&description)?)
}

