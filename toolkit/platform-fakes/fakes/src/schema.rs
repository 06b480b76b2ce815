//! GraphQL schema loading on top of the [Fetch] contract.
//!
//! [load_schema] is the caller the fetch fixtures are designed for: every fixture in
//! [crate::fetch] maps onto one [SchemaLoadError] variant.

use crate::fetch::{Fetch, FetchError, Headers, Request, RequestInit, Response};
use http::{HeaderValue, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;

pub const INTROSPECTION_QUERY: &str =
	"query IntrospectionQuery { __schema { queryType { name } types { kind name } } }";

const JSON_CONTENT_TYPES: [&str; 2] = ["application/json", "application/graphql-response+json"];

/// Phrases servers use when rejecting introspection queries
const INTROSPECTION_DISABLED_PHRASES: [&str; 3] = [
	"introspection is not allowed",
	"introspection is disabled",
	"introspection has been disabled",
];

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
	/// The `__schema` object of an introspection result
	Introspection(Value),
	/// Schema definition language served by a federated `_service` field
	Sdl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
	#[error("Could not reach '{endpoint}': {source}")]
	Transport { endpoint: String, source: FetchError },
	#[error("Request failed with status {0}")]
	HttpStatus(StatusCode),
	#[error("Unexpected content type '{0}'")]
	UnexpectedContentType(String),
	#[error("Malformed response body: {0}")]
	MalformedBody(FetchError),
	#[error("GraphQL introspection is disabled on the server")]
	IntrospectionDisabled,
	#[error("GraphQL request failed: {}", .0.join("; "))]
	GraphQl(Vec<String>),
	#[error("Invalid schema: {0}")]
	InvalidSchema(String),
	#[error("Response is not a GraphQL payload")]
	UnrecognizedPayload,
}

#[derive(Deserialize)]
struct GraphQlEnvelope {
	#[serde(default)]
	data: Option<Value>,
	#[serde(default)]
	errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
	message: String,
	#[serde(rename = "originalError", default)]
	original_error: Option<OriginalError>,
}

#[derive(Deserialize)]
struct OriginalError {
	#[serde(default)]
	errors: Vec<GraphQlError>,
}

impl GraphQlError {
	/// Unwraps aggregate errors into the messages of the errors they were built from
	fn flatten_messages(self, messages: &mut Vec<String>) {
		match self.original_error {
			Some(OriginalError { errors }) if !errors.is_empty() => {
				errors.into_iter().for_each(|error| error.flatten_messages(messages))
			},
			_ => messages.push(self.message),
		}
	}
}

fn introspection_request(endpoint: &str) -> Request {
	let mut headers = Headers::new();
	headers.append(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
	headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));
	Request {
		url: endpoint.to_string(),
		init: RequestInit {
			method: Some("POST".to_string()),
			headers,
			body: Some(serde_json::json!({ "query": INTROSPECTION_QUERY }).to_string()),
		},
	}
}

fn check_content_type(response: &Response) -> Result<(), SchemaLoadError> {
	let content_type = response.headers().get("Content-Type").unwrap_or_default();
	let media_type = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
	if JSON_CONTENT_TYPES.contains(&media_type.as_str()) {
		Ok(())
	} else {
		Err(SchemaLoadError::UnexpectedContentType(content_type))
	}
}

fn rejects_introspection(message: &str) -> bool {
	let message = message.to_ascii_lowercase();
	INTROSPECTION_DISABLED_PHRASES.iter().any(|phrase| message.contains(phrase))
}

fn schema_from_envelope(envelope: GraphQlEnvelope) -> Result<SchemaSource, SchemaLoadError> {
	if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
		let mut messages = Vec::new();
		errors.into_iter().for_each(|error| error.flatten_messages(&mut messages));
		if messages.iter().any(|message| rejects_introspection(message)) {
			return Err(SchemaLoadError::IntrospectionDisabled);
		}
		return Err(SchemaLoadError::GraphQl(messages));
	}

	let Some(Value::Object(data)) = envelope.data else {
		return Err(SchemaLoadError::UnrecognizedPayload);
	};
	match data.get("__schema") {
		Some(schema @ Value::Object(_)) => Ok(SchemaSource::Introspection(schema.clone())),
		Some(_) => Err(SchemaLoadError::InvalidSchema("'__schema' is not an object".into())),
		None => service_sdl(&data)
			.map(|sdl| SchemaSource::Sdl(sdl.to_string()))
			.ok_or_else(|| SchemaLoadError::InvalidSchema("no '__schema' or '_service.sdl'".into())),
	}
}

fn service_sdl(data: &serde_json::Map<String, Value>) -> Option<&str> {
	data.get("_service")?.get("sdl")?.as_str()
}

/// Fetches the schema served at `endpoint`.
///
/// Failures before a response exists and failures of the response future are both
/// reported as [SchemaLoadError::Transport].
pub async fn load_schema<F: Fetch + ?Sized>(
	fetch: &F,
	endpoint: &str,
) -> Result<SchemaSource, SchemaLoadError> {
	let transport = |source| SchemaLoadError::Transport { endpoint: endpoint.to_string(), source };
	log::debug!("loading schema from '{endpoint}'");

	let response = fetch.fetch(introspection_request(endpoint).into(), None).map_err(transport)?;
	let response = response.await.map_err(transport)?;

	if !response.ok() {
		return Err(SchemaLoadError::HttpStatus(response.status()));
	}
	check_content_type(&response)?;

	let body: Value = response.json().await.map_err(SchemaLoadError::MalformedBody)?;
	let envelope: GraphQlEnvelope =
		serde_json::from_value(body).map_err(|_| SchemaLoadError::UnrecognizedPayload)?;
	schema_from_envelope(envelope)
}
