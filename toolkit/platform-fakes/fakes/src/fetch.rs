//! Minimal HTTP fetch contract and fixed-response accessors.
//!
//! A fetch accessor has two failure paths, both of which callers have to handle:
//! - the outer [Result] of [Fetch::fetch] fails synchronously, before any future exists
//!   (pre-flight failures such as [timeout_fetch])
//! - the returned [ResponseFuture] fails asynchronously
//!
//! Fixed-response accessors never fail: their future is ready immediately and bodies
//! are only parsed when the caller reads them.

use futures::{FutureExt, future::BoxFuture};
use http::{
	HeaderMap, HeaderName, HeaderValue, StatusCode,
	header::{self, GetAll},
};
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

/// Message of the pre-flight failure raised by [timeout_fetch]
pub const TIMEOUT_MESSAGE: &str = "Connection failed ETIMEDOUT";

const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
	#[error("{0}")]
	Connection(String),
	#[error("Could not parse response body as JSON: '{0}'")]
	Json(#[from] serde_json::Error),
	#[error("Response body is not valid UTF-8: '{0}'")]
	InvalidUtf8(#[from] std::string::FromUtf8Error),
	#[error("Status {0} is not in the range of 200 to 599")]
	InvalidStatus(u16),
}

/// Future resolving to the response of a fetch call
pub type ResponseFuture = BoxFuture<'static, Result<Response, FetchError>>;

/// Outcome of calling a fetch accessor. `Err` is a pre-flight failure.
pub type FetchResult = Result<ResponseFuture, FetchError>;

/// The fetch contract.
///
/// Every `Fn(RequestTarget, Option<RequestInit>) -> FetchResult` is a [Fetch], so plain
/// functions such as [timeout_fetch] are accessors too.
pub trait Fetch: Send + Sync {
	fn fetch(&self, target: RequestTarget, options: Option<RequestInit>) -> FetchResult;
}

impl<F> Fetch for F
where
	F: Fn(RequestTarget, Option<RequestInit>) -> FetchResult + Send + Sync,
{
	fn fetch(&self, target: RequestTarget, options: Option<RequestInit>) -> FetchResult {
		self(target, options)
	}
}

/// Case-insensitive multimap of header names to values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HeaderMap);

fn join_values(values: GetAll<'_, HeaderValue>) -> String {
	let values: Vec<_> =
		values.iter().map(|value| String::from_utf8_lossy(value.as_bytes())).collect();
	values.join(", ")
}

impl Headers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns all values of `name` joined with `", "`, or `None` when the header is absent
	pub fn get(&self, name: &str) -> Option<String> {
		self.0.contains_key(name).then(|| join_values(self.0.get_all(name)))
	}

	pub fn has(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
		self.0.append(name, value);
	}

	/// Replaces all values of `name` with `value`
	pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
		self.0.insert(name, value);
	}

	/// Lowercase header names, each with its values joined as in [Headers::get]
	pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
		self.0.keys().map(|name| (name.as_str(), join_values(self.0.get_all(name))))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<const N: usize> From<[(HeaderName, HeaderValue); N]> for Headers {
	fn from(entries: [(HeaderName, HeaderValue); N]) -> Self {
		let mut headers = Headers::new();
		for (name, value) in entries {
			headers.append(name, value);
		}
		headers
	}
}

/// Response body content
#[derive(Clone, PartialEq, Eq)]
pub enum Body {
	Text(String),
	Bytes(Vec<u8>),
}

impl Body {
	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Body::Text(text) => text.as_bytes(),
			Body::Bytes(bytes) => bytes,
		}
	}
}

impl fmt::Debug for Body {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
		}
	}
}

impl From<&str> for Body {
	fn from(text: &str) -> Self {
		Body::Text(text.to_string())
	}
}

impl From<String> for Body {
	fn from(text: String) -> Self {
		Body::Text(text)
	}
}

impl From<Vec<u8>> for Body {
	fn from(bytes: Vec<u8>) -> Self {
		Body::Bytes(bytes)
	}
}

impl From<serde_json::Value> for Body {
	fn from(value: serde_json::Value) -> Self {
		Body::Text(value.to_string())
	}
}

/// Status, status text and headers of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInit {
	status: StatusCode,
	status_text: String,
	headers: Headers,
}

impl Default for ResponseInit {
	fn default() -> Self {
		Self::from_status(StatusCode::OK)
	}
}

impl ResponseInit {
	fn from_status(status: StatusCode) -> Self {
		Self { status, status_text: String::new(), headers: Headers::new() }
	}

	/// Fails for statuses outside 200..=599, which no response can carry
	pub fn with_status(status: u16) -> Result<Self, FetchError> {
		StatusCode::from_u16(status)
			.ok()
			.filter(|code| (200..=599).contains(&code.as_u16()))
			.map(Self::from_status)
			.ok_or(FetchError::InvalidStatus(status))
	}

	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);
		self
	}

	pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
		self.status_text = status_text.into();
		self
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	status: StatusCode,
	status_text: String,
	headers: Headers,
	body: Option<Body>,
}

impl Response {
	/// Builds a response the way host runtimes do: a text body without an explicit
	/// `Content-Type` is labelled `text/plain;charset=UTF-8`.
	pub fn new(body: Option<Body>, init: ResponseInit) -> Self {
		let ResponseInit { status, status_text, mut headers } = init;
		if matches!(body, Some(Body::Text(_))) && !headers.has("content-type") {
			let content_type = HeaderValue::from_static(DEFAULT_TEXT_CONTENT_TYPE);
			headers.append(header::CONTENT_TYPE, content_type);
		}
		Self { status, status_text, headers, body }
	}

	/// `true` for statuses in the 200..=299 range
	pub fn ok(&self) -> bool {
		self.status.is_success()
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}

	pub fn status_text(&self) -> &str {
		&self.status_text
	}

	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	pub fn body(&self) -> Option<&Body> {
		self.body.as_ref()
	}

	/// Reads the body as UTF-8 text. An absent body reads as an empty string.
	pub async fn text(&self) -> Result<String, FetchError> {
		let bytes = self.body.as_ref().map(|body| body.as_bytes().to_vec()).unwrap_or_default();
		Ok(String::from_utf8(bytes)?)
	}

	/// Parses the body as JSON. Parse failures surface here, never at fetch time.
	pub async fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
		let bytes = self.body.as_ref().map(Body::as_bytes).unwrap_or_default();
		Ok(serde_json::from_slice(bytes)?)
	}
}

/// Method, headers and body of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInit {
	pub method: Option<String>,
	pub headers: Headers,
	pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub url: String,
	pub init: RequestInit,
}

/// What a fetch call is aimed at: a URL, as text or parsed, or a full request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
	String(String),
	Url(Url),
	Request(Request),
}

impl RequestTarget {
	pub fn url(&self) -> &str {
		match self {
			RequestTarget::String(url) => url,
			RequestTarget::Url(url) => url.as_str(),
			RequestTarget::Request(request) => &request.url,
		}
	}
}

impl From<&str> for RequestTarget {
	fn from(url: &str) -> Self {
		RequestTarget::String(url.to_string())
	}
}

impl From<String> for RequestTarget {
	fn from(url: String) -> Self {
		RequestTarget::String(url)
	}
}

impl From<Url> for RequestTarget {
	fn from(url: Url) -> Self {
		RequestTarget::Url(url)
	}
}

impl From<Request> for RequestTarget {
	fn from(request: Request) -> Self {
		RequestTarget::Request(request)
	}
}

/// Accessor ignoring its arguments and answering every call with a new copy of the same response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedResponseFetch {
	body: Option<Body>,
	init: ResponseInit,
}

impl Fetch for FixedResponseFetch {
	fn fetch(&self, target: RequestTarget, _options: Option<RequestInit>) -> FetchResult {
		log::debug!("answering fetch of '{}' with status {}", target.url(), self.init.status);
		let response = Response::new(self.body.clone(), self.init.clone());
		Ok(futures::future::ready(Ok(response)).boxed())
	}
}

/// Creates an accessor resolving every call to a response built from `body` and `init`.
pub fn fixed_response_fetch(body: Option<Body>, init: ResponseInit) -> FixedResponseFetch {
	FixedResponseFetch { body, init }
}

/// Accessor failing before any future exists, like a connection that never gets established.
pub fn timeout_fetch(target: RequestTarget, _options: Option<RequestInit>) -> FetchResult {
	log::warn!("injecting pre-flight failure for fetch of '{}'", target.url());
	Err(FetchError::Connection(TIMEOUT_MESSAGE.to_string()))
}

fn json_response() -> ResponseInit {
	ResponseInit::default()
		.header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
}

/// Empty body, status 404
pub fn not_found_fetch() -> FixedResponseFetch {
	fixed_response_fetch(None, ResponseInit::from_status(StatusCode::NOT_FOUND))
}

/// Empty body, status 400
pub fn bad_request_fetch() -> FixedResponseFetch {
	fixed_response_fetch(None, ResponseInit::from_status(StatusCode::BAD_REQUEST))
}

/// Empty body, status 500
pub fn server_error_fetch() -> FixedResponseFetch {
	fixed_response_fetch(None, ResponseInit::from_status(StatusCode::INTERNAL_SERVER_ERROR))
}

/// JSON content type and status 200, but the body is missing its closing brace
pub fn malformed_json_fetch() -> FixedResponseFetch {
	fixed_response_fetch(
		Some(r#"{"data": {"__schema": {"queryType": {"name": "Query"}}}"#.into()),
		json_response(),
	)
}

/// Status 200 with `Content-Type: application/unknown`
pub fn unknown_content_type_fetch() -> FixedResponseFetch {
	fixed_response_fetch(
		Some("Hello World!".into()),
		ResponseInit::default()
			.header(header::CONTENT_TYPE, HeaderValue::from_static("application/unknown")),
	)
}

/// GraphQL envelope with one error aggregating two underlying errors
pub fn aggregate_error_fetch() -> FixedResponseFetch {
	let body = serde_json::json!({
		"errors": [{
			"message": "The first error!\nThe second error!",
			"originalError": {
				"errors": [
					{ "message": "The first error!" },
					{ "message": "The second error!" }
				]
			}
		}]
	});
	fixed_response_fetch(Some(body.into()), json_response())
}

/// Message of the error in [introspection_disabled_fetch]
pub const INTROSPECTION_DISABLED_MESSAGE: &str =
	"GraphQL introspection is not allowed, but the query contained __schema or __type.";

/// GraphQL envelope rejecting the introspection query
pub fn introspection_disabled_fetch() -> FixedResponseFetch {
	let body = serde_json::json!({
		"errors": [{ "message": INTROSPECTION_DISABLED_MESSAGE }],
		"data": null
	});
	fixed_response_fetch(Some(body.into()), json_response())
}

/// GraphQL envelope whose `data.__schema` is a string instead of an object
pub fn invalid_schema_fetch() -> FixedResponseFetch {
	let body = serde_json::json!({
		"data": {
			"__schema": "type Query { hello: String }",
			"_service": { "sdl": "type Query { hello: String }" }
		}
	});
	fixed_response_fetch(Some(body.into()), json_response())
}

/// Valid JSON that is not a GraphQL envelope at all
pub fn unrecognized_payload_fetch() -> FixedResponseFetch {
	let body = serde_json::json!({ "message": "Hello there!" });
	fixed_response_fetch(Some(body.into()), json_response())
}
