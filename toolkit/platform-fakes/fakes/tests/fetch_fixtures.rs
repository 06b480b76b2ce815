use platform_fakes::fetch::TIMEOUT_MESSAGE;
use http::StatusCode;
use platform_fakes::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;

async fn fetch_with(fetch: &impl Fetch) -> Response {
	let pending = fetch.fetch("http://localhost:4000/graphql".into(), None).unwrap();
	pending.await.unwrap()
}

#[tokio::test]
async fn malformed_json_resolves_but_fails_on_body_read() {
	let response = fetch_with(&malformed_json_fetch()).await;
	assert!(response.ok());
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("content-type"), Some("application/json".to_string()));

	let parsed = response.json::<Value>().await;
	assert!(matches!(parsed, Err(FetchError::Json(_))));
	assert!(response.text().await.unwrap().starts_with('{'));
}

#[tokio::test]
async fn unknown_content_type_is_reported_verbatim() {
	let response = fetch_with(&unknown_content_type_fetch()).await;
	assert!(response.ok());
	assert_eq!(response.headers().get("Content-Type"), Some("application/unknown".to_string()));
}

#[tokio::test]
async fn aggregate_error_carries_both_messages() {
	let body: Value = fetch_with(&aggregate_error_fetch()).await.json().await.unwrap();
	let errors = body["errors"].as_array().unwrap();
	assert_eq!(errors.len(), 1);

	let message = errors[0]["message"].as_str().unwrap();
	assert!(message.contains("The first error!"));
	assert!(message.contains("The second error!"));
	assert_eq!(errors[0]["originalError"]["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn introspection_disabled_has_null_data() {
	let response = fetch_with(&introspection_disabled_fetch()).await;
	assert_eq!(response.status(), StatusCode::OK);
	let body: Value = response.json().await.unwrap();
	assert_eq!(body["data"], Value::Null);
	assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_schema_has_string_schema() {
	let body: Value = fetch_with(&invalid_schema_fetch()).await.json().await.unwrap();
	assert!(body["data"]["__schema"].is_string());
	assert!(body["data"]["_service"]["sdl"].is_string());
}

#[tokio::test]
async fn unrecognized_payload_is_valid_json() {
	let body: Value = fetch_with(&unrecognized_payload_fetch()).await.json().await.unwrap();
	assert_eq!(body, json!({ "message": "Hello there!" }));
}

#[tokio::test]
async fn every_call_returns_a_new_identical_response() {
	let fetch = aggregate_error_fetch();
	let request = Request {
		url: "https://other.example/api".into(),
		init: RequestInit { method: Some("PUT".into()), ..Default::default() },
	};
	let first = fetch_with(&fetch).await;
	let second = fetch.fetch(request.into(), Some(RequestInit::default())).unwrap().await.unwrap();
	let url = Url::parse("https://third.example/graphql").unwrap();
	let third = fetch.fetch(url.into(), None).unwrap().await.unwrap();
	assert_eq!(first, second);
	assert_eq!(first, third);
}

async fn fetch_status(fetch: &dyn Fetch) -> Result<u16, FetchError> {
	let response = fetch.fetch("http://localhost".into(), None)?.await?;
	Ok(response.status().as_u16())
}

#[tokio::test]
async fn timeout_is_raised_before_any_future_exists() {
	let result = timeout_fetch("http://localhost".into(), None);
	let err = result.err().expect("fetch should fail synchronously");
	assert!(err.to_string().contains("ETIMEDOUT"));

	match fetch_status(&timeout_fetch).await {
		Err(FetchError::Connection(message)) => assert_eq!(message, TIMEOUT_MESSAGE),
		other => panic!("unexpected result: {other:?}"),
	}
	assert_eq!(fetch_status(&not_found_fetch()).await.unwrap(), 404);
}
