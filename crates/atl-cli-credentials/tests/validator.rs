// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use atl_cli_credentials::{
	CredentialError, ErrorKind, MemoryTokenManager, RemoteValidator, SecretString, TokenManager,
	API_TOKEN_URL,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MYSELF: &str = "/rest/api/3/myself";

fn identity_body() -> serde_json::Value {
	serde_json::json!({
		"accountId": "5b10a2844c20165700ede21g",
		"displayName": "Mia Krystof",
		"emailAddress": "mia@example.com",
		"active": true,
		"timeZone": "Australia/Sydney"
	})
}

async fn validate(server: &str, token: &str) -> Result<atl_cli_credentials::UserIdentity, CredentialError> {
	RemoteValidator::new()
		.unwrap()
		.validate(server, "mia@example.com", &SecretString::new(token), &CancellationToken::new())
		.await
}

#[tokio::test]
async fn valid_credentials_return_identity() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.and(basic_auth("mia@example.com", "good-token"))
		.and(header("accept", "application/json"))
		.respond_with(ResponseTemplate::new(200).set_body_json(identity_body()))
		.expect(1)
		.mount(&server)
		.await;

	let identity = validate(&server.uri(), "good-token").await.unwrap();
	assert_eq!(identity.display_name, "Mia Krystof");
	assert_eq!(identity.account_id, "5b10a2844c20165700ede21g");
	assert_eq!(identity.email, "mia@example.com");
	assert!(identity.active);
}

#[tokio::test]
async fn trailing_slash_in_server_url_is_tolerated() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(200).set_body_json(identity_body()))
		.expect(1)
		.mount(&server)
		.await;

	let identity = validate(&format!("{}/", server.uri()), "good-token").await.unwrap();
	assert_eq!(identity.display_name, "Mia Krystof");
}

#[tokio::test]
async fn hidden_email_is_empty() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"accountId": "abc",
			"displayName": "Private Person",
			"active": true
		})))
		.mount(&server)
		.await;

	let identity = validate(&server.uri(), "good-token").await.unwrap();
	assert_eq!(identity.email, "");
}

#[tokio::test]
async fn unauthorized_points_at_token_page() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(401))
		.expect(1)
		.mount(&server)
		.await;

	let err = validate(&server.uri(), "bad-token").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Authentication);
	assert!(!err.is_retryable());

	let message = err.to_string();
	assert!(message.contains("invalid"), "{message}");
	assert!(message.contains(API_TOKEN_URL), "{message}");
	assert!(!message.contains("bad-token"), "{message}");
}

#[tokio::test]
async fn server_error_reports_status_and_body() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
		.expect(1)
		.mount(&server)
		.await;

	let err = validate(&server.uri(), "good-token").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
	assert!(err.is_retryable());
	let message = err.to_string();
	assert!(message.contains("500"), "{message}");
	assert!(message.contains("upstream exploded"), "{message}");
}

#[tokio::test]
async fn forbidden_is_an_unexpected_status() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(403))
		.mount(&server)
		.await;

	let err = validate(&server.uri(), "good-token").await.unwrap_err();
	assert!(matches!(err, CredentialError::UnexpectedStatus { status: 403, .. }));
	assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_a_protocol_error() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
		.mount(&server)
		.await;

	let err = validate(&server.uri(), "good-token").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn unreachable_server_names_the_url() {
	let err = validate("http://127.0.0.1:1", "good-token").await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unreachable);
	assert!(err.is_retryable());
	let message = err.to_string();
	assert!(message.contains("cannot reach"), "{message}");
	assert!(message.contains("http://127.0.0.1:1"), "{message}");
}

#[tokio::test]
async fn slow_server_hits_the_timeout() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(identity_body())
				.set_delay(Duration::from_secs(5)),
		)
		.mount(&server)
		.await;

	let err = RemoteValidator::with_timeout(Duration::from_millis(200))
		.unwrap()
		.validate(
			&server.uri(),
			"mia@example.com",
			&SecretString::new("good-token"),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unreachable);
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_request() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(identity_body())
				.set_delay(Duration::from_secs(5)),
		)
		.mount(&server)
		.await;

	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(100)).await;
		trigger.cancel();
	});

	let err = RemoteValidator::new()
		.unwrap()
		.validate(&server.uri(), "mia@example.com", &SecretString::new("good-token"), &cancel)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn backend_validate_does_not_store() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(MYSELF))
		.respond_with(ResponseTemplate::new(200).set_body_json(identity_body()))
		.expect(1)
		.mount(&server)
		.await;

	let manager = MemoryTokenManager::new(RemoteValidator::new().unwrap());
	let cancel = CancellationToken::new();
	let identity = manager
		.validate(&server.uri(), "mia@example.com", &SecretString::new("good-token"), &cancel)
		.await
		.unwrap();
	assert_eq!(identity.display_name, "Mia Krystof");
	assert!(!manager.exists(&server.uri(), &cancel).await.unwrap());
}
