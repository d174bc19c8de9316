// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live credential check against the remote service's "who am I" endpoint.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::CredentialError;
use crate::manager::ensure_not_cancelled;
use crate::record::{validate_server_url, MyselfResponse, UserIdentity};
use crate::secret::SecretString;

/// Default bound on a single validation request.
pub const DEFAULT_VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

const MYSELF_PATH: &str = "/rest/api/3/myself";

/// Issues exactly one authenticated `GET {server}/rest/api/3/myself` per call
/// and classifies the outcome. No retries happen here.
#[derive(Debug, Clone)]
pub struct RemoteValidator {
	client: Client,
}

impl RemoteValidator {
	pub fn new() -> Result<Self, CredentialError> {
		Self::with_timeout(DEFAULT_VALIDATE_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self, CredentialError> {
		let client = Client::builder()
			.user_agent(user_agent())
			.timeout(timeout)
			.build()
			.map_err(|e| CredentialError::config(format!("failed to build HTTP client: {e}")))?;
		Ok(Self { client })
	}

	#[instrument(skip_all, fields(server_url = %server_url))]
	pub async fn validate(
		&self,
		server_url: &str,
		email: &str,
		token: &SecretString,
		cancel: &CancellationToken,
	) -> Result<UserIdentity, CredentialError> {
		ensure_not_cancelled(cancel)?;
		validate_server_url(server_url)?;
		let url = myself_url(server_url);

		tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!("validation cancelled");
				Err(CredentialError::Cancelled)
			}
			result = self.fetch_identity(&url, email, token) => result,
		}
	}

	async fn fetch_identity(
		&self,
		url: &str,
		email: &str,
		token: &SecretString,
	) -> Result<UserIdentity, CredentialError> {
		let resp = self
			.client
			.get(url)
			.header(ACCEPT, "application/json")
			.basic_auth(email, Some(token.expose()))
			.send()
			.await
			.map_err(|e| {
				warn!(error = %e, "validation request failed before a response");
				CredentialError::Unreachable {
					url: url.to_string(),
					reason: e.to_string(),
				}
			})?;

		let status = resp.status();
		debug!(status = %status, "validation response");

		if status == StatusCode::UNAUTHORIZED {
			return Err(CredentialError::Authentication {
				url: url.to_string(),
			});
		}

		if !status.is_success() {
			let body = resp.text().await.unwrap_or_default();
			return Err(CredentialError::UnexpectedStatus {
				url: url.to_string(),
				status: status.as_u16(),
				body,
			});
		}

		let body = resp.bytes().await.map_err(|e| CredentialError::Protocol {
			url: url.to_string(),
			reason: format!("failed to read body: {e}"),
		})?;
		let myself: MyselfResponse = serde_json::from_slice(&body).map_err(|e| CredentialError::Protocol {
			url: url.to_string(),
			reason: e.to_string(),
		})?;

		Ok(myself.into())
	}
}

fn myself_url(server_url: &str) -> String {
	format!("{}{MYSELF_PATH}", server_url.trim_end_matches('/'))
}

/// `atl/{version}`, sent on every validation request.
pub fn user_agent() -> String {
	format!("atl/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn myself_url_strips_trailing_slash() {
		assert_eq!(
			myself_url("https://acme.atlassian.net/"),
			"https://acme.atlassian.net/rest/api/3/myself"
		);
		assert_eq!(
			myself_url("http://localhost:8080/jira"),
			"http://localhost:8080/jira/rest/api/3/myself"
		);
	}

	#[test]
	fn user_agent_has_expected_shape() {
		let ua = user_agent();
		assert!(ua.starts_with("atl/"));
		assert_eq!(ua.split('/').count(), 2);
	}

	#[tokio::test]
	async fn malformed_server_url_is_a_validation_error() {
		let validator = RemoteValidator::new().unwrap();
		for server_url in ["acme.atlassian.net", "https//acme.atlassian.net", "ftp://acme.example"] {
			let err = validator
				.validate(server_url, "u@x.com", &SecretString::new("t1"), &CancellationToken::new())
				.await
				.unwrap_err();
			assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{server_url}");
			assert!(!err.to_string().contains("cannot reach"));
		}
	}

	#[tokio::test]
	async fn already_cancelled_token_short_circuits() {
		let validator = RemoteValidator::new().unwrap();
		let cancel = CancellationToken::new();
		cancel.cancel();

		let err = validator
			.validate("https://a.example", "u@x.com", &SecretString::new("t1"), &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, CredentialError::Cancelled));
	}
}
