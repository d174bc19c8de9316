// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential record and user identity types.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroize;

use crate::error::CredentialError;
use crate::secret::{SecretString, REDACTED};

/// Credentials for one remote server.
///
/// `server_url` is the storage key: storing a second record with the same
/// URL replaces the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
	pub server_url: String,
	pub email: String,
	pub token: SecretString,
}

impl CredentialRecord {
	pub fn new(
		server_url: impl Into<String>,
		email: impl Into<String>,
		token: impl Into<String>,
	) -> Self {
		Self {
			server_url: server_url.into(),
			email: email.into(),
			token: SecretString::new(token),
		}
	}

	/// Check the record's shape before it is persisted anywhere.
	pub fn validate(&self) -> Result<(), CredentialError> {
		validate_server_url(&self.server_url)?;
		validate_email(&self.email)?;
		if self.token.is_blank() {
			return Err(CredentialError::validation("API token must not be empty"));
		}
		Ok(())
	}
}

/// Plain form of [`CredentialRecord`] used inside the sealed container and
/// keyring entries. Only ever serialized into bytes that are encrypted or
/// handed to the OS secret store. Wiped on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCredential {
	pub server_url: String,
	pub email: String,
	pub token: String,
}

impl fmt::Debug for PersistedCredential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PersistedCredential")
			.field("server_url", &self.server_url)
			.field("email", &self.email)
			.field("token", &REDACTED)
			.finish()
	}
}

impl From<&CredentialRecord> for PersistedCredential {
	fn from(record: &CredentialRecord) -> Self {
		Self {
			server_url: record.server_url.clone(),
			email: record.email.clone(),
			token: record.token.expose().to_string(),
		}
	}
}

impl From<PersistedCredential> for CredentialRecord {
	fn from(mut persisted: PersistedCredential) -> Self {
		Self {
			server_url: std::mem::take(&mut persisted.server_url),
			email: std::mem::take(&mut persisted.email),
			token: SecretString::new(std::mem::take(&mut persisted.token)),
		}
	}
}

/// Account the remote service reports for a validated credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
	pub account_id: String,
	pub display_name: String,
	pub email: String,
	pub active: bool,
}

/// Body of `GET /rest/api/3/myself`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MyselfResponse {
	account_id: String,
	display_name: String,
	/// Hidden when the account's profile visibility is restricted.
	#[serde(default)]
	email_address: Option<String>,
	active: bool,
}

impl From<MyselfResponse> for UserIdentity {
	fn from(resp: MyselfResponse) -> Self {
		Self {
			account_id: resp.account_id,
			display_name: resp.display_name,
			email: resp.email_address.unwrap_or_default(),
			active: resp.active,
		}
	}
}

pub fn validate_server_url(server_url: &str) -> Result<(), CredentialError> {
	if server_url.trim().is_empty() {
		return Err(CredentialError::validation("server URL must not be empty"));
	}
	let parsed = Url::parse(server_url)
		.map_err(|e| CredentialError::validation(format!("server URL {server_url:?} is not valid: {e}")))?;
	if !matches!(parsed.scheme(), "http" | "https") {
		return Err(CredentialError::validation(format!(
			"server URL {server_url:?} must use http or https"
		)));
	}
	if parsed.host_str().map_or(true, str::is_empty) {
		return Err(CredentialError::validation(format!(
			"server URL {server_url:?} has no host"
		)));
	}
	Ok(())
}

pub fn validate_email(email: &str) -> Result<(), CredentialError> {
	let invalid = || CredentialError::validation(format!("{email:?} is not a valid email address"));

	if email.chars().any(char::is_whitespace) {
		return Err(invalid());
	}
	let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
	if local.is_empty() || domain.contains('@') {
		return Err(invalid());
	}
	let labels: Vec<&str> = domain.split('.').collect();
	if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
		return Err(invalid());
	}
	Ok(())
}
