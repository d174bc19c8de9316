// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::CredentialError;
use crate::manager::{ensure_not_cancelled, TokenManager};
use crate::record::{CredentialRecord, PersistedCredential, UserIdentity};
use crate::secret::SecretString;
use crate::validator::RemoteValidator;

/// Credentials held by the OS secret store (Keychain, Credential Manager,
/// kernel keyring), one entry per server URL.
#[derive(Debug, Clone)]
pub struct KeyringTokenManager {
	service: String,
	validator: RemoteValidator,
}

impl KeyringTokenManager {
	pub fn new(service: impl Into<String>, validator: RemoteValidator) -> Self {
		Self {
			service: service.into(),
			validator,
		}
	}
}

fn backend_error(e: keyring::Error) -> CredentialError {
	CredentialError::Backend(e.to_string())
}

#[async_trait]
impl TokenManager for KeyringTokenManager {
	#[instrument(skip_all, fields(server_url = %record.server_url))]
	async fn store(
		&self,
		record: &CredentialRecord,
		cancel: &CancellationToken,
	) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		record.validate()?;

		let service = self.service.clone();
		let server_url = record.server_url.clone();
		let data = serde_json::to_string(&PersistedCredential::from(record))
			.map_err(|e| CredentialError::Backend(format!("failed to encode credential: {e}")))?;

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &server_url).map_err(backend_error)?;
			entry.set_password(&data).map_err(backend_error)?;

			// Read back through a fresh entry: mock backends only keep values per instance.
			let verify_entry = keyring::Entry::new(&service, &server_url).map_err(backend_error)?;
			match verify_entry.get_password() {
				Ok(stored) if stored == data => Ok(()),
				Ok(_) => Err(CredentialError::Backend(
					"keyring verification failed: stored data mismatch".to_string(),
				)),
				Err(keyring::Error::NoEntry) => Err(CredentialError::Backend(
					"keyring verification failed: credential not persisted".to_string(),
				)),
				Err(e) => Err(CredentialError::Backend(format!(
					"keyring verification failed: {e}"
				))),
			}
		})
		.await
		.map_err(|e| CredentialError::Backend(e.to_string()))?
	}

	#[instrument(skip_all, fields(server_url = %server_url))]
	async fn get(
		&self,
		server_url: &str,
		cancel: &CancellationToken,
	) -> Result<CredentialRecord, CredentialError> {
		ensure_not_cancelled(cancel)?;
		let service = self.service.clone();
		let server_url = server_url.to_string();

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &server_url).map_err(backend_error)?;
			match entry.get_password() {
				Ok(data) => {
					let persisted: PersistedCredential = serde_json::from_str(&data).map_err(|e| {
						CredentialError::Backend(format!("keyring entry is not a credential: {e}"))
					})?;
					Ok(CredentialRecord::from(persisted))
				}
				Err(keyring::Error::NoEntry) => Err(CredentialError::NotFound(server_url)),
				Err(e) => Err(backend_error(e)),
			}
		})
		.await
		.map_err(|e| CredentialError::Backend(e.to_string()))?
	}

	#[instrument(skip_all, fields(server_url = %server_url))]
	async fn delete(&self, server_url: &str, cancel: &CancellationToken) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		let service = self.service.clone();
		let server_url = server_url.to_string();

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &server_url).map_err(backend_error)?;
			match entry.delete_credential() {
				Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
				Err(e) => Err(backend_error(e)),
			}
		})
		.await
		.map_err(|e| CredentialError::Backend(e.to_string()))?
	}

	async fn validate(
		&self,
		server_url: &str,
		email: &str,
		token: &SecretString,
		cancel: &CancellationToken,
	) -> Result<UserIdentity, CredentialError> {
		self.validator.validate(server_url, email, token, cancel).await
	}
}
