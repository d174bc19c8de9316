// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::encrypted::EncryptedFileTokenManager;
use crate::error::{CredentialError, ErrorKind};
use crate::manager::{ensure_not_cancelled, TokenManager};
use crate::record::{CredentialRecord, UserIdentity};
use crate::secret::SecretString;
use crate::store_keyring::KeyringTokenManager;
use crate::validator::RemoteValidator;

/// Prefers the OS secret store and falls back to the encrypted file when the
/// store is unavailable (headless Linux, containers, CI).
///
/// A record lives in at most one of the two: a file write clears any older
/// keyring entry for the same server so `get` cannot return a stale token.
#[derive(Debug)]
pub struct KeyringThenFileTokenManager<K = KeyringTokenManager> {
	keyring: K,
	file: EncryptedFileTokenManager,
	validator: RemoteValidator,
}

impl<K: TokenManager> KeyringThenFileTokenManager<K> {
	pub fn new(
		keyring: K,
		file: EncryptedFileTokenManager,
		validator: RemoteValidator,
	) -> Self {
		Self {
			keyring,
			file,
			validator,
		}
	}
}

#[async_trait]
impl<K: TokenManager> TokenManager for KeyringThenFileTokenManager<K> {
	async fn store(
		&self,
		record: &CredentialRecord,
		cancel: &CancellationToken,
	) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		record.validate()?;
		match self.keyring.store(record, cancel).await {
			Ok(()) => return Ok(()),
			Err(e) => {
				warn!(server_url = %record.server_url, error = %e, "keyring save failed, falling back to encrypted file");
			}
		}
		self.file.store(record, cancel).await?;

		if let Err(e) = self.keyring.delete(&record.server_url, cancel).await {
			warn!(server_url = %record.server_url, error = %e, "could not clear older keyring entry");
		}
		Ok(())
	}

	async fn get(
		&self,
		server_url: &str,
		cancel: &CancellationToken,
	) -> Result<CredentialRecord, CredentialError> {
		match self.keyring.get(server_url, cancel).await {
			Ok(record) => {
				debug!(server_url = %server_url, "loaded credentials from keyring");
				return Ok(record);
			}
			Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!(server_url = %server_url, "not in keyring, trying encrypted file");
			}
			Err(e) => {
				warn!(server_url = %server_url, error = %e, "keyring load failed, trying encrypted file");
			}
		}
		self.file.get(server_url, cancel).await
	}

	async fn delete(&self, server_url: &str, cancel: &CancellationToken) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		let keyring_result = self.keyring.delete(server_url, cancel).await;
		let file_result = self.file.delete(server_url, cancel).await;

		match (keyring_result, file_result) {
			(Err(keyring_err), Err(file_err)) => {
				warn!(server_url = %server_url, error = %keyring_err, "keyring delete failed");
				Err(file_err)
			}
			_ => Ok(()),
		}
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
