// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The capability contract shared by every credential backend.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{CredentialError, ErrorKind};
use crate::record::{CredentialRecord, UserIdentity};
use crate::secret::SecretString;

/// Uniform interface over the memory, OS keyring and encrypted file backends.
///
/// Records are keyed by server URL. Callers hold `Arc<dyn TokenManager>` and
/// never a concrete backend, so tests can swap in [`crate::MemoryTokenManager`].
///
/// Every method takes the caller's cancellation token and fails with
/// [`CredentialError::Cancelled`] if it has already fired. File I/O that has
/// started is not interrupted; the network call in `validate` is.
#[async_trait]
pub trait TokenManager: Send + Sync + std::fmt::Debug {
	/// Validate the record's shape, then insert or replace it.
	async fn store(
		&self,
		record: &CredentialRecord,
		cancel: &CancellationToken,
	) -> Result<(), CredentialError>;

	/// Fetch the record stored for `server_url`, or [`CredentialError::NotFound`].
	async fn get(
		&self,
		server_url: &str,
		cancel: &CancellationToken,
	) -> Result<CredentialRecord, CredentialError>;

	/// Remove the record for `server_url`. Removing an absent record succeeds.
	async fn delete(&self, server_url: &str, cancel: &CancellationToken) -> Result<(), CredentialError>;

	/// Ask the remote service who these credentials belong to.
	///
	/// Never reads or writes stored credentials; callers decide whether to
	/// `store` after a successful check.
	async fn validate(
		&self,
		server_url: &str,
		email: &str,
		token: &SecretString,
		cancel: &CancellationToken,
	) -> Result<UserIdentity, CredentialError>;

	async fn exists(&self, server_url: &str, cancel: &CancellationToken) -> Result<bool, CredentialError> {
		match self.get(server_url, cancel).await {
			Ok(_) => Ok(true),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e),
		}
	}
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), CredentialError> {
	if cancel.is_cancelled() {
		return Err(CredentialError::Cancelled);
	}
	Ok(())
}
