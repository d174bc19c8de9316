// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::CredentialError;
use crate::manager::{ensure_not_cancelled, TokenManager};
use crate::record::{CredentialRecord, UserIdentity};
use crate::secret::SecretString;
use crate::validator::RemoteValidator;

/// Volatile in-process store, for tests and as a last-resort fallback.
#[derive(Debug)]
pub struct MemoryTokenManager {
	records: RwLock<HashMap<String, CredentialRecord>>,
	validator: RemoteValidator,
}

impl MemoryTokenManager {
	pub fn new(validator: RemoteValidator) -> Self {
		Self {
			records: RwLock::new(HashMap::new()),
			validator,
		}
	}
}

#[async_trait]
impl TokenManager for MemoryTokenManager {
	async fn store(
		&self,
		record: &CredentialRecord,
		cancel: &CancellationToken,
	) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		record.validate()?;
		let mut records = self.records.write().await;
		records.insert(record.server_url.clone(), record.clone());
		Ok(())
	}

	async fn get(
		&self,
		server_url: &str,
		cancel: &CancellationToken,
	) -> Result<CredentialRecord, CredentialError> {
		ensure_not_cancelled(cancel)?;
		let records = self.records.read().await;
		records
			.get(server_url)
			.cloned()
			.ok_or_else(|| CredentialError::NotFound(server_url.to_string()))
	}

	async fn delete(&self, server_url: &str, cancel: &CancellationToken) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		let mut records = self.records.write().await;
		records.remove(server_url);
		Ok(())
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
