// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::codec;
use super::key::{derive_machine_key, KEY_SIZE};
use crate::atomic::write_atomic;
use crate::error::CredentialError;
use crate::manager::{ensure_not_cancelled, TokenManager};
use crate::record::{CredentialRecord, PersistedCredential, UserIdentity};
use crate::secret::SecretString;
use crate::validator::RemoteValidator;

/// Decrypted file contents: server URL to record.
pub type CredentialContainer = BTreeMap<String, PersistedCredential>;

/// Credentials sealed with AES-256-GCM in a single file.
///
/// Every mutation reads the whole container, changes it in memory and
/// rewrites it atomically. Writers are exclusive and readers share, per
/// instance. Two instances (or processes) on the same path are not
/// coordinated: the last completed write wins for the whole container.
pub struct EncryptedFileTokenManager {
	path: PathBuf,
	key: Zeroizing<[u8; KEY_SIZE]>,
	guard: RwLock<()>,
	validator: RemoteValidator,
}

impl std::fmt::Debug for EncryptedFileTokenManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EncryptedFileTokenManager")
			.field("path", &self.path)
			.finish_non_exhaustive()
	}
}

impl EncryptedFileTokenManager {
	/// Open the store at `path`, deriving the key from this machine and user.
	pub fn open(path: impl Into<PathBuf>, validator: RemoteValidator) -> Result<Self, CredentialError> {
		let key = derive_machine_key()?;
		Ok(Self::with_key(path, key, validator))
	}

	/// Open the store with an explicit key.
	pub fn with_key(
		path: impl Into<PathBuf>,
		key: Zeroizing<[u8; KEY_SIZE]>,
		validator: RemoteValidator,
	) -> Self {
		Self {
			path: path.into(),
			key,
			guard: RwLock::new(()),
			validator,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read and decrypt the whole container. A missing file is an empty container.
	async fn load_container(&self) -> Result<CredentialContainer, CredentialError> {
		let sealed = match fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = ?self.path, "no credentials file yet");
				return Ok(CredentialContainer::new());
			}
			Err(e) => return Err(e.into()),
		};

		let plaintext = codec::open(&self.key, &sealed).map_err(|e| match e {
			CredentialError::Crypto(reason) => CredentialError::UnreadableStore {
				path: self.path.clone(),
				reason,
			},
			other => other,
		})?;
		serde_json::from_slice(&plaintext).map_err(|e| {
			CredentialError::Persistence(format!(
				"credentials file {} has an unreadable layout: {e}; remove it and log in again",
				self.path.display()
			))
		})
	}

	async fn persist_container(&self, container: &CredentialContainer) -> Result<(), CredentialError> {
		if container.is_empty() {
			return match fs::remove_file(&self.path).await {
				Ok(()) => {
					debug!(path = ?self.path, "last credential removed, deleted credentials file");
					Ok(())
				}
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(e.into()),
			};
		}

		let plaintext = Zeroizing::new(
			serde_json::to_vec(container)
				.map_err(|e| CredentialError::Persistence(format!("failed to serialize credentials: {e}")))?,
		);
		let sealed = codec::seal(&self.key, &plaintext)?;
		write_atomic(&self.path, &sealed).await?;
		debug!(path = ?self.path, entries = container.len(), "credentials file written");
		Ok(())
	}
}

#[async_trait]
impl TokenManager for EncryptedFileTokenManager {
	#[instrument(skip_all, fields(server_url = %record.server_url))]
	async fn store(
		&self,
		record: &CredentialRecord,
		cancel: &CancellationToken,
	) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;
		record.validate()?;

		let _write = self.guard.write().await;
		let mut container = self.load_container().await?;
		container.insert(record.server_url.clone(), PersistedCredential::from(record));
		self.persist_container(&container).await
	}

	#[instrument(skip_all, fields(server_url = %server_url))]
	async fn get(
		&self,
		server_url: &str,
		cancel: &CancellationToken,
	) -> Result<CredentialRecord, CredentialError> {
		ensure_not_cancelled(cancel)?;

		let _read = self.guard.read().await;
		let mut container = self.load_container().await?;
		container
			.remove(server_url)
			.map(CredentialRecord::from)
			.ok_or_else(|| CredentialError::NotFound(server_url.to_string()))
	}

	#[instrument(skip_all, fields(server_url = %server_url))]
	async fn delete(&self, server_url: &str, cancel: &CancellationToken) -> Result<(), CredentialError> {
		ensure_not_cancelled(cancel)?;

		let _write = self.guard.write().await;
		let mut container = self.load_container().await?;
		if container.remove(server_url).is_none() {
			debug!("nothing stored, delete is a no-op");
			return Ok(());
		}
		self.persist_container(&container).await
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	fn test_store(path: &Path) -> EncryptedFileTokenManager {
		EncryptedFileTokenManager::with_key(
			path,
			Zeroizing::new([42u8; KEY_SIZE]),
			RemoteValidator::new().unwrap(),
		)
	}

	#[tokio::test]
	async fn store_then_get_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = test_store(&dir.path().join("credentials.enc"));
		let cancel = CancellationToken::new();
		let record = CredentialRecord::new("https://a.example", "u@x.com", "t1");

		store.store(&record, &cancel).await.unwrap();
		let loaded = store.get("https://a.example", &cancel).await.unwrap();
		assert_eq!(loaded, record);
	}

	#[tokio::test]
	async fn missing_file_reads_as_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let store = test_store(&dir.path().join("credentials.enc"));

		let err = store
			.get("https://a.example", &CancellationToken::new())
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn store_replaces_existing_entry() {
		let dir = tempfile::tempdir().unwrap();
		let store = test_store(&dir.path().join("credentials.enc"));
		let cancel = CancellationToken::new();

		store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "old"), &cancel)
			.await
			.unwrap();
		store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "new"), &cancel)
			.await
			.unwrap();

		let container = store.load_container().await.unwrap();
		assert_eq!(container.len(), 1);
		let loaded = store.get("https://a.example", &cancel).await.unwrap();
		assert_eq!(loaded.token.expose(), "new");
	}

	#[tokio::test]
	async fn invalid_record_is_rejected_without_touching_disk() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credentials.enc");
		let store = test_store(&path);

		let err = store
			.store(
				&CredentialRecord::new("not a url", "u@x.com", "t1"),
				&CancellationToken::new(),
			)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn deleting_last_entry_removes_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credentials.enc");
		let store = test_store(&path);
		let cancel = CancellationToken::new();

		store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "t1"), &cancel)
			.await
			.unwrap();
		assert!(path.exists());

		store.delete("https://a.example", &cancel).await.unwrap();
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn wrong_key_is_a_crypto_error_not_empty() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credentials.enc");
		let cancel = CancellationToken::new();

		test_store(&path)
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "t1"), &cancel)
			.await
			.unwrap();

		let other = EncryptedFileTokenManager::with_key(
			&path,
			Zeroizing::new([1u8; KEY_SIZE]),
			RemoteValidator::new().unwrap(),
		);
		let err = other.get("https://a.example", &cancel).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Crypto);
	}

	#[tokio::test]
	async fn corrupt_file_error_names_the_file_to_remove() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credentials.enc");
		std::fs::write(&path, b"this is not a sealed credentials container").unwrap();
		let store = test_store(&path);
		let cancel = CancellationToken::new();

		let err = store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "t1"), &cancel)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Crypto);
		let text = err.to_string();
		assert!(
			text.contains(&format!("remove {} and log in again", path.display())),
			"{text}"
		);

		let err = store.delete("https://a.example", &cancel).await.unwrap_err();
		assert!(err.to_string().contains(&path.display().to_string()));

		std::fs::remove_file(&path).unwrap();
		store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "t1"), &cancel)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn cancelled_store_does_not_write() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credentials.enc");
		let store = test_store(&path);
		let cancel = CancellationToken::new();
		cancel.cancel();

		let err = store
			.store(&CredentialRecord::new("https://a.example", "u@x.com", "t1"), &cancel)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Cancelled);
		assert!(!path.exists());
	}

	#[test]
	fn debug_output_omits_key_material() {
		let store = test_store(Path::new("/tmp/credentials.enc"));
		let debug = format!("{store:?}");
		assert!(debug.contains("credentials.enc"));
		assert!(!debug.contains("42"));
	}
}
