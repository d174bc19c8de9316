// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend selection and construction.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::encrypted::EncryptedFileTokenManager;
use crate::error::CredentialError;
use crate::manager::TokenManager;
use crate::store_memory::MemoryTokenManager;
use crate::validator::{RemoteValidator, DEFAULT_VALIDATE_TIMEOUT};

pub const ENV_BACKEND: &str = "ATL_CREDENTIAL_BACKEND";
pub const ENV_FILE: &str = "ATL_CREDENTIALS_FILE";
pub const ENV_KEYRING_SERVICE: &str = "ATL_KEYRING_SERVICE";
pub const ENV_VALIDATE_TIMEOUT_SECS: &str = "ATL_VALIDATE_TIMEOUT_SECS";

/// Keyring service name entries are filed under.
pub const DEFAULT_KEYRING_SERVICE: &str = "atl-cli";

/// Which credential backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// Volatile, lost when the process exits.
	Memory,
	/// OS secret store only.
	Keyring,
	/// Encrypted file only.
	File,
	/// OS secret store when it works, encrypted file otherwise.
	#[default]
	Auto,
}

impl FromStr for BackendKind {
	type Err = CredentialError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"memory" => Ok(Self::Memory),
			"keyring" => Ok(Self::Keyring),
			"file" => Ok(Self::File),
			"auto" => Ok(Self::Auto),
			other => Err(CredentialError::config(format!(
				"unknown credential backend {other:?} (expected memory, keyring, file or auto)"
			))),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
	pub backend: BackendKind,
	/// Encrypted file location; `~/.atl/credentials.enc` when unset.
	pub file_path: Option<PathBuf>,
	pub keyring_service: String,
	#[serde(with = "duration_secs")]
	pub validate_timeout: Duration,
}

impl Default for CredentialsConfig {
	fn default() -> Self {
		Self {
			backend: BackendKind::default(),
			file_path: None,
			keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
			validate_timeout: DEFAULT_VALIDATE_TIMEOUT,
		}
	}
}

impl CredentialsConfig {
	/// Defaults overridden by `ATL_*` environment variables.
	pub fn from_env() -> Result<Self, CredentialError> {
		Self::default().with_overrides(|name| std::env::var(name).ok())
	}

	fn with_overrides(
		mut self,
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<Self, CredentialError> {
		if let Some(backend) = lookup(ENV_BACKEND) {
			self.backend = backend.parse()?;
		}
		if let Some(path) = lookup(ENV_FILE).filter(|p| !p.trim().is_empty()) {
			self.file_path = Some(PathBuf::from(path));
		}
		if let Some(service) = lookup(ENV_KEYRING_SERVICE).filter(|s| !s.trim().is_empty()) {
			self.keyring_service = service;
		}
		if let Some(secs) = lookup(ENV_VALIDATE_TIMEOUT_SECS) {
			let secs: u64 = secs.trim().parse().map_err(|_| {
				CredentialError::config(format!("{ENV_VALIDATE_TIMEOUT_SECS} must be a whole number of seconds"))
			})?;
			if secs == 0 {
				return Err(CredentialError::config(format!(
					"{ENV_VALIDATE_TIMEOUT_SECS} must be greater than zero"
				)));
			}
			self.validate_timeout = Duration::from_secs(secs);
		}

		tracing::debug!(
			backend = ?self.backend,
			file_path = ?self.file_path,
			timeout_secs = self.validate_timeout.as_secs(),
			"resolved credentials config"
		);
		Ok(self)
	}

	/// The encrypted file path, falling back to the default under `$HOME`.
	pub fn resolved_file_path(&self) -> Result<PathBuf, CredentialError> {
		match &self.file_path {
			Some(path) => Ok(path.clone()),
			None => default_store_path(),
		}
	}
}

/// `~/.atl/credentials.enc`
pub fn default_store_path() -> Result<PathBuf, CredentialError> {
	let home = dirs::home_dir()
		.ok_or_else(|| CredentialError::config("could not determine home directory"))?;
	Ok(home.join(".atl").join("credentials.enc"))
}

/// Build the configured backend around a single shared validator.
pub fn open_token_manager(config: &CredentialsConfig) -> Result<Arc<dyn TokenManager>, CredentialError> {
	let validator = RemoteValidator::with_timeout(config.validate_timeout)?;

	let manager: Arc<dyn TokenManager> = match config.backend {
		BackendKind::Memory => Arc::new(MemoryTokenManager::new(validator)),
		BackendKind::File => Arc::new(EncryptedFileTokenManager::open(
			config.resolved_file_path()?,
			validator,
		)?),
		#[cfg(feature = "keyring")]
		BackendKind::Keyring => Arc::new(crate::store_keyring::KeyringTokenManager::new(
			config.keyring_service.clone(),
			validator,
		)),
		#[cfg(feature = "keyring")]
		BackendKind::Auto => Arc::new(crate::store_fallback::KeyringThenFileTokenManager::new(
			crate::store_keyring::KeyringTokenManager::new(config.keyring_service.clone(), validator.clone()),
			EncryptedFileTokenManager::open(config.resolved_file_path()?, validator.clone())?,
			validator,
		)),
		#[cfg(not(feature = "keyring"))]
		BackendKind::Keyring => {
			return Err(CredentialError::config(
				"keyring backend requested but this build has no OS secret store support",
			))
		}
		#[cfg(not(feature = "keyring"))]
		BackendKind::Auto => Arc::new(EncryptedFileTokenManager::open(
			config.resolved_file_path()?,
			validator,
		)?),
	};

	tracing::debug!(backend = ?config.backend, "credential backend ready");
	Ok(manager)
}

mod duration_secs {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer};

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_secs)
	}
}
