// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential vault for the `atl` CLI.
//!
//! Stores one API token per remote server URL so later invocations do not
//! prompt again, and checks tokens against the server's `/rest/api/3/myself`
//! endpoint.
//!
//! # Backends
//!
//! All backends implement [`TokenManager`]:
//!
//! - **MemoryTokenManager**: volatile, for tests
//! - **KeyringTokenManager** (`keyring` feature): the OS secret store
//! - **EncryptedFileTokenManager**: AES-256-GCM sealed file for hosts without one
//! - **KeyringThenFileTokenManager** (`keyring` feature): OS store, file on failure
//!
//! # Trust boundary of the encrypted file
//!
//! The file key is derived from the hostname, the OS user id and a fixed
//! application passphrase compiled into the binary. The file is therefore
//! unreadable on another machine, by another local user, or to someone
//! browsing the disk, but anyone able to run code as the same user on the same
//! host can derive the key and decrypt it.
//!
//! # Concurrency
//!
//! One [`EncryptedFileTokenManager`] serializes its own writers. Separate
//! instances or processes sharing a file are not coordinated beyond the
//! atomic rename: the file never ends up corrupt, but concurrent updates can
//! be lost (last writer wins for the whole file).
//!
//! # Example
//!
//! ```rust,no_run
//! use atl_cli_credentials::{
//!     CredentialRecord, MemoryTokenManager, RemoteValidator, TokenManager,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryTokenManager::new(RemoteValidator::new().unwrap());
//! let cancel = CancellationToken::new();
//!
//! let record = CredentialRecord::new("https://acme.atlassian.net", "me@acme.com", "ATATT3x...");
//! let identity = store
//!     .validate(&record.server_url, &record.email, &record.token, &cancel)
//!     .await
//!     .unwrap();
//! println!("logged in as {}", identity.display_name);
//! store.store(&record, &cancel).await.unwrap();
//! # });
//! ```

mod atomic;
mod config;
pub mod encrypted;
mod error;
mod manager;
mod record;
mod secret;
#[cfg(feature = "keyring")]
mod store_fallback;
#[cfg(feature = "keyring")]
mod store_keyring;
mod store_memory;
mod validator;

pub use atomic::write_atomic;
pub use config::{
	default_store_path, open_token_manager, BackendKind, CredentialsConfig, DEFAULT_KEYRING_SERVICE,
	ENV_BACKEND, ENV_FILE, ENV_KEYRING_SERVICE, ENV_VALIDATE_TIMEOUT_SECS,
};
pub use encrypted::EncryptedFileTokenManager;
pub use error::{CredentialError, ErrorKind, API_TOKEN_URL};
pub use manager::TokenManager;
pub use record::{validate_email, validate_server_url, CredentialRecord, PersistedCredential, UserIdentity};
pub use secret::{SecretString, REDACTED};
#[cfg(feature = "keyring")]
pub use store_fallback::KeyringThenFileTokenManager;
#[cfg(feature = "keyring")]
pub use store_keyring::KeyringTokenManager;
pub use store_memory::MemoryTokenManager;
pub use validator::{user_agent, RemoteValidator, DEFAULT_VALIDATE_TIMEOUT};
