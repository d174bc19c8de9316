// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Machine-bound key derivation for the encrypted credentials file.
//!
//! The key is PBKDF2-HMAC-SHA256 over a fixed application passphrase, salted
//! with `"<hostname>:<uid>"`. Nothing here is secret: anyone who can run code
//! as the same user on the same host can rebuild the key. The file is opaque to
//! casual inspection, to other local users and to other machines, no more.

use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CredentialError;

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2 round count. Changing it makes existing files unreadable.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Application-wide passphrase, identical in every build.
const APP_PASSPHRASE: &[u8] = b"atl-cli/credential-store/v1";

/// Derive the key for the current host and OS user.
pub fn derive_machine_key() -> Result<Zeroizing<[u8; KEY_SIZE]>, CredentialError> {
	let host = machine_hostname()?;
	let user = current_user_id()?;
	tracing::debug!(hostname = %host, "deriving credentials file key");
	Ok(derive_key(&host, &user))
}

/// Pure derivation from the two machine identifiers.
pub fn derive_key(hostname: &str, user_id: &str) -> Zeroizing<[u8; KEY_SIZE]> {
	let salt = format!("{hostname}:{user_id}");
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	pbkdf2::pbkdf2_hmac::<Sha256>(APP_PASSPHRASE, salt.as_bytes(), KDF_ITERATIONS, &mut key[..]);
	key
}

fn machine_hostname() -> Result<String, CredentialError> {
	hostname::get()
		.map(|h| h.to_string_lossy().to_string())
		.map_err(|e| CredentialError::config(format!("cannot read hostname for key derivation: {e}")))
}

#[cfg(unix)]
fn current_user_id() -> Result<String, CredentialError> {
	// SAFETY: getuid has no preconditions and cannot fail.
	let uid = unsafe { libc::getuid() };
	Ok(uid.to_string())
}

#[cfg(not(unix))]
fn current_user_id() -> Result<String, CredentialError> {
	user_from_env(|name| std::env::var(name).ok())
}

#[cfg_attr(unix, allow(dead_code))]
fn user_from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<String, CredentialError> {
	lookup("USERNAME")
		.or_else(|| lookup("USER"))
		.filter(|u| !u.trim().is_empty())
		.ok_or_else(|| CredentialError::config("cannot determine the current user for key derivation"))
}
