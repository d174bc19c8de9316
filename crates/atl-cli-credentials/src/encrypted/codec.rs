// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM sealing of the serialized credential container.
//!
//! Sealed layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use super::key::KEY_SIZE;
use crate::error::CredentialError;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let mut nonce_bytes = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce_bytes);

	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
		.map_err(|e| CredentialError::crypto(format!("encryption failed: {e}")))?;

	let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
	sealed.extend_from_slice(&nonce_bytes);
	sealed.extend_from_slice(&ciphertext);
	Ok(sealed)
}

/// Authenticate and decrypt a sealed blob. Fails closed on truncation or any
/// tag mismatch.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
	if sealed.len() < NONCE_SIZE {
		return Err(CredentialError::crypto(format!(
			"sealed data is {} bytes, shorter than the {NONCE_SIZE}-byte nonce",
			sealed.len()
		)));
	}
	let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let plaintext = cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|_| CredentialError::crypto("authentication failed"))?;

	Ok(Zeroizing::new(plaintext))
}
