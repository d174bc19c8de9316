// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Self-managed encrypted credentials file, for hosts without an OS secret store.
//!
//! File layout: `[12-byte nonce][AES-256-GCM ciphertext + tag]`; the plaintext
//! is a JSON object mapping server URL to credential record.

pub mod codec;
pub mod key;
mod store;

pub use key::{derive_key, derive_machine_key, KDF_ITERATIONS, KEY_SIZE};
pub use store::{CredentialContainer, EncryptedFileTokenManager};
