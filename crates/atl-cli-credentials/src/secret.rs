// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for API tokens.

use std::fmt;

use zeroize::Zeroize;

/// Placeholder printed wherever a token would otherwise appear.
pub const REDACTED: &str = "[REDACTED]";

/// An API token that never prints itself and is wiped from memory on drop.
///
/// There is no `Deref` and no `Serialize`; the raw value is only reachable
/// through [`SecretString::expose`], which keeps every access greppable.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretString {
	inner: String,
}

impl SecretString {
	pub fn new(inner: impl Into<String>) -> Self {
		Self {
			inner: inner.into(),
		}
	}

	pub fn expose(&self) -> &str {
		&self.inner
	}

	/// True when the token is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl From<String> for SecretString {
	fn from(inner: String) -> Self {
		Self::new(inner)
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl Eq for SecretString {}
