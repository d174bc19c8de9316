// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential error types.

use std::path::PathBuf;

/// Page where Atlassian users create and revoke API tokens.
pub const API_TOKEN_URL: &str = "https://id.atlassian.com/manage-profile/security/api-tokens";

/// Machine-checkable classification of a [`CredentialError`].
///
/// Callers branch on this instead of inspecting error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	Validation,
	NotFound,
	Persistence,
	Crypto,
	Unreachable,
	Authentication,
	UnexpectedStatus,
	Protocol,
	Backend,
	Config,
	Cancelled,
}

/// Errors that can occur during credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
	/// The record handed to `store` is malformed.
	#[error("Invalid credential: {0}")]
	Validation(String),

	#[error("No credentials stored for {0}")]
	NotFound(String),

	/// Reading or writing the credentials file failed.
	#[error("Credential store I/O error: {0}")]
	Persistence(String),

	/// Sealing or opening a blob failed.
	#[error("Credential encryption error: {0}")]
	Crypto(String),

	/// The credentials file exists but does not open with this machine's key.
	/// Every later read or write hits the same wall until the file is removed.
	#[error(
		"Cannot decrypt credentials file {}: {reason}. The file may be corrupted or this machine's identity changed; remove {} and log in again",
		.path.display(),
		.path.display()
	)]
	UnreadableStore { path: PathBuf, reason: String },

	#[error("cannot reach {url}: {reason}. Check the server URL and your network connection")]
	Unreachable { url: String, reason: String },

	#[error("invalid email or API token for {url}. Generate a new API token at {}", API_TOKEN_URL)]
	Authentication { url: String },

	#[error("unexpected status {status} from {url}: {body}")]
	UnexpectedStatus { url: String, status: u16, body: String },

	/// The server answered 2xx but the body was not a user identity.
	#[error("malformed response from {url}: {reason}")]
	Protocol { url: String, reason: String },

	/// The OS secret store refused the operation.
	#[error("Secret store error: {0}")]
	Backend(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Operation cancelled")]
	Cancelled,
}

impl CredentialError {
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	pub fn crypto(msg: impl Into<String>) -> Self {
		Self::Crypto(msg.into())
	}

	pub fn config(msg: impl Into<String>) -> Self {
		Self::Config(msg.into())
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation(_) => ErrorKind::Validation,
			Self::NotFound(_) => ErrorKind::NotFound,
			Self::Persistence(_) => ErrorKind::Persistence,
			Self::Crypto(_) | Self::UnreadableStore { .. } => ErrorKind::Crypto,
			Self::Unreachable { .. } => ErrorKind::Unreachable,
			Self::Authentication { .. } => ErrorKind::Authentication,
			Self::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
			Self::Protocol { .. } => ErrorKind::Protocol,
			Self::Backend(_) => ErrorKind::Backend,
			Self::Config(_) => ErrorKind::Config,
			Self::Cancelled => ErrorKind::Cancelled,
		}
	}

	/// Whether an external retry helper may reasonably try the call again.
	///
	/// Nothing in this crate retries on its own.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Unreachable { .. } => true,
			Self::UnexpectedStatus { status, .. } => *status == 429 || (500..600).contains(status),
			_ => false,
		}
	}
}

impl From<std::io::Error> for CredentialError {
	fn from(err: std::io::Error) -> Self {
		CredentialError::Persistence(err.to_string())
	}
}
