// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use atl_cli_credentials::{
	CredentialRecord, ErrorKind, SecretString, TokenManager, UserIdentity, API_TOKEN_URL,
};

/// Non-interactive token source for scripts and CI.
pub const TOKEN_ENV: &str = "ATL_API_TOKEN";

/// Take the token from the environment, or read one line from `input`.
pub async fn read_token<R>(from_env: Option<String>, mut input: R) -> Result<SecretString>
where
	R: AsyncBufRead + Unpin,
{
	if let Some(token) = from_env.filter(|t| !t.trim().is_empty()) {
		debug!("using API token from {TOKEN_ENV}");
		return Ok(SecretString::new(token.trim()));
	}

	eprint!("API token (create one at {API_TOKEN_URL}): ");
	io::stderr().flush().ok();

	let mut line = String::new();
	input
		.read_line(&mut line)
		.await
		.context("failed to read API token from stdin")?;
	let token = SecretString::new(line.trim());

	if token.is_blank() {
		bail!("no API token given; set {TOKEN_ENV} or type it at the prompt");
	}
	Ok(token)
}

#[instrument(skip_all, fields(server_url = %server_url))]
pub async fn login(
	manager: &dyn TokenManager,
	server_url: &str,
	email: &str,
	token: SecretString,
	cancel: &CancellationToken,
) -> Result<()> {
	let record = CredentialRecord {
		server_url: server_url.to_string(),
		email: email.to_string(),
		token,
	};
	record.validate()?;

	let identity = manager
		.validate(&record.server_url, &record.email, &record.token, cancel)
		.await?;
	manager
		.store(&record, cancel)
		.await
		.context("token is valid but could not be saved")?;

	info!(account_id = %identity.account_id, "logged in");
	println!("Logged in to {server_url} as {}", describe(&identity));
	Ok(())
}

#[instrument(skip_all, fields(server_url = %server_url))]
pub async fn logout(
	manager: &dyn TokenManager,
	server_url: &str,
	cancel: &CancellationToken,
) -> Result<()> {
	manager
		.delete(server_url, cancel)
		.await
		.context("failed to remove stored credentials")?;
	println!("Logged out of {server_url}");
	Ok(())
}

#[instrument(skip_all, fields(server_url = %server_url))]
pub async fn status(
	manager: &dyn TokenManager,
	server_url: &str,
	cancel: &CancellationToken,
) -> Result<()> {
	let record = match manager.get(server_url, cancel).await {
		Ok(record) => record,
		Err(e) if e.kind() == ErrorKind::NotFound => {
			return Err(anyhow!(
				"not logged in to {server_url}; run `atl auth login --server {server_url}`"
			));
		}
		Err(e) => return Err(anyhow::Error::new(e).context("failed to read stored credentials")),
	};

	let identity = manager
		.validate(&record.server_url, &record.email, &record.token, cancel)
		.await?;
	println!("Logged in to {server_url} as {}", describe(&identity));
	Ok(())
}

fn describe(identity: &UserIdentity) -> String {
	let mut out = identity.display_name.clone();
	if !identity.email.is_empty() {
		out.push_str(&format!(" <{}>", identity.email));
	}
	if !identity.active {
		out.push_str(" (inactive)");
	}
	out
}
