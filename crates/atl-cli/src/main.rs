// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! atl - Jira and Confluence from the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use atl_cli_credentials::{open_token_manager, BackendKind, CredentialsConfig};

mod auth;

#[derive(Parser, Debug)]
#[command(name = "atl", version, about, long_about = None)]
struct Args {
	/// Credential backend: memory, keyring, file or auto
	#[arg(long, global = true)]
	backend: Option<BackendKind>,

	/// Encrypted credentials file (default: ~/.atl/credentials.enc)
	#[arg(long, global = true)]
	credentials_file: Option<PathBuf>,

	/// Increase log verbosity (-v debug, -vv trace)
	#[arg(short, long, global = true, action = ArgAction::Count)]
	verbose: u8,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Manage stored API tokens
	Auth {
		#[command(subcommand)]
		command: AuthCommand,
	},
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
	/// Check an API token against the server and store it
	Login {
		/// Server base URL, e.g. https://acme.atlassian.net
		#[arg(long, env = "ATL_SERVER")]
		server: String,
		/// Account email the token belongs to
		#[arg(long, env = "ATL_EMAIL")]
		email: String,
	},
	/// Forget the stored token for a server
	Logout {
		#[arg(long, env = "ATL_SERVER")]
		server: String,
	},
	/// Show who the stored token belongs to
	Status {
		#[arg(long, env = "ATL_SERVER")]
		server: String,
	},
}

fn init_tracing(verbose: u8) {
	let level = match verbose {
		0 => "warn",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().compact().with_writer(std::io::stderr))
		.init();
}

fn load_config(args: &Args) -> Result<CredentialsConfig> {
	let mut config = CredentialsConfig::from_env().context("invalid credential settings")?;
	if let Some(backend) = args.backend {
		config.backend = backend;
	}
	if let Some(path) = &args.credentials_file {
		config.file_path = Some(path.clone());
	}
	Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(args.verbose);

	let config = load_config(&args)?;
	let manager = open_token_manager(&config).context("failed to open credential store")?;

	let cancel = CancellationToken::new();
	let on_interrupt = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			debug!("interrupt received, cancelling");
			on_interrupt.cancel();
		}
	});

	match args.command {
		Command::Auth { command } => match command {
			AuthCommand::Login { server, email } => {
				let token = auth::read_token(
					std::env::var(auth::TOKEN_ENV).ok(),
					tokio::io::BufReader::new(tokio::io::stdin()),
				)
				.await?;
				auth::login(manager.as_ref(), &server, &email, token, &cancel).await
			}
			AuthCommand::Logout { server } => auth::logout(manager.as_ref(), &server, &cancel).await,
			AuthCommand::Status { server } => auth::status(manager.as_ref(), &server, &cancel).await,
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cli_definition_is_consistent() {
		use clap::CommandFactory;
		Args::command().debug_assert();
	}

	#[test]
	fn backend_flag_parses_and_overrides() {
		let args = Args::try_parse_from([
			"atl",
			"--backend",
			"memory",
			"--credentials-file",
			"/tmp/creds.enc",
			"auth",
			"logout",
			"--server",
			"https://a.example",
		])
		.unwrap();
		assert_eq!(args.backend, Some(BackendKind::Memory));

		let config = load_config(&args).unwrap();
		assert_eq!(config.backend, BackendKind::Memory);
		assert_eq!(config.file_path, Some(PathBuf::from("/tmp/creds.enc")));
	}

	#[test]
	fn unknown_backend_is_rejected_by_the_parser() {
		let err = Args::try_parse_from([
			"atl",
			"--backend",
			"vault",
			"auth",
			"status",
			"--server",
			"https://a.example",
		])
		.unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
	}
}
