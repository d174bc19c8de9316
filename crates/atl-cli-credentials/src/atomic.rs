// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash-safe file replacement: write a sibling temp file, then rename it over
//! the target. Readers see either the old file or the new one, never a mix.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomically replace `path` with `contents`.
///
/// The temp file is named `<path>.tmp.<pid>-<nanos>-<seq>` and opened with
/// `create_new`, so concurrent writers never share or truncate each other's
/// temp file. It is removed on every error path.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).await?;
	}

	let temp_path = temp_path_for(path);
	match write_then_rename(&temp_path, path, contents).await {
		Ok(()) => {
			debug!(path = ?path, "file replaced atomically");
			Ok(())
		}
		Err(e) => {
			if let Err(cleanup) = fs::remove_file(&temp_path).await {
				if cleanup.kind() != std::io::ErrorKind::NotFound {
					warn!(path = ?temp_path, error = %cleanup, "failed to remove temp file");
				}
			}
			Err(e)
		}
	}
}

async fn write_then_rename(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let mut file = fs::OpenOptions::new()
		.write(true)
		.create_new(true)
		.open(temp_path)
		.await?;
	file.write_all(contents).await?;
	file.sync_all().await?;
	drop(file);

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let perms = std::fs::Permissions::from_mode(0o600);
		if let Err(e) = fs::set_permissions(temp_path, perms).await {
			warn!(path = ?temp_path, error = %e, "Failed to set file permissions to 0600");
		}
	}

	fs::rename(temp_path, path).await
}

fn temp_path_for(path: &Path) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_nanos())
		.unwrap_or_default();
	let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);

	let mut name = OsString::from(path.as_os_str());
	name.push(format!(".tmp.{}-{nanos}-{seq}", std::process::id()));
	PathBuf::from(name)
}
