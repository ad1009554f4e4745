// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only per-controller, per-situation data log.

use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Appends one record to `<controller_name>-<situation>.data` under `dir`.
/// Creates the file if it doesn't exist. Never panics on I/O failure; the
/// caller turns the returned error into a human-readable `DATA_NACK` reason.
pub async fn append_record(
    dir: &Path,
    controller_name: &str,
    situation: &str,
    frame_type_name: &str,
    device: &str,
    value: &str,
) -> std::io::Result<()> {
    let path = record_path(dir, controller_name, situation);
    let line = format!(
        "{},{},{},{}\n",
        timestamp(),
        frame_type_name,
        device,
        value
    );

    let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

fn record_path(dir: &Path, controller_name: &str, situation: &str) -> PathBuf {
    dir.join(format!("{}-{}.data", controller_name, situation))
}

/// `DD-MM-YY,HH:MM:SS` in local wall-clock time, matching `localtime`/`strftime`
/// in the reference implementation.
fn timestamp() -> String {
    chrono::Local::now().format("%d-%m-%y,%H:%M:%S").to_string()
}
