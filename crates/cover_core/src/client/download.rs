//! Artifact download (the "Download" button of the result views).

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::{Client, Url};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::error::{TransportError, TransportResult};
use crate::status::MediaLocator;

/// Destination path for a locator inside `dir`.
///
/// Uses the locator's last path segment, or `fallback` when it has none.
pub fn download_path(dir: &Path, locator: &MediaLocator, fallback: &str) -> PathBuf {
    let name = locator
        .file_name()
        .map(sanitize_filename)
        .filter(|name| !matches!(name.as_str(), "" | "." | ".."))
        .unwrap_or_else(|| fallback.to_string());
    dir.join(name)
}

/// Stream a remote artifact to `dest`, reporting percent complete.
///
/// Returns the number of bytes written.
pub async fn fetch_artifact(
    client: &Client,
    locator: &MediaLocator,
    dest: &Path,
    progress: impl Fn(u8),
) -> TransportResult<u64> {
    let url = Url::parse(locator.as_str())
        .map_err(|e| TransportError::invalid_url(locator.as_str(), e.to_string()))?;
    info!("Downloading {} -> {}", url, dest.display());

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(TransportError::status(
            response.status().as_u16(),
            locator.as_str(),
        ));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| TransportError::io("create download folder", e))?;
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(dest)
        .await
        .map_err(|e| TransportError::io("create download file", e))?;
    let mut downloaded: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| TransportError::io("write download file", e))?;
        downloaded += chunk.len() as u64;

        if total_size > 0 {
            let percent = ((downloaded as f64 / total_size as f64) * 100.0) as u8;
            progress(percent.min(100));
        }
    }

    file.flush()
        .await
        .map_err(|e| TransportError::io("flush download file", e))?;

    Ok(downloaded)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
