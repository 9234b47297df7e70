//! Blocking HTTP download.
//!
//! Wraps an async `reqwest` client in a single-threaded Tokio runtime so the
//! caller stays synchronous. No retries.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};

/// Download `url` into the file at `dest`.
///
/// Any transport failure, non-2xx status or write error is reported as
/// [`Error::SourceUnavailable`] for `url`.
pub fn download(url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::unavailable(url, e))?;

    let bytes = rt.block_on(fetch_bytes(url, timeout))?;
    std::fs::write(dest, &bytes).map_err(|e| Error::unavailable(url, e))?;

    debug!(url, bytes = bytes.len(), dest = %dest.display(), "downloaded");
    Ok(bytes.len() as u64)
}

async fn fetch_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::unavailable(url, e))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::unavailable(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::unavailable(url, format!("HTTP {}", status)));
    }

    let body = resp.bytes().await.map_err(|e| Error::unavailable(url, e))?;
    Ok(body.to_vec())
}
