//! Remote source downloads
//!
//! Fetches an allow-listed image URL into a per-URL temp file with bounded
//! retries. Deleting the temp file belongs to the caller (see
//! [`crate::cleanup`]), so several presets can share one download.

pub mod client;
pub mod mock;

pub use client::{DownloadPolicy, HttpDownloader};
pub use mock::MockDownloader;

use crate::models::DownloadResult;
use crate::source::image_extension;
use async_trait::async_trait;
use reqwest::Url;
use sha2::{Digest, Sha256};

/// Extension used when the URL path does not reveal the image type.
pub const FALLBACK_EXTENSION: &str = "jpg";

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Never fails past this boundary: errors come back inside the result.
    async fn download(&self, url: &Url) -> DownloadResult;
}

/// Deterministic temp file name for a URL: `<hash>.<ext>`.
pub fn temp_file_name(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    let hash: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    let ext = image_extension(url.path()).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{}.{}", hash, ext)
}
