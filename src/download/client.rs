use super::{temp_file_name, Downloader};
use crate::models::DownloadResult;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Upper bound for a single retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Linearly increasing retry delays: `base`, `2 * base`, `3 * base`, ...,
/// each capped at [`MAX_RETRY_DELAY`].
pub fn linear_backoff(base: Duration) -> impl Iterator<Item = Duration> {
    (1u32..).map(move |attempt| {
        base.checked_mul(attempt)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    })
}

pub struct HttpDownloader {
    client: Client,
    temp_dir: PathBuf,
    policy: DownloadPolicy,
}

impl HttpDownloader {
    pub fn new(temp_dir: &Path, policy: DownloadPolicy) -> Result<Self> {
        let client = Client::builder().timeout(policy.timeout).build()?;
        Ok(Self::new_with_client(temp_dir, policy, client))
    }

    pub fn new_with_client(temp_dir: &Path, policy: DownloadPolicy, client: Client) -> Self {
        Self {
            client,
            temp_dir: temp_dir.to_path_buf(),
            policy: DownloadPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn temp_path_for(&self, url: &Url) -> PathBuf {
        self.temp_dir.join(temp_file_name(url))
    }

    async fn fetch_once(client: &Client, url: &Url, attempt: u32) -> Result<Vec<u8>> {
        debug!("Fetching {} (attempt {})", url, attempt);

        let response = client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(Error::Download(format!("HTTP status {}", response.status())));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(Error::Download("empty response body".to_string()));
        }

        Ok(bytes.to_vec())
    }

    async fn fetch_with_retry(&self, url: &Url) -> (Result<Vec<u8>>, u32) {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.policy.max_attempts;
        let strategy = linear_backoff(self.policy.base_delay).take(max_attempts as usize - 1);

        let outcome = Retry::spawn(strategy, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let client = &self.client;
            async move {
                Self::fetch_once(client, url, attempt).await.map_err(|e| {
                    warn!(
                        "Download attempt {}/{} for {} failed: {}",
                        attempt, max_attempts, url, e
                    );
                    e
                })
            }
        })
        .await;

        (outcome, attempts.load(Ordering::SeqCst))
    }

    async fn write_temp(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        if let Err(e) = tokio::fs::write(path, bytes).await {
            let _ = tokio::fs::remove_file(path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &Url) -> DownloadResult {
        let (outcome, attempts) = self.fetch_with_retry(url).await;

        let bytes = match outcome {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("Failed after {} attempts: {}", attempts, e);
                warn!("Download of {} gave up: {}", url, message);
                return DownloadResult::failed(url.as_str(), attempts, message);
            }
        };

        let temp_path = self.temp_path_for(url);
        if let Err(e) = self.write_temp(&temp_path, &bytes).await {
            let message = format!("Failed to write {}: {}", temp_path.display(), e);
            warn!("Download of {} could not be stored: {}", url, message);
            return DownloadResult::failed(url.as_str(), attempts, message);
        }

        info!(
            "Downloaded {} ({} bytes) to {}",
            url,
            bytes.len(),
            temp_path.display()
        );
        DownloadResult::succeeded(url.as_str(), temp_path, bytes.len() as u64, attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> DownloadPolicy {
        DownloadPolicy {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
        }
    }

    fn url_for(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[test]
    fn test_linear_backoff_grows_by_base() {
        let delays: Vec<Duration> = linear_backoff(Duration::from_millis(100)).take(3).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300)
            ]
        );
    }

    #[test]
    fn test_linear_backoff_is_capped_without_overflow() {
        let delays: Vec<Duration> = linear_backoff(Duration::from_millis(u64::MAX))
            .take(3)
            .collect();
        assert_eq!(delays, vec![MAX_RETRY_DELAY; 3]);

        let delays: Vec<Duration> = linear_backoff(Duration::from_secs(120)).take(3).collect();
        assert_eq!(
            delays,
            vec![Duration::from_secs(120), Duration::from_secs(240), MAX_RETRY_DELAY]
        );
    }

    #[tokio::test]
    async fn test_download_writes_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let temp_dir = temp.path().join("temp/images");
        let downloader = HttpDownloader::new(&temp_dir, fast_policy()).unwrap();

        let url = url_for(&server, "/photo.png");
        let result = downloader.download(&url).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.size_bytes, 4);
        assert_eq!(result.attempts, 1);
        let temp_path = result.temp_path.unwrap();
        assert_eq!(temp_path, downloader.temp_path_for(&url));
        assert!(temp_path.to_string_lossy().ends_with(".png"));
        assert_eq!(std::fs::read(&temp_path).unwrap(), vec![1u8, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_download_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 16]))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(temp.path(), fast_policy()).unwrap();

        let result = downloader.download(&url_for(&server, "/flaky.jpg")).await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.size_bytes, 16);
    }

    #[tokio::test]
    async fn test_download_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(temp.path(), fast_policy()).unwrap();

        let url = url_for(&server, "/broken.jpg");
        let result = downloader.download(&url).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert!(result.temp_path.is_none());
        assert!(result.error.unwrap().contains("3 attempts"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert!(!downloader.temp_path_for(&url).exists());
    }

    #[tokio::test]
    async fn test_download_times_out_each_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 8])
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let policy = DownloadPolicy {
            timeout: Duration::from_millis(50),
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let downloader = HttpDownloader::new(temp.path(), policy).unwrap();

        let result = downloader.download(&url_for(&server, "/slow.webp")).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert!(result.error.unwrap().contains("2 attempts"));
    }

    #[tokio::test]
    async fn test_empty_body_counts_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let policy = DownloadPolicy {
            max_attempts: 1,
            ..fast_policy()
        };
        let downloader = HttpDownloader::new(temp.path(), policy).unwrap();

        let result = downloader.download(&url_for(&server, "/empty.gif")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("empty response body"));
    }
}
