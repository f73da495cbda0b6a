use super::{temp_file_name, Downloader};
use crate::models::DownloadResult;
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Writes canned bytes instead of touching the network.
#[derive(Clone)]
pub struct MockDownloader {
    temp_dir: PathBuf,
    body: Arc<Mutex<Vec<u8>>>,
    call_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
    max_attempts: u32,
}

impl MockDownloader {
    pub fn new(temp_dir: &Path) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            body: Arc::new(Mutex::new(b"mock image bytes".to_vec())),
            call_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            max_attempts: 3,
        }
    }

    pub fn with_body(self, body: Vec<u8>) -> Self {
        *self.body.lock().unwrap() = body;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn temp_path_for(&self, url: &Url) -> PathBuf {
        self.temp_dir.join(temp_file_name(url))
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(&self, url: &Url) -> DownloadResult {
        *self.call_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return DownloadResult::failed(
                url.as_str(),
                self.max_attempts,
                format!("Failed after {} attempts: mock failure", self.max_attempts),
            );
        }

        let body = self.body.lock().unwrap().clone();
        let temp_path = self.temp_path_for(url);
        let written = async {
            tokio::fs::create_dir_all(&self.temp_dir).await?;
            tokio::fs::write(&temp_path, &body).await
        }
        .await;

        match written {
            Ok(()) => DownloadResult::succeeded(url.as_str(), temp_path, body.len() as u64, 1),
            Err(e) => DownloadResult::failed(url.as_str(), 1, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_downloader_writes_body() {
        let temp = TempDir::new().unwrap();
        let downloader = MockDownloader::new(temp.path()).with_body(vec![7, 7, 7]);
        let url = Url::parse("https://images.unsplash.com/photo-x").unwrap();

        let result = downloader.download(&url).await;

        assert!(result.success);
        assert_eq!(result.size_bytes, 3);
        assert_eq!(std::fs::read(result.temp_path.unwrap()).unwrap(), vec![7, 7, 7]);
        assert_eq!(downloader.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_downloader_failure() {
        let temp = TempDir::new().unwrap();
        let downloader = MockDownloader::new(temp.path()).with_failure(true);
        let url = Url::parse("https://images.unsplash.com/photo-x").unwrap();

        let result = downloader.download(&url).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("3 attempts"));
        assert!(!downloader.temp_path_for(&url).exists());
    }
}
