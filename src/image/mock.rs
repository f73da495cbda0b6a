use super::{lqip_paths, output_path, ImageService};
use crate::models::{LqipResult, Preset, ProcessingResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records calls and writes placeholder bytes; individual presets or the
/// LQIP step can be made to fail.
#[derive(Clone)]
pub struct MockImageProcessor {
    transform_count: Arc<Mutex<usize>>,
    lqip_count: Arc<Mutex<usize>>,
    seen_sources: Arc<Mutex<Vec<PathBuf>>>,
    failing_presets: Arc<Mutex<HashSet<String>>>,
    lqip_should_fail: Arc<Mutex<bool>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            transform_count: Arc::new(Mutex::new(0)),
            lqip_count: Arc::new(Mutex::new(0)),
            seen_sources: Arc::new(Mutex::new(Vec::new())),
            failing_presets: Arc::new(Mutex::new(HashSet::new())),
            lqip_should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failing_preset(self, name: &str) -> Self {
        self.failing_presets.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn with_lqip_failure(self, should_fail: bool) -> Self {
        *self.lqip_should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_transform_count(&self) -> usize {
        *self.transform_count.lock().unwrap()
    }

    pub fn get_lqip_count(&self) -> usize {
        *self.lqip_count.lock().unwrap()
    }

    /// Sources passed to `transform`/`generate_lqip`, in call order.
    pub fn get_seen_sources(&self) -> Vec<PathBuf> {
        self.seen_sources.lock().unwrap().clone()
    }

    // Returns whether the source still exists.
    fn record(&self, source: &Path) -> bool {
        self.seen_sources.lock().unwrap().push(source.to_path_buf());
        source.exists()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    async fn transform(
        &self,
        source: &Path,
        preset: &Preset,
        output_dir: &Path,
        base_name: &str,
    ) -> ProcessingResult {
        *self.transform_count.lock().unwrap() += 1;
        let output = output_path(output_dir, base_name, preset);

        if !self.record(source) {
            return ProcessingResult::failed(
                preset,
                output,
                format!("Transform failed: source {} is missing", source.display()),
            );
        }

        if self.failing_presets.lock().unwrap().contains(&preset.name) {
            return ProcessingResult::failed(
                preset,
                output,
                "Transform failed: mock encode failure".to_string(),
            );
        }

        let body = format!("{}:{}", preset.name, base_name).into_bytes();
        let written = async {
            tokio::fs::create_dir_all(output_dir).await?;
            tokio::fs::write(&output, &body).await
        }
        .await;

        match written {
            Ok(()) => ProcessingResult::generated(preset, output, body.len() as u64),
            Err(e) => ProcessingResult::failed(preset, output, format!("Transform failed: {}", e)),
        }
    }

    async fn generate_lqip(&self, source: &Path, output_dir: &Path, base_name: &str) -> LqipResult {
        *self.lqip_count.lock().unwrap() += 1;
        let (lqip_path, base64_path) = lqip_paths(output_dir, base_name);
        let source_present = self.record(source);

        if *self.lqip_should_fail.lock().unwrap() || !source_present {
            return LqipResult {
                success: false,
                skipped: false,
                lqip_path,
                base64_path,
                data_uri: None,
                size_bytes: 0,
                error: Some("LQIP generation failed: mock failure".to_string()),
            };
        }

        let data_uri = super::lqip::data_uri(base_name.as_bytes());
        let written = async {
            tokio::fs::create_dir_all(output_dir).await?;
            tokio::fs::write(&lqip_path, base_name.as_bytes()).await?;
            tokio::fs::write(&base64_path, data_uri.as_bytes()).await
        }
        .await;

        match written {
            Ok(()) => LqipResult {
                success: true,
                skipped: false,
                lqip_path,
                base64_path,
                data_uri: Some(data_uri),
                size_bytes: base_name.len() as u64,
                error: None,
            },
            Err(e) => LqipResult {
                success: false,
                skipped: false,
                lqip_path,
                base64_path,
                data_uri: None,
                size_bytes: 0,
                error: Some(format!("LQIP generation failed: {}", e)),
            },
        }
    }
}
