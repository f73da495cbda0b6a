//! Pipeline orchestration for deriving every artifact of a source image.
//!
//! Flow per source: resolve presets, classify the source, download if
//! remote, then run the preset loop and the LQIP generator against the same
//! file. A downloaded temp file lives until both have finished.

use crate::cache::{file_size, lqip_is_current, should_regenerate};
use crate::cleanup::with_temp_source;
use crate::download::{DownloadPolicy, Downloader, HttpDownloader};
use crate::image::{lqip_paths, output_path, ImageProcessor, ImageService, LqipSettings};
use crate::models::{
    Config, DownloadResult, FailureKind, LqipResult, Preset, ProcessingResult, SourceImage,
};
use crate::presets::{PresetRegistry, DEFAULT_PRESET, LQIP_PRESET};
use crate::source::{AllowList, SourceResolver};
use crate::{Error, Result};
use reqwest::Url;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Which presets a source should be rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetSelection {
    /// The registry's essential list (cover images).
    Essential,
    /// Only the `default` preset (inline images).
    Default,
    Named(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SourceRequest {
    /// Local path or remote URL.
    pub source: String,
    pub presets: PresetSelection,
    pub output_dir: PathBuf,
    pub base_name: String,
    pub force: bool,
    pub include_lqip: bool,
}

impl SourceRequest {
    pub fn new(source: &str, output_dir: &Path, base_name: &str) -> Self {
        Self {
            source: source.to_string(),
            presets: PresetSelection::Default,
            output_dir: output_dir.to_path_buf(),
            base_name: base_name.to_string(),
            force: false,
            include_lqip: false,
        }
    }

    pub fn with_presets(mut self, presets: PresetSelection) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_lqip(mut self, include_lqip: bool) -> Self {
        self.include_lqip = include_lqip;
        self
    }
}

/// Everything that happened to one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub download: Option<DownloadResult>,
    pub results: Vec<ProcessingResult>,
    pub lqip: Option<LqipResult>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Artifacts the request asked for, counted even when the source failed early.
    pub requested_artifacts: usize,
}

impl SourceReport {
    fn completed(
        request: &SourceRequest,
        download: Option<DownloadResult>,
        results: Vec<ProcessingResult>,
        lqip: Option<LqipResult>,
        requested_artifacts: usize,
    ) -> Self {
        Self {
            source: request.source.clone(),
            download,
            results,
            lqip,
            error: None,
            failure: None,
            requested_artifacts,
        }
    }

    fn failed(
        request: &SourceRequest,
        kind: FailureKind,
        error: Error,
        download: Option<DownloadResult>,
        requested_artifacts: usize,
    ) -> Self {
        let message = error.to_string();
        error!("{}: {}", request.source, message);
        Self {
            source: request.source.clone(),
            download,
            results: Vec::new(),
            lqip: None,
            error: Some(message),
            failure: Some(kind),
            requested_artifacts,
        }
    }

    /// No source-level failure and every artifact succeeded or was current.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
            && self.results.iter().all(|r| r.success)
            && self.lqip.as_ref().map_or(true, |l| l.success)
    }

    fn tally(&self, summary: &mut RunSummary) {
        if self.failure.is_some() {
            summary.errored += self.requested_artifacts;
            return;
        }

        let outcomes = self
            .results
            .iter()
            .map(|r| (r.success, r.skipped))
            .chain(self.lqip.iter().map(|l| (l.success, l.skipped)));

        for (success, skipped) in outcomes {
            match (success, skipped) {
                (true, true) => summary.skipped += 1,
                (true, false) => summary.processed += 1,
                (false, _) => summary.errored += 1,
            }
        }
    }
}

/// Artifact counts across a run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed={} skipped={} errored={}",
            self.processed, self.skipped, self.errored
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for source in &self.sources {
            source.tally(&mut summary);
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.summary().errored > 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Injectable service bundle used to construct [`Pipeline`] in tests.
pub struct PipelineServices {
    pub downloader: Box<dyn Downloader>,
    pub image: Box<dyn ImageService>,
}

pub struct Pipeline {
    downloader: Box<dyn Downloader>,
    image: Box<dyn ImageService>,
    registry: PresetRegistry,
    resolver: SourceResolver,
}

impl Pipeline {
    pub fn with_services(
        services: PipelineServices,
        registry: PresetRegistry,
        resolver: SourceResolver,
    ) -> Self {
        Self {
            downloader: services.downloader,
            image: services.image,
            registry,
            resolver,
        }
    }

    /// Production wiring: HTTP downloader, `image`-backed processor, the
    /// default registry and the configured allow-list.
    pub fn new(config: &Config) -> Result<Self> {
        let registry = PresetRegistry::default();
        let resolver = SourceResolver::new(
            AllowList::default().with_extra_domains(&config.extra_image_domains),
        );

        let downloader = HttpDownloader::new(
            &config.temp_dir,
            DownloadPolicy {
                timeout: config.download_timeout,
                max_attempts: config.download_max_attempts,
                base_delay: config.download_retry_delay,
            },
        )?;

        let lqip = registry
            .lookup(LQIP_PRESET)
            .map(LqipSettings::from_preset)
            .unwrap_or_default();
        let image = ImageProcessor::new().with_lqip_settings(lqip);

        Ok(Self::with_services(
            PipelineServices {
                downloader: Box::new(downloader),
                image: Box::new(image),
            },
            registry,
            resolver,
        ))
    }

    fn select_presets(&self, selection: &PresetSelection) -> Result<Vec<Preset>> {
        match selection {
            PresetSelection::Essential => {
                self.registry.resolve(self.registry.list_essential_presets())
            }
            PresetSelection::Default => self.registry.resolve(&[DEFAULT_PRESET]),
            PresetSelection::Named(names) => {
                // The placeholder has its own generator and sidecar; the preset
                // loop must never write `<base>-lqip.webp`.
                if names.iter().any(|name| name == LQIP_PRESET) {
                    return Err(Error::Config(format!(
                        "preset '{}' is produced by the LQIP generator; use include_lqip",
                        LQIP_PRESET
                    )));
                }
                self.registry.resolve(names)
            }
        }
    }

    fn requested_artifacts(&self, request: &SourceRequest) -> usize {
        let presets = match &request.presets {
            PresetSelection::Essential => self.registry.list_essential_presets().len(),
            PresetSelection::Default => 1,
            PresetSelection::Named(names) => names.len(),
        };
        presets + usize::from(request.include_lqip)
    }

    /// Process one source. Never fails: every problem is recorded in the report.
    pub async fn process_source(&self, request: &SourceRequest) -> SourceReport {
        info!(
            "Processing {} -> {}",
            request.source,
            request.output_dir.display()
        );
        let requested = self.requested_artifacts(request);

        let presets = match self.select_presets(&request.presets) {
            Ok(presets) => presets,
            Err(e) => return SourceReport::failed(request, FailureKind::Config, e, None, requested),
        };

        let source = match self.resolver.classify(&request.source) {
            Ok(source) => source,
            Err(e) => {
                return SourceReport::failed(request, FailureKind::InvalidSource, e, None, requested)
            }
        };

        match source {
            SourceImage::Local { path } => {
                if !path.is_file() {
                    let e =
                        Error::InvalidSource(format!("local file not found: {}", path.display()));
                    return SourceReport::failed(
                        request,
                        FailureKind::InvalidSource,
                        e,
                        None,
                        requested,
                    );
                }

                let (results, lqip) = self.run_artifacts(&path, request, &presets).await;
                SourceReport::completed(request, None, results, lqip, requested)
            }
            SourceImage::Remote { url } => {
                self.process_remote(&url, request, &presets, requested).await
            }
        }
    }

    /// Process sources one after another; a failed source never stops the rest.
    ///
    /// Two requests that would write the same outputs (same directory and base
    /// name) cannot both be honoured: the first one wins and every later one
    /// fails as an invalid source instead of being reported as up to date.
    pub async fn process_batch(&self, requests: &[SourceRequest]) -> RunReport {
        let mut report = RunReport::default();
        let mut claimed: HashMap<(PathBuf, String), &str> = HashMap::new();

        for request in requests {
            let target = (request.output_dir.clone(), request.base_name.clone());
            if let Some(owner) = claimed.get(&target) {
                let e = Error::InvalidSource(format!(
                    "outputs '{}' in {} are already produced by {}",
                    request.base_name,
                    request.output_dir.display(),
                    owner
                ));
                report.sources.push(SourceReport::failed(
                    request,
                    FailureKind::InvalidSource,
                    e,
                    None,
                    self.requested_artifacts(request),
                ));
                continue;
            }
            claimed.insert(target, &request.source);

            report.sources.push(self.process_source(request).await);
        }

        info!("Summary: {}", report.summary());
        report
    }

    async fn process_remote(
        &self,
        url: &Url,
        request: &SourceRequest,
        presets: &[Preset],
        requested: usize,
    ) -> SourceReport {
        if !request.force {
            if let Some((results, lqip)) = self.existing_outputs(request, presets) {
                info!("All outputs for {} already exist, skipping download", url);
                return SourceReport::completed(request, None, results, lqip, requested);
            }
        }

        let download = self.downloader.download(url).await;
        let temp_path = match (&download.temp_path, download.success) {
            (Some(path), true) => path.clone(),
            _ => {
                let reason = download
                    .error
                    .clone()
                    .unwrap_or_else(|| "no file was produced".to_string());
                return SourceReport::failed(
                    request,
                    FailureKind::DownloadFailure,
                    Error::Download(reason),
                    Some(download),
                    requested,
                );
            }
        };

        let (results, lqip) = with_temp_source(&temp_path, |path| async move {
            self.run_artifacts(&path, request, presets).await
        })
        .await;

        SourceReport::completed(request, Some(download), results, lqip, requested)
    }

    /// Skipped results for every requested artifact, if all of them exist.
    fn existing_outputs(
        &self,
        request: &SourceRequest,
        presets: &[Preset],
    ) -> Option<(Vec<ProcessingResult>, Option<LqipResult>)> {
        let mut results = Vec::with_capacity(presets.len());
        for preset in presets {
            let output = output_path(&request.output_dir, &request.base_name, preset);
            if !output.is_file() {
                return None;
            }
            let size = file_size(&output);
            results.push(ProcessingResult::skipped(preset, output, size));
        }

        let lqip = if request.include_lqip {
            let (webp, txt) = lqip_paths(&request.output_dir, &request.base_name);
            Some(read_existing_lqip(webp, txt)?)
        } else {
            None
        };

        Some((results, lqip))
    }

    async fn run_artifacts(
        &self,
        source: &Path,
        request: &SourceRequest,
        presets: &[Preset],
    ) -> (Vec<ProcessingResult>, Option<LqipResult>) {
        let lqip = async {
            if request.include_lqip {
                Some(self.run_lqip(source, request).await)
            } else {
                None
            }
        };

        tokio::join!(self.run_presets(source, request, presets), lqip)
    }

    async fn run_presets(
        &self,
        source: &Path,
        request: &SourceRequest,
        presets: &[Preset],
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(presets.len());

        for preset in presets {
            let output = output_path(&request.output_dir, &request.base_name, preset);

            if !should_regenerate(source, &output, request.force) {
                info!("[{}] {} is up to date", preset.name, output.display());
                let size = file_size(&output);
                results.push(ProcessingResult::skipped(preset, output, size));
                continue;
            }

            let result = self
                .image
                .transform(source, preset, &request.output_dir, &request.base_name)
                .await;

            match &result.error {
                None => info!(
                    "[{}] {} -> {} ({} bytes)",
                    preset.name, request.source, result.output_file_name, result.size_bytes
                ),
                Some(e) => error!("[{}] {}: {}", preset.name, request.source, e),
            }
            results.push(result);
        }

        results
    }

    async fn run_lqip(&self, source: &Path, request: &SourceRequest) -> LqipResult {
        let (webp, txt) = lqip_paths(&request.output_dir, &request.base_name);

        if lqip_is_current(source, &webp, &txt, request.force) {
            if let Some(existing) = read_existing_lqip(webp, txt) {
                info!("[lqip] {} is up to date", existing.lqip_path.display());
                return existing;
            }
            warn!("[lqip] sidecar for {} is unreadable, regenerating", request.source);
        }

        let result = self
            .image
            .generate_lqip(source, &request.output_dir, &request.base_name)
            .await;

        match &result.error {
            None => info!("[lqip] {} -> {}", request.source, result.lqip_path.display()),
            Some(e) => error!("[lqip] {}: {}", request.source, e),
        }
        result
    }
}

fn read_existing_lqip(webp: PathBuf, txt: PathBuf) -> Option<LqipResult> {
    if !webp.is_file() {
        return None;
    }
    let data_uri = std::fs::read_to_string(&txt).ok()?;
    let size_bytes = file_size(&webp);

    Some(LqipResult {
        success: true,
        skipped: true,
        lqip_path: webp,
        base64_path: txt,
        data_uri: Some(data_uri.trim().to_string()),
        size_bytes,
        error: None,
    })
}
