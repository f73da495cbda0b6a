//! Data models and structures
//!
//! Defines presets, source descriptors, and the result records every
//! component hands back to the orchestrator, plus environment configuration.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    WebP,
    Avif,
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::WebP => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::WebP => "image/webp",
            ImageFormat::Avif => "image/avif",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// How a preset's bounds are applied to the source.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Crop to fill the target box.
    Cover,
    /// Fit within the bounds, preserving aspect ratio.
    Inside,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    /// `None` leaves the dimension unconstrained.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: ImageFormat,
    /// Encoder quality, 1-100.
    pub quality: u8,
    pub fit: FitMode,
}

impl Preset {
    pub fn new(
        name: &str,
        width: Option<u32>,
        height: Option<u32>,
        format: ImageFormat,
        quality: u8,
        fit: FitMode,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            format,
            quality: quality.clamp(1, 100),
            fit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    Local { path: PathBuf },
    Remote { url: reqwest::Url },
}

impl SourceImage {
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceImage::Remote { .. })
    }
}

impl std::fmt::Display for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceImage::Local { path } => write!(f, "{}", path.display()),
            SourceImage::Remote { url } => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DownloadResult {
    pub success: bool,
    pub temp_path: Option<PathBuf>,
    pub original_url: String,
    pub size_bytes: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn succeeded(url: &str, temp_path: PathBuf, size_bytes: u64, attempts: u32) -> Self {
        Self {
            success: true,
            temp_path: Some(temp_path),
            original_url: url.to_string(),
            size_bytes,
            attempts,
            error: None,
        }
    }

    pub fn failed(url: &str, attempts: u32, error: String) -> Self {
        Self {
            success: false,
            temp_path: None,
            original_url: url.to_string(),
            size_bytes: 0,
            attempts,
            error: Some(error),
        }
    }
}

/// Outcome of one (source, preset) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessingResult {
    pub success: bool,
    /// Output was already current; nothing was written.
    pub skipped: bool,
    pub output_path: PathBuf,
    pub output_file_name: String,
    pub preset: String,
    pub format: ImageFormat,
    pub size_bytes: u64,
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn generated(preset: &Preset, output_path: PathBuf, size_bytes: u64) -> Self {
        Self::with_outcome(preset, output_path, true, false, size_bytes, None)
    }

    pub fn skipped(preset: &Preset, output_path: PathBuf, size_bytes: u64) -> Self {
        Self::with_outcome(preset, output_path, true, true, size_bytes, None)
    }

    pub fn failed(preset: &Preset, output_path: PathBuf, error: String) -> Self {
        Self::with_outcome(preset, output_path, false, false, 0, Some(error))
    }

    fn with_outcome(
        preset: &Preset,
        output_path: PathBuf,
        success: bool,
        skipped: bool,
        size_bytes: u64,
        error: Option<String>,
    ) -> Self {
        let output_file_name = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            success,
            skipped,
            output_path,
            output_file_name,
            preset: preset.name.clone(),
            format: preset.format,
            size_bytes,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LqipResult {
    pub success: bool,
    pub skipped: bool,
    pub lqip_path: PathBuf,
    pub base64_path: PathBuf,
    /// `data:image/webp;base64,...`; `None` on failure.
    pub data_uri: Option<String>,
    pub size_bytes: u64,
    pub error: Option<String>,
}

/// Which stage of the taxonomy stopped a whole source.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    InvalidSource,
    DownloadFailure,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub raw_dir: PathBuf,
    pub public_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub download_timeout: Duration,
    pub download_max_attempts: u32,
    pub download_retry_delay: Duration,
    pub extra_image_domains: Vec<String>,
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("images/raw"),
            public_dir: PathBuf::from("public/images"),
            temp_dir: PathBuf::from("temp/images"),
            download_timeout: Duration::from_secs(30),
            download_max_attempts: 3,
            download_retry_delay: Duration::from_millis(1000),
            extra_image_domains: Vec::new(),
            strict: false,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse_u64 = |name: &str, default: u64| -> crate::Result<u64> {
            match lookup(name) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    crate::Error::Config(format!(
                        "{} must be a non-negative integer, got '{}'",
                        name, raw
                    ))
                }),
                None => Ok(default),
            }
        };

        let max_attempts =
            parse_u64("DOWNLOAD_MAX_ATTEMPTS", defaults.download_max_attempts as u64)?;
        if max_attempts == 0 || max_attempts > u32::MAX as u64 {
            return Err(crate::Error::Config(
                "DOWNLOAD_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let timeout_secs = parse_u64("DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(crate::Error::Config(
                "DOWNLOAD_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            raw_dir: lookup("IMAGES_RAW_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_dir),
            public_dir: lookup("IMAGES_PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            temp_dir: lookup("IMAGES_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            download_timeout: Duration::from_secs(timeout_secs),
            download_max_attempts: max_attempts as u32,
            download_retry_delay: Duration::from_millis(parse_u64(
                "DOWNLOAD_RETRY_DELAY_MS",
                defaults.download_retry_delay.as_millis() as u64,
            )?),
            extra_image_domains: lookup("EXTRA_IMAGE_DOMAINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|d| d.trim().to_ascii_lowercase())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            strict: lookup("CI")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
        })
    }
}

/// A missing `.env` is normal; a malformed one is not.
fn check_dotenv<T>(loaded: dotenvy::Result<T>) -> crate::Result<()> {
    match loaded {
        Err(e) if !e.not_found() => Err(e.into()),
        _ => Ok(()),
    }
}
