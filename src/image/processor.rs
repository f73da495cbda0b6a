use super::calculations::{plan_resize, ResizePlan};
use super::encode::encode;
use super::lqip::{write_placeholder, LqipSettings};
use super::{lqip_paths, output_path, write_atomic, ImageService};
use crate::models::{LqipResult, Preset, ProcessingResult};
use crate::{Error, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Real transformer backed by the `image` crate; codec work runs on the
/// blocking pool.
pub struct ImageProcessor {
    lqip: LqipSettings,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            lqip: LqipSettings::default(),
        }
    }

    pub fn with_lqip_settings(mut self, settings: LqipSettings) -> Self {
        self.lqip = settings;
        self
    }

    fn load(source: &Path) -> Result<DynamicImage> {
        Ok(image::ImageReader::open(source)?
            .with_guessed_format()?
            .decode()?)
    }

    fn apply(img: DynamicImage, plan: ResizePlan) -> DynamicImage {
        match plan {
            ResizePlan::Keep => img,
            ResizePlan::Scale { width, height } => {
                img.resize_exact(width, height, FilterType::Lanczos3)
            }
            ResizePlan::Fill { width, height } => {
                img.resize_to_fill(width, height, FilterType::Lanczos3)
            }
        }
    }

    fn transform_sync(source: PathBuf, output: PathBuf, preset: Preset) -> Result<u64> {
        let img = Self::load(&source)?;
        let plan = plan_resize((img.width(), img.height()), &preset);
        debug!(
            "Preset '{}' on {}x{} source: {:?}",
            preset.name,
            img.width(),
            img.height(),
            plan
        );

        let resized = Self::apply(img, plan);
        let bytes = encode(&resized, preset.format, preset.quality)?;
        write_atomic(&output, &bytes)?;
        Ok(bytes.len() as u64)
    }

    async fn run_blocking<T, F>(job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| Error::Generic(format!("Image processing task join error: {}", e)))?
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for ImageProcessor {
    async fn transform(
        &self,
        source: &Path,
        preset: &Preset,
        output_dir: &Path,
        base_name: &str,
    ) -> ProcessingResult {
        let output = output_path(output_dir, base_name, preset);

        let outcome = Self::run_blocking({
            let source = source.to_path_buf();
            let output = output.clone();
            let preset = preset.clone();
            move || Self::transform_sync(source, output, preset)
        })
        .await;

        match outcome {
            Ok(size) => {
                debug!(
                    "[{}] {} -> {} ({} bytes)",
                    preset.name,
                    source.display(),
                    output.display(),
                    size
                );
                ProcessingResult::generated(preset, output, size)
            }
            Err(e) => {
                let message = Error::Transform(e.to_string()).to_string();
                debug!("[{}] {}: {}", preset.name, source.display(), message);
                ProcessingResult::failed(preset, output, message)
            }
        }
    }

    async fn generate_lqip(&self, source: &Path, output_dir: &Path, base_name: &str) -> LqipResult {
        let (webp_path, txt_path) = lqip_paths(output_dir, base_name);

        let outcome = Self::run_blocking({
            let source = source.to_path_buf();
            let webp_path = webp_path.clone();
            let txt_path = txt_path.clone();
            let settings = self.lqip;
            move || write_placeholder(&source, &webp_path, &txt_path, &settings)
        })
        .await;

        match outcome {
            Ok((data_uri, size_bytes)) => {
                debug!(
                    "[lqip] {} -> {} ({} bytes)",
                    source.display(),
                    webp_path.display(),
                    size_bytes
                );
                LqipResult {
                    success: true,
                    skipped: false,
                    lqip_path: webp_path,
                    base64_path: txt_path,
                    data_uri: Some(data_uri),
                    size_bytes,
                    error: None,
                }
            }
            Err(e) => {
                let message = Error::Lqip(e.to_string()).to_string();
                debug!("[lqip] {}: {}", source.display(), message);
                LqipResult {
                    success: false,
                    skipped: false,
                    lqip_path: webp_path,
                    base64_path: txt_path,
                    data_uri: None,
                    size_bytes: 0,
                    error: Some(message),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FitMode, ImageFormat};
    use crate::presets::PresetRegistry;
    use tempfile::TempDir;

    struct TestImageProcessor {
        processor: ImageProcessor,
        source: PathBuf,
        output_dir: PathBuf,
        _temp_dir: TempDir,
    }

    impl TestImageProcessor {
        fn new(width: u32, height: u32) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let source = temp_dir.path().join("portada.png");
            image::RgbImage::from_fn(width, height, |x, y| {
                image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
            })
            .save(&source)
            .unwrap();

            Self {
                processor: ImageProcessor::new(),
                source,
                output_dir: temp_dir.path().join("public/p1"),
                _temp_dir: temp_dir,
            }
        }
    }

    #[tokio::test]
    async fn test_default_preset_downscales_to_webp() {
        let test = TestImageProcessor::new(1600, 800);
        let registry = PresetRegistry::default();
        let preset = registry.lookup("default").unwrap();

        let result = test
            .processor
            .transform(&test.source, preset, &test.output_dir, "portada")
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output_file_name, "portada.webp");
        assert_eq!(result.size_bytes, std::fs::metadata(&result.output_path).unwrap().len());

        let out = image::open(&result.output_path).unwrap();
        assert_eq!((out.width(), out.height()), (1200, 600));
    }

    #[tokio::test]
    async fn test_cover_preset_crops_to_target() {
        let test = TestImageProcessor::new(1300, 900);
        let registry = PresetRegistry::default();

        let result = test
            .processor
            .transform(&test.source, registry.lookup("thumb").unwrap(), &test.output_dir, "portada")
            .await;

        assert!(result.success, "{:?}", result.error);
        let out = image::open(&result.output_path).unwrap();
        assert_eq!((out.width(), out.height()), (600, 315));
    }

    #[tokio::test]
    async fn test_small_source_is_never_enlarged() {
        let test = TestImageProcessor::new(300, 200);
        let registry = PresetRegistry::default();

        for name in ["default", "og", "thumb"] {
            let result = test
                .processor
                .transform(
                    &test.source,
                    registry.lookup(name).unwrap(),
                    &test.output_dir,
                    "portada",
                )
                .await;
            assert!(result.success, "{}: {:?}", name, result.error);

            let out = image::open(&result.output_path).unwrap();
            assert_eq!(out.width().max(out.height()), 300, "preset {}", name);
        }
    }

    #[tokio::test]
    async fn test_corrupt_source_fails_without_output() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not an image").unwrap();
        let preset = Preset::new(
            "thumb",
            Some(10),
            Some(10),
            ImageFormat::WebP,
            50,
            FitMode::Cover,
        );

        let result = ImageProcessor::new()
            .transform(&source, &preset, temp.path(), "broken")
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Transform failed"));
        assert!(!result.output_path.exists());
    }

    #[tokio::test]
    async fn test_generate_lqip_writes_both_sidecars() {
        let test = TestImageProcessor::new(200, 100);

        let result = test
            .processor
            .generate_lqip(&test.source, &test.output_dir, "portada")
            .await;

        assert!(result.success, "{:?}", result.error);
        assert!(result.lqip_path.ends_with("portada-lqip.webp"));
        assert!(result.base64_path.ends_with("portada-lqip.txt"));
        let uri = result.data_uri.unwrap();
        assert!(uri.starts_with("data:image/webp;base64,"));
        assert_eq!(std::fs::read_to_string(&result.base64_path).unwrap(), uri);
    }

    #[tokio::test]
    async fn test_generate_lqip_failure_has_no_data_uri() {
        let temp = TempDir::new().unwrap();
        let result = ImageProcessor::new()
            .generate_lqip(&temp.path().join("missing.png"), temp.path(), "missing")
            .await;

        assert!(!result.success);
        assert!(result.data_uri.is_none());
        assert!(result.error.unwrap().starts_with("LQIP generation failed"));
    }
}
