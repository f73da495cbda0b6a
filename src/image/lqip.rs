//! Low-quality image placeholders.
//!
//! A ~20px blurred WebP plus a sidecar holding the same bytes as a
//! `data:image/webp;base64,...` URI, so pages can inline it.

use super::calculations::{plan_inside, ResizePlan};
use super::encode::encode;
use super::write_atomic;
use crate::models::{ImageFormat, Preset};
use crate::Result;
use base64::Engine as _;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LqipSettings {
    pub width: u32,
    pub quality: u8,
    pub blur_sigma: f32,
}

impl Default for LqipSettings {
    fn default() -> Self {
        Self {
            width: 20,
            quality: 20,
            blur_sigma: 1.0,
        }
    }
}

impl LqipSettings {
    /// Take width and quality from the registry's `lqip` preset.
    pub fn from_preset(preset: &Preset) -> Self {
        let defaults = Self::default();
        Self {
            width: preset.width.unwrap_or(defaults.width),
            quality: preset.quality,
            blur_sigma: defaults.blur_sigma,
        }
    }
}

pub fn data_uri(webp_bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        ImageFormat::WebP.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(webp_bytes)
    )
}

pub fn render_placeholder(img: &DynamicImage, settings: &LqipSettings) -> Result<Vec<u8>> {
    let small = match plan_inside((img.width(), img.height()), Some(settings.width), None) {
        ResizePlan::Scale { width, height } | ResizePlan::Fill { width, height } => {
            img.resize_exact(width, height, FilterType::Triangle)
        }
        ResizePlan::Keep => img.clone(),
    };

    let blurred = DynamicImage::ImageRgba8(image::imageops::blur(
        &small.to_rgba8(),
        settings.blur_sigma,
    ));
    encode(&blurred, ImageFormat::WebP, settings.quality)
}

/// Decode the source, write both sidecars, and return `(data_uri, webp_size)`.
pub fn write_placeholder(
    source: &Path,
    webp_path: &Path,
    txt_path: &Path,
    settings: &LqipSettings,
) -> Result<(String, u64)> {
    let img = image::ImageReader::open(source)?
        .with_guessed_format()?
        .decode()?;

    let bytes = render_placeholder(&img, settings)?;
    let uri = data_uri(&bytes);

    write_atomic(webp_path, &bytes)?;
    write_atomic(txt_path, uri.as_bytes())?;

    Ok((uri, bytes.len() as u64))
}
