//! Format encoders.
//!
//! | Format | Encoder |
//! |---|---|
//! | WebP | `webp` (libwebp, lossy at preset quality) |
//! | AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | JPEG | `image::codecs::jpeg::JpegEncoder`, alpha dropped |
//! | PNG | `image::codecs::png::PngEncoder`, lossless |

use crate::models::ImageFormat;
use crate::{Error, Result};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::DynamicImage;

const AVIF_SPEED: u8 = 6;

pub fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    match format {
        ImageFormat::WebP => encode_webp(img, quality),
        ImageFormat::Avif => {
            let mut buf = Vec::new();
            let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
            Ok(buf)
        }
        ImageFormat::Jpeg => {
            let mut buf = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
            Ok(buf)
        }
        ImageFormat::Png => {
            let mut buf = Vec::new();
            let encoder = PngEncoder::new(&mut buf);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
            Ok(buf)
        }
    }
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let encoded = encoder
        .encode_simple(false, quality as f32)
        .map_err(|e| Error::Transform(format!("WebP encode failed: {:?}", e)))?;
    Ok(encoded.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x * 7) as u8, (y * 5) as u8, 128, 255])
        }))
    }

    #[test]
    fn test_webp_output_has_riff_header() {
        let bytes = encode(&gradient(32, 24), ImageFormat::WebP, 80).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_jpeg_drops_alpha_and_decodes() {
        let bytes = encode(&gradient(32, 24), ImageFormat::Jpeg, 85).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_png_round_trips_dimensions() {
        let bytes = encode(&gradient(10, 4), ImageFormat::Png, 50).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 4));
    }

    #[test]
    fn test_avif_produces_ftyp_box() {
        let bytes = encode(&gradient(16, 16), ImageFormat::Avif, 60).unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");
    }
}
