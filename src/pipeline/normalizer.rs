use crate::common::NormalizedImage;
use crate::config::NormalizerSettings;
use crate::error::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Scaled dimensions that fit `(max_width, max_height)` along the longer side.
/// Images already within bounds keep their size.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale = if width > height {
        if width > max_width {
            max_width as f64 / width as f64
        } else {
            1.0
        }
    } else if height > max_height {
        max_height as f64 / height as f64
    } else {
        1.0
    };

    if scale >= 1.0 {
        return (width, height);
    }
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

fn quality_to_encoder(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Decodes `image_bytes`, shrinks it to fit the bounds and re-encodes it as JPEG.
#[instrument(skip(image_bytes), fields(len = image_bytes.len()))]
pub fn normalize(
    image_bytes: &[u8],
    max_width: u32,
    max_height: u32,
    quality: f32,
) -> Result<NormalizedImage, AppError> {
    let decoded = image::load_from_memory(image_bytes)?;
    let (width, height) = decoded.dimensions();
    let (target_width, target_height) = fit_within(width, height, max_width, max_height);

    let resized = if (target_width, target_height) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_width, target_height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality_to_encoder(quality));
    rgb.write_with_encoder(encoder)?;

    debug!(
        "Normalized {}x{} -> {}x{} ({} bytes)",
        width,
        height,
        target_width,
        target_height,
        encoded.len()
    );
    Ok(NormalizedImage::new(
        encoded,
        target_width,
        target_height,
        ImageFormat::Jpeg.to_mime_type(),
    ))
}

/// Runs [`normalize`] on the blocking pool with the configured bounds.
pub async fn normalize_async(
    image_bytes: Arc<Vec<u8>>,
    settings: NormalizerSettings,
) -> Result<NormalizedImage, AppError> {
    tokio::task::spawn_blocking(move || {
        normalize(
            &image_bytes,
            settings.max_width,
            settings.max_height,
            settings.quality,
        )
    })
    .await
    .map_err(|e| AppError::Decode(format!("normalizer task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([90, 160, 60])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn landscape_is_bounded_by_width() {
        let normalized = normalize(&png(2000, 1000), 512, 512, 0.9).unwrap();
        assert_eq!(normalized.dimensions(), (512, 256));
        assert_eq!(normalized.mime_type(), "image/jpeg");
        let decoded = image::load_from_memory(normalized.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (512, 256));
    }

    #[test]
    fn portrait_is_bounded_by_height() {
        let normalized = normalize(&png(300, 900), 512, 512, 0.9).unwrap();
        assert_eq!(normalized.dimensions(), (171, 512));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let normalized = normalize(&png(100, 40), 512, 512, 0.9).unwrap();
        assert_eq!(normalized.dimensions(), (100, 40));
    }

    #[test]
    fn transparent_input_is_flattened() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(20, 10, Rgba([1, 2, 3, 0])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        let normalized = normalize(&bytes.into_inner(), 512, 512, 0.9).unwrap();
        assert_eq!(normalized.dimensions(), (20, 10));
    }

    #[test]
    fn undecodable_input_is_decode_error() {
        let result = normalize(b"GIF89a but not really", 512, 512, 0.9);
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[test]
    fn fit_preserves_aspect_ratio_and_bound() {
        let cases = [
            (4032, 3024),
            (3024, 4032),
            (1000, 1000),
            (513, 7),
            (9, 5000),
            (777, 333),
            (640, 480),
        ];
        for (w, h) in cases {
            let (fw, fh) = fit_within(w, h, 512, 512);
            assert!(fw.max(fh) <= 512, "{}x{} -> {}x{}", w, h, fw, fh);
            assert!(fw >= 1 && fh >= 1);
            // The shorter side may be off by one pixel of rounding.
            let scale = fw.max(fh) as f64 / w.max(h) as f64;
            assert!((fw as f64 - w as f64 * scale).abs() <= 1.0);
            assert!((fh as f64 - h as f64 * scale).abs() <= 1.0);
        }
    }

    #[test]
    fn quality_maps_to_encoder_scale() {
        assert_eq!(quality_to_encoder(0.9), 90);
        assert_eq!(quality_to_encoder(1.0), 100);
        assert_eq!(quality_to_encoder(0.001), 1);
    }

    #[tokio::test]
    async fn async_normalization_uses_settings() {
        let settings = NormalizerSettings {
            max_width: 64,
            max_height: 64,
            quality: 0.8,
        };
        let normalized = normalize_async(Arc::new(png(256, 128)), settings).await.unwrap();
        assert_eq!(normalized.dimensions(), (64, 32));
    }
}
