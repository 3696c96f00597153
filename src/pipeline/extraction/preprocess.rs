//! Image preparation for Tesseract.
//!
//! Grayscale, bring the longest edge into a range Tesseract reads well,
//! stretch contrast. Binarization is opt-in and used by the secondary pass.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};
use tracing::debug;

use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Scans whose longest edge is below this get upscaled.
const MIN_OCR_DIMENSION: u32 = 1000;

/// Scans whose longest edge is above this get downscaled.
const MAX_OCR_DIMENSION: u32 = 4000;

const MAX_UPSCALE: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub stretch_contrast: bool,
    pub binarize: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            stretch_contrast: true,
            binarize: false,
        }
    }
}

/// Default preparation: grayscale, resize, contrast stretch. Returns PNG bytes.
pub fn preprocess_for_ocr(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    preprocess_with(bytes, &PreprocessOptions::default())
}

pub fn preprocess_with(bytes: &[u8], options: &PreprocessOptions) -> Result<Vec<u8>, ExtractionError> {
    let img = decode_image(bytes)?;
    let mut gray = rgb_to_gray(&img.to_rgb8());
    gray = fit_for_ocr(gray);

    if options.stretch_contrast {
        stretch_contrast(&mut gray);
    }
    if options.binarize {
        let threshold = otsu_threshold(&gray);
        binarize(&mut gray, threshold);
    }

    tracing::debug!(
        width = gray.width(),
        height = gray.height(),
        contrast = compute_contrast_score(&gray),
        "Image prepared for OCR"
    );
    encode_gray_png(&gray)
}

/// Validate and decode image bytes. Undecodable input is a corrupt file.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ExtractionError> {
    validate_image_bytes(bytes)?;
    image::load_from_memory(bytes).map_err(|e| ExtractionError::ImageDecode(e.to_string()))
}

/// Returns early error for clearly invalid input.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageDecode(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageDecode(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Convert RGB image to grayscale using ITU-R BT.601 luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
        gray.put_pixel(x, y, Luma([luma.round().min(255.0) as u8]));
    }
    gray
}

/// Scale so the longest edge lands in [MIN_OCR_DIMENSION, MAX_OCR_DIMENSION].
fn fit_for_ocr(gray: GrayImage) -> GrayImage {
    let (w, h) = (gray.width(), gray.height());
    let largest = w.max(h);
    if largest == 0 {
        return gray;
    }

    let (scale, filter) = if largest < MIN_OCR_DIMENSION {
        (
            (MIN_OCR_DIMENSION as f32 / largest as f32).min(MAX_UPSCALE),
            FilterType::CatmullRom,
        )
    } else if largest > MAX_OCR_DIMENSION {
        (MAX_OCR_DIMENSION as f32 / largest as f32, FilterType::Triangle)
    } else {
        return gray;
    };

    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    debug!(
        from = format!("{w}x{h}"),
        to = format!("{new_w}x{new_h}"),
        "Resizing image for OCR"
    );
    image::imageops::resize(&gray, new_w, new_h, filter)
}

/// Linear stretch between the 1st and 99th intensity percentiles.
/// Leaves near-uniform images alone.
pub fn stretch_contrast(gray: &mut GrayImage) {
    let histogram = histogram(gray);
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return;
    }

    let cutoff = total / 100;
    let low = percentile_index(&histogram, cutoff);
    let high = 255 - percentile_index_rev(&histogram, cutoff);
    if high <= low + 1 {
        return;
    }

    let range = (high - low) as f32;
    for pixel in gray.pixels_mut() {
        let v = pixel.0[0].clamp(low as u8, high as u8) as f32;
        pixel.0[0] = (((v - low as f32) / range) * 255.0).round() as u8;
    }
}

fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

fn percentile_index(histogram: &[u64; 256], cutoff: u64) -> usize {
    let mut seen = 0;
    for (i, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > cutoff {
            return i;
        }
    }
    255
}

fn percentile_index_rev(histogram: &[u64; 256], cutoff: u64) -> usize {
    let mut seen = 0;
    for (i, count) in histogram.iter().rev().enumerate() {
        seen += count;
        if seen > cutoff {
            return i;
        }
    }
    255
}

/// Otsu's method: threshold maximizing between-class variance.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let histogram = histogram(gray);
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }

    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, c)| i as f64 * *c as f64)
        .sum();

    let mut sum_background = 0.0f64;
    let mut weight_background = 0u64;
    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;

    for (t, count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * *count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_all - sum_background) / weight_foreground as f64;
        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Pixels above the threshold become white, the rest black.
pub fn binarize(gray: &mut GrayImage, threshold: u8) {
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
}

/// RMS contrast: standard deviation of grayscale intensities (0-127.5).
pub fn compute_contrast_score(img: &GrayImage) -> f32 {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for pixel in img.pixels() {
        let val = pixel.0[0] as f64;
        sum += val;
        sum_sq += val * val;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    variance.max(0.0).sqrt() as f32
}

pub fn encode_gray_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    /// Gray page with a dark band, low contrast.
    fn faded_scan(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| {
            if y % 10 < 3 {
                image::Rgb([110, 110, 110])
            } else {
                image::Rgb([150, 150, 150])
            }
        })
    }

    #[test]
    fn garbage_bytes_are_decode_errors() {
        let result = preprocess_for_ocr(&[0u8; 200]);
        assert!(matches!(result, Err(ExtractionError::ImageDecode(_))));
        assert!(matches!(
            validate_image_bytes(b"tiny"),
            Err(ExtractionError::ImageDecode(_))
        ));
    }

    #[test]
    fn small_scan_is_upscaled_and_png_encoded() {
        let out = preprocess_for_ocr(&png_bytes(&faded_scan(200, 100))).unwrap();
        assert_eq!(&out[0..4], b"\x89PNG");
        let img = image::load_from_memory(&out).unwrap();
        // 200px longest edge, capped at 3x
        assert_eq!(img.dimensions(), (600, 300));
    }

    #[test]
    fn large_scan_is_downscaled() {
        let gray = GrayImage::new(5000, 2500);
        let fitted = fit_for_ocr(gray);
        assert_eq!(fitted.dimensions(), (4000, 2000));
    }

    #[test]
    fn mid_size_scan_is_untouched() {
        let gray = GrayImage::new(1200, 1600);
        assert_eq!(fit_for_ocr(gray).dimensions(), (1200, 1600));
    }

    #[test]
    fn contrast_stretch_widens_range() {
        let mut gray = rgb_to_gray(&faded_scan(50, 50));
        let before = compute_contrast_score(&gray);
        stretch_contrast(&mut gray);
        let after = compute_contrast_score(&gray);
        assert!(after > before * 2.0, "before {before}, after {after}");
    }

    #[test]
    fn uniform_image_left_alone() {
        let mut gray = GrayImage::from_pixel(20, 20, Luma([200]));
        stretch_contrast(&mut gray);
        assert!(gray.pixels().all(|p| p.0[0] == 200));
    }

    #[test]
    fn otsu_splits_bimodal_image() {
        let gray = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([40]) } else { Luma([210]) });
        let t = otsu_threshold(&gray);
        assert!((40..210).contains(&t), "threshold {t}");
    }

    #[test]
    fn binarized_output_is_two_tone() {
        let options = PreprocessOptions {
            stretch_contrast: true,
            binarize: true,
        };
        let out = preprocess_with(&png_bytes(&faded_scan(100, 100)), &options).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();
        assert!(img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn gray_conversion_uses_luminance_weights() {
        let rgb = RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0]));
        assert_eq!(rgb_to_gray(&rgb).get_pixel(0, 0).0[0], 76);
    }
}
