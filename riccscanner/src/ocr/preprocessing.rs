use crate::config::OcrConfig;
use crate::error::{Result, ScanError};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, ImageReader, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Adaptive threshold neighbourhood (pixels) and the constant subtracted from
/// the weighted local mean.
const THRESHOLD_BLOCK_SIZE: u32 = 11;
const THRESHOLD_C: i16 = 2;

/// Decode raw bytes, sniffing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::Image(format!("Failed to read image: {e}")))?;

    reader
        .decode()
        .map_err(|e| ScanError::Image(format!("Failed to decode image: {e}")))
}

/// Decode and size-check an image that will be sent to OCR as-is.
pub fn validate_image(bytes: &[u8], config: &OcrConfig) -> Result<()> {
    let img = decode_image(bytes)?;
    ensure_min_dimensions(&img, config)
}

fn ensure_min_dimensions(img: &DynamicImage, config: &OcrConfig) -> Result<()> {
    let (width, height) = img.dimensions();
    if width < config.min_image_dimension || height < config.min_image_dimension {
        return Err(ScanError::Image(format!(
            "Image too small: {}x{}, minimum {}x{}",
            width, height, config.min_image_dimension, config.min_image_dimension
        )));
    }
    Ok(())
}

/// Preprocess image bytes so handwriting survives OCR.
///
/// 1. Validates image dimensions (minimum)
/// 2. Downscales oversized images
/// 3. Converts to grayscale
/// 4. Upscales narrow images to `target_width` (cubic)
/// 5. Median denoise
/// 6. Adaptive Gaussian threshold
/// 7. Morphological close to reconnect broken strokes
///
/// Returns a binary black/white PNG.
pub fn preprocess_image(bytes: &[u8], config: &OcrConfig) -> Result<Vec<u8>> {
    let img = decode_image(bytes)?;
    ensure_min_dimensions(&img, config)?;
    let (width, height) = img.dimensions();

    let img = resize_if_needed(img, config.max_image_dimension);
    let gray = img.to_luma8();
    let gray = upscale_to_width(gray, config.target_width, config.max_image_dimension);
    let denoised = median_filter_3x3(&gray);
    let binary = adaptive_threshold(&denoised, THRESHOLD_BLOCK_SIZE, THRESHOLD_C);
    let closed = close_2x2(&binary);

    tracing::debug!(
        original_width = width,
        original_height = height,
        width = closed.width(),
        height = closed.height(),
        "Image preprocessed for OCR"
    );

    let mut output = Vec::new();
    DynamicImage::ImageLuma8(closed)
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| ScanError::Image(format!("Failed to encode image: {e}")))?;

    Ok(output)
}

/// Resize image if it exceeds maximum dimension while maintaining aspect ratio
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    if width <= max_dim && height <= max_dim {
        return img;
    }

    let ratio = if width > height {
        max_dim as f32 / width as f32
    } else {
        max_dim as f32 / height as f32
    };

    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);

    img.resize(new_width, new_height, FilterType::Lanczos3)
}

/// Upscale so the width reaches `target_width`, never letting either side
/// grow past `max_dim`.
fn upscale_to_width(gray: GrayImage, target_width: u32, max_dim: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || width >= target_width {
        return gray;
    }

    let mut scale = target_width as f32 / width as f32;
    if height as f32 * scale > max_dim as f32 {
        scale = max_dim as f32 / height as f32;
    }
    if scale <= 1.0 {
        return gray;
    }

    let new_width = ((width as f32 * scale).round() as u32).min(max_dim).max(1);
    let new_height = ((height as f32 * scale).round() as u32).min(max_dim).max(1);

    image::imageops::resize(&gray, new_width, new_height, FilterType::CatmullRom)
}

/// 3x3 median filter with replicated borders.
fn median_filter_3x3(gray: &GrayImage) -> GrayImage {
    median_filter(gray, 1, 1)
}

/// Gaussian-weighted local mean threshold. A pixel turns white when it is
/// brighter than `mean - c`.
fn adaptive_threshold(gray: &GrayImage, block_size: u32, c: i16) -> GrayImage {
    // Same sigma OpenCV derives for a kernel of this size.
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(gray, sigma);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i16;
        let threshold = mean.get_pixel(x, y)[0] as i16 - c;
        if value > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Morphological close (dilate then erode) with a 2x2 square. The erosion
/// uses the mirrored anchor so the pair is a true closing.
fn close_2x2(gray: &GrayImage) -> GrayImage {
    let kernel = GrayImage::from_pixel(2, 2, Luma([255]));
    let dilated = grayscale_dilate(gray, &Mask::from_image(&kernel, 0, 0));
    grayscale_erode(&dilated, &Mask::from_image(&kernel, 1, 1))
}
