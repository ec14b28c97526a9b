//! Decoding and shaping of note images for the two checks.
//!
//! The decoder yields RGB channel order directly, so the embedding path needs
//! no channel swap. The sharpness path collapses to grayscale before resizing.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use ndarray::Array4;

use crate::error::{AppError, ImageRole, Result};

/// Square resolution fed to the embedding model.
pub const EMBEDDING_INPUT_SIZE: u32 = 128;

/// Square canvas for the Laplacian focus measure.
pub const SHARPNESS_CANVAS_SIZE: u32 = 256;

/// Load an image from disk, detecting the format from its content.
///
/// # Errors
///
/// [`AppError::ImageNotFound`] if `path` does not exist and
/// [`AppError::ImageDecode`] if it exists but is not a readable image.
pub fn load_image(path: &Path, role: ImageRole) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(AppError::ImageNotFound {
            role,
            path: path.to_path_buf(),
        });
    }
    log::debug!("Loading {} image: {}", role, path.display());

    let origin = path.display().to_string();
    image::io::Reader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode())
        .map_err(|source| AppError::ImageDecode { role, origin, source })
}

/// Decode an in-memory image, e.g. an upload.
pub fn decode_image_bytes(bytes: &[u8], role: ImageRole, origin: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| AppError::ImageDecode {
        role,
        origin: origin.to_string(),
        source,
    })
}

/// Build the `(1, size, size, 3)` float batch the embedding model consumes.
///
/// Intensities stay in `[0, 255]`; the model rescales internally.
pub fn embedding_input(img: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let rgb = image::imageops::resize(&rgb, size, size, FilterType::Triangle);
    let side = size as usize;

    Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        f32::from(rgb.get_pixel(x as u32, y as u32)[c])
    })
}

/// Grayscale and resize to the square sharpness canvas.
pub fn sharpness_input(img: &DynamicImage, size: u32) -> GrayImage {
    let gray = to_grayscale(img);
    image::imageops::resize(&gray, size, size, FilterType::Triangle)
}

/// Luma with ITU-R BT.601 weights, rounded to nearest.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}
