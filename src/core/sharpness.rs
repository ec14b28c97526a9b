//! Focus comparison between a trusted reference crop and a captured frame.
//!
//! Genuine intaglio print keeps crisp micro-texture under the camera; copies
//! and inkjet reproductions come out soft. The focus measure is the variance
//! of the Laplacian of the grayscale image.

use std::fmt;
use std::path::Path;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::core::preprocess::{load_image, sharpness_input};
use crate::error::{AppError, ImageRole, Result};
use crate::models::report::{InputRecord, VerificationReport};
use crate::state::SharpnessConfig;

/// Minimum candidate/reference ratio for a pass.
pub const DEFAULT_PASS_RATIO: f64 = 0.6;

/// Ratios below this fail outright.
pub const DEFAULT_FAIL_RATIO: f64 = 0.2;

/// Outcome of a sharpness comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpnessVerdict {
    /// Sharp enough; consistent with genuine intaglio print.
    Pass,
    /// Too soft compared to the real note; photocopy or inkjet print.
    Suspicious,
    /// Extremely blurry; out of focus or low resolution.
    Fail,
}

impl SharpnessVerdict {
    /// One-line explanation for operators.
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::Pass => "The image is sharp (likely genuine intaglio print).",
            Self::Suspicious => {
                "The image is too soft compared to the real note (could be a photocopy or inkjet print)."
            }
            Self::Fail => "The image is extremely blurry (out of focus or low resolution).",
        }
    }
}

impl fmt::Display for SharpnessVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "PASS",
            Self::Suspicious => "SUSPICIOUS",
            Self::Fail => "FAIL",
        };
        f.write_str(label)
    }
}

/// Ratio bands for the sharpness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioThresholds {
    /// Ratios at or above this pass.
    pub pass_ratio: f64,
    /// Ratios strictly below this fail.
    pub fail_ratio: f64,
}

impl Default for RatioThresholds {
    fn default() -> Self {
        Self {
            pass_ratio: DEFAULT_PASS_RATIO,
            fail_ratio: DEFAULT_FAIL_RATIO,
        }
    }
}

impl RatioThresholds {
    /// Both ratios must be finite, non-negative and ordered.
    pub fn validate(&self) -> Result<()> {
        let ok = |r: f64| r.is_finite() && r >= 0.0;
        if !ok(self.pass_ratio) || !ok(self.fail_ratio) || self.fail_ratio > self.pass_ratio {
            return Err(AppError::Config(format!(
                "sharpness ratios must satisfy 0 <= fail ({}) <= pass ({})",
                self.fail_ratio, self.pass_ratio
            )));
        }
        Ok(())
    }

    /// Place a ratio into a band.
    pub fn classify(&self, ratio: f64) -> SharpnessVerdict {
        if ratio >= self.pass_ratio {
            SharpnessVerdict::Pass
        } else if ratio < self.fail_ratio {
            SharpnessVerdict::Fail
        } else {
            SharpnessVerdict::Suspicious
        }
    }
}

/// Scores of one reference/candidate comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpnessScore {
    /// Laplacian variance of the reference.
    pub reference_score: f64,
    /// Laplacian variance of the candidate.
    pub candidate_score: f64,
    /// `candidate_score / reference_score`.
    pub ratio: f64,
    /// Band the ratio fell in.
    pub verdict: SharpnessVerdict,
    /// Bands that were applied.
    pub thresholds: RatioThresholds,
}

/// 4-neighbour Laplacian kernel.
const LAPLACIAN_KERNEL: [i16; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Population variance of the 4-neighbour Laplacian response.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let response = imageproc::filter::filter3x3::<_, i16, i16>(gray, &LAPLACIAN_KERNEL);
    let count = response.width() as usize * response.height() as usize;
    if count == 0 {
        return 0.0;
    }

    let (sum, sum_sq) = response.pixels().fold((0.0_f64, 0.0_f64), |(s, sq), p| {
        let v = f64::from(p[0]);
        (s + v, sq + v * v)
    });
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// Focus measure of a decoded image on the square canvas.
pub fn sharpness_score(img: &DynamicImage, canvas_size: u32) -> f64 {
    laplacian_variance(&sharpness_input(img, canvas_size))
}

/// Candidate sharpness relative to the reference.
///
/// # Errors
///
/// [`AppError::ZeroReferenceScore`] when the reference has no texture at all.
pub fn sharpness_ratio(reference_score: f64, candidate_score: f64) -> Result<f64> {
    if reference_score == 0.0 {
        return Err(AppError::ZeroReferenceScore);
    }
    Ok(candidate_score / reference_score)
}

/// Compare two precomputed scores.
pub fn compare_scores(
    reference_score: f64,
    candidate_score: f64,
    thresholds: &RatioThresholds,
) -> Result<SharpnessScore> {
    let ratio = sharpness_ratio(reference_score, candidate_score)?;
    Ok(SharpnessScore {
        reference_score,
        candidate_score,
        ratio,
        verdict: thresholds.classify(ratio),
        thresholds: *thresholds,
    })
}

/// Score and compare two decoded images.
pub fn compare_images(
    reference: &DynamicImage,
    candidate: &DynamicImage,
    config: &SharpnessConfig,
) -> Result<SharpnessScore> {
    let reference_score = sharpness_score(reference, config.canvas_size);
    let candidate_score = sharpness_score(candidate, config.canvas_size);
    log::debug!(
        "Sharpness reference={:.2} candidate={:.2}",
        reference_score,
        candidate_score
    );

    let score = compare_scores(reference_score, candidate_score, &config.thresholds)?;
    log::info!("Sharpness ratio {:.2}: {}", score.ratio, score.verdict);
    Ok(score)
}

/// Compare the candidate file against the reference file.
///
/// # Errors
///
/// Fails before any ratio is computed if either image is missing or
/// undecodable, and with [`AppError::ZeroReferenceScore`] for a flat reference.
pub fn compare_files(
    reference_path: &Path,
    candidate_path: &Path,
    config: &SharpnessConfig,
) -> Result<VerificationReport<SharpnessScore>> {
    let reference = load_image(reference_path, ImageRole::Reference)?;
    let candidate = load_image(candidate_path, ImageRole::Candidate)?;

    let score = compare_images(&reference, &candidate, config)?;

    let inputs = vec![
        InputRecord::from_path(reference_path, ImageRole::Reference)?,
        InputRecord::from_path(candidate_path, ImageRole::Candidate)?,
    ];
    Ok(VerificationReport::new(score, inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage, RgbaImage};

    fn checkerboard(size: u32, cell: u32) -> DynamicImage {
        let img = RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([240, 230, 220])
            } else {
                Rgb([20, 30, 40])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_ratio_bands() {
        let t = RatioThresholds::default();

        let pass = compare_scores(100.0, 70.0, &t).unwrap();
        assert!((pass.ratio - 0.7).abs() < 1e-12);
        assert_eq!(pass.verdict, SharpnessVerdict::Pass);

        let fail = compare_scores(100.0, 15.0, &t).unwrap();
        assert!((fail.ratio - 0.15).abs() < 1e-12);
        assert_eq!(fail.verdict, SharpnessVerdict::Fail);

        let suspicious = compare_scores(100.0, 40.0, &t).unwrap();
        assert!((suspicious.ratio - 0.4).abs() < 1e-12);
        assert_eq!(suspicious.verdict, SharpnessVerdict::Suspicious);
    }

    #[test]
    fn test_band_edges() {
        let t = RatioThresholds::default();
        assert_eq!(t.classify(0.6), SharpnessVerdict::Pass);
        assert_eq!(t.classify(0.2), SharpnessVerdict::Suspicious);
        assert_eq!(t.classify(0.19999), SharpnessVerdict::Fail);
        assert_eq!(t.classify(1.8), SharpnessVerdict::Pass);
    }

    #[test]
    fn test_zero_reference_is_an_error() {
        let err = compare_scores(0.0, 12.0, &RatioThresholds::default()).unwrap_err();
        assert!(matches!(err, AppError::ZeroReferenceScore));
    }

    #[test]
    fn test_ratio_reciprocal_symmetry() {
        let (a, b) = (123.4, 56.7);
        let forward = sharpness_ratio(a, b).unwrap();
        let backward = sharpness_ratio(b, a).unwrap();
        assert!((forward * backward - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_image_has_zero_sharpness() {
        let flat = GrayImage::from_pixel(64, 64, Luma([128]));
        assert_eq!(laplacian_variance(&flat), 0.0);
    }

    #[test]
    fn test_blur_lowers_sharpness() {
        let sharp = checkerboard(256, 4);
        let soft = DynamicImage::ImageRgb8(image::imageops::blur(&sharp.to_rgb8(), 2.0));

        let sharp_score = sharpness_score(&sharp, 256);
        let soft_score = sharpness_score(&soft, 256);
        assert!(sharp_score > 0.0);
        assert!(soft_score < sharp_score * 0.5, "{} vs {}", soft_score, sharp_score);
    }

    #[test]
    fn test_score_ignores_alpha_channel() {
        let rgb = checkerboard(64, 3);
        let pixels = rgb.to_rgb8();
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            let p = pixels.get_pixel(x, y).0;
            image::Rgba([p[0], p[1], p[2], 255])
        }));
        assert_eq!(sharpness_score(&rgb, 256), sharpness_score(&rgba, 256));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(RatioThresholds::default().validate().is_ok());
        let inverted = RatioThresholds { pass_ratio: 0.2, fail_ratio: 0.6 };
        assert!(inverted.validate().is_err());
    }
}
