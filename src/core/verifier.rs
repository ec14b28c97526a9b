//! Embedding-distance verification of a candidate note against a trusted anchor.

use std::fmt;
use std::path::Path;

use image::DynamicImage;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::core::embeddings::{cosine_similarity, euclidean_distance, normalize_embedding, Embedder};
use crate::core::preprocess::{embedding_input, load_image};
use crate::error::{AppError, ImageRole, Result};
use crate::models::report::{InputRecord, VerificationReport};
use crate::state::EmbeddingConfig;

/// Decision threshold on the distance between unit-normalized embeddings.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.8;

/// Threshold once meant for raw, unnormalized embedding distances.
///
/// Superseded by [`DEFAULT_DISTANCE_THRESHOLD`] and never applied: raw
/// distances have no fixed scale, so only the normalized comparison is made.
pub const LEGACY_UNNORMALIZED_THRESHOLD: f32 = 0.5;

/// Lower bound of the optional uncertain band.
pub const UNCERTAIN_LOWER: f32 = 0.75;

/// Upper bound of the optional uncertain band.
pub const UNCERTAIN_UPPER: f32 = 1.0;

/// Outcome of an embedding comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingVerdict {
    /// The candidate shows the same genuine feature as the anchor.
    Match,
    /// Between the bands; needs a closer look.
    Uncertain,
    /// Fake, or a different feature altogether.
    NoMatch,
}

impl fmt::Display for EmbeddingVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Match => "MATCH",
            Self::Uncertain => "UNCERTAIN",
            Self::NoMatch => "NO MATCH",
        };
        f.write_str(label)
    }
}

/// Distance bands over `[0, 2]`.
///
/// `d < match_below` is a match, `d >= no_match_from` is not, anything in
/// between is uncertain. Equal bounds give a plain two-way split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceThresholds {
    /// Distances strictly below this match.
    pub match_below: f32,
    /// Distances at or above this do not match.
    pub no_match_from: f32,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self::two_band(DEFAULT_DISTANCE_THRESHOLD)
    }
}

impl DistanceThresholds {
    /// Single cut: match below `threshold`, no match otherwise.
    pub const fn two_band(threshold: f32) -> Self {
        Self {
            match_below: threshold,
            no_match_from: threshold,
        }
    }

    /// Match below 0.75, uncertain up to 1.0, no match beyond.
    pub const fn three_band() -> Self {
        Self {
            match_below: UNCERTAIN_LOWER,
            no_match_from: UNCERTAIN_UPPER,
        }
    }

    /// Bounds must be finite, ordered and within the unit-vector range.
    pub fn validate(&self) -> Result<()> {
        let in_range = |t: f32| t.is_finite() && (0.0..=2.0).contains(&t);
        if !in_range(self.match_below) || !in_range(self.no_match_from) {
            return Err(AppError::Config(format!(
                "distance thresholds must lie in [0, 2], got {} and {}",
                self.match_below, self.no_match_from
            )));
        }
        if self.match_below > self.no_match_from {
            return Err(AppError::Config(format!(
                "match threshold {} exceeds no-match threshold {}",
                self.match_below, self.no_match_from
            )));
        }
        Ok(())
    }

    /// Place a normalized distance into a band.
    pub fn classify(&self, distance: f32) -> EmbeddingVerdict {
        if distance < self.match_below {
            EmbeddingVerdict::Match
        } else if distance >= self.no_match_from {
            EmbeddingVerdict::NoMatch
        } else {
            EmbeddingVerdict::Uncertain
        }
    }
}

/// Scores of one anchor/candidate comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingScore {
    /// Euclidean distance between the normalized embeddings, in `[0, 2]`.
    pub distance: f32,
    /// Cosine similarity of the embeddings, in `[-1, 1]`.
    pub cosine_similarity: f32,
    /// Embedding length.
    pub dimension: usize,
    /// Band the distance fell in.
    pub verdict: EmbeddingVerdict,
    /// Bands that were applied.
    pub thresholds: DistanceThresholds,
}

/// Compare two raw embeddings.
///
/// # Errors
///
/// [`AppError::DimensionMismatch`] for vectors of different length and
/// [`AppError::DegenerateVector`] if either has zero norm.
pub fn compare_embeddings(
    anchor: &Array1<f32>,
    candidate: &Array1<f32>,
    thresholds: &DistanceThresholds,
) -> Result<EmbeddingScore> {
    if anchor.len() != candidate.len() {
        return Err(AppError::DimensionMismatch {
            anchor: anchor.len(),
            candidate: candidate.len(),
        });
    }

    let anchor = normalize_embedding(anchor, ImageRole::Anchor)?;
    let candidate = normalize_embedding(candidate, ImageRole::Candidate)?;

    let distance = euclidean_distance(&anchor, &candidate);
    let verdict = thresholds.classify(distance);

    Ok(EmbeddingScore {
        distance,
        cosine_similarity: cosine_similarity(&anchor, &candidate),
        dimension: anchor.len(),
        verdict,
        thresholds: *thresholds,
    })
}

/// Embed and compare two decoded images.
///
/// Both images are preprocessed before the model runs; each is embedded in
/// its own single-item inference.
pub fn verify_images(
    embedder: &dyn Embedder,
    anchor: &DynamicImage,
    candidate: &DynamicImage,
    config: &EmbeddingConfig,
) -> Result<EmbeddingScore> {
    let anchor_batch = embedding_input(anchor, config.input_size);
    let candidate_batch = embedding_input(candidate, config.input_size);

    let anchor_vec = embedder.embed(&anchor_batch)?;
    let candidate_vec = embedder.embed(&candidate_batch)?;

    let score = compare_embeddings(&anchor_vec, &candidate_vec, &config.thresholds)?;
    log::info!(
        "Embedding distance {:.4} ({} dims): {}",
        score.distance,
        score.dimension,
        score.verdict
    );
    Ok(score)
}

/// Verify the candidate file against the anchor file.
///
/// # Errors
///
/// Fails without invoking the model if either image is missing or
/// undecodable; see [`compare_embeddings`] for the numeric failures.
pub fn verify_files(
    embedder: &dyn Embedder,
    anchor_path: &Path,
    candidate_path: &Path,
    config: &EmbeddingConfig,
) -> Result<VerificationReport<EmbeddingScore>> {
    let anchor = load_image(anchor_path, ImageRole::Anchor)?;
    let candidate = load_image(candidate_path, ImageRole::Candidate)?;

    let score = verify_images(embedder, &anchor, &candidate, config)?;

    let inputs = vec![
        InputRecord::from_path(anchor_path, ImageRole::Anchor)?,
        InputRecord::from_path(candidate_path, ImageRole::Candidate)?,
    ];
    Ok(VerificationReport::new(score, inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identical_vectors_match() {
        let score = compare_embeddings(
            &array![1.0_f32, 0.0],
            &array![1.0_f32, 0.0],
            &DistanceThresholds::default(),
        )
        .unwrap();
        assert_eq!(score.distance, 0.0);
        assert_eq!(score.verdict, EmbeddingVerdict::Match);
        assert_eq!(score.dimension, 2);
    }

    #[test]
    fn test_orthogonal_vectors_do_not_match() {
        let x = array![1.0_f32, 0.0];
        let y = array![0.0_f32, 1.0];

        let score = compare_embeddings(&x, &y, &DistanceThresholds::default()).unwrap();
        assert!((score.distance - 1.414).abs() < 1e-3);
        assert_eq!(score.verdict, EmbeddingVerdict::NoMatch);

        let score = compare_embeddings(&x, &y, &DistanceThresholds::three_band()).unwrap();
        assert_eq!(score.verdict, EmbeddingVerdict::NoMatch);
    }

    #[test]
    fn test_opposite_vectors_do_not_match() {
        let score = compare_embeddings(
            &array![1.0_f32, 0.0],
            &array![-1.0_f32, 0.0],
            &DistanceThresholds::default(),
        )
        .unwrap();
        assert!((score.distance - 2.0).abs() < 1e-6);
        assert!((score.cosine_similarity + 1.0).abs() < 1e-6);
        assert_eq!(score.verdict, EmbeddingVerdict::NoMatch);
    }

    #[test]
    fn test_unnormalized_inputs_compare_by_direction() {
        let score = compare_embeddings(
            &array![10.0_f32, 0.0],
            &array![0.5_f32, 0.0],
            &DistanceThresholds::default(),
        )
        .unwrap();
        assert!(score.distance.abs() < 1e-6);
        assert_eq!(score.verdict, EmbeddingVerdict::Match);
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let err = compare_embeddings(
            &array![1.0_f32, 2.0],
            &array![0.0_f32, 0.0],
            &DistanceThresholds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::DegenerateVector { role: ImageRole::Candidate }));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = compare_embeddings(
            &array![1.0_f32, 2.0, 3.0],
            &array![1.0_f32, 2.0],
            &DistanceThresholds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { anchor: 3, candidate: 2 }));
    }

    #[test]
    fn test_two_band_boundary() {
        let t = DistanceThresholds::default();
        assert_eq!(t.classify(0.79), EmbeddingVerdict::Match);
        assert_eq!(t.classify(0.8), EmbeddingVerdict::NoMatch);
        assert_eq!(t.classify(0.9), EmbeddingVerdict::NoMatch);
    }

    #[test]
    fn test_three_band_boundaries() {
        let t = DistanceThresholds::three_band();
        assert_eq!(t.classify(0.0), EmbeddingVerdict::Match);
        assert_eq!(t.classify(0.74), EmbeddingVerdict::Match);
        assert_eq!(t.classify(0.75), EmbeddingVerdict::Uncertain);
        assert_eq!(t.classify(0.99), EmbeddingVerdict::Uncertain);
        assert_eq!(t.classify(1.0), EmbeddingVerdict::NoMatch);
        assert_eq!(t.classify(2.0), EmbeddingVerdict::NoMatch);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(DistanceThresholds::default().validate().is_ok());
        assert!(DistanceThresholds::three_band().validate().is_ok());
        assert!(DistanceThresholds { match_below: 1.0, no_match_from: 0.5 }.validate().is_err());
        assert!(DistanceThresholds::two_band(2.5).validate().is_err());
        assert!(DistanceThresholds::two_band(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_legacy_threshold_is_not_the_decision_threshold() {
        assert_ne!(DistanceThresholds::default().match_below, LEGACY_UNNORMALIZED_THRESHOLD);
    }
}
