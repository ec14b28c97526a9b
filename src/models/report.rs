use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sharpness::SharpnessScore;
use crate::core::verifier::{EmbeddingScore, EmbeddingVerdict};
use crate::error::{ImageRole, Result};

/// One input image of a verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Part the image played in the comparison.
    pub role: ImageRole,
    /// File or upload name.
    pub file_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// SHA3-256 of the raw file, when hashing is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha3_256: Option<String>,
}

impl InputRecord {
    /// Describe a file on disk.
    pub fn from_path(path: &Path, role: ImageRole) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        #[cfg(feature = "hashing")]
        let sha3_256 = Some(crate::core::hash::compute_file_hash(path)?);
        #[cfg(not(feature = "hashing"))]
        let sha3_256 = None;

        Ok(Self {
            role,
            file_name,
            size_bytes: metadata.len(),
            sha3_256,
        })
    }

    /// Describe an in-memory upload.
    pub fn from_bytes(file_name: &str, bytes: &[u8], role: ImageRole) -> Self {
        #[cfg(feature = "hashing")]
        let sha3_256 = Some(crate::core::hash::compute_sha3_256(bytes));
        #[cfg(not(feature = "hashing"))]
        let sha3_256 = None;

        Self {
            role,
            file_name: file_name.to_string(),
            size_bytes: bytes.len() as u64,
            sha3_256,
        }
    }
}

/// A completed check: its scores plus when and on what it ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport<T> {
    /// Unique report id.
    pub id: Uuid,
    /// When the check completed.
    pub checked_at: DateTime<Utc>,
    /// The compared images.
    pub inputs: Vec<InputRecord>,
    /// Scores and verdict.
    #[serde(flatten)]
    pub result: T,
}

impl<T> VerificationReport<T> {
    /// Stamp a result with a fresh id and the current time.
    pub fn new(result: T, inputs: Vec<InputRecord>) -> Self {
        Self {
            id: Uuid::new_v4(),
            checked_at: Utc::now(),
            inputs,
            result,
        }
    }

    /// Serializes the report to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String>
    where
        T: Serialize,
    {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn write_inputs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "{:<10} {}", format!("{}:", input.role), input.file_name)?;
            if let Some(digest) = &input.sha3_256 {
                write!(f, " (sha3 {})", &digest[..digest.len().min(12)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for VerificationReport<EmbeddingScore> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let score = &self.result;
        writeln!(f, "--- EMBEDDING VERIFICATION ---")?;
        self.write_inputs(f)?;
        writeln!(f, "Distance Score:    {:.4}", score.distance)?;
        writeln!(f, "Cosine Similarity: {:.4}", score.cosine_similarity)?;
        writeln!(f, "{}", "-".repeat(30))?;
        let detail = match score.verdict {
            EmbeddingVerdict::Match => "Genuine feature",
            EmbeddingVerdict::Uncertain => "Inconclusive, inspect manually",
            EmbeddingVerdict::NoMatch => "Fake or different",
        };
        write!(f, "{}: {}", score.verdict, detail)
    }
}

impl fmt::Display for VerificationReport<SharpnessScore> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let score = &self.result;
        writeln!(f, "--- SHARPNESS VERIFICATION ---")?;
        self.write_inputs(f)?;
        writeln!(f, "Reference Sharpness:  {:.2}", score.reference_score)?;
        writeln!(f, "Test Frame Sharpness: {:.2}", score.candidate_score)?;
        writeln!(
            f,
            "Sharpness Ratio:      {:.2} ({:.1}%)",
            score.ratio,
            score.ratio * 100.0
        )?;
        writeln!(f, "{}", "-".repeat(30))?;
        write!(f, "{}: {}", score.verdict, score.verdict.explanation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sharpness::{compare_scores, RatioThresholds};
    use crate::core::verifier::DistanceThresholds;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sharpness_report() -> VerificationReport<SharpnessScore> {
        let score = compare_scores(100.0, 40.0, &RatioThresholds::default()).unwrap();
        let inputs = vec![
            InputRecord::from_bytes("ref.png", b"reference", ImageRole::Reference),
            InputRecord::from_bytes("frame.png", b"candidate", ImageRole::Candidate),
        ];
        VerificationReport::new(score, inputs)
    }

    #[test]
    fn test_record_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "test content").unwrap();

        let record = InputRecord::from_path(file.path(), ImageRole::Anchor).unwrap();
        assert_eq!(record.role, ImageRole::Anchor);
        assert_eq!(record.size_bytes, 12);
        #[cfg(feature = "hashing")]
        assert_eq!(record.sha3_256.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn test_report_json_is_flat() {
        let report = sharpness_report();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["verdict"], "suspicious");
        assert_eq!(json["inputs"][0]["role"], "reference");
        assert!((json["ratio"].as_f64().unwrap() - 0.4).abs() < 1e-12);

        let back: VerificationReport<SharpnessScore> = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, report.id);
        assert_eq!(back.result, report.result);
    }

    #[test]
    fn test_sharpness_rendering() {
        let text = sharpness_report().to_string();
        assert!(text.contains("Sharpness Ratio:      0.40 (40.0%)"));
        assert!(text.contains("SUSPICIOUS: "));
        assert!(text.contains("photocopy or inkjet"));
    }

    #[test]
    fn test_embedding_rendering() {
        let score = EmbeddingScore {
            distance: 0.3,
            cosine_similarity: 0.955,
            dimension: 4,
            verdict: EmbeddingVerdict::Match,
            thresholds: DistanceThresholds::default(),
        };
        let text = VerificationReport::new(score, Vec::new()).to_string();
        assert!(text.contains("Distance Score:    0.3000"));
        assert!(text.ends_with("MATCH: Genuine feature"));
    }
}
