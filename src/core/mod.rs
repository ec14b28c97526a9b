//! Core image checks and the numeric decision logic behind them

/// Embedding model capability and vector arithmetic.
pub mod embeddings;
/// SHA3 digests of input files.
#[cfg(feature = "hashing")]
pub mod hash;
/// Image decoding and per-check preprocessing.
pub mod preprocess;
/// Laplacian-variance sharpness comparison.
pub mod sharpness;
/// Embedding-distance verification.
pub mod verifier;
