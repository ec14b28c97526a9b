#![doc(html_root_url = "https://docs.rs/notecheck/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # notecheck
//!
//! Two independent authenticity heuristics for currency note images.
//!
//! ## Checks
//!
//! - **Embedding verification**: a pretrained image-embedding model embeds a
//!   trusted anchor and a candidate; the distance between the L2-normalized
//!   vectors decides MATCH / UNCERTAIN / NO MATCH.
//! - **Sharpness comparison**: the Laplacian variance of a candidate capture
//!   relative to a trusted reference crop decides PASS / SUSPICIOUS / FAIL.
//!   Genuine intaglio print stays crisp; copies come out soft.
//!
//! Each check returns a [`VerificationReport`] carrying the scores and an
//! enumerated verdict; text rendering is its `Display` impl.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notecheck::{sharpness, Config, Result};
//!
//! fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let report = sharpness::compare_files(
//!         &config.sharpness.reference_path,
//!         &config.sharpness.candidate_path,
//!         &config.sharpness,
//!     )?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

#[cfg(feature = "api")]
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
/// Runtime configuration and shared service state.
pub mod state;
pub mod utils;

// Public API exports
pub use crate::{
    core::{
        embeddings::{self, load_model, Embedder},
        preprocess,
        sharpness::{self, RatioThresholds, SharpnessScore, SharpnessVerdict},
        verifier::{self, DistanceThresholds, EmbeddingScore, EmbeddingVerdict},
    },
    error::{AppError, ImageRole, Result, ResultExt},
    models::report::{InputRecord, VerificationReport},
    state::{AppState, Config, EmbeddingConfig, ServerConfig, SharpnessConfig},
};

#[cfg(feature = "api")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "hashing")]
pub use crate::core::hash::{self, compute_file_hash, compute_sha3_256};

#[cfg(feature = "torch")]
pub use crate::core::embeddings::TorchEmbedder;

/// Initialize the application with default settings
///
/// Loads a `.env` file if one exists and sets up logging. It should be
/// called early in the application startup process, and only once.
///
/// # Errors
///
/// Returns an error if a logger has already been installed.
///
/// # Example
///
/// ```no_run
/// use notecheck::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env_file = dotenv::dotenv().ok();
    init_logging()?;
    if let Some(path) = env_file {
        log::debug!("Loaded environment from {}", path.display());
    }

    log::debug!("notecheck {} initialized", utils::version());
    Ok(())
}

fn init_logging() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to initialize logging: {}", e)))
}
