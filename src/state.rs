use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::embeddings::Embedder;
use crate::core::preprocess::{EMBEDDING_INPUT_SIZE, SHARPNESS_CANVAS_SIZE};
use crate::core::sharpness::RatioThresholds;
use crate::core::verifier::DistanceThresholds;
use crate::error::{AppError, Result};

const ENV_PREFIX: &str = "NOTECHECK_";

/// Configuration for the application
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Embedding verifier settings
    pub embedding: EmbeddingConfig,
    /// Sharpness comparator settings
    pub sharpness: SharpnessConfig,
    /// HTTP service settings
    pub server: ServerConfig,
}

/// Embedding verifier configuration
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    /// Serialized TorchScript model
    pub model_path: PathBuf,
    /// Trusted genuine image
    pub anchor_path: PathBuf,
    /// Image under test
    pub candidate_path: PathBuf,
    /// Distance bands applied to normalized embeddings
    pub thresholds: DistanceThresholds,
    /// Square input resolution expected by the model
    pub input_size: u32,
}

/// Sharpness comparator configuration
#[derive(Clone, Debug)]
pub struct SharpnessConfig {
    /// Trusted high quality crop
    pub reference_path: PathBuf,
    /// Captured frame under test
    pub candidate_path: PathBuf,
    /// Ratio bands for the verdict
    pub thresholds: RatioThresholds,
    /// Square canvas both images are resized to
    pub canvas_size: u32,
}

/// HTTP service configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Maximum request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("verifier_model.pt"),
            anchor_path: PathBuf::from("anchor.jpg"),
            candidate_path: PathBuf::from("trial_image"),
            thresholds: DistanceThresholds::default(),
            input_size: EMBEDDING_INPUT_SIZE,
        }
    }
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            reference_path: PathBuf::from("reference_microtext.jpg"),
            candidate_path: PathBuf::from("captured_frame.jpg"),
            thresholds: RatioThresholds::default(),
            canvas_size: SHARPNESS_CANVAS_SIZE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_bytes: 20 * 1024 * 1024, // 20MB
        }
    }
}

impl Config {
    /// Build a configuration from defaults overlaid with `NOTECHECK_*` variables.
    ///
    /// Recognised variables: `MODEL_PATH`, `ANCHOR_PATH`, `CANDIDATE_PATH`,
    /// `DISTANCE_THRESHOLD`, `NO_MATCH_THRESHOLD`, `EMBEDDING_SIZE`,
    /// `REFERENCE_PATH`, `SHARPNESS_CANDIDATE_PATH`, `PASS_RATIO`, `FAIL_RATIO`,
    /// `SHARPNESS_SIZE`, `BIND_ADDR` and `MAX_UPLOAD_BYTES`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if a variable does not parse or the
    /// resulting thresholds are inconsistent.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        let embedding = &mut config.embedding;
        if let Some(path) = env_var("MODEL_PATH") {
            embedding.model_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("ANCHOR_PATH") {
            embedding.anchor_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("CANDIDATE_PATH") {
            embedding.candidate_path = PathBuf::from(path);
        }
        if let Some(threshold) = env_parse::<f32>("DISTANCE_THRESHOLD")? {
            embedding.thresholds = DistanceThresholds::two_band(threshold);
        }
        if let Some(upper) = env_parse::<f32>("NO_MATCH_THRESHOLD")? {
            embedding.thresholds.no_match_from = upper;
        }
        if let Some(size) = env_parse::<u32>("EMBEDDING_SIZE")? {
            embedding.input_size = size;
        }

        let sharpness = &mut config.sharpness;
        if let Some(path) = env_var("REFERENCE_PATH") {
            sharpness.reference_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("SHARPNESS_CANDIDATE_PATH") {
            sharpness.candidate_path = PathBuf::from(path);
        }
        if let Some(ratio) = env_parse::<f64>("PASS_RATIO")? {
            sharpness.thresholds.pass_ratio = ratio;
        }
        if let Some(ratio) = env_parse::<f64>("FAIL_RATIO")? {
            sharpness.thresholds.fail_ratio = ratio;
        }
        if let Some(size) = env_parse::<u32>("SHARPNESS_SIZE")? {
            sharpness.canvas_size = size;
        }

        if let Some(addr) = env_parse::<SocketAddr>("BIND_ADDR")? {
            config.server.bind_addr = addr;
        }
        if let Some(limit) = env_parse::<usize>("MAX_UPLOAD_BYTES")? {
            config.server.max_upload_bytes = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that thresholds are ordered and sizes are usable.
    pub fn validate(&self) -> Result<()> {
        self.embedding.thresholds.validate()?;
        self.sharpness.thresholds.validate()?;
        if self.embedding.input_size == 0 || self.sharpness.canvas_size == 0 {
            return Err(AppError::Config("preprocessing sizes must be positive".to_string()));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                AppError::Config(format!("{}{}={:?}: {}", ENV_PREFIX, name, raw, e))
            })
        })
        .transpose()
}

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Shared read-only embedding model, absent when none could be loaded
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("embedder", &self.embedder.as_ref().map(|_| "loaded"))
            .finish()
    }
}

impl AppState {
    /// Create a new application state with custom configuration
    pub fn with_config(config: Config, embedder: Option<Arc<dyn Embedder>>) -> Arc<Self> {
        Arc::new(Self { config, embedder })
    }
}
