use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array4};

use crate::error::{AppError, ImageRole, Result};

/// An image embedding model.
///
/// The only capability the verifier needs: turn one preprocessed
/// `(1, H, W, 3)` batch into a fixed-length vector. Implementations must be
/// deterministic for a given input and must not mutate shared state.
pub trait Embedder: Send + Sync {
    /// Embed a single-item batch.
    fn embed(&self, batch: &Array4<f32>) -> Result<Array1<f32>>;
}

/// Scale a vector to unit Euclidean length.
///
/// Returns `None` when the norm is zero or not finite.
pub fn l2_normalize(v: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 && norm.is_finite() {
        Some(v.mapv(|x| (f64::from(x) / norm) as f32))
    } else {
        None
    }
}

/// Normalize an embedding, attributing failure to `role`.
pub fn normalize_embedding(v: &Array1<f32>, role: ImageRole) -> Result<Array1<f32>> {
    l2_normalize(v).ok_or(AppError::DegenerateVector { role })
}

/// Straight-line distance between two equal-length vectors
pub fn euclidean_distance(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let diff = a - b;
    diff.dot(&diff).sqrt()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let dot_product = a.dot(b);
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Load the serialized embedding model at `path` for inference.
///
/// # Errors
///
/// [`AppError::ModelLoad`] if the artifact is missing or incompatible, or if
/// the crate was built without a model backend.
pub fn load_model(path: &Path) -> Result<Arc<dyn Embedder>> {
    #[cfg(feature = "torch")]
    {
        Ok(Arc::new(TorchEmbedder::load(path)?))
    }

    #[cfg(not(feature = "torch"))]
    {
        Err(AppError::ModelLoad {
            path: path.to_path_buf(),
            reason: "built without the `torch` feature".to_string(),
        })
    }
}

#[cfg(feature = "torch")]
pub use self::torch::TorchEmbedder;

#[cfg(feature = "torch")]
mod torch {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use ndarray::{Array1, Array4};
    use tch::{CModule, Device, Kind, Tensor};

    use super::Embedder;
    use crate::error::{AppError, Result};

    /// Embedding model backed by a TorchScript module.
    ///
    /// The module is loaded for inference only. Calls are serialized so one
    /// handle can be shared across request handlers.
    pub struct TorchEmbedder {
        module: Mutex<CModule>,
        device: Device,
        path: PathBuf,
    }

    impl std::fmt::Debug for TorchEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TorchEmbedder")
                .field("path", &self.path)
                .field("device", &self.device)
                .finish()
        }
    }

    impl TorchEmbedder {
        /// Load a serialized model, on CUDA when available.
        ///
        /// # Errors
        ///
        /// [`AppError::ModelLoad`] if the file is missing or is not a loadable module.
        pub fn load(path: &Path) -> Result<Self> {
            if !path.exists() {
                return Err(AppError::ModelLoad {
                    path: path.to_path_buf(),
                    reason: "model file not found".to_string(),
                });
            }

            let device = Device::cuda_if_available();
            log::info!("Loading embedding model {} on {:?}", path.display(), device);

            let mut module = CModule::load_on_device(path, device).map_err(|e| AppError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            module.set_eval();

            Ok(Self {
                module: Mutex::new(module),
                device,
                path: path.to_path_buf(),
            })
        }
    }

    impl Embedder for TorchEmbedder {
        fn embed(&self, batch: &Array4<f32>) -> Result<Array1<f32>> {
            let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
            let data: Vec<f32> = batch.iter().copied().collect();

            let input = Tensor::of_slice(&data)
                .reshape(&shape[..])
                .to_kind(Kind::Float)
                .to_device(self.device);

            let module = self
                .module
                .lock()
                .map_err(|_| AppError::Internal("embedding model lock poisoned".to_string()))?;
            let output = tch::no_grad(|| module.forward_ts(&[input]))?;

            // (1, D) -> (D)
            let output = output.to_device(Device::Cpu).to_kind(Kind::Float).flatten(0, -1);
            let embedding = Vec::<f32>::try_from(output)?;

            Ok(Array1::from(embedding))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_produces_unit_norm() {
        let v = array![3.0_f32, 4.0];
        let n = l2_normalize(&v).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert!((n.dot(&n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let v = array![0.2_f32, -1.7, 3.3, 0.01];
        let once = l2_normalize(&v).unwrap();
        let twice = l2_normalize(&once).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_rejects_zero_vector() {
        assert!(l2_normalize(&array![0.0_f32, 0.0, 0.0]).is_none());
        assert!(l2_normalize(&array![f32::NAN, 1.0]).is_none());

        let err = normalize_embedding(&array![0.0_f32, 0.0], ImageRole::Anchor).unwrap_err();
        assert!(matches!(err, AppError::DegenerateVector { role: ImageRole::Anchor }));
    }

    #[test]
    fn test_normalize_large_components() {
        let unit = l2_normalize(&array![1e20_f32, 0.0]).unwrap();
        assert_eq!(unit, array![1.0_f32, 0.0]);

        let unit = l2_normalize(&array![3e30_f32, 4e30]).unwrap();
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_distance_geometry_of_unit_vectors() {
        let x = array![1.0_f32, 0.0];
        let y = array![0.0_f32, 1.0];
        let neg_x = array![-1.0_f32, 0.0];

        assert_eq!(euclidean_distance(&x, &x), 0.0);
        assert!((euclidean_distance(&x, &y) - 2.0_f32.sqrt()).abs() < 1e-6);
        assert!((euclidean_distance(&x, &neg_x) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_bounded_for_unit_vectors() {
        let vectors = [
            array![0.3_f32, -0.9, 0.2],
            array![-5.0_f32, 0.1, 7.0],
            array![1.0_f32, 1.0, 1.0],
            array![-1.0_f32, -1.0, -1.0],
        ];
        for a in &vectors {
            for b in &vectors {
                let a = l2_normalize(a).unwrap();
                let b = l2_normalize(b).unwrap();
                let d = euclidean_distance(&a, &b);
                assert!((0.0..=2.0 + 1e-6).contains(&d), "distance {} out of range", d);

                // |a - b|^2 = 2 - 2cos for unit vectors
                let cos = cosine_similarity(&a, &b);
                assert!((d * d - (2.0 - 2.0 * cos)).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_load_model_missing_file() {
        let err = load_model(Path::new("no/such/model.pt")).err().unwrap();
        assert!(matches!(err, AppError::ModelLoad { .. }));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0_f32, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);

        let a = array![1.0_f32, 0.0];
        let b = array![0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        let b = array![-1.0_f32, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }
}
