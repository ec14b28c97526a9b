use axum::extract::{Multipart, State};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    core::{preprocess::decode_image_bytes, sharpness, verifier},
    error::{AppError, ImageRole, Result},
    models::report::{InputRecord, VerificationReport},
    state::AppState,
};

use super::responses::ApiResponse;

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    fn decode(&self, role: ImageRole) -> Result<image::DynamicImage> {
        decode_image_bytes(&self.bytes, role, &self.file_name)
    }

    fn record(&self, role: ImageRole) -> InputRecord {
        InputRecord::from_bytes(&self.file_name, &self.bytes, role)
    }
}

async fn read_uploads(mut multipart: Multipart) -> Result<HashMap<String, Upload>> {
    let mut uploads = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let bytes = field.bytes().await?.to_vec();
        log::debug!("Received field {:?} ({} bytes)", name, bytes.len());
        uploads.insert(name, Upload { file_name, bytes });
    }

    Ok(uploads)
}

fn take_upload(uploads: &mut HashMap<String, Upload>, role: ImageRole) -> Result<Upload> {
    let field = role.to_string();
    match uploads.remove(&field) {
        Some(upload) if !upload.bytes.is_empty() => Ok(upload),
        Some(_) => Err(AppError::InvalidInput(format!("multipart field `{}` is empty", field))),
        None => Err(AppError::InvalidInput(format!("missing multipart field `{}`", field))),
    }
}

/// Compare an uploaded `candidate` against an uploaded `anchor` by embedding distance.
pub async fn verify_embedding(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ApiResponse<VerificationReport<verifier::EmbeddingScore>>> {
    let embedder = state.embedder.clone().ok_or_else(|| AppError::ModelLoad {
        path: state.config.embedding.model_path.clone(),
        reason: "no embedding model is loaded".to_string(),
    })?;

    let mut uploads = read_uploads(multipart).await?;
    let anchor = take_upload(&mut uploads, ImageRole::Anchor)?;
    let candidate = take_upload(&mut uploads, ImageRole::Candidate)?;
    let config = state.config.embedding.clone();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let anchor_img = anchor.decode(ImageRole::Anchor)?;
        let candidate_img = candidate.decode(ImageRole::Candidate)?;
        let score = verifier::verify_images(&*embedder, &anchor_img, &candidate_img, &config)?;

        let inputs = vec![anchor.record(ImageRole::Anchor), candidate.record(ImageRole::Candidate)];
        Ok(VerificationReport::new(score, inputs))
    })
    .await??;

    Ok(ApiResponse::success(report))
}

/// Compare an uploaded `candidate` against an uploaded `reference` by sharpness.
pub async fn verify_sharpness(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ApiResponse<VerificationReport<sharpness::SharpnessScore>>> {
    let mut uploads = read_uploads(multipart).await?;
    let reference = take_upload(&mut uploads, ImageRole::Reference)?;
    let candidate = take_upload(&mut uploads, ImageRole::Candidate)?;
    let config = state.config.sharpness.clone();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let reference_img = reference.decode(ImageRole::Reference)?;
        let candidate_img = candidate.decode(ImageRole::Candidate)?;
        let score = sharpness::compare_images(&reference_img, &candidate_img, &config)?;

        let inputs = vec![
            reference.record(ImageRole::Reference),
            candidate.record(ImageRole::Candidate),
        ];
        Ok(VerificationReport::new(score, inputs))
    })
    .await??;

    Ok(ApiResponse::success(report))
}
