use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dossier::models::Photo;
use crate::dossier::pipeline::{run_photo_extraction, run_pipeline};
use crate::errors::AppError;
use crate::state::AppState;

pub const EXTRACTION_ID_HEADER: &str = "x-extraction-id";

/// Name of the multipart part carrying the PDF.
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct PhotoResponse {
    pub photo: Option<Photo>,
}

/// POST /api/v1/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let extraction_id = Uuid::new_v4();
    let pdf = read_pdf_upload(multipart).await?;
    info!("Extraction {extraction_id}: received {} bytes", pdf.len());

    let dossier = run_pipeline(pdf, state.llm.as_ref(), &state.pipeline)
        .await
        .inspect_err(|e| warn!("Extraction {extraction_id} failed ({}): {e}", e.kind()))?;

    info!("Extraction {extraction_id} complete");
    Ok((
        [(EXTRACTION_ID_HEADER, extraction_id.to_string())],
        Json(dossier),
    ))
}

/// POST /api/v1/extract/photo
pub async fn handle_extract_photo(multipart: Multipart) -> Result<Json<PhotoResponse>, AppError> {
    let pdf = read_pdf_upload(multipart).await?;
    let photo = run_photo_extraction(pdf).await?;
    Ok(Json(PhotoResponse { photo }))
}

/// Returns the part named `file`, or else the first part that carries a file name.
async fn read_pdf_upload(mut multipart: Multipart) -> Result<Bytes, AppError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let named_file = field.name() == Some(FILE_FIELD);
        if !named_file && (fallback.is_some() || field.file_name().is_none()) {
            continue;
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if named_file {
            return Ok(bytes);
        }
        fallback = Some(bytes);
    }

    fallback.ok_or_else(|| {
        AppError::Validation(format!(
            "multipart body has no file part (expected a field named '{FILE_FIELD}')"
        ))
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}
