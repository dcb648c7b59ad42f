use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse, ReorderRequest};
use crate::api::validation::validate_vehicle_id;
use crate::services::VehicleImageInfo;

/// Multipart part name the upload endpoint expects.
const IMAGE_PART: &str = "image";

/// POST /api/admin/vehicles/{id}/upload
/// Upload one image for a vehicle. The part must be named "image" and carry
/// a filename; everything else about the file is decided by the pipeline.
pub async fn upload_vehicle_image(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<VehicleImageInfo>>), ApiError> {
    let vehicle_id = validate_vehicle_id(vehicle_id)?;

    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_PART) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::validation("No file provided"));
    };

    let image = state
        .uploads
        .upload_image(vehicle_id, &filename, bytes)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(image))))
}

/// GET /api/admin/vehicles/{id}/images
pub async fn list_vehicle_images(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<VehicleImageInfo>>>, ApiError> {
    let vehicle_id = validate_vehicle_id(vehicle_id)?;

    let images = state.uploads.list_images(vehicle_id).await?;
    Ok(Json(ApiResponse::success(images)))
}

/// PUT /api/admin/vehicles/{id}/images/reorder
/// Body: {"image_ids": [..]} in the desired display order
pub async fn reorder_vehicle_images(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<i32>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<ApiResponse<Vec<VehicleImageInfo>>>, ApiError> {
    let vehicle_id = validate_vehicle_id(vehicle_id)?;

    let images = state
        .uploads
        .reorder_images(vehicle_id, &payload.image_ids)
        .await?;

    Ok(Json(ApiResponse::success(images)))
}

/// DELETE /api/admin/images/{id}
pub async fn delete_vehicle_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.uploads.delete_image(image_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Image deleted".to_string(),
    })))
}
