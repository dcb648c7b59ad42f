//! Domain service for the vehicle image lifecycle.
//!
//! Ties validation, processing, and the image metadata records together:
//! records exist only for files the pipeline wrote, and deletes take the
//! backing files with them.

use serde::Serialize;
use thiserror::Error;

use crate::entities::vehicle_images;
use crate::services::image::ImageError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Vehicle {0} not found")]
    VehicleNotFound(i32),

    #[error("Image {0} not found")]
    ImageNotFound(i32),

    #[error("No file provided")]
    NoFileProvided,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for UploadError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Image record DTO. URLs are derived from the record on every read; the
/// record set is the single source of truth for gallery order.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleImageInfo {
    pub id: i32,
    pub vehicle_id: i32,
    pub filename: String,
    pub original_filename: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    pub sort_index: i32,
    pub url: String,
    pub thumbnail_url: String,
    pub created_at: String,
}

impl From<vehicle_images::Model> for VehicleImageInfo {
    fn from(model: vehicle_images::Model) -> Self {
        let url = format!("/uploads/{}", model.filename);
        let thumbnail_url = format!(
            "/uploads/{}",
            crate::services::image::ImageService::thumbnail_name(&model.filename)
        );
        Self {
            id: model.id,
            vehicle_id: model.vehicle_id,
            filename: model.filename,
            original_filename: model.original_filename,
            file_size: model.file_size,
            mime_type: model.mime_type,
            sort_index: model.sort_index,
            url,
            thumbnail_url,
            created_at: model.created_at,
        }
    }
}

/// Domain service trait for image uploads. Role checks happen in the API
/// middleware before any of these run.
#[async_trait::async_trait]
pub trait UploadService: Send + Sync {
    /// Validates, processes, and stores one upload, then appends the record
    /// to the vehicle's gallery.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Image`] for any validation failure; nothing is
    /// written to disk or the database in that case.
    async fn upload_image(
        &self,
        vehicle_id: i32,
        original_filename: &str,
        bytes: Vec<u8>,
    ) -> Result<VehicleImageInfo, UploadError>;

    /// Removes an image record and its backing files. Missing files are
    /// tolerated; the record removal is authoritative.
    async fn delete_image(&self, image_id: i32) -> Result<(), UploadError>;

    /// Reassigns gallery positions from the given id order. Ids not
    /// belonging to the vehicle are ignored.
    async fn reorder_images(
        &self,
        vehicle_id: i32,
        ordered_ids: &[i32],
    ) -> Result<Vec<VehicleImageInfo>, UploadError>;

    /// Gallery contents in display order.
    async fn list_images(&self, vehicle_id: i32) -> Result<Vec<VehicleImageInfo>, UploadError>;
}
