//! `SeaORM` implementation of the `UploadService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::Store;
use crate::services::image::ImageService;
use crate::services::upload_service::{UploadError, UploadService, VehicleImageInfo};

pub struct SeaOrmUploadService {
    store: Store,
    images: Arc<ImageService>,
}

impl SeaOrmUploadService {
    #[must_use]
    pub fn new(store: Store, images: Arc<ImageService>) -> Self {
        Self { store, images }
    }
}

#[async_trait]
impl UploadService for SeaOrmUploadService {
    async fn upload_image(
        &self,
        vehicle_id: i32,
        original_filename: &str,
        bytes: Vec<u8>,
    ) -> Result<VehicleImageInfo, UploadError> {
        if self.store.get_vehicle(vehicle_id).await?.is_none() {
            return Err(UploadError::VehicleNotFound(vehicle_id));
        }

        if original_filename.is_empty() || bytes.is_empty() {
            return Err(UploadError::NoFileProvided);
        }

        // Validation and processing; no disk writes happen unless the whole
        // pipeline passes
        let stored = self
            .images
            .validate_and_store(bytes, original_filename)
            .await?;

        // Append semantics: next index is the current gallery size
        let sort_index = self.store.count_vehicle_images(vehicle_id).await?;
        let sort_index = i32::try_from(sort_index).unwrap_or(i32::MAX);

        let record = self
            .store
            .insert_vehicle_image(
                vehicle_id,
                &stored.filename,
                Some(original_filename),
                stored.file_size,
                sort_index,
            )
            .await;

        match record {
            Ok(record) => {
                info!(
                    vehicle_id,
                    image_id = record.id,
                    filename = %record.filename,
                    "Image uploaded"
                );
                Ok(VehicleImageInfo::from(record))
            }
            Err(e) => {
                // The files were already written; don't leave orphans behind
                warn!(vehicle_id, "Image record insert failed, removing files: {e}");
                self.images.delete_files(&stored.filename).await;
                Err(UploadError::Database(e.to_string()))
            }
        }
    }

    async fn delete_image(&self, image_id: i32) -> Result<(), UploadError> {
        let Some(record) = self.store.get_vehicle_image(image_id).await? else {
            return Err(UploadError::ImageNotFound(image_id));
        };

        // File removal is best effort; a file already gone must not block
        // the metadata delete
        self.images.delete_files(&record.filename).await;
        self.store.delete_vehicle_image(image_id).await?;

        info!(
            image_id,
            vehicle_id = record.vehicle_id,
            "Image deleted"
        );
        Ok(())
    }

    async fn reorder_images(
        &self,
        vehicle_id: i32,
        ordered_ids: &[i32],
    ) -> Result<Vec<VehicleImageInfo>, UploadError> {
        if self.store.get_vehicle(vehicle_id).await?.is_none() {
            return Err(UploadError::VehicleNotFound(vehicle_id));
        }

        let records = self
            .store
            .reorder_vehicle_images(vehicle_id, ordered_ids)
            .await?;

        Ok(records.into_iter().map(VehicleImageInfo::from).collect())
    }

    async fn list_images(&self, vehicle_id: i32) -> Result<Vec<VehicleImageInfo>, UploadError> {
        if self.store.get_vehicle(vehicle_id).await?.is_none() {
            return Err(UploadError::VehicleNotFound(vehicle_id));
        }

        let records = self.store.list_vehicle_images(vehicle_id).await?;
        Ok(records.into_iter().map(VehicleImageInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::db::VehicleInput;
    use crate::services::image::ImageError;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    fn vehicle_input() -> VehicleInput {
        VehicleInput {
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2021,
            price: 18_500.0,
            description: None,
            fuel_type: Some("Flex".to_string()),
            transmission: Some("Manual".to_string()),
            color: Some("Silver".to_string()),
            mileage: 42_000,
            category: Some("Sedan".to_string()),
        }
    }

    async fn setup() -> (SeaOrmUploadService, Store, tempfile::TempDir, i32) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(ImageService::new(
            dir.path().to_str().unwrap(),
            UploadConfig::default(),
        ));
        let service = SeaOrmUploadService::new(store.clone(), images);

        let vehicle = store.create_vehicle(&vehicle_input()).await.unwrap();
        (service, store, dir, vehicle.id)
    }

    #[tokio::test]
    async fn upload_appends_with_dense_indices() {
        let (service, _store, dir, vehicle_id) = setup().await;

        let first = service
            .upload_image(vehicle_id, "front.jpg", jpeg_bytes(800, 600))
            .await
            .unwrap();
        let second = service
            .upload_image(vehicle_id, "rear.jpg", jpeg_bytes(800, 600))
            .await
            .unwrap();

        assert_eq!(first.sort_index, 0);
        assert_eq!(second.sort_index, 1);
        assert_eq!(first.mime_type, "image/jpeg");
        assert_eq!(first.original_filename.as_deref(), Some("front.jpg"));
        assert_eq!(first.url, format!("/uploads/{}", first.filename));

        assert!(dir.path().join(&first.filename).exists());
        assert!(dir.path().join(format!("thumb_{}", first.filename)).exists());
    }

    #[tokio::test]
    async fn upload_to_unknown_vehicle_fails_before_any_write() {
        let (service, _store, dir, _vehicle_id) = setup().await;

        let result = service
            .upload_image(9999, "front.jpg", jpeg_bytes(100, 100))
            .await;
        assert!(matches!(result, Err(UploadError::VehicleNotFound(9999))));

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn empty_filename_is_no_file_provided() {
        let (service, _store, _dir, vehicle_id) = setup().await;

        let result = service
            .upload_image(vehicle_id, "", jpeg_bytes(100, 100))
            .await;
        assert!(matches!(result, Err(UploadError::NoFileProvided)));
    }

    #[tokio::test]
    async fn invalid_image_fails_validation_without_records() {
        let (service, store, dir, vehicle_id) = setup().await;

        let result = service
            .upload_image(vehicle_id, "virus.jpg", b"MZ\x90\x00junk".to_vec())
            .await;
        assert!(matches!(
            result,
            Err(UploadError::Image(ImageError::UnsupportedMimeType))
        ));

        assert_eq!(store.count_vehicle_images(vehicle_id).await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_removes_record_and_files_exactly_once() {
        let (service, store, dir, vehicle_id) = setup().await;

        let uploaded = service
            .upload_image(vehicle_id, "front.jpg", jpeg_bytes(640, 480))
            .await
            .unwrap();

        service.delete_image(uploaded.id).await.unwrap();

        assert!(!dir.path().join(&uploaded.filename).exists());
        assert!(!dir
            .path()
            .join(format!("thumb_{}", uploaded.filename))
            .exists());
        assert_eq!(store.count_vehicle_images(vehicle_id).await.unwrap(), 0);

        // Gone means gone
        assert!(matches!(
            service.delete_image(uploaded.id).await,
            Err(UploadError::ImageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_tolerates_already_missing_files() {
        let (service, store, dir, vehicle_id) = setup().await;

        let uploaded = service
            .upload_image(vehicle_id, "front.jpg", jpeg_bytes(640, 480))
            .await
            .unwrap();

        std::fs::remove_file(dir.path().join(&uploaded.filename)).unwrap();
        std::fs::remove_file(dir.path().join(format!("thumb_{}", uploaded.filename))).unwrap();

        service.delete_image(uploaded.id).await.unwrap();
        assert_eq!(store.count_vehicle_images(vehicle_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reorder_assigns_positions_from_given_order() {
        let (service, _store, _dir, vehicle_id) = setup().await;

        let a = service
            .upload_image(vehicle_id, "a.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();
        let b = service
            .upload_image(vehicle_id, "b.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();
        let c = service
            .upload_image(vehicle_id, "c.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();

        let reordered = service
            .reorder_images(vehicle_id, &[c.id, a.id, b.id])
            .await
            .unwrap();

        let order: Vec<(i32, i32)> = reordered.iter().map(|i| (i.id, i.sort_index)).collect();
        assert_eq!(order, vec![(c.id, 0), (a.id, 1), (b.id, 2)]);
    }

    #[tokio::test]
    async fn reorder_ignores_foreign_ids_and_stays_dense() {
        let (service, store, _dir, vehicle_id) = setup().await;

        let other = store.create_vehicle(&vehicle_input()).await.unwrap();
        let foreign = service
            .upload_image(other.id, "other.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();

        let a = service
            .upload_image(vehicle_id, "a.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();
        let b = service
            .upload_image(vehicle_id, "b.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();

        let reordered = service
            .reorder_images(vehicle_id, &[foreign.id, b.id, a.id])
            .await
            .unwrap();

        let order: Vec<(i32, i32)> = reordered.iter().map(|i| (i.id, i.sort_index)).collect();
        assert_eq!(order, vec![(b.id, 0), (a.id, 1)]);

        // The foreign vehicle's gallery is untouched
        let other_images = service.list_images(other.id).await.unwrap();
        assert_eq!(other_images[0].sort_index, 0);
    }

    #[tokio::test]
    async fn list_images_follows_gallery_order() {
        let (service, _store, _dir, vehicle_id) = setup().await;

        let a = service
            .upload_image(vehicle_id, "a.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();
        let b = service
            .upload_image(vehicle_id, "b.jpg", jpeg_bytes(100, 100))
            .await
            .unwrap();

        service
            .reorder_images(vehicle_id, &[b.id, a.id])
            .await
            .unwrap();

        let listed = service.list_images(vehicle_id).await.unwrap();
        let ids: Vec<i32> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
