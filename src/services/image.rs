//! Upload validation and image normalization.
//!
//! Every accepted upload goes through two stages: a strictly ordered
//! validation pass over the raw bytes, then re-encoding into the canonical
//! stored form (full-size JPEG plus thumbnail). Nothing touches disk until
//! validation has passed in full.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("File type not allowed. Use png, jpg, jpeg, or webp")]
    UnsupportedExtension,

    #[error("File too large. Maximum allowed: {0}MB")]
    FileTooLarge(usize),

    #[error("File content is not an allowed image type. Use JPEG, PNG, or WebP")]
    UnsupportedMimeType,

    #[error("Invalid or corrupt image file")]
    CorruptImage,

    #[error("Image too large. Maximum: {0}x{0} pixels")]
    ImageTooLarge(u32),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImageError {
    /// Validation failures are the caller's fault; everything else is ours.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExtension
                | Self::FileTooLarge(_)
                | Self::UnsupportedMimeType
                | Self::CorruptImage
                | Self::ImageTooLarge(_)
        )
    }
}

/// Validate an upload buffer in a fixed order: declared extension, byte
/// size, sniffed content type, decodability, decoded dimensions. The first
/// failing step wins so error messages stay deterministic. Returns the
/// decoded image for the processing stage.
pub fn validate_upload(
    bytes: &[u8],
    declared_filename: &str,
    config: &UploadConfig,
) -> Result<DynamicImage, ImageError> {
    let extension = Path::new(declared_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => return Err(ImageError::UnsupportedExtension),
    }

    if bytes.len() > config.max_file_size_bytes {
        return Err(ImageError::FileTooLarge(
            config.max_file_size_bytes / (1024 * 1024),
        ));
    }

    // Sniff the real type from the byte signature; the extension proves
    // nothing about the content
    let format = image::guess_format(bytes).map_err(|_| ImageError::UnsupportedMimeType)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP
    ) {
        return Err(ImageError::UnsupportedMimeType);
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| ImageError::CorruptImage)?;

    if decoded.width() > config.max_image_dimension || decoded.height() > config.max_image_dimension
    {
        return Err(ImageError::ImageTooLarge(config.max_image_dimension));
    }

    Ok(decoded)
}

/// Result of a successful store: both artifact names plus the byte size of
/// the full image as written.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub filename: String,
    pub thumbnail_filename: String,
    pub file_size: i64,
}

pub struct ImageService {
    uploads_dir: PathBuf,
    config: UploadConfig,
}

impl ImageService {
    #[must_use]
    pub fn new(uploads_path: &str, config: UploadConfig) -> Self {
        Self {
            uploads_dir: PathBuf::from(uploads_path),
            config,
        }
    }

    #[must_use]
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    #[must_use]
    pub fn thumbnail_name(filename: &str) -> String {
        format!("thumb_{filename}")
    }

    /// Run validation and, on success, normalize the upload into the stored
    /// form: RGB JPEG fitting the configured bounds plus a thumbnail derived
    /// from the stored image rather than the original upload. Decode and
    /// re-encode are CPU-bound and run on the blocking pool.
    pub async fn validate_and_store(
        &self,
        bytes: Vec<u8>,
        declared_filename: &str,
    ) -> Result<StoredImage, ImageError> {
        let config = self.config.clone();
        let declared = declared_filename.to_string();

        let (full_jpeg, thumb_jpeg) = task::spawn_blocking(move || {
            let decoded = validate_upload(&bytes, &declared, &config)?;
            let full_jpeg = encode_stored_jpeg(&decoded, &config)?;

            let stored = image::load_from_memory_with_format(&full_jpeg, ImageFormat::Jpeg)
                .map_err(|e| ImageError::Encode(e.to_string()))?;
            let thumb_jpeg = encode_thumbnail_jpeg(&stored, &config)?;

            Ok::<_, ImageError>((full_jpeg, thumb_jpeg))
        })
        .await
        .map_err(|e| ImageError::Internal(format!("Image processing task panicked: {e}")))??;

        // Opaque, collision-resistant name; the client's filename and
        // extension never reach the filesystem
        let filename = format!("{}.jpg", Uuid::new_v4().simple());
        let thumbnail_filename = Self::thumbnail_name(&filename);

        fs::create_dir_all(&self.uploads_dir).await?;

        let full_path = self.uploads_dir.join(&filename);
        fs::write(&full_path, &full_jpeg).await?;

        if let Err(e) = fs::write(self.uploads_dir.join(&thumbnail_filename), &thumb_jpeg).await {
            // Either both artifacts land or neither stays behind
            let _ = fs::remove_file(&full_path).await;
            return Err(ImageError::Io(e));
        }

        info!(
            filename = %filename,
            bytes = full_jpeg.len(),
            "Stored processed image"
        );

        Ok(StoredImage {
            filename,
            thumbnail_filename,
            file_size: i64::try_from(full_jpeg.len()).unwrap_or(i64::MAX),
        })
    }

    /// Best-effort removal of a stored image and its thumbnail. A file that
    /// is already gone is not an error.
    pub async fn delete_files(&self, filename: &str) {
        for name in [filename.to_string(), Self::thumbnail_name(filename)] {
            let path = self.uploads_dir.join(&name);
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "Failed to remove stored file: {e}");
                }
            }
        }
    }
}

/// Canonical stored form: full RGB, downscaled to fit the stored bounds
/// when it exceeds them, JPEG at the configured quality.
fn encode_stored_jpeg(decoded: &DynamicImage, config: &UploadConfig) -> Result<Vec<u8>, ImageError> {
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let resized = if rgb.width() > config.max_stored_width || rgb.height() > config.max_stored_height
    {
        rgb.resize(
            config.max_stored_width,
            config.max_stored_height,
            FilterType::Lanczos3,
        )
    } else {
        rgb
    };

    encode_jpeg(&resized, config.jpeg_quality)
}

fn encode_thumbnail_jpeg(
    stored: &DynamicImage,
    config: &UploadConfig,
) -> Result<Vec<u8>, ImageError> {
    let thumb = stored.thumbnail(config.thumbnail_width, config.thumbnail_height);
    encode_jpeg(&thumb, config.thumbnail_jpeg_quality)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn rejects_disallowed_extension_first() {
        let config = UploadConfig::default();
        // Valid PNG bytes, but the declared name is not an image extension
        let result = validate_upload(&png_bytes(10, 10), "report.pdf", &config);
        assert!(matches!(result, Err(ImageError::UnsupportedExtension)));

        let result = validate_upload(&png_bytes(10, 10), "no_extension", &config);
        assert!(matches!(result, Err(ImageError::UnsupportedExtension)));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let config = UploadConfig::default();
        assert!(validate_upload(&png_bytes(10, 10), "photo.PNG", &config).is_ok());
        assert!(validate_upload(&jpeg_bytes(10, 10), "photo.JpG", &config).is_ok());
    }

    #[test]
    fn rejects_oversized_payload_before_sniffing() {
        let config = UploadConfig {
            max_file_size_bytes: 16,
            ..UploadConfig::default()
        };
        let result = validate_upload(&png_bytes(64, 64), "photo.png", &config);
        assert!(matches!(result, Err(ImageError::FileTooLarge(_))));
    }

    #[test]
    fn renamed_executable_never_validates() {
        let config = UploadConfig::default();
        // MZ header plus junk, masquerading as a JPEG
        let bytes = b"MZ\x90\x00this is not an image at all".to_vec();
        let result = validate_upload(&bytes, "totally_a_photo.jpg", &config);
        assert!(matches!(result, Err(ImageError::UnsupportedMimeType)));
    }

    #[test]
    fn truncated_image_is_corrupt() {
        let config = UploadConfig::default();
        let mut bytes = png_bytes(64, 64);
        bytes.truncate(32);
        let result = validate_upload(&bytes, "photo.png", &config);
        assert!(matches!(result, Err(ImageError::CorruptImage)));
    }

    #[test]
    fn rejects_excessive_dimensions() {
        let config = UploadConfig::default();
        let result = validate_upload(&jpeg_bytes(3000, 3000), "big.jpg", &config);
        assert!(matches!(result, Err(ImageError::ImageTooLarge(2048))));
    }

    #[test]
    fn accepts_valid_image_within_limits() {
        let config = UploadConfig::default();
        let decoded = validate_upload(&jpeg_bytes(1500, 1000), "car.jpg", &config).unwrap();
        assert_eq!(decoded.width(), 1500);
        assert_eq!(decoded.height(), 1000);
    }

    #[test]
    fn stored_form_fits_bounds_and_is_jpeg() {
        let config = UploadConfig::default();
        let decoded = validate_upload(&jpeg_bytes(1500, 1000), "car.jpg", &config).unwrap();

        let full = encode_stored_jpeg(&decoded, &config).unwrap();
        let stored = image::load_from_memory(&full).unwrap();
        assert!(stored.width() <= 1200);
        assert!(stored.height() <= 800);
        assert_eq!(image::guess_format(&full).unwrap(), ImageFormat::Jpeg);

        let thumb = encode_thumbnail_jpeg(&stored, &config).unwrap();
        let thumb_img = image::load_from_memory(&thumb).unwrap();
        assert!(thumb_img.width() <= 300);
        assert!(thumb_img.height() <= 200);
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let config = UploadConfig::default();
        let decoded = validate_upload(&png_bytes(640, 480), "car.png", &config).unwrap();

        let full = encode_stored_jpeg(&decoded, &config).unwrap();
        let stored = image::load_from_memory(&full).unwrap();
        assert_eq!(stored.width(), 640);
        assert_eq!(stored.height(), 480);
    }

    #[tokio::test]
    async fn validate_and_store_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::new(dir.path().to_str().unwrap(), UploadConfig::default());

        let stored = service
            .validate_and_store(jpeg_bytes(1500, 1000), "car.jpg")
            .await
            .unwrap();

        assert!(stored.filename.ends_with(".jpg"));
        assert_eq!(
            stored.thumbnail_filename,
            format!("thumb_{}", stored.filename)
        );

        let full_path = dir.path().join(&stored.filename);
        let thumb_path = dir.path().join(&stored.thumbnail_filename);
        assert!(full_path.exists());
        assert!(thumb_path.exists());
        assert_eq!(
            stored.file_size,
            i64::try_from(std::fs::metadata(&full_path).unwrap().len()).unwrap()
        );
    }

    #[tokio::test]
    async fn invalid_upload_leaves_no_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::new(dir.path().to_str().unwrap(), UploadConfig::default());

        let result = service
            .validate_and_store(b"MZ\x90\x00junk".to_vec(), "fake.jpg")
            .await;
        assert!(matches!(result, Err(ImageError::UnsupportedMimeType)));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_files_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = ImageService::new(dir.path().to_str().unwrap(), UploadConfig::default());

        let stored = service
            .validate_and_store(png_bytes(100, 100), "car.png")
            .await
            .unwrap();

        service.delete_files(&stored.filename).await;
        assert!(!dir.path().join(&stored.filename).exists());
        assert!(!dir.path().join(&stored.thumbnail_filename).exists());

        // Second delete is a no-op
        service.delete_files(&stored.filename).await;
    }
}
