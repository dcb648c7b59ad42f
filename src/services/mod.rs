pub mod password;

pub mod token;
pub use token::{AccessClaims, TokenError, TokenService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccountSummary, AuthError, AuthService, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod image;
pub use image::{ImageError, ImageService, StoredImage};

pub mod upload_service;
pub mod upload_service_impl;
pub use upload_service::{UploadError, UploadService, VehicleImageInfo};
pub use upload_service_impl::SeaOrmUploadService;
