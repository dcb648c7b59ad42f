use serde::{Deserialize, Serialize};

use crate::entities::vehicles;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VehicleDto {
    pub id: i32,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub description: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub mileage: i32,
    pub category: Option<String>,
    /// Gallery URLs in display order, derived from the image records.
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl VehicleDto {
    #[must_use]
    pub fn from_model(model: vehicles::Model, images: Vec<String>) -> Self {
        Self {
            id: model.id,
            make: model.make,
            model: model.model,
            year: model.year,
            price: model.price,
            description: model.description,
            fuel_type: model.fuel_type,
            transmission: model.transmission,
            color: model.color,
            mileage: model.mileage,
            category: model.category,
            images,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationDto {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct VehicleListResponse {
    pub vehicles: Vec<VehicleDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct NameCountDto {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_vehicles: u64,
    pub total_inactive: u64,
    pub categories: Vec<NameCountDto>,
    pub makes: Vec<NameCountDto>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub image_ids: Vec<i32>,
}
