use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, DashboardStats, MessageResponse, NameCountDto, PaginationDto,
    VehicleDto, VehicleListResponse,
};
use crate::api::validation::{VehiclePayload, validate_vehicle_id, validate_vehicle_payload};
use crate::db::{VehicleFilter, VehiclePage};
use crate::entities::vehicles;

const PUBLIC_MAX_PER_PAGE: u64 = 50;
const ADMIN_MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct VehicleListQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub fuel_type: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Attach computed gallery URL lists to a page of vehicles with one query.
async fn to_dto_page(
    state: &AppState,
    page: VehiclePage,
    page_num: u64,
    per_page: u64,
) -> Result<VehicleListResponse, ApiError> {
    let ids: Vec<i32> = page.items.iter().map(|v| v.id).collect();
    let mut image_map = state.store.list_images_for_vehicles(&ids).await?;

    let vehicles = page
        .items
        .into_iter()
        .map(|model| {
            let images = image_map
                .remove(&model.id)
                .unwrap_or_default()
                .into_iter()
                .map(|img| format!("/uploads/{}", img.filename))
                .collect();
            VehicleDto::from_model(model, images)
        })
        .collect();

    Ok(VehicleListResponse {
        vehicles,
        pagination: PaginationDto {
            page: page_num,
            per_page,
            total: page.total_items,
            pages: page.total_pages,
            has_next: page_num < page.total_pages,
            has_prev: page_num > 1,
        },
    })
}

async fn to_dto(state: &AppState, model: vehicles::Model) -> Result<VehicleDto, ApiError> {
    let images = state
        .store
        .list_vehicle_images(model.id)
        .await?
        .into_iter()
        .map(|img| format!("/uploads/{}", img.filename))
        .collect();
    Ok(VehicleDto::from_model(model, images))
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/vehicles
/// Active vehicles with filters and pagination
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VehicleListQuery>,
) -> Result<Json<ApiResponse<VehicleListResponse>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(12).clamp(1, PUBLIC_MAX_PER_PAGE);

    let filter = VehicleFilter {
        make: query.make,
        model: query.model,
        year_min: query.year_min,
        year_max: query.year_max,
        price_min: query.price_min,
        price_max: query.price_max,
        fuel_type: query.fuel_type,
        category: query.category,
        search: query.search,
        sort_by: query.sort_by,
        sort_order: query.sort_order,
    };

    let result = state
        .store
        .list_public_vehicles(&filter, page, per_page)
        .await?;
    let response = to_dto_page(&state, result, page, per_page).await?;

    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/vehicles/{id}
/// Details of an active vehicle
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    let id = validate_vehicle_id(id)?;

    let vehicle = state
        .store
        .get_active_vehicle(id)
        .await?
        .ok_or_else(|| ApiError::vehicle_not_found(id))?;

    Ok(Json(ApiResponse::success(to_dto(&state, vehicle).await?)))
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /api/admin/vehicles
/// All vehicles, inactive included
pub async fn list_admin_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<VehicleListResponse>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, ADMIN_MAX_PER_PAGE);

    let result = state.store.list_all_vehicles(page, per_page).await?;
    let response = to_dto_page(&state, result, page, per_page).await?;

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/admin/vehicles
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VehiclePayload>,
) -> Result<(StatusCode, Json<ApiResponse<VehicleDto>>), ApiError> {
    let input = validate_vehicle_payload(&payload)?;

    let vehicle = state.store.create_vehicle(&input).await?;
    let dto = to_dto(&state, vehicle).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

/// PUT /api/admin/vehicles/{id}
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<VehiclePayload>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    let id = validate_vehicle_id(id)?;
    let input = validate_vehicle_payload(&payload)?;

    let vehicle = state
        .store
        .update_vehicle(id, &input)
        .await?
        .ok_or_else(|| ApiError::vehicle_not_found(id))?;

    Ok(Json(ApiResponse::success(to_dto(&state, vehicle).await?)))
}

/// DELETE /api/admin/vehicles/{id}
/// Soft delete: hides the vehicle from the public surface
pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_vehicle_id(id)?;

    if !state.store.deactivate_vehicle(id).await? {
        return Err(ApiError::vehicle_not_found(id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Vehicle deleted".to_string(),
    })))
}

/// GET /api/admin/dashboard/stats
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let stats = state.store.vehicle_stats().await?;

    Ok(Json(ApiResponse::success(DashboardStats {
        total_vehicles: stats.total_active,
        total_inactive: stats.total_inactive,
        categories: stats
            .categories
            .into_iter()
            .map(|(name, count)| NameCountDto { name, count })
            .collect(),
        makes: stats
            .makes
            .into_iter()
            .map(|(name, count)| NameCountDto { name, count })
            .collect(),
    })))
}
