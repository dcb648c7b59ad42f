use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, ImageService, SeaOrmAuthService, SeaOrmUploadService, TokenService, UploadService,
};

pub mod auth;
mod error;
mod types;
mod uploads;
mod validation;
mod vehicles;

pub use error::ApiError;
pub use types::*;

/// Headroom over the upload ceiling so multipart framing does not eat into
/// it; anything bigger is cut off at the transport with a 413.
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub tokens: TokenService,

    pub auth: Arc<dyn AuthService>,

    pub uploads: Arc<dyn UploadService>,
}

pub async fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let tokens = TokenService::new(
        &config.security.jwt_secret,
        config.security.token_ttl_hours,
    );

    let auth = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        tokens.clone(),
        config.security.clone(),
    )) as Arc<dyn AuthService>;

    let image_service = Arc::new(ImageService::new(
        &config.general.uploads_path,
        config.uploads.clone(),
    ));

    let uploads = Arc::new(SeaOrmUploadService::new(store.clone(), image_service))
        as Arc<dyn UploadService>;

    Ok(Arc::new(AppState {
        config,
        store,
        tokens,
        auth,
        uploads,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let uploads_path = state.config.general.uploads_path.clone();
    let cors_origins = state.config.server.cors_allowed_origins.clone();
    let body_limit = state.config.uploads.max_file_size_bytes + BODY_LIMIT_OVERHEAD;

    let admin_routes = create_admin_router(state.clone());

    let authed_routes = Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    let api_router = Router::new()
        .merge(admin_routes)
        .merge(authed_routes)
        .route("/auth/login", post(auth::login))
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles/{id}", get(vehicles::get_vehicle))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(uploads_path),
        )
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Admin surface. Authentication and authorization are separate layers: the
/// first verifies the token and attaches the identity, the second checks it
/// against the role this group declares.
fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/admin/vehicles",
            get(vehicles::list_admin_vehicles).post(vehicles::create_vehicle),
        )
        .route(
            "/admin/vehicles/{id}",
            put(vehicles::update_vehicle).delete(vehicles::delete_vehicle),
        )
        .route("/admin/dashboard/stats", get(vehicles::dashboard_stats))
        .route(
            "/admin/vehicles/{id}/upload",
            post(uploads::upload_vehicle_image),
        )
        .route(
            "/admin/vehicles/{id}/images",
            get(uploads::list_vehicle_images),
        )
        .route(
            "/admin/vehicles/{id}/images/reorder",
            put(uploads::reorder_vehicle_images),
        )
        .route("/admin/images/{id}", delete(uploads::delete_vehicle_image))
        .route_layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state, auth::authenticate))
                .layer(Extension(auth::RequiredRole(auth::ADMIN_ROLE)))
                .layer(middleware::from_fn(auth::authorize)),
        )
}
