use axum::{
    Extension, Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::services::{AccountSummary, LoginResult, TokenError};

pub const ADMIN_ROLE: &str = "admin";

/// Verified identity attached to the request after `authenticate` runs.
#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: i32,
    pub email: String,
    pub role: String,
}

/// Role a protected router group demands, declared as data on the group.
#[derive(Debug, Clone, Copy)]
pub struct RequiredRole(pub &'static str);

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware: extracts the bearer token, verifies it against
/// the signing key, and attaches the resulting [`Identity`] to the request.
/// Pure function of the token; no store lookups.
///
/// The three failure kinds stay distinguishable: no token, expired token,
/// and invalid token each produce their own 401 message.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::Unauthorized("Access token required".to_string()));
    };

    let claims = state.tokens.verify(&token).map_err(|e| match e {
        TokenError::Expired => ApiError::Unauthorized("Token expired".to_string()),
        TokenError::Invalid => ApiError::Unauthorized("Invalid token".to_string()),
    })?;

    tracing::Span::current().record("user_id", claims.sub);

    request.extensions_mut().insert(Identity {
        account_id: claims.sub,
        email: claims.email,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

/// Authorization middleware: compares the authenticated identity's role
/// claim against the [`RequiredRole`] the router group declares. Composes
/// after [`authenticate`].
pub async fn authorize(request: Request, next: Next) -> Result<Response, ApiError> {
    let required = request
        .extensions()
        .get::<RequiredRole>()
        .copied()
        .ok_or_else(|| ApiError::internal("No required role declared for protected route"))?;

    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

    if identity.role != required.0 {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Authenticate with email and password, returns a signed access token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    let result = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/auth/me
/// Get the account behind the presented token (requires authentication)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<AccountSummary>>, ApiError> {
    let user = state.auth.current_user(identity.account_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// POST /api/auth/logout
/// Tokens are self-contained and expire on their own; the client discards
/// its copy and that is the whole logout.
pub async fn logout(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    tracing::info!(account = %identity.email, "Logout");
    Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
