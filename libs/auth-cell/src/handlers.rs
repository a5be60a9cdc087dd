use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Session, TokenResponse};
use shared_models::error::AppError;
use shared_utils::jwt;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

#[axum::debug_handler]
pub async fn sign_up(
    State(config): State<Arc<AppConfig>>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Signing up user: {}", payload.email);

    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::ValidationError("A valid email is required".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let metadata = json!({
        "name": payload.name,
        "phone": payload.phone,
        "role": "patient",
    });

    let client = SupabaseClient::new(&config);
    let response = client
        .sign_up(&payload.email, &payload.password, Some(metadata))
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    info!("User signed up: {}", payload.email);
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn sign_in(
    State(config): State<Arc<AppConfig>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    debug!("Signing in user: {}", payload.email);

    let client = SupabaseClient::new(&config);
    let response = client
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| AppError::Auth(format!("Sign-in failed: {}", e)))?;

    let session: Session = serde_json::from_value(response)
        .map_err(|e| AppError::Internal(format!("Unexpected auth response: {}", e)))?;

    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn sign_out(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let client = SupabaseClient::new(&config);
    client
        .sign_out(auth.token())
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let client = SupabaseClient::new(&config);
    let user = client
        .get_user(auth.token())
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;

    Ok(Json(user))
}

#[axum::debug_handler]
pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    let user = jwt::validate_token(&token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

#[axum::debug_handler]
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    match jwt::validate_token(&token, &config.supabase_jwt_secret) {
        Ok(_) => Ok(Json(json!({ "valid": true }))),
        Err(_) => Ok(Json(json!({ "valid": false }))),
    }
}
