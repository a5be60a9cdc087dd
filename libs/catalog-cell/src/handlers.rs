use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CatalogError, CreateCategoryRequest};
use crate::services::CatalogService;

fn map_catalog_error(err: CatalogError) -> AppError {
    match err {
        CatalogError::NotFound => AppError::NotFound("Service category not found".to_string()),
        CatalogError::ValidationError(msg) => AppError::ValidationError(msg),
        CatalogError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_categories(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let categories = CatalogService::new(&state)
        .list_categories()
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({
        "categories": categories,
        "total": categories.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_category(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    let category = CatalogService::new(&state)
        .create_category(payload)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(json!(category)))
}

#[axum::debug_handler]
pub async fn delete_category(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(category_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    CatalogService::new(&state)
        .delete_category(&category_id)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(json!({ "deleted": category_id })))
}
