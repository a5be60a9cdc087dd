use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateDoctorRequest, DoctorError, PublishAvailabilityRequest, UpdateDoctorRequest};
use crate::services::{AvailabilityService, DoctorService};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ProfileMissing => AppError::Internal(err.to_string()),
        DoctorError::SlotTaken => AppError::Conflict(err.to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

async fn require_admin_or_owner(
    state: &AppConfig,
    user: &User,
    doctor_id: &str,
    auth_token: &str,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let doctor = DoctorService::new(state)
        .get_doctor(doctor_id, Some(auth_token))
        .await
        .map_err(map_doctor_error)?;

    if doctor.user_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not allowed to manage this doctor's schedule".to_string(),
        ));
    }

    Ok(())
}

// Public handlers

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&state)
        .list_doctors(None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state)
        .get_doctor(&doctor_id, None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_available_times(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let times = AvailabilityService::new(&state)
        .get_available_times(&doctor_id, query.date, None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available_times": times,
    })))
}

#[axum::debug_handler]
pub async fn get_availability_range(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = AvailabilityService::new(&state)
        .get_availability_range(&doctor_id, query.from, query.to, None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from": query.from,
        "to": query.to,
        "slots": slots,
    })))
}

// Protected handlers

#[axum::debug_handler]
pub async fn publish_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<String>,
    Json(payload): Json<PublishAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin_or_owner(&state, &user, &doctor_id, auth.token()).await?;

    let slots = AvailabilityService::new(&state)
        .publish_availability(&doctor_id, payload, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "published": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    let doctor = DoctorService::new(&state)
        .create_doctor(payload)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(payload): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    let doctor = DoctorService::new(&state)
        .update_doctor(&doctor_id, payload)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Admin role required".to_string()));
    }

    DoctorService::new(&state)
        .delete_doctor(&doctor_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({ "deleted": doctor_id })))
}
