use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentStatus, BookAppointmentRequest, UpdateStatusRequest,
};
use crate::services::{AdminService, BookingService, LifecycleService};

fn map_appointment_error(err: AppointmentError) -> AppError {
    match &err {
        AppointmentError::NotFound => AppError::NotFound(err.to_string()),
        AppointmentError::InvalidTime(_) => AppError::BadRequest(err.to_string()),
        AppointmentError::ConflictDetected => AppError::Conflict(err.to_string()),
        AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(err.to_string()),
        AppointmentError::CancellationWindowClosed(_) => AppError::BadRequest(err.to_string()),
        AppointmentError::Unauthorized => AppError::Auth(err.to_string()),
        AppointmentError::ValidationError(_) => AppError::ValidationError(err.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg.clone()),
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingService::new(&state)
        .book_appointment(&user.id, payload, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingService::new(&state)
        .get_appointment(&appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    if !user.is_admin() && appointment.patient_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not allowed to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let appointments = BookingService::new(&state)
        .list_for_patient(&user.id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(_user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    // Row-level security scopes what the token can actually see here.
    let appointments = BookingService::new(&state)
        .list_for_doctor(&doctor_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = LifecycleService::new(&state)
        .update_status(&appointment_id, payload.status, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    Err(AppError::Auth("Admin role required".to_string()))
}

#[axum::debug_handler]
pub async fn list_all_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let appointments = AdminService::new(&state)
        .list_all()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn list_pending_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let appointments = AdminService::new(&state)
        .list_pending()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_system_stats(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let stats = AdminService::new(&state)
        .system_stats()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = LifecycleService::new(&state)
        .update_status(
            &appointment_id,
            AppointmentStatus::Cancelled,
            &user,
            auth.token(),
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}
