use chrono::{Duration, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use doctor_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::booking::split_slot_time;

/// Patients may cancel up to this many hours before the appointment starts.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct LifecycleService {
    supabase: SupabaseClient,
    availability: AvailabilityService,
}

impl LifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
        }
    }

    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating status transition {} -> {}",
            current_status, new_status
        );

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!(
                "Invalid status transition attempted: {} -> {}",
                current_status, new_status
            );
            return Err(AppointmentError::InvalidStatusTransition(
                current_status.clone(),
            ));
        }

        Ok(())
    }

    /// All statuses an appointment may move to from its current one.
    pub fn get_valid_transitions(
        &self,
        current_status: &AppointmentStatus,
    ) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::InProgress => vec![AppointmentStatus::Completed],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    /// Move an appointment to a new status, enforcing the transition table
    /// and the patient cancellation window. Cancellations put the claimed
    /// slot back on the market.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        let is_patient = user.id == current.patient_id.to_string();
        if new_status == AppointmentStatus::Cancelled && is_patient && !user.is_admin() {
            let slot = current
                .slot_datetime()
                .ok_or_else(|| {
                    AppointmentError::InvalidTime(format!(
                        "Unparseable slot time: {}",
                        current.slot_time
                    ))
                })?;
            if !patient_can_cancel(slot, Utc::now().naive_utc()) {
                return Err(AppointmentError::CancellationWindowClosed(
                    CANCELLATION_CUTOFF_HOURS,
                ));
            }
        }

        self.validate_status_transition(&current.status, &new_status)?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "status": new_status.to_string() })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(AppointmentError::NotFound)?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if appointment.status == AppointmentStatus::Cancelled {
            self.release_appointment_slot(&appointment, auth_token).await;
        }

        info!(
            "Appointment {} moved to {}",
            appointment.id, appointment.status
        );
        Ok(appointment)
    }

    async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;

        serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Best effort: the publisher may have replaced the day since booking,
    /// in which case there is nothing to release.
    async fn release_appointment_slot(&self, appointment: &Appointment, auth_token: &str) {
        let (date, time) = match split_slot_time(&appointment.slot_time) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(
                    "Cannot release slot for appointment {}: {}",
                    appointment.id, e
                );
                return;
            }
        };

        if let Err(e) = self
            .availability
            .release_slot(&appointment.doctor_id.to_string(), date, &time, auth_token)
            .await
        {
            warn!(
                "Failed to release slot for cancelled appointment {}: {}",
                appointment.id, e
            );
        }
    }
}

/// A patient may cancel only while the start of the appointment is further
/// than the cutoff away.
pub fn patient_can_cancel(slot_start: NaiveDateTime, now: NaiveDateTime) -> bool {
    slot_start > now + Duration::hours(CANCELLATION_CUTOFF_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn service() -> LifecycleService {
        let config = shared_config::AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_key: "service".to_string(),
            supabase_jwt_secret: "secret".to_string(),
        };
        LifecycleService::new(&config)
    }

    #[test]
    fn scheduled_can_confirm_cancel_or_no_show() {
        let svc = service();
        for status in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(svc
                .validate_status_transition(&AppointmentStatus::Scheduled, &status)
                .is_ok());
        }
        assert!(svc
            .validate_status_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Completed)
            .is_err());
        assert!(svc
            .validate_status_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::InProgress)
            .is_err());
    }

    #[test]
    fn in_progress_only_completes() {
        let svc = service();
        assert!(svc
            .validate_status_transition(&AppointmentStatus::InProgress, &AppointmentStatus::Completed)
            .is_ok());
        assert!(svc
            .validate_status_transition(&AppointmentStatus::InProgress, &AppointmentStatus::Cancelled)
            .is_err());
    }

    #[test]
    fn terminal_states_are_frozen() {
        let svc = service();
        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(svc.get_valid_transitions(&terminal).is_empty());
        }
    }

    #[test]
    fn cancellation_window() {
        // More than two hours out: allowed.
        assert!(patient_can_cancel(dt("2025-06-02T12:01"), dt("2025-06-02T10:00")));
        // Exactly two hours: too late.
        assert!(!patient_can_cancel(dt("2025-06-02T12:00"), dt("2025-06-02T10:00")));
        // In the past: too late.
        assert!(!patient_can_cancel(dt("2025-06-02T09:00"), dt("2025-06-02T10:00")));
    }
}
