use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use doctor_cell::services::availability::{normalize_start_time, AvailabilityService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, BookAppointmentRequest};

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct BookingService {
    supabase: SupabaseClient,
    availability: AvailabilityService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
        }
    }

    /// Book an appointment against a published slot.
    ///
    /// The slot is claimed with a conditional update before the appointment
    /// row is written, so two patients submitting the same slot race on the
    /// claim and exactly one booking goes through. If the appointment insert
    /// fails after a successful claim, the slot is released again.
    pub async fn book_appointment(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let (date, time) = split_slot_time(&request.slot_time)?;
        let doctor_id = request.doctor_id.to_string();

        debug!(
            "Booking appointment for patient {} with doctor {} at {}T{}",
            patient_id, doctor_id, date, time
        );

        let available = self
            .availability
            .get_available_times(&doctor_id, date, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if !available.contains(&time) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not an available time on {}",
                time, date
            )));
        }

        let claimed = self
            .availability
            .claim_slot(&doctor_id, date, &time, auth_token)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::SlotTaken => {
                    AppointmentError::ConflictDetected
                }
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        debug!("Claimed slot {:?} for booking", claimed.id);

        let row = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "slot_time": format!("{}T{}", date, time),
            "status": "scheduled",
            "service_type": request.service_type,
            "notes": request.notes,
        });

        let inserted: Vec<Value> = match self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(row),
                Some(return_representation()),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                // The slot was claimed but the booking never landed.
                if let Err(release) = self
                    .availability
                    .release_slot(&doctor_id, date, &time, auth_token)
                    .await
                {
                    warn!("Failed to release claimed slot after insert error: {}", release);
                }
                return Err(AppointmentError::DatabaseError(e.to_string()));
            }
        };

        let row = inserted.into_iter().next().ok_or_else(|| {
            AppointmentError::DatabaseError("Appointment insert returned no row".to_string())
        })?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Appointment {} booked for patient {} at {}",
            appointment.id, patient_id, appointment.slot_time
        );
        Ok(appointment)
    }

    pub async fn get_appointment(
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

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=slot_time.asc",
            patient_id
        );
        self.list(&path, auth_token).await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=slot_time.asc",
            doctor_id
        );
        self.list(&path, auth_token).await
    }

    async fn list(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

/// Split a "YYYY-MM-DDTHH:MM[:SS]" slot value into its date and a normalized
/// "HH:MM" start time.
pub fn split_slot_time(slot_time: &str) -> Result<(NaiveDate, String), AppointmentError> {
    let (date_part, time_part) = slot_time.split_once('T').ok_or_else(|| {
        AppointmentError::InvalidTime(format!(
            "Expected YYYY-MM-DDTHH:MM, got {}",
            slot_time
        ))
    })?;

    let date: NaiveDate = date_part.parse().map_err(|_| {
        AppointmentError::InvalidTime(format!("Invalid date: {}", date_part))
    })?;

    let time = normalize_start_time(time_part)
        .map_err(|_| AppointmentError::InvalidTime(format!("Invalid time: {}", time_part)))?;

    Ok((date, time))
}
