use chrono::{NaiveDate, NaiveTime};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilitySlot, DoctorError, PublishAvailabilityRequest};

/// Normalize a stored time value to wall-clock "HH:MM".
///
/// The database returns "09:00:00" while clients submit and compare "09:00",
/// and older rows carry full timestamps ("2024-06-01T10:00:00+00:00"); every
/// comparison in the booking path goes through this so the forms never
/// diverge. `get(..5)` keeps arbitrary client input from slicing inside a
/// multi-byte character.
pub fn normalize_start_time(raw: &str) -> Result<String, DoctorError> {
    let trimmed = raw.trim();

    // Combined date-time values carry the wall clock after the separator.
    let time_part = match trimmed.split_once('T') {
        Some((_, time)) => time,
        None => trimmed,
    };

    let hhmm = time_part.get(..5).ok_or_else(|| {
        DoctorError::ValidationError(format!("Invalid time value: {}", raw))
    })?;

    NaiveTime::parse_from_str(hhmm, "%H:%M").map_err(|_| {
        DoctorError::ValidationError(format!("Invalid time value: {}", raw))
    })?;

    Ok(hhmm.to_string())
}

fn parse_time(normalized: &str) -> Result<NaiveTime, DoctorError> {
    NaiveTime::parse_from_str(normalized, "%H:%M").map_err(|_| {
        DoctorError::ValidationError(format!("Invalid time value: {}", normalized))
    })
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Publish a doctor's slots for one day, replacing whatever was there.
    ///
    /// The request carries the full day: existing rows for (doctor, date)
    /// are deleted first, then only the entries marked available are
    /// inserted. Rows claimed by earlier bookings disappear with the delete,
    /// which is the intended way for a doctor to reshape a day.
    pub async fn publish_availability(
        &self,
        doctor_id: &str,
        request: PublishAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, DoctorError> {
        debug!(
            "Publishing {} slots for doctor {} on {}",
            request.slots.len(),
            doctor_id,
            request.date
        );

        if request.slots.is_empty() {
            return Err(DoctorError::ValidationError(
                "At least one slot entry is required".to_string(),
            ));
        }

        let mut seen_starts: Vec<String> = Vec::new();
        let mut rows: Vec<Value> = Vec::new();

        for entry in &request.slots {
            let start = normalize_start_time(&entry.start_time)?;
            let end = normalize_start_time(&entry.end_time)?;

            if parse_time(&start)? >= parse_time(&end)? {
                return Err(DoctorError::ValidationError(format!(
                    "Slot start {} must be before end {}",
                    start, end
                )));
            }

            if seen_starts.contains(&start) {
                return Err(DoctorError::ValidationError(format!(
                    "Duplicate slot start time: {}",
                    start
                )));
            }
            seen_starts.push(start.clone());

            if entry.is_available {
                rows.push(json!({
                    "doctor_id": doctor_id,
                    "date": request.date,
                    "start_time": start,
                    "end_time": end,
                    "is_available": true,
                }));
            }
        }

        let delete_path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&date=eq.{}",
            doctor_id, request.date
        );
        // return=representation keeps the response a JSON array instead of
        // an empty 204 body.
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &delete_path,
                Some(auth_token),
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        // A day can be published with no bookable slots; the delete already
        // cleared it.
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let inserted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_availability",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let slots: Vec<AvailabilitySlot> = inserted
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilitySlot>, _>>()
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        debug!("Published {} bookable slots", slots.len());
        Ok(slots)
    }

    /// Bookable start times for a doctor on a date, normalized to "HH:MM".
    ///
    /// Prefers the `get_available_time_slots` server-side function and falls
    /// back to reading the table directly when the function is missing or
    /// errors, so reads keep working on databases without it.
    pub async fn get_available_times(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<String>, DoctorError> {
        debug!("Fetching available times for doctor {} on {}", doctor_id, date);

        let params = json!({
            "p_doctor_id": doctor_id,
            "p_date": date,
        });

        let rows: Vec<Value> = match self
            .supabase
            .rpc("get_available_time_slots", params, auth_token)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "get_available_time_slots failed ({}), falling back to direct query",
                    e
                );
                self.query_available_rows(doctor_id, date, auth_token)
                    .await?
            }
        };

        let mut times = Vec::new();
        for row in rows {
            let raw = match &row {
                Value::String(s) => s.clone(),
                other => other["start_time"]
                    .as_str()
                    .ok_or_else(|| {
                        DoctorError::DatabaseError(
                            "Slot row is missing start_time".to_string(),
                        )
                    })?
                    .to_string(),
            };
            let normalized = normalize_start_time(&raw)?;
            if !times.contains(&normalized) {
                times.push(normalized);
            }
        }

        times.sort();
        Ok(times)
    }

    /// Raw availability rows for a date span, bookable or not.
    pub async fn get_availability_range(
        &self,
        doctor_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilitySlot>, DoctorError> {
        if from > to {
            return Err(DoctorError::ValidationError(
                "Range start must not be after range end".to_string(),
            ));
        }

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id, from, to
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilitySlot>, _>>()
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    /// Atomically claim a slot for booking.
    ///
    /// The update filters on `is_available=eq.true`, so of two concurrent
    /// claims for the same slot exactly one sees a row come back; the other
    /// gets an empty result and `SlotTaken`.
    pub async fn claim_slot(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start_time: &str,
        auth_token: &str,
    ) -> Result<AvailabilitySlot, DoctorError> {
        let normalized = normalize_start_time(start_time)?;

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&date=eq.{}&start_time=eq.{}&is_available=eq.true",
            doctor_id, date, normalized
        );

        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "is_available": false })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(DoctorError::SlotTaken)?;

        serde_json::from_value(row).map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    /// Put a previously claimed slot back on the market. Used when a booking
    /// is cancelled; a no-op if the publisher has since replaced the day.
    pub async fn release_slot(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start_time: &str,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let normalized = normalize_start_time(start_time)?;

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&date=eq.{}&start_time=eq.{}&is_available=eq.false",
            doctor_id, date, normalized
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "is_available": true })),
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn query_available_rows(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Value>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&date=eq.{}&is_available=eq.true&order=start_time.asc",
            doctor_id, date
        );

        self.supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_seconds_away() {
        assert_eq!(normalize_start_time("09:00:00").unwrap(), "09:00");
        assert_eq!(normalize_start_time("14:30:59").unwrap(), "14:30");
    }

    #[test]
    fn keeps_short_form() {
        assert_eq!(normalize_start_time("09:00").unwrap(), "09:00");
        assert_eq!(normalize_start_time("23:59").unwrap(), "23:59");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize_start_time(" 09:00:00 ").unwrap(), "09:00");
    }

    #[test]
    fn extracts_time_from_date_prefixed_values() {
        assert_eq!(normalize_start_time("2024-06-01T10:00:00").unwrap(), "10:00");
        assert_eq!(
            normalize_start_time("2024-06-01T10:00:00+00:00").unwrap(),
            "10:00"
        );
        assert_eq!(normalize_start_time("2024-06-01T10:00").unwrap(), "10:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_start_time("").is_err());
        assert!(normalize_start_time("9am").is_err());
        assert!(normalize_start_time("25:00").is_err());
        assert!(normalize_start_time("09:60").is_err());
        assert!(normalize_start_time("0900").is_err());
        assert!(normalize_start_time("2024-06-01").is_err());
    }

    #[test]
    fn rejects_multibyte_input_without_panicking() {
        assert!(normalize_start_time("1234é").is_err());
        assert!(normalize_start_time("éé:00").is_err());
        assert!(normalize_start_time("2024-06-01Té9:00").is_err());
    }
}
