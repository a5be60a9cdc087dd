use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_doctors: usize,
    pub total_patients: usize,
    pub total_appointments: usize,
    pub appointments_this_month: usize,
}

/// Admin views over the whole appointment book. Runs under the service-role
/// key; the handlers gate on the admin role before constructing this.
pub struct AdminService {
    supabase: SupabaseClient,
}

impl AdminService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Every appointment in the system, newest slot first.
    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.list("/rest/v1/appointments?order=slot_time.desc").await
    }

    /// Appointments still in `scheduled`, soonest first.
    pub async fn list_pending(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.list("/rest/v1/appointments?status=eq.scheduled&order=slot_time.asc")
            .await
    }

    pub async fn system_stats(&self) -> Result<SystemStats, AppointmentError> {
        debug!("Collecting system statistics");

        let total_doctors = self.count("/rest/v1/doctors?select=id").await?;
        let total_patients = self
            .count("/rest/v1/users?role=eq.patient&select=id")
            .await?;
        let total_appointments = self.count("/rest/v1/appointments?select=id").await?;

        let today = Utc::now().date_naive();
        let month_path = format!(
            "/rest/v1/appointments?select=id&slot_time=gte.{}T00:00&slot_time=lt.{}T00:00",
            month_start(today),
            next_month_start(today)
        );
        let appointments_this_month = self.count(&month_path).await?;

        Ok(SystemStats {
            total_doctors,
            total_patients,
            total_appointments,
            appointments_this_month,
        })
    }

    async fn list(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .admin_request(Method::GET, path, None, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn count(&self, path: &str) -> Result<usize, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .admin_request(Method::GET, path, None, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.len())
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}
