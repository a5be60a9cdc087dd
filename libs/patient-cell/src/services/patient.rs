use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Provision a patient end to end: auth user, then profile row. Used by
    /// reception staff registering walk-ins; runs under the service-role key.
    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient account for {}", request.email);

        if request.email.trim().is_empty() || !request.email.contains('@') {
            return Err(PatientError::ValidationError(
                "A valid email is required".to_string(),
            ));
        }
        if request.password.len() < 8 {
            return Err(PatientError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if request.name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Name is required".to_string(),
            ));
        }

        let metadata = json!({
            "name": request.name,
            "phone": request.phone,
            "role": "patient",
        });

        let auth_user = self
            .supabase
            .admin_create_user(&request.email, &request.password, metadata)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let user_id = auth_user["id"]
            .as_str()
            .ok_or_else(|| {
                PatientError::DatabaseError("Auth API returned no user id".to_string())
            })?
            .to_string();

        let profile = json!({
            "id": user_id,
            "name": request.name,
            "email": request.email,
            "phone": request.phone,
            "role": "patient",
            "date_of_birth": request.date_of_birth,
            "address": request.address,
        });

        let inserted: Vec<Value> = match self
            .supabase
            .admin_request(
                Method::POST,
                "/rest/v1/users",
                Some(profile),
                Some(return_representation()),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                // Leave no orphaned auth user behind.
                if let Err(cleanup) = self.supabase.admin_delete_user(&user_id).await {
                    warn!("Failed to clean up auth user {}: {}", user_id, cleanup);
                }
                return Err(PatientError::DatabaseError(e.to_string()));
            }
        };

        let row = inserted.into_iter().next().ok_or_else(|| {
            PatientError::DatabaseError("Profile insert returned no row".to_string())
        })?;

        let patient: Patient = serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient created: {} ({})", patient.id, request.email);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/users?id=eq.{}&role=eq.patient", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    /// Admin-only listing of all patient profiles.
    pub async fn list_patients(&self) -> Result<Vec<Patient>, PatientError> {
        let path = "/rest/v1/users?role=eq.patient&order=created_at.asc";
        let rows: Vec<Value> = self
            .supabase
            .admin_request(Method::GET, path, None, None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update = serde_json::Map::new();
        if let Some(name) = &request.name {
            update.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = &request.phone {
            update.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = &request.address {
            update.insert("address".to_string(), json!(address));
        }
        if let Some(date_of_birth) = &request.date_of_birth {
            update.insert("date_of_birth".to_string(), json!(date_of_birth));
        }

        if update.is_empty() {
            return Err(PatientError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        let path = format!("/rest/v1/users?id=eq.{}&role=eq.patient", patient_id);
        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = updated.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    /// Remove the profile row and the auth user behind it.
    pub async fn delete_patient(&self, patient_id: &str) -> Result<(), PatientError> {
        debug!("Deleting patient {}", patient_id);

        let path = format!("/rest/v1/users?id=eq.{}&role=eq.patient", patient_id);
        let deleted: Vec<Value> = self
            .supabase
            .admin_request(Method::DELETE, &path, None, Some(return_representation()))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(PatientError::NotFound);
        }

        self.supabase
            .admin_delete_user(patient_id)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient deleted: {}", patient_id);
        Ok(())
    }
}
