use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, UpdateDoctorRequest};

/// Single authoritative embed for the doctor's user profile. Every read path
/// uses this select so there is one canonical join shape.
const DOCTOR_SELECT: &str = "*,user:users!doctors_user_id_fkey(*)";

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Provision a doctor end to end: auth user, profile row, doctor row.
    /// Runs under the service-role key; only the admin surface reaches this.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor account for {}", request.email);

        if request.email.trim().is_empty() || !request.email.contains('@') {
            return Err(DoctorError::ValidationError(
                "A valid email is required".to_string(),
            ));
        }
        if request.password.len() < 8 {
            return Err(DoctorError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if request.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Specialty is required".to_string(),
            ));
        }

        let metadata = json!({
            "name": request.name,
            "role": "doctor",
        });

        let auth_user = self
            .supabase
            .admin_create_user(&request.email, &request.password, metadata)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let user_id = auth_user["id"]
            .as_str()
            .ok_or_else(|| {
                DoctorError::DatabaseError("Auth API returned no user id".to_string())
            })?
            .to_string();

        let profile = json!({
            "id": user_id,
            "name": request.name,
            "email": request.email,
            "phone": request.phone,
            "role": "doctor",
        });

        let profile_result: Result<Vec<Value>, _> = self
            .supabase
            .admin_request(
                Method::POST,
                "/rest/v1/users",
                Some(profile),
                Some(return_representation()),
            )
            .await;

        if let Err(e) = profile_result {
            // Leave no orphaned auth user behind.
            if let Err(cleanup) = self.supabase.admin_delete_user(&user_id).await {
                warn!("Failed to clean up auth user {}: {}", user_id, cleanup);
            }
            return Err(DoctorError::DatabaseError(e.to_string()));
        }

        let doctor_row = json!({
            "user_id": user_id,
            "specialty": request.specialty,
            "experience": request.experience,
            "education": request.education,
            "bio": request.bio,
        });

        let inserted: Vec<Value> = match self
            .supabase
            .admin_request(
                Method::POST,
                "/rest/v1/doctors",
                Some(doctor_row),
                Some(return_representation()),
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(cleanup) = self.supabase.admin_delete_user(&user_id).await {
                    warn!("Failed to clean up auth user {}: {}", user_id, cleanup);
                }
                return Err(DoctorError::DatabaseError(e.to_string()));
            }
        };

        let row = inserted.into_iter().next().ok_or_else(|| {
            DoctorError::DatabaseError("Doctor insert returned no row".to_string())
        })?;

        let doctor: Doctor = serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        info!("Doctor created: {} ({})", doctor.id, request.email);
        Ok(doctor)
    }

    pub async fn get_doctor(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select={}",
            doctor_id,
            urlencoding::encode(DOCTOR_SELECT)
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;

        let doctor: Doctor = serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if doctor.user.is_none() {
            return Err(DoctorError::ProfileMissing);
        }

        Ok(doctor)
    }

    pub async fn list_doctors(
        &self,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?select={}&order=created_at.asc",
            urlencoding::encode(DOCTOR_SELECT)
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor {}", doctor_id);

        let mut doctor_update = serde_json::Map::new();
        if let Some(specialty) = &request.specialty {
            doctor_update.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(experience) = &request.experience {
            doctor_update.insert("experience".to_string(), json!(experience));
        }
        if let Some(education) = &request.education {
            doctor_update.insert("education".to_string(), json!(education));
        }
        if let Some(bio) = &request.bio {
            doctor_update.insert("bio".to_string(), json!(bio));
        }

        let mut profile_update = serde_json::Map::new();
        if let Some(name) = &request.name {
            profile_update.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = &request.phone {
            profile_update.insert("phone".to_string(), json!(phone));
        }

        if doctor_update.is_empty() && profile_update.is_empty() {
            return Err(DoctorError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        if !profile_update.is_empty() {
            let current = self.get_doctor_admin(doctor_id).await?;
            let path = format!("/rest/v1/users?id=eq.{}", current.user_id);
            let _: Vec<Value> = self
                .supabase
                .admin_request(
                    Method::PATCH,
                    &path,
                    Some(Value::Object(profile_update)),
                    Some(return_representation()),
                )
                .await
                .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        }

        if !doctor_update.is_empty() {
            let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
            let updated: Vec<Value> = self
                .supabase
                .admin_request(
                    Method::PATCH,
                    &path,
                    Some(Value::Object(doctor_update)),
                    Some(return_representation()),
                )
                .await
                .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

            if updated.is_empty() {
                return Err(DoctorError::NotFound);
            }
        }

        self.get_doctor_admin(doctor_id).await
    }

    /// Remove the doctor row, profile row, and auth user, in that order.
    pub async fn delete_doctor(&self, doctor_id: &str) -> Result<(), DoctorError> {
        debug!("Deleting doctor {}", doctor_id);

        let doctor = self.get_doctor_admin(doctor_id).await?;

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let _: Vec<Value> = self
            .supabase
            .admin_request(Method::DELETE, &path, None, Some(return_representation()))
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let profile_path = format!("/rest/v1/users?id=eq.{}", doctor.user_id);
        let _: Vec<Value> = self
            .supabase
            .admin_request(
                Method::DELETE,
                &profile_path,
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        self.supabase
            .admin_delete_user(&doctor.user_id.to_string())
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        info!("Doctor deleted: {}", doctor_id);
        Ok(())
    }

    async fn get_doctor_admin(&self, doctor_id: &str) -> Result<Doctor, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select={}",
            doctor_id,
            urlencoding::encode(DOCTOR_SELECT)
        );

        let rows: Vec<Value> = self
            .supabase
            .admin_request(Method::GET, &path, None, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;

        let doctor: Doctor = serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if doctor.user.is_none() {
            return Err(DoctorError::ProfileMissing);
        }

        Ok(doctor)
    }
}
