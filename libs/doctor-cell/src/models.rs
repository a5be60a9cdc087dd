use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row from the `users` table. Doctors embed this as their public profile
/// through the `doctors_user_id_fkey` relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row from the `doctors` table, with the linked user profile embedded.
/// Single reads surface a missing embed as `DoctorError::ProfileMissing`
/// instead of propagating the null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialty: String,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub bio: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Row from the `doctor_availability` table. `start_time` and `end_time`
/// are stored as Postgres `time` values and travel as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotEntry {
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

/// Replace-by-day publish request: the full set of slots for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAvailabilityRequest {
    pub date: NaiveDate,
    pub slots: Vec<SlotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialty: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub bio: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor record has no linked user profile")]
    ProfileMissing,

    #[error("Slot is no longer available")]
    SlotTaken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
