use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CatalogError, CreateCategoryRequest, ServiceCategory};

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

pub struct CatalogService {
    supabase: SupabaseClient,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<ServiceCategory>, CatalogError> {
        debug!("Listing service categories");

        let rows: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/service_categories?order=name.asc",
                None,
                None,
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ServiceCategory>, _>>()
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))
    }

    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<ServiceCategory, CatalogError> {
        if request.name.trim().is_empty() {
            return Err(CatalogError::ValidationError(
                "Category name is required".to_string(),
            ));
        }
        if request.slot_duration <= 0 {
            return Err(CatalogError::ValidationError(
                "Slot duration must be positive".to_string(),
            ));
        }
        if request.buffer_time.is_some_and(|b| b < 0) {
            return Err(CatalogError::ValidationError(
                "Buffer time must not be negative".to_string(),
            ));
        }

        let row = json!({
            "name": request.name,
            "description": request.description,
            "slot_duration": request.slot_duration,
            "buffer_time": request.buffer_time.unwrap_or(0),
        });

        let inserted: Vec<Value> = self
            .supabase
            .admin_request(
                Method::POST,
                "/rest/v1/service_categories",
                Some(row),
                Some(return_representation()),
            )
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        let row = inserted.into_iter().next().ok_or_else(|| {
            CatalogError::DatabaseError("Category insert returned no row".to_string())
        })?;

        let category: ServiceCategory = serde_json::from_value(row)
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        info!("Service category created: {}", category.name);
        Ok(category)
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), CatalogError> {
        let path = format!("/rest/v1/service_categories?id=eq.{}", category_id);
        let deleted: Vec<Value> = self
            .supabase
            .admin_request(Method::DELETE, &path, None, Some(return_representation()))
            .await
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if deleted.is_empty() {
            return Err(CatalogError::NotFound);
        }

        Ok(())
    }
}
