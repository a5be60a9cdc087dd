use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin client over the Supabase HTTP surface: PostgREST rows under
/// `/rest/v1/...`, server-side functions under `/rest/v1/rpc/...`, and the
/// auth API under `/auth/v1/...`.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Admin requests run under the service-role key, bypassing row-level
    /// security. Only the admin-gated handlers may reach this path.
    pub async fn admin_request<T>(&self, method: Method, path: &str,
                                  body: Option<Value>,
                                  extra_headers: Option<HeaderMap>)
                                  -> Result<T>
    where T: DeserializeOwned {
        if self.service_key.is_empty() {
            return Err(anyhow!("Service role key is not configured"));
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("Making admin request to {}", url);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Admin API error ({}): {}", status, error_text);
            return Err(anyhow!("API error ({}): {}", status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Invoke a PostgREST server-side function.
    pub async fn rpc<T>(&self, function: &str, params: Value,
                        auth_token: Option<&str>) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(params)).await
    }

    // Auth API

    pub async fn sign_up(&self, email: &str, password: &str,
                         user_metadata: Option<Value>) -> Result<Value> {
        let mut body = json!({
            "email": email,
            "password": password,
        });
        if let Some(metadata) = user_metadata {
            body["data"] = metadata;
        }

        self.request(Method::POST, "/auth/v1/signup", None, Some(body)).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Value> {
        let body = json!({
            "email": email,
            "password": password,
        });

        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(body),
        ).await
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let headers = self.get_headers(Some(auth_token))?;

        let response = self.client.post(&url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Sign-out error ({}): {}", status, error_text);
            return Err(anyhow!("Sign-out failed ({}): {}", status, error_text));
        }

        Ok(())
    }

    pub async fn get_user(&self, auth_token: &str) -> Result<Value> {
        self.request(Method::GET, "/auth/v1/user", Some(auth_token), None).await
    }

    /// Provision an auth user via the admin API, returning the created user.
    pub async fn admin_create_user(&self, email: &str, password: &str,
                                   user_metadata: Value) -> Result<Value> {
        let body = json!({
            "email": email,
            "password": password,
            "email_confirm": true,
            "user_metadata": user_metadata,
        });

        self.admin_request(Method::POST, "/auth/v1/admin/users", Some(body), None).await
    }

    pub async fn admin_delete_user(&self, user_id: &str) -> Result<()> {
        let path = format!("/auth/v1/admin/users/{}", user_id);
        let _: Value = self.admin_request(Method::DELETE, &path, None, None).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
