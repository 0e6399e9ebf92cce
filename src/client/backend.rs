//! HTTP connection to the coursehub backend

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::error::ClientError;
use crate::api::middleware::PROJECT_ID_HEADER;
use crate::api::ApiError;

/// Client-side environment: where the backend lives and which project the
/// client belongs to. Missing values are kept as `None`; calls that need
/// them fail with [`ClientError::NotConfigured`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: Option<String>,
    pub project_id: Option<String>,
    pub app_url: Option<String>,
}

impl BackendConfig {
    /// Read `COURSEHUB_ENDPOINT`, `COURSEHUB_PROJECT_ID` and `COURSEHUB_APP_URL`
    pub fn from_env() -> Self {
        let config = Self {
            endpoint: env_value("COURSEHUB_ENDPOINT"),
            project_id: env_value("COURSEHUB_PROJECT_ID"),
            app_url: env_value("COURSEHUB_APP_URL"),
        };
        if config.endpoint.is_none() {
            tracing::warn!("COURSEHUB_ENDPOINT is not set, backend calls will fail");
        }
        config
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shared HTTP client holding the current session token
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    config: BackendConfig,
    token: Arc<RwLock<Option<String>>>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    /// Absolute URL of an API path such as `/auth/session`
    pub fn url(&self, path: &str) -> Result<String, ClientError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(ClientError::NotConfigured("COURSEHUB_ENDPOINT"))?;
        Ok(format!("{}/api/v1{}", endpoint.trim_end_matches('/'), path))
    }

    /// Link into the web application, e.g. `/courses/3`
    pub fn app_link(&self, path: &str) -> Result<String, ClientError> {
        let app_url = self
            .config
            .app_url
            .as_deref()
            .ok_or(ClientError::NotConfigured("COURSEHUB_APP_URL"))?;
        Ok(format!("{}{}", app_url.trim_end_matches('/'), path))
    }

    /// Request with the session token and project id attached
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let mut request = self.http.request(method, self.url(path)?);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(project_id) = &self.config.project_id {
            request = request.header(PROJECT_ID_HEADER, project_id);
        }
        Ok(request)
    }

    /// Send and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send and ignore the body
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ApiError>().await.ok();
        let err = ClientError::from_response(status, body);
        tracing::warn!(%status, "Backend call failed: {}", err);
        Err(err)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send_json(self.request(Method::GET, path)?).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ClientError> {
        self.send_json(self.request(Method::GET, path)?.query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path)?.json(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, path)?.json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::DELETE, path)?).await
    }
}
