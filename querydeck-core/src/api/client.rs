//! HTTP client for the analytics backend
//!
//! Every endpoint returns JSON. Non-success responses are classified into
//! [`Error::Unauthorized`], [`Error::ServiceUnavailable`] or [`Error::Api`]
//! carrying the backend's `detail` message. Nothing is retried; callers
//! surface the error and let the user trigger the action again.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{
    Dashboard, DashboardId, DashboardPayload, DatabaseInfo, Identity, LoginResponse,
    QueryResponse, QueryResult,
};

/// HTTP client for the analytics backend
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client, optionally carrying a bearer token on every request
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ApiConfig, token: Option<&str>) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid access token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ============================================
    // Auth
    // ============================================

    /// Exchange credentials for an access token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest { username, password };
        self.send(self.http_client.post(self.url("/users/login")).json(&body))
            .await
    }

    /// Identity behind the current token
    pub async fn me(&self) -> Result<Identity> {
        self.send(self.http_client.get(self.url("/users/me"))).await
    }

    // ============================================
    // Questions & SQL
    // ============================================

    /// Ask the backend to classify a question and, for data questions, write SQL
    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        tracing::debug!(question = %question, "Submitting question");
        self.send(
            self.http_client
                .post(self.url("/database/query"))
                .json(&QuestionRequest { question }),
        )
        .await
    }

    /// Execute one SQL statement against the session's database
    pub async fn execute_sql(&self, sql_query: &str) -> Result<QueryResult> {
        tracing::debug!(sql = %sql_query, "Executing SQL");
        let result: QueryResult = self
            .send(
                self.http_client
                    .post(self.url("/database/execute-sql"))
                    .json(&ExecuteSqlRequest { sql_query }),
            )
            .await?;
        tracing::debug!(rows = result.row_count(), "SQL executed");
        Ok(result)
    }

    // ============================================
    // Dashboards
    // ============================================

    pub async fn list_dashboards(&self) -> Result<Vec<Dashboard>> {
        self.send(self.http_client.get(self.url("/dashboards"))).await
    }

    pub async fn list_client_dashboards(&self, client_id: i64) -> Result<Vec<Dashboard>> {
        self.send(
            self.http_client
                .get(self.url(&format!("/dashboards/client/{}", client_id))),
        )
        .await
    }

    pub async fn get_dashboard(&self, id: DashboardId) -> Result<Dashboard> {
        self.send(self.http_client.get(self.url(&format!("/dashboards/{}", id))))
            .await
    }

    /// Create a dashboard; the backend assigns its id
    pub async fn create_dashboard(&self, payload: &DashboardPayload<'_>) -> Result<Dashboard> {
        self.send(self.http_client.post(self.url("/dashboards")).json(payload))
            .await
    }

    /// Replace a dashboard's chats, charts and title
    pub async fn update_dashboard(
        &self,
        id: DashboardId,
        payload: &DashboardPayload<'_>,
    ) -> Result<Dashboard> {
        self.send(
            self.http_client
                .put(self.url(&format!("/dashboards/{}", id)))
                .json(payload),
        )
        .await
    }

    pub async fn delete_dashboard(&self, id: DashboardId) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                self.http_client
                    .delete(self.url(&format!("/dashboards/{}", id))),
            )
            .await?;
        Ok(())
    }

    // ============================================
    // Databases
    // ============================================

    /// Look up a database connection's display name
    pub async fn get_database(&self, id: i64) -> Result<DatabaseInfo> {
        self.send(self.http_client.get(self.url(&format!("/databases/{}", id))))
            .await
    }

    /// Send a request and decode a JSON success body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Request(format!("failed to parse response: {}", e)))
        } else {
            let body = response.text().await.unwrap_or_default();
            let err = classify_error(status, &body);
            tracing::warn!(status = status.as_u16(), error = %err, "Backend request failed");
            Err(err)
        }
    }
}

/// Request body for POST /users/login
#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Request body for POST /database/query
#[derive(Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

/// Request body for POST /database/execute-sql
#[derive(Serialize)]
struct ExecuteSqlRequest<'a> {
    sql_query: &'a str,
}

/// Map a non-success response to the error taxonomy
fn classify_error(status: StatusCode, body: &str) -> Error {
    let detail = extract_detail(body);
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::SERVICE_UNAVAILABLE => Error::ServiceUnavailable(
            detail.unwrap_or_else(|| "No database connected".to_string()),
        ),
        _ => Error::Api {
            status: status.as_u16(),
            detail,
        },
    }
}

/// Pull `detail` out of an error body.
///
/// `detail` is usually a string; validation failures send a list of
/// `{msg, ...}` objects, which are joined.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
