//! Cloud record store over HTTP/JSON

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{CloudConnector, RecordStore};
use crate::config::CloudConfig;
use crate::error::{Error, Result};
use crate::models::{RecordId, SyncRecord, Table};

#[derive(Clone)]
pub struct HttpStore {
    base_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpStore")
            .field("base_url", &self.base_url)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpStore {
    pub fn new(config: &CloudConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.normalized_base_url()?,
            auth_token: config.normalized_token()?,
            client: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()?,
        })
    }

    fn records_url(&self, table: Table, user_id: &str) -> String {
        format!(
            "{}/v1/users/{}/tables/{}/records",
            self.base_url,
            urlencoding::encode(user_id),
            table.as_str()
        )
    }

    fn record_url(&self, table: Table, user_id: &str, id: &RecordId) -> String {
        format!("{}/{id}", self.records_url(table, user_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.auth_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(response)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound(message))
    } else {
        Err(Error::Cloud(message))
    }
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn ping(&self) -> Result<()> {
        let response = self
            .send(self.client.get(format!("{}/v1/health", self.base_url)))
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list(&self, table: Table, user_id: &str) -> Result<Vec<SyncRecord>> {
        let response = self
            .send(self.client.get(self.records_url(table, user_id)))
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn get(
        &self,
        table: Table,
        user_id: &str,
        id: &RecordId,
    ) -> Result<Option<SyncRecord>> {
        let response = self
            .send(self.client.get(self.record_url(table, user_id, id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn create(&self, record: &SyncRecord) -> Result<SyncRecord> {
        let url = self.records_url(record.table(), &record.envelope.user_id);
        let response = self.send(self.client.post(url).json(record)).await?;
        Ok(check(response).await?.json().await?)
    }

    async fn update(&self, record: &SyncRecord) -> Result<SyncRecord> {
        let url = self.record_url(record.table(), &record.envelope.user_id, &record.id());
        let response = self.send(self.client.put(url).json(record)).await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete(&self, table: Table, user_id: &str, id: &RecordId) -> Result<()> {
        let response = self
            .send(self.client.delete(self.record_url(table, user_id, id)))
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Connects users to the HTTP record store described by a [`CloudConfig`].
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: CloudConfig,
}

impl HttpConnector {
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.normalized_base_url()?;
        config.normalized_token()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl CloudConnector for HttpConnector {
    async fn connect(&self, user_id: &str) -> Result<Arc<dyn RecordStore>> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".to_string()));
        }
        Ok(Arc::new(HttpStore::new(&self.config)?))
    }
}

/// Plain-text error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 180;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpStore {
        HttpStore::new(&CloudConfig::new("https://api.example.com/", "secret")).unwrap()
    }

    #[test]
    fn record_urls_encode_user_and_table() {
        let store = store();
        let id = RecordId::new();
        assert_eq!(
            store.records_url(Table::ApiKey, "alice@example.com"),
            "https://api.example.com/v1/users/alice%40example.com/tables/api_keys/records"
        );
        assert_eq!(
            store.record_url(Table::Task, "bob", &id),
            format!("https://api.example.com/v1/users/bob/tables/tasks/records/{id}")
        );
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", store());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::CONFLICT, r#"{"message":" stale write "}"#),
            "stale write (409)"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, r#"{"error":"upstream"}"#),
            "upstream (502)"
        );
        assert_eq!(parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "  "), "HTTP 500");
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, "denied"),
            "denied (401)"
        );
    }

    #[test]
    fn parse_api_error_truncates_html_pages() {
        let page = format!("<html>{}</html>", "x".repeat(500));
        let message = parse_api_error(StatusCode::SERVICE_UNAVAILABLE, &page);
        assert_eq!(message.len(), MAX_ERROR_BODY_CHARS + " (503)".len());
        assert!(message.starts_with("<html>xxx"));
    }

    #[test]
    fn connector_rejects_bad_config() {
        assert!(HttpConnector::new(CloudConfig::new("ftp://x", "t")).is_err());
        assert!(HttpConnector::new(CloudConfig::default()).is_err());
        assert!(HttpConnector::new(CloudConfig::new("http://localhost:8080", "t")).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connector_requires_user() {
        let connector = HttpConnector::new(CloudConfig::new("http://localhost:8080", "t")).unwrap();
        assert!(matches!(
            connector.connect("  ").await,
            Err(Error::InvalidInput(_))
        ));
    }
}
