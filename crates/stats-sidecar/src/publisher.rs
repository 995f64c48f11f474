//! Telemetry delivery to the log ingestion endpoint.

use crate::config::{ConfigError, Identity, IngestionSettings};
use crate::signer::{self, JSON_CONTENT_TYPE};
use crate::types::{MetricRecord, PublishError, PublishResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{info, warn};

/// Ingestion resource path, also part of the signed string
pub const RESOURCE: &str = "/api/logs";

/// Only method the ingestion API accepts
pub const HTTP_POST: &str = "POST";

/// Overall deadline of one delivery, connect included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Publisher trait
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver one record. Non-2xx responses are returned, not errors.
    async fn publish(
        &self,
        identity: &Identity,
        record: &MetricRecord,
    ) -> Result<PublishResult, PublishError>;
}

/// Signs records and POSTs them to the tenant's ingestion endpoint
pub struct TelemetryPublisher {
    client: reqwest::Client,
    settings: IngestionSettings,
}

impl TelemetryPublisher {
    /// Create a new publisher
    pub fn new(settings: IngestionSettings) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, settings })
    }

    /// Full URL records for `customer_id` are posted to
    pub fn endpoint(&self, customer_id: &str) -> String {
        let base = match &self.settings.endpoint {
            Some(base) => base.trim().trim_end_matches('/').to_string(),
            None => format!("https://{}.{}", customer_id, self.settings.host),
        };
        format!(
            "{}{}?api-version={}",
            base, RESOURCE, self.settings.api_version
        )
    }

    /// Build the signed request for an encoded body
    pub fn build_request(
        &self,
        identity: &Identity,
        body: Vec<u8>,
        date: &str,
    ) -> Result<reqwest::Request, PublishError> {
        let signature = signer::sign(
            &identity.customer_id,
            &identity.shared_key,
            date,
            body.len(),
            HTTP_POST,
            RESOURCE,
        );
        info!("Signature: {}", signature);

        self.client
            .post(self.endpoint(&identity.customer_id))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, signature)
            .header("Log-Type", &self.settings.log_type)
            .header("x-ms-date", date)
            .body(body)
            .build()
            .map_err(PublishError::transport)
    }
}

#[async_trait]
impl Publisher for TelemetryPublisher {
    async fn publish(
        &self,
        identity: &Identity,
        record: &MetricRecord,
    ) -> Result<PublishResult, PublishError> {
        info!("Stats to send: {}", record);
        let body = serde_json::to_vec(record)?;

        let date = signer::rfc1123(Utc::now());
        let request = self.build_request(identity, body, &date)?;
        let url = request.url().to_string();
        info!("Request:\n{}", format_request(&request));

        let response = self.client.execute(request).await.map_err(|e| {
            warn!(url = %url, error = %e, "Telemetry request failed");
            PublishError::transport(e)
        })?;

        let status = response.status();
        // Reading the body to the end releases the connection
        let body = response.text().await.map_err(|e| {
            warn!(url = %url, status = status.as_u16(), error = %e, "Failed to read telemetry response");
            PublishError::transport(e)
        })?;

        if status.is_success() {
            info!("Response ({}):\n{}", status, body);
        } else {
            warn!("Response ({}):\n{}", status, body);
        }

        Ok(PublishResult {
            status: status.as_u16(),
            body,
        })
    }
}

/// Render a request as text for the logs.
///
/// Request line, `Host`, one line per header, a blank line, then the body.
pub fn format_request(request: &reqwest::Request) -> String {
    let url = request.url();
    let mut lines = vec![format!("{} {} HTTP/1.1", request.method(), url)];

    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => lines.push(format!("Host: {}:{}", host, port)),
            None => lines.push(format!("Host: {}", host)),
        }
    }

    for (name, value) in request.headers() {
        let value = value.to_str().unwrap_or("<binary>");
        lines.push(format!("{}: {}", name.as_str().to_lowercase(), value));
    }

    if let Some(body) = request.body().and_then(|b| b.as_bytes()) {
        lines.push(String::new());
        lines.push(String::from_utf8_lossy(body).into_owned());
    }

    lines.join("\n")
}
