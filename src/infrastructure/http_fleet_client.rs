// Fleet endpoint client over HTTP
use crate::application::fleet_client::{FleetClient, FleetError};
use crate::domain::messages::TelemetryReport;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    client: reqwest::Client,
    status_url: String,
}

impl HttpFleetClient {
    pub fn new(status_url: String, timeout: Duration) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FleetError::Transport(e.to_string()))?;

        Ok(Self { client, status_url })
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }
}

#[async_trait]
impl FleetClient for HttpFleetClient {
    async fn push_status(&self, report: &TelemetryReport) -> Result<(), FleetError> {
        let response = self
            .client
            .post(&self.status_url)
            .json(report)
            .send()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Fleet endpoint answered {}: {}", status, body);
            return Err(FleetError::Status(status.as_u16()));
        }

        Ok(())
    }
}
