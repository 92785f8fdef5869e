// Seam for the remote fleet-management endpoint
use crate::domain::messages::TelemetryReport;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet request failed: {0}")]
    Transport(String),
    #[error("fleet endpoint returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait FleetClient: Send + Sync {
    /// Push one status report. One attempt, no retry.
    async fn push_status(&self, report: &TelemetryReport) -> Result<(), FleetError>;
}
