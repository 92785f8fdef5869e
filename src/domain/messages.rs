// Wire messages exchanged with clients and the fleet endpoint
use serde::Serialize;
use serde_json::{Map, Value};

use super::robot_status::RobotState;

/// Milliseconds since the Unix epoch
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Server-initiated messages pushed over a client socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection {
        status: String,
        message: String,
        timestamp: i64,
    },
    StatusUpdate {
        data: Map<String, Value>,
    },
    Error {
        message: String,
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn welcome(message: impl Into<String>) -> Self {
        ServerMessage::Connection {
            status: "connected".to_string(),
            message: message.into(),
            timestamp: epoch_millis(),
        }
    }

    pub fn invalid_command(detail: impl std::fmt::Display) -> Self {
        ServerMessage::Error {
            message: format!("Invalid command format: {}", detail),
            timestamp: epoch_millis(),
        }
    }

    pub fn status_update(data: Map<String, Value>) -> Self {
        ServerMessage::StatusUpdate { data }
    }
}

/// Gateway-wide status, answered to `get_status` and pushed to the fleet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStatus {
    pub status: RobotState,
    pub serial_number: String,
    pub battery: u8,
    pub charging: bool,
    pub location: String,
    pub ready: bool,
    pub locations: Vec<String>,
    pub websocket_port: u16,
    pub connections: usize,
    pub timestamp: i64,
}

/// Body of one telemetry push
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub sn: String,
    pub status: GatewayStatus,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub connections: usize,
    pub port: u16,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: &'static str,
    pub websocket_port: u16,
    pub active_connections: usize,
}
