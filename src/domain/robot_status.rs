// Robot status domain model
use serde::Serialize;
use serde_json::{Map, Value};

use super::messages::epoch_millis;

pub const UNKNOWN_SERIAL: &str = "UNKNOWN";

/// Aggregated state of the robot as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotState {
    Initializing,
    Idle,
    Moving,
    CalculatingPath,
    NotReady,
    Error,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Initializing => "initializing",
            RobotState::Idle => "idle",
            RobotState::Moving => "moving",
            RobotState::CalculatingPath => "calculating_path",
            RobotState::NotReady => "not_ready",
            RobotState::Error => "error",
        }
    }
}

impl std::fmt::Display for RobotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub level: u8,
    pub charging: bool,
}

impl BatteryReading {
    pub fn new(level: u8, charging: bool) -> Self {
        Self {
            level: level.min(100),
            charging,
        }
    }
}

/// Snapshot of the robot. Only the event aggregator mutates it; everyone
/// else gets a clone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub status: RobotState,
    pub battery: u8,
    pub charging: bool,
    pub location: String,
    pub ready: bool,
    pub serial_number: String,
    pub timestamp: i64,
}

impl Default for RobotStatus {
    fn default() -> Self {
        Self {
            status: RobotState::Initializing,
            battery: 0,
            charging: false,
            location: "unknown".to_string(),
            ready: false,
            serial_number: UNKNOWN_SERIAL.to_string(),
            timestamp: epoch_millis(),
        }
    }
}

impl RobotStatus {
    /// Stamp the snapshot after a mutation
    pub fn touch(&mut self) {
        self.timestamp = epoch_millis();
    }

    pub fn apply_battery(&mut self, reading: BatteryReading) {
        self.battery = reading.level;
        self.charging = reading.charging;
    }

    /// Snapshot fields merged with event-specific extras. Extras never
    /// replace a snapshot field.
    pub fn to_update_data(&self, extra: Map<String, Value>) -> Map<String, Value> {
        let mut data = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in extra {
            data.entry(key).or_insert(value);
        }
        data
    }
}
