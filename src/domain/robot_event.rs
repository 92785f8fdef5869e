// Robot event domain model - Asynchronous callbacks raised by the controller
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    ReadinessChanged(bool),
    NavigationStatusChanged(NavigationEvent),
    LocationsUpdated(Vec<String>),
    PositionChanged(PositionSample),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPhase {
    Start,
    Going,
    Complete,
    Abort,
    Calculating,
}

impl NavigationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationPhase::Start => "start",
            NavigationPhase::Going => "going",
            NavigationPhase::Complete => "complete",
            NavigationPhase::Abort => "abort",
            NavigationPhase::Calculating => "calculating",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEvent {
    pub location: String,
    pub phase: NavigationPhase,
    pub description: String,
}

impl NavigationEvent {
    pub fn new(location: impl Into<String>, phase: NavigationPhase, description: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            phase,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub tilt: f64,
    pub timestamp: i64,
}

/// Lets at most one position sample through per window. Samples inside the
/// window are dropped, not queued.
#[derive(Debug, Clone)]
pub struct PositionThrottle {
    window: Duration,
    last_emitted: Option<Instant>,
}

impl PositionThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: None,
        }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_emitted {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_emitted = Some(now);
                true
            }
        }
    }
}
