// Test doubles for the application seams
use crate::application::broadcast::Broadcast;
use crate::application::fleet_client::{FleetClient, FleetError};
use crate::application::robot_controller::{ControllerError, RobotController};
use crate::domain::messages::TelemetryReport;
use crate::domain::robot_event::RobotEvent;
use crate::domain::robot_status::BatteryReading;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GoTo(String),
    Stop,
    Save(String),
    Delete(String),
    Speak(String),
    Tilt(i32),
    Turn(i32),
}

pub struct FakeController {
    events: broadcast::Sender<RobotEvent>,
    locations: Mutex<Vec<String>>,
    battery: Mutex<BatteryReading>,
    calls: Mutex<Vec<Call>>,
    battery_polls: Mutex<usize>,
    fail_subscribe: bool,
}

impl FakeController {
    pub fn with_locations(locations: &[&str]) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            locations: Mutex::new(locations.iter().map(|l| l.to_string()).collect()),
            battery: Mutex::new(BatteryReading::new(100, false)),
            calls: Mutex::new(Vec::new()),
            battery_polls: Mutex::new(0),
            fail_subscribe: false,
        }
    }

    pub fn failing_subscription() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::with_locations(&[])
        }
    }

    pub fn emit(&self, event: RobotEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_battery(&self, reading: BatteryReading) {
        *self.battery.lock() = reading;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn battery_polls(&self) -> usize {
        *self.battery_polls.lock()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl RobotController for FakeController {
    fn subscribe(&self) -> Result<broadcast::Receiver<RobotEvent>, ControllerError> {
        if self.fail_subscribe {
            return Err(ControllerError::Unavailable("no robot attached".to_string()));
        }
        Ok(self.events.subscribe())
    }

    async fn go_to(&self, location: &str) -> Result<(), ControllerError> {
        self.record(Call::GoTo(location.to_string()));
        Ok(())
    }

    async fn stop_movement(&self) -> Result<(), ControllerError> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn list_locations(&self) -> Result<Vec<String>, ControllerError> {
        Ok(self.locations.lock().clone())
    }

    async fn save_location(&self, name: &str) -> Result<bool, ControllerError> {
        self.record(Call::Save(name.to_string()));
        let mut locations = self.locations.lock();
        if locations.iter().any(|l| l == name) {
            return Ok(false);
        }
        locations.push(name.to_string());
        Ok(true)
    }

    async fn delete_location(&self, name: &str) -> Result<bool, ControllerError> {
        self.record(Call::Delete(name.to_string()));
        let mut locations = self.locations.lock();
        let before = locations.len();
        locations.retain(|l| l != name);
        Ok(locations.len() != before)
    }

    async fn speak(&self, text: &str, _show_caption: bool) -> Result<(), ControllerError> {
        self.record(Call::Speak(text.to_string()));
        Ok(())
    }

    async fn tilt_head(&self, degrees: i32) -> Result<(), ControllerError> {
        self.record(Call::Tilt(degrees));
        Ok(())
    }

    async fn turn_by(&self, degrees: i32) -> Result<(), ControllerError> {
        self.record(Call::Turn(degrees));
        Ok(())
    }

    async fn serial_number(&self) -> Result<String, ControllerError> {
        Ok("FAKE-0001".to_string())
    }

    async fn poll_battery(&self) -> Result<BatteryReading, ControllerError> {
        *self.battery_polls.lock() += 1;
        Ok(*self.battery.lock())
    }
}

/// Collects every broadcast payload
#[derive(Default)]
pub struct RecordingBroadcast {
    sent: Mutex<Vec<String>>,
}

impl RecordingBroadcast {
    pub fn messages(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    pub fn count_events(&self, event: &str) -> usize {
        self.messages()
            .iter()
            .filter(|m| m["data"]["event"] == event)
            .count()
    }

    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.sent.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for broadcasts");
    }
}

impl Broadcast for RecordingBroadcast {
    fn broadcast_text(&self, text: String) {
        self.sent.lock().push(text);
    }
}

/// Fleet client that records reports, optionally slow or failing
#[derive(Default)]
pub struct RecordingFleetClient {
    reports: Mutex<Vec<TelemetryReport>>,
    started: Mutex<usize>,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingFleetClient {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each push takes `delay` before the report is recorded
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<TelemetryReport> {
        self.reports.lock().clone()
    }

    pub fn started(&self) -> usize {
        *self.started.lock()
    }
}

#[async_trait]
impl FleetClient for RecordingFleetClient {
    async fn push_status(&self, report: &TelemetryReport) -> Result<(), FleetError> {
        *self.started.lock() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reports.lock().push(report.clone());
        if self.fail {
            return Err(FleetError::Status(503));
        }
        Ok(())
    }
}
