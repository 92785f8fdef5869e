// Simulated robot - In-process controller standing in for the hardware SDK
use crate::application::robot_controller::{ControllerError, RobotController};
use crate::domain::messages::epoch_millis;
use crate::domain::robot_event::{NavigationEvent, NavigationPhase, PositionSample, RobotEvent};
use crate::domain::robot_status::BatteryReading;
use crate::infrastructure::config::SimulatorSettings;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 256;

pub struct SimulatedRobot {
    state: Arc<SimState>,
}

struct SimState {
    events: broadcast::Sender<RobotEvent>,
    serial_number: String,
    available: bool,
    locations: Mutex<Vec<String>>,
    battery: Mutex<BatteryReading>,
    head_tilt: Mutex<i32>,
    heading: Mutex<f64>,
    trip: Mutex<Option<Trip>>,
    next_trip: AtomicU64,
    ready_delay: Duration,
    travel_step: Duration,
}

/// The trip currently driving the robot
struct Trip {
    id: u64,
    target: String,
    handle: JoinHandle<()>,
}

impl SimulatedRobot {
    pub fn new(settings: &SimulatorSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(SimState {
                events,
                serial_number: settings.serial_number.clone(),
                available: settings.available,
                locations: Mutex::new(settings.locations.clone()),
                battery: Mutex::new(BatteryReading::new(100, false)),
                head_tilt: Mutex::new(0),
                heading: Mutex::new(0.0),
                trip: Mutex::new(None),
                next_trip: AtomicU64::new(0),
                ready_delay: Duration::from_millis(settings.ready_delay_ms),
                travel_step: Duration::from_millis(settings.travel_step_ms),
            }),
        }
    }
}

impl SimState {
    fn emit(&self, event: RobotEvent) {
        // No subscribers is not an error for the robot
        let _ = self.events.send(event);
    }

    fn navigation(&self, location: &str, phase: NavigationPhase, description: &str) {
        self.emit(RobotEvent::NavigationStatusChanged(NavigationEvent::new(
            location,
            phase,
            description,
        )));
    }

    fn position(&self, x: f64, y: f64) {
        self.emit(RobotEvent::PositionChanged(PositionSample {
            x,
            y,
            yaw: *self.heading.lock(),
            tilt: *self.head_tilt.lock() as f64,
            timestamp: epoch_millis(),
        }));
    }

    /// Clear the current trip only if it is still the one that finished
    fn finish_trip(&self, id: u64) {
        let mut trip = self.trip.lock();
        if trip.as_ref().is_some_and(|t| t.id == id) {
            trip.take();
        }
    }

    fn locations_changed(&self) {
        let locations = self.locations.lock().clone();
        self.emit(RobotEvent::LocationsUpdated(locations));
    }
}

#[async_trait]
impl RobotController for SimulatedRobot {
    fn subscribe(&self) -> Result<broadcast::Receiver<RobotEvent>, ControllerError> {
        if !self.state.available {
            return Err(ControllerError::Unavailable(format!(
                "simulated robot {} is switched off",
                self.state.serial_number
            )));
        }

        let receiver = self.state.events.subscribe();
        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.ready_delay).await;
            state.emit(RobotEvent::ReadinessChanged(true));
        });
        Ok(receiver)
    }

    async fn go_to(&self, location: &str) -> Result<(), ControllerError> {
        if !self.state.locations.lock().iter().any(|l| l == location) {
            return Err(ControllerError::Rejected {
                operation: "goto",
                reason: format!("unknown location {}", location),
            });
        }

        let id = self.state.next_trip.fetch_add(1, Ordering::Relaxed);
        let state = self.state.clone();
        let target = location.to_string();
        let handle = tokio::spawn(async move {
            let step = state.travel_step;
            state.navigation(&target, NavigationPhase::Start, "");
            tokio::time::sleep(step).await;
            state.navigation(&target, NavigationPhase::Calculating, "");
            tokio::time::sleep(step).await;
            state.navigation(&target, NavigationPhase::Going, "");
            for i in 1..=3 {
                state.position(i as f64 * 0.5, i as f64 * 0.25);
                tokio::time::sleep(step).await;
            }
            state.navigation(&target, NavigationPhase::Complete, "");
            state.finish_trip(id);
        });

        let trip = Trip {
            id,
            target: location.to_string(),
            handle,
        };
        let previous = self.state.trip.lock().replace(trip);
        if let Some(previous) = previous {
            previous.handle.abort();
            self.state.navigation(&previous.target, NavigationPhase::Abort, "Superseded by new goal");
        }
        Ok(())
    }

    async fn stop_movement(&self) -> Result<(), ControllerError> {
        let trip = self.state.trip.lock().take();
        if let Some(trip) = trip {
            trip.handle.abort();
            self.state.navigation(&trip.target, NavigationPhase::Abort, "Stopped by user");
        }
        Ok(())
    }

    async fn list_locations(&self) -> Result<Vec<String>, ControllerError> {
        Ok(self.state.locations.lock().clone())
    }

    async fn save_location(&self, name: &str) -> Result<bool, ControllerError> {
        let saved = {
            let mut locations = self.state.locations.lock();
            if name.trim().is_empty() || locations.iter().any(|l| l == name) {
                false
            } else {
                locations.push(name.to_string());
                true
            }
        };
        if saved {
            self.state.locations_changed();
        }
        Ok(saved)
    }

    async fn delete_location(&self, name: &str) -> Result<bool, ControllerError> {
        let deleted = {
            let mut locations = self.state.locations.lock();
            let before = locations.len();
            locations.retain(|l| l != name);
            locations.len() != before
        };
        if deleted {
            self.state.locations_changed();
        }
        Ok(deleted)
    }

    async fn speak(&self, text: &str, show_caption: bool) -> Result<(), ControllerError> {
        tracing::info!("Robot says: {} (caption: {})", text, show_caption);
        Ok(())
    }

    async fn tilt_head(&self, degrees: i32) -> Result<(), ControllerError> {
        *self.state.head_tilt.lock() = degrees;
        Ok(())
    }

    async fn turn_by(&self, degrees: i32) -> Result<(), ControllerError> {
        let mut heading = self.state.heading.lock();
        *heading = (*heading + (degrees as f64).to_radians()).rem_euclid(std::f64::consts::TAU);
        Ok(())
    }

    async fn serial_number(&self) -> Result<String, ControllerError> {
        Ok(self.state.serial_number.clone())
    }

    /// Drains one percent per poll, charges back up below fifteen
    async fn poll_battery(&self) -> Result<BatteryReading, ControllerError> {
        let mut battery = self.state.battery.lock();
        let next = if battery.charging {
            let level = battery.level.saturating_add(2).min(100);
            BatteryReading::new(level, level < 100)
        } else {
            let level = battery.level.saturating_sub(1);
            BatteryReading::new(level, level <= 15)
        };
        *battery = next;
        Ok(next)
    }
}
