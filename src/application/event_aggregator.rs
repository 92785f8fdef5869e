// Event aggregator - Owns the robot snapshot and is the only caller into the controller
use crate::application::broadcast::{broadcast_json, Broadcast};
use crate::application::robot_controller::RobotController;
use crate::domain::messages::ServerMessage;
use crate::domain::robot_event::{NavigationEvent, NavigationPhase, PositionSample, PositionThrottle, RobotEvent};
use crate::domain::robot_status::{RobotState, RobotStatus, UNKNOWN_SERIAL};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub battery_poll_interval: Duration,
    pub position_throttle: Duration,
    pub tilt_min: i32,
    pub tilt_max: i32,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            battery_poll_interval: Duration::from_secs(10),
            position_throttle: Duration::from_secs(5),
            tilt_min: -25,
            tilt_max: 55,
        }
    }
}

#[derive(Clone)]
pub struct EventAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    controller: Arc<dyn RobotController>,
    sink: Arc<dyn Broadcast>,
    settings: AggregatorSettings,
    status: Mutex<RobotStatus>,
    known_locations: Mutex<Vec<String>>,
    throttle: Mutex<PositionThrottle>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    battery_task: Mutex<Option<JoinHandle<()>>>,
}

impl EventAggregator {
    pub fn new(
        controller: Arc<dyn RobotController>,
        sink: Arc<dyn Broadcast>,
        settings: AggregatorSettings,
    ) -> Self {
        let throttle = PositionThrottle::new(settings.position_throttle);
        Self {
            inner: Arc::new(Inner {
                controller,
                sink,
                settings,
                status: Mutex::new(RobotStatus::default()),
                known_locations: Mutex::new(Vec::new()),
                throttle: Mutex::new(throttle),
                event_task: Mutex::new(None),
                battery_task: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to controller events. A failed subscription leaves the
    /// snapshot in `error` until restart; the gateway keeps serving.
    pub fn start(&self) {
        match self.inner.controller.subscribe() {
            Ok(mut events) => {
                let aggregator = self.clone();
                let handle = tokio::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(event) => aggregator.handle_event(event).await,
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!("Robot event stream lagged, skipped {} events", skipped);
                            }
                            Err(RecvError::Closed) => {
                                tracing::info!("Robot event stream closed");
                                break;
                            }
                        }
                    }
                });
                if let Some(previous) = self.inner.event_task.lock().replace(handle) {
                    previous.abort();
                }
                tracing::info!("Subscribed to robot events");
            }
            Err(e) => {
                tracing::error!("Failed to initialize robot controller: {}", e);
                self.inner.mutate(|status| status.status = RobotState::Error);
                self.inner.send_status_update(Map::new());
            }
        }
    }

    /// Apply one controller event. The subscription pump calls this for
    /// every event in arrival order.
    pub async fn handle_event(&self, event: RobotEvent) {
        self.inner.handle_event(event).await;
    }

    pub async fn go_to_location(&self, name: &str) -> bool {
        if !self.inner.is_ready() {
            tracing::warn!("Robot not ready, ignoring goto {}", name);
            return false;
        }

        let locations = match self.inner.controller.list_locations().await {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!("Could not read locations: {}", e);
                return false;
            }
        };
        let known = locations.iter().any(|l| l == name);
        *self.inner.known_locations.lock() = locations;

        if !known {
            tracing::warn!("Location '{}' not found", name);
            return false;
        }

        match self.inner.controller.go_to(name).await {
            Ok(()) => {
                tracing::info!("Going to location: {}", name);
                true
            }
            Err(e) => {
                tracing::warn!("Navigation to {} rejected: {}", name, e);
                false
            }
        }
    }

    pub async fn stop_movement(&self) -> bool {
        if !self.inner.is_ready() {
            return false;
        }

        if let Err(e) = self.inner.controller.stop_movement().await {
            tracing::warn!("Stop rejected: {}", e);
            return false;
        }

        tracing::info!("Movement stopped");
        self.inner.mutate(|status| status.status = RobotState::Idle);
        self.inner.send_status_update(Map::new());
        true
    }

    pub async fn get_locations(&self) -> Vec<String> {
        if !self.inner.is_ready() {
            return Vec::new();
        }

        match self.inner.controller.list_locations().await {
            Ok(locations) => {
                *self.inner.known_locations.lock() = locations.clone();
                locations
            }
            Err(e) => {
                tracing::warn!("Could not read locations: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn save_location(&self, name: &str) -> bool {
        if !self.inner.is_ready() {
            return false;
        }

        match self.inner.controller.save_location(name).await {
            Ok(saved) => {
                tracing::info!("Save location {}: {}", name, saved);
                saved
            }
            Err(e) => {
                tracing::warn!("Failed to save location {}: {}", name, e);
                false
            }
        }
    }

    pub async fn delete_location(&self, name: &str) -> bool {
        if !self.inner.is_ready() {
            return false;
        }

        match self.inner.controller.delete_location(name).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!("Failed to delete location {}: {}", name, e);
                false
            }
        }
    }

    /// Returns whether the request was handed to the robot
    pub async fn speak(&self, text: &str) -> bool {
        if !self.inner.is_ready() {
            return false;
        }
        if let Err(e) = self.inner.controller.speak(text, true).await {
            tracing::warn!("Speak failed: {}", e);
        }
        true
    }

    pub async fn tilt_angle(&self, degrees: i64) -> bool {
        if !self.inner.is_ready() {
            return false;
        }
        let clamped = self.clamp_tilt(degrees);
        if let Err(e) = self.inner.controller.tilt_head(clamped).await {
            tracing::warn!("Tilt failed: {}", e);
        }
        true
    }

    pub async fn turn_by(&self, degrees: i64) -> bool {
        if !self.inner.is_ready() {
            return false;
        }
        let degrees = degrees.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        if let Err(e) = self.inner.controller.turn_by(degrees).await {
            tracing::warn!("Turn failed: {}", e);
        }
        true
    }

    pub fn clamp_tilt(&self, degrees: i64) -> i32 {
        let settings = &self.inner.settings;
        degrees.clamp(settings.tilt_min as i64, settings.tilt_max as i64) as i32
    }

    pub fn current_status(&self) -> RobotStatus {
        self.inner.status.lock().clone()
    }

    pub fn known_locations(&self) -> Vec<String> {
        self.inner.known_locations.lock().clone()
    }

    /// Drop the event subscription and cancel battery polling. Safe to call
    /// more than once, and after a failed start.
    pub fn teardown(&self) {
        if let Some(handle) = self.inner.event_task.lock().take() {
            handle.abort();
            tracing::info!("Unsubscribed from robot events");
        }
        self.inner.stop_battery_polling();
    }
}

impl Inner {
    fn is_ready(&self) -> bool {
        self.status.lock().ready
    }

    fn mutate(&self, apply: impl FnOnce(&mut RobotStatus)) {
        let mut status = self.status.lock();
        apply(&mut status);
        status.touch();
    }

    fn send_status_update(&self, extra: Map<String, Value>) {
        let data = self.status.lock().to_update_data(extra);
        broadcast_json(self.sink.as_ref(), &ServerMessage::status_update(data));
    }

    async fn handle_event(self: &Arc<Self>, event: RobotEvent) {
        match event {
            RobotEvent::ReadinessChanged(ready) => self.on_readiness_changed(ready).await,
            RobotEvent::NavigationStatusChanged(nav) => self.on_navigation_status(nav),
            RobotEvent::LocationsUpdated(locations) => self.on_locations_updated(locations),
            RobotEvent::PositionChanged(sample) => self.on_position_changed(sample),
        }
    }

    async fn on_readiness_changed(self: &Arc<Self>, ready: bool) {
        tracing::info!("Robot ready: {}", ready);

        if !ready {
            self.stop_battery_polling();
            self.mutate(|status| {
                status.ready = false;
                status.status = RobotState::NotReady;
            });
            self.send_status_update(Map::new());
            return;
        }

        let serial = match self.controller.serial_number().await {
            Ok(serial) => serial,
            Err(e) => {
                tracing::warn!("Could not read serial number: {}", e);
                UNKNOWN_SERIAL.to_string()
            }
        };
        let battery = self.controller.poll_battery().await;
        match self.controller.list_locations().await {
            Ok(locations) => *self.known_locations.lock() = locations,
            Err(e) => tracing::warn!("Could not read locations: {}", e),
        }

        tracing::info!("Robot SN: {}", serial);
        self.mutate(|status| {
            status.ready = true;
            status.status = RobotState::Idle;
            status.serial_number = serial;
            match battery {
                Ok(reading) => status.apply_battery(reading),
                Err(e) => tracing::warn!("Could not read battery: {}", e),
            }
        });

        self.start_battery_polling();
        self.send_status_update(Map::new());
    }

    fn on_navigation_status(&self, nav: NavigationEvent) {
        tracing::info!("GoTo status: {} -> {} ({})", nav.location, nav.phase.as_str(), nav.description);

        self.mutate(|status| match nav.phase {
            NavigationPhase::Start => {
                status.status = RobotState::Moving;
                status.location = format!("traveling_to_{}", nav.location);
            }
            NavigationPhase::Going => status.status = RobotState::Moving,
            NavigationPhase::Complete => {
                status.status = RobotState::Idle;
                status.location = nav.location.clone();
            }
            NavigationPhase::Abort => {
                tracing::warn!("Navigation aborted: {}", nav.description);
                status.status = RobotState::Idle;
            }
            NavigationPhase::Calculating => status.status = RobotState::CalculatingPath,
        });

        self.send_status_update(extra(json!({
            "event": "navigation_status",
            "destination": nav.location,
            "phase": nav.phase,
            "description": nav.description,
        })));
    }

    fn on_locations_updated(&self, locations: Vec<String>) {
        tracing::info!("Locations updated: {:?}", locations);
        *self.known_locations.lock() = locations.clone();
        self.send_status_update(extra(json!({
            "event": "locations_updated",
            "locations": locations,
        })));
    }

    fn on_position_changed(&self, sample: PositionSample) {
        let now = tokio::time::Instant::now().into_std();
        if !self.throttle.lock().admit(now) {
            return;
        }
        self.send_status_update(extra(json!({
            "event": "position_update",
            "x": sample.x,
            "y": sample.y,
            "yaw": sample.yaw,
            "tilt": sample.tilt,
            "sampled_at": sample.timestamp,
        })));
    }

    /// (Re)start the poll; a running poll is cancelled first
    fn start_battery_polling(self: &Arc<Self>) {
        let period = self.settings.battery_poll_interval;
        let inner = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.refresh_battery().await;
            }
        });

        if let Some(previous) = self.battery_task.lock().replace(handle) {
            previous.abort();
        }
        tracing::info!("Battery monitoring started");
    }

    fn stop_battery_polling(&self) {
        if let Some(handle) = self.battery_task.lock().take() {
            handle.abort();
            tracing::info!("Battery monitoring stopped");
        }
    }

    async fn refresh_battery(&self) {
        match self.controller.poll_battery().await {
            Ok(reading) => {
                self.mutate(|status| status.apply_battery(reading));
                self.send_status_update(Map::new());
            }
            Err(e) => tracing::warn!("Battery poll failed: {}", e),
        }
    }
}

fn extra(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{Call, FakeController, RecordingBroadcast};
    use crate::domain::robot_status::BatteryReading;

    fn aggregator(controller: &Arc<FakeController>, sink: &Arc<RecordingBroadcast>) -> EventAggregator {
        EventAggregator::new(controller.clone(), sink.clone(), AggregatorSettings::default())
    }

    async fn ready_aggregator() -> (EventAggregator, Arc<FakeController>, Arc<RecordingBroadcast>) {
        let controller = Arc::new(FakeController::with_locations(&["kitchen", "lobby"]));
        let sink = Arc::new(RecordingBroadcast::default());
        let aggregator = aggregator(&controller, &sink);
        aggregator.handle_event(RobotEvent::ReadinessChanged(true)).await;
        sink.clear();
        (aggregator, controller, sink)
    }

    #[tokio::test]
    async fn test_readiness_moves_to_idle_and_refreshes() {
        let controller = Arc::new(FakeController::with_locations(&["kitchen"]));
        controller.set_battery(BatteryReading::new(77, true));
        let sink = Arc::new(RecordingBroadcast::default());
        let aggregator = aggregator(&controller, &sink);

        aggregator.handle_event(RobotEvent::ReadinessChanged(true)).await;

        let status = aggregator.current_status();
        assert!(status.ready);
        assert_eq!(status.status, RobotState::Idle);
        assert_eq!(status.battery, 77);
        assert!(status.charging);
        assert_eq!(status.serial_number, "FAKE-0001");
        assert_eq!(aggregator.known_locations(), vec!["kitchen".to_string()]);

        let updates = sink.messages();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["type"], "status_update");
        assert_eq!(updates[0]["data"]["status"], "idle");

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_not_ready_fails_closed() {
        let controller = Arc::new(FakeController::with_locations(&["kitchen"]));
        let sink = Arc::new(RecordingBroadcast::default());
        let aggregator = aggregator(&controller, &sink);

        assert!(!aggregator.go_to_location("kitchen").await);
        assert!(!aggregator.stop_movement().await);
        assert!(aggregator.get_locations().await.is_empty());
        assert!(!aggregator.save_location("dock").await);
        assert!(!aggregator.delete_location("dock").await);
        assert!(!aggregator.tilt_angle(10).await);
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_goto_unknown_location_keeps_status() {
        let (aggregator, controller, _sink) = ready_aggregator().await;

        assert!(!aggregator.go_to_location("garage").await);
        assert_eq!(aggregator.current_status().status, RobotState::Idle);
        assert!(!controller.calls().contains(&Call::GoTo("garage".to_string())));

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_goto_then_complete_event() {
        let (aggregator, controller, sink) = ready_aggregator().await;

        assert!(aggregator.go_to_location("kitchen").await);
        assert!(controller.calls().contains(&Call::GoTo("kitchen".to_string())));

        aggregator
            .handle_event(RobotEvent::NavigationStatusChanged(NavigationEvent::new(
                "kitchen",
                NavigationPhase::Start,
                "",
            )))
            .await;
        let status = aggregator.current_status();
        assert_eq!(status.status, RobotState::Moving);
        assert_eq!(status.location, "traveling_to_kitchen");

        aggregator
            .handle_event(RobotEvent::NavigationStatusChanged(NavigationEvent::new(
                "kitchen",
                NavigationPhase::Complete,
                "arrived",
            )))
            .await;
        let status = aggregator.current_status();
        assert_eq!(status.status, RobotState::Idle);
        assert_eq!(status.location, "kitchen");

        let last = sink.messages().pop().unwrap();
        assert_eq!(last["data"]["event"], "navigation_status");
        assert_eq!(last["data"]["phase"], "complete");
        assert_eq!(last["data"]["destination"], "kitchen");
        assert_eq!(last["data"]["status"], "idle");

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_navigation_phases() {
        let (aggregator, _controller, _sink) = ready_aggregator().await;
        let nav = |phase| RobotEvent::NavigationStatusChanged(NavigationEvent::new("lobby", phase, ""));

        aggregator.handle_event(nav(NavigationPhase::Calculating)).await;
        assert_eq!(aggregator.current_status().status, RobotState::CalculatingPath);

        aggregator.handle_event(nav(NavigationPhase::Going)).await;
        assert_eq!(aggregator.current_status().status, RobotState::Moving);

        aggregator.handle_event(nav(NavigationPhase::Abort)).await;
        assert_eq!(aggregator.current_status().status, RobotState::Idle);

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_stop_sets_idle() {
        let (aggregator, controller, sink) = ready_aggregator().await;
        aggregator
            .handle_event(RobotEvent::NavigationStatusChanged(NavigationEvent::new(
                "lobby",
                NavigationPhase::Going,
                "",
            )))
            .await;

        assert!(aggregator.stop_movement().await);
        assert_eq!(aggregator.current_status().status, RobotState::Idle);
        assert!(controller.calls().contains(&Call::Stop));
        assert_eq!(sink.messages().pop().unwrap()["data"]["status"], "idle");

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_tilt_is_clamped() {
        let (aggregator, controller, _sink) = ready_aggregator().await;

        assert!(aggregator.tilt_angle(90).await);
        assert!(aggregator.tilt_angle(-40).await);
        assert!(aggregator.tilt_angle(12).await);

        let tilts: Vec<_> = controller
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Tilt(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(tilts, vec![55, -25, 12]);

        aggregator.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_updates_are_throttled() {
        let (aggregator, _controller, sink) = ready_aggregator().await;
        let sample = PositionSample {
            x: 1.0,
            y: 2.0,
            yaw: 0.5,
            tilt: 0.0,
            timestamp: 0,
        };

        aggregator.handle_event(RobotEvent::PositionChanged(sample)).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        aggregator.handle_event(RobotEvent::PositionChanged(sample)).await;
        assert_eq!(sink.count_events("position_update"), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        aggregator.handle_event(RobotEvent::PositionChanged(sample)).await;
        assert_eq!(sink.count_events("position_update"), 2);

        aggregator.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_polling_runs_while_ready() {
        let (aggregator, controller, sink) = ready_aggregator().await;
        controller.set_battery(BatteryReading::new(42, false));

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(aggregator.current_status().battery, 42);
        let polls_while_ready = controller.battery_polls();
        // one on readiness, two ticks
        assert_eq!(polls_while_ready, 3);
        assert!(!sink.messages().is_empty());

        aggregator.handle_event(RobotEvent::ReadinessChanged(false)).await;
        assert_eq!(aggregator.current_status().status, RobotState::NotReady);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(controller.battery_polls(), polls_while_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_readiness_keeps_one_poll() {
        let (aggregator, controller, _sink) = ready_aggregator().await;
        aggregator.handle_event(RobotEvent::ReadinessChanged(true)).await;
        let before = controller.battery_polls();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(controller.battery_polls(), before + 1);

        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_subscription_failure_sets_error() {
        let controller = Arc::new(FakeController::failing_subscription());
        let sink = Arc::new(RecordingBroadcast::default());
        let aggregator = aggregator(&controller, &sink);

        aggregator.start();

        assert_eq!(aggregator.current_status().status, RobotState::Error);
        assert_eq!(sink.messages()[0]["data"]["status"], "error");
        aggregator.teardown();
        aggregator.teardown();
    }

    #[tokio::test]
    async fn test_subscribed_events_reach_snapshot() {
        let controller = Arc::new(FakeController::with_locations(&["kitchen"]));
        let sink = Arc::new(RecordingBroadcast::default());
        let aggregator = aggregator(&controller, &sink);
        aggregator.start();

        controller.emit(RobotEvent::ReadinessChanged(true));
        controller.emit(RobotEvent::LocationsUpdated(vec!["kitchen".into(), "dock".into()]));
        sink.wait_for(2).await;

        assert!(aggregator.current_status().ready);
        assert_eq!(aggregator.known_locations(), vec!["kitchen".to_string(), "dock".to_string()]);
        assert_eq!(sink.count_events("locations_updated"), 1);

        aggregator.teardown();
    }
}
