// Status service - Gateway-wide read model built from the snapshot and the hub
use crate::application::connection_hub::ConnectionHub;
use crate::application::event_aggregator::EventAggregator;
use crate::domain::messages::{epoch_millis, GatewayStatus};
use std::sync::Arc;

#[derive(Clone)]
pub struct StatusService {
    aggregator: EventAggregator,
    hub: Arc<ConnectionHub>,
}

impl StatusService {
    pub fn new(aggregator: EventAggregator, hub: Arc<ConnectionHub>) -> Self {
        Self { aggregator, hub }
    }

    pub fn current_status(&self) -> GatewayStatus {
        let snapshot = self.aggregator.current_status();
        GatewayStatus {
            status: snapshot.status,
            serial_number: snapshot.serial_number,
            battery: snapshot.battery,
            charging: snapshot.charging,
            location: snapshot.location,
            ready: snapshot.ready,
            locations: self.aggregator.known_locations(),
            websocket_port: self.hub.port(),
            connections: self.hub.connection_count(),
            timestamp: epoch_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::event_aggregator::AggregatorSettings;
    use crate::application::test_support::FakeController;
    use crate::domain::robot_event::RobotEvent;
    use crate::domain::robot_status::RobotState;

    #[tokio::test]
    async fn test_status_combines_snapshot_and_connections() {
        let hub = Arc::new(ConnectionHub::new(9001, "hi"));
        let controller = Arc::new(FakeController::with_locations(&["kitchen", "lobby"]));
        let aggregator = EventAggregator::new(controller, hub.clone(), AggregatorSettings::default());
        let _a = hub.accept();
        let _b = hub.accept();

        aggregator.handle_event(RobotEvent::ReadinessChanged(true)).await;
        let status = StatusService::new(aggregator.clone(), hub).current_status();

        assert_eq!(status.status, RobotState::Idle);
        assert_eq!(status.serial_number, "FAKE-0001");
        assert_eq!(status.locations, vec!["kitchen".to_string(), "lobby".to_string()]);
        assert_eq!(status.websocket_port, 9001);
        assert_eq!(status.connections, 2);

        aggregator.teardown();
    }
}
