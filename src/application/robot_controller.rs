// Capability contract for the hardware controller
use crate::domain::robot_event::RobotEvent;
use crate::domain::robot_status::BatteryReading;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("robot controller unavailable: {0}")]
    Unavailable(String),
    #[error("robot rejected {operation}: {reason}")]
    Rejected { operation: &'static str, reason: String },
}

/// Everything the gateway needs from the robot. Implementations deliver
/// events on their own execution context; arrival order is theirs.
#[async_trait]
pub trait RobotController: Send + Sync {
    /// Start receiving events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Result<broadcast::Receiver<RobotEvent>, ControllerError>;

    /// Start navigating to a saved location; completion arrives as events
    async fn go_to(&self, location: &str) -> Result<(), ControllerError>;

    async fn stop_movement(&self) -> Result<(), ControllerError>;

    async fn list_locations(&self) -> Result<Vec<String>, ControllerError>;

    async fn save_location(&self, name: &str) -> Result<bool, ControllerError>;

    async fn delete_location(&self, name: &str) -> Result<bool, ControllerError>;

    async fn speak(&self, text: &str, show_caption: bool) -> Result<(), ControllerError>;

    /// Degrees are already clamped by the caller
    async fn tilt_head(&self, degrees: i32) -> Result<(), ControllerError>;

    async fn turn_by(&self, degrees: i32) -> Result<(), ControllerError>;

    async fn serial_number(&self) -> Result<String, ControllerError>;

    async fn poll_battery(&self) -> Result<BatteryReading, ControllerError>;
}
