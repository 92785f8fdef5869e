// Domain layer - Plain data describing the robot and the wire messages
pub mod command;
pub mod messages;
pub mod robot_event;
pub mod robot_status;
