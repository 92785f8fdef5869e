// Application layer - Gateway components and the traits at their seams
pub mod broadcast;
pub mod command_router;
pub mod connection_hub;
pub mod event_aggregator;
pub mod fleet_client;
pub mod robot_controller;
pub mod status_service;
pub mod telemetry_reporter;

#[cfg(test)]
pub mod test_support;
