// Command router - Translates one client command into one aggregator call
use crate::application::broadcast::{broadcast_json, Broadcast};
use crate::application::connection_hub::CommandHandler;
use crate::application::event_aggregator::EventAggregator;
use crate::application::status_service::StatusService;
use crate::domain::command::{Command, CommandResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandRouter {
    aggregator: EventAggregator,
    status: StatusService,
    sink: Arc<dyn Broadcast>,
}

impl CommandRouter {
    pub fn new(aggregator: EventAggregator, status: StatusService, sink: Arc<dyn Broadcast>) -> Self {
        Self {
            aggregator,
            status,
            sink,
        }
    }

    pub async fn dispatch(&self, command: &Command) -> CommandResult {
        tracing::info!("Command received: {}", command.name);

        match command.name.as_str() {
            "goto" => {
                let Some(location) = command.str_param("location") else {
                    return CommandResult::missing_param("location");
                };
                let success = self.aggregator.go_to_location(location).await;
                let message = if success {
                    "Navigation started"
                } else {
                    "Failed to start navigation"
                };
                CommandResult::payload(json!({
                    "command": "goto",
                    "success": success,
                    "location": location,
                    "message": message,
                }))
            }
            "stop" => {
                let success = self.aggregator.stop_movement().await;
                CommandResult::payload(json!({
                    "command": "stop",
                    "success": success,
                    "message": "Movement stopped",
                }))
            }
            "get_locations" => {
                let locations = self.aggregator.get_locations().await;
                CommandResult::payload(json!({
                    "command": "get_locations",
                    "locations": locations,
                }))
            }
            "save_location" => {
                let Some(name) = command.str_param("name") else {
                    return CommandResult::missing_param("name");
                };
                let success = self.aggregator.save_location(name).await;
                CommandResult::payload(json!({
                    "command": "save_location",
                    "success": success,
                    "name": name,
                }))
            }
            "delete_location" => {
                let Some(name) = command.str_param("name") else {
                    return CommandResult::missing_param("name");
                };
                let success = self.aggregator.delete_location(name).await;
                CommandResult::payload(json!({
                    "command": "delete_location",
                    "success": success,
                    "name": name,
                }))
            }
            "speak" => {
                let Some(text) = command.str_param("text") else {
                    return CommandResult::missing_param("text");
                };
                self.aggregator.speak(text).await;
                CommandResult::payload(json!({
                    "command": "speak",
                    "success": true,
                    "text": text,
                }))
            }
            "tilt" => {
                let Some(degrees) = command.int_param("degrees") else {
                    return CommandResult::missing_param("degrees");
                };
                self.aggregator.tilt_angle(degrees).await;
                CommandResult::payload(json!({
                    "command": "tilt",
                    "success": true,
                    "degrees": degrees,
                }))
            }
            "turn" => {
                let Some(degrees) = command.int_param("degrees") else {
                    return CommandResult::missing_param("degrees");
                };
                self.aggregator.turn_by(degrees).await;
                CommandResult::payload(json!({
                    "command": "turn",
                    "success": true,
                    "degrees": degrees,
                }))
            }
            "get_status" => match serde_json::to_value(self.status.current_status()) {
                Ok(value) => CommandResult::payload(value),
                Err(e) => CommandResult::Failure {
                    error: format!("Failed to read status: {}", e),
                },
            },
            other => CommandResult::unknown_command(other),
        }
    }
}

#[async_trait]
impl CommandHandler for CommandRouter {
    async fn handle(&self, command: Command) {
        let result = self.dispatch(&command).await;
        broadcast_json(self.sink.as_ref(), &result);
    }
}
