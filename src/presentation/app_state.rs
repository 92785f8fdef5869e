// Application state for HTTP handlers
use crate::application::command_router::CommandRouter;
use crate::application::connection_hub::ConnectionHub;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub router: CommandRouter,
    pub service_name: String,
}
