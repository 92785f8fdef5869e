// Presentation layer - HTTP routes and WebSocket sessions
pub mod app_state;
pub mod handlers;
pub mod session;
