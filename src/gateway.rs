// Gateway orchestrator - Starts the components in dependency order and tears them down in reverse
use crate::application::command_router::CommandRouter;
use crate::application::connection_hub::ConnectionHub;
use crate::application::event_aggregator::EventAggregator;
use crate::application::fleet_client::FleetClient;
use crate::application::robot_controller::RobotController;
use crate::application::status_service::StatusService;
use crate::application::telemetry_reporter::TelemetryReporter;
use crate::infrastructure::config::GatewayConfig;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::build_router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

struct ServerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Gateway {
    local_addr: SocketAddr,
    hub: Arc<ConnectionHub>,
    aggregator: Option<EventAggregator>,
    reporter: Option<TelemetryReporter>,
    server: Option<ServerHandle>,
}

impl Gateway {
    pub async fn start(
        config: &GatewayConfig,
        controller: Arc<dyn RobotController>,
        fleet: Arc<dyn FleetClient>,
    ) -> Result<Self, GatewayError> {
        let port = config.server.port;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { port, source })?;

        let hub = Arc::new(ConnectionHub::new(
            local_addr.port(),
            config.server.welcome_message.clone(),
        ));

        let aggregator = EventAggregator::new(controller, hub.clone(), config.robot.aggregator_settings());
        aggregator.start();

        let status = StatusService::new(aggregator.clone(), hub.clone());
        let router = CommandRouter::new(aggregator.clone(), status.clone(), hub.clone());
        let state = Arc::new(AppState {
            hub: hub.clone(),
            router,
            service_name: config.server.service_name.clone(),
        });

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = build_router(state);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        });
        tracing::info!("WebSocket server started on {}", local_addr);

        let reporter = TelemetryReporter::new(fleet, status, config.fleet.reporter_settings());
        reporter.start();

        Ok(Self {
            local_addr,
            hub,
            aggregator: Some(aggregator),
            reporter: Some(reporter),
            server: Some(ServerHandle { shutdown, task }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn aggregator(&self) -> Option<&EventAggregator> {
        self.aggregator.as_ref()
    }

    /// Reverse of start: reporter, hub and listener, then the robot side.
    /// Calling it again is a no-op.
    pub async fn shutdown(&mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.stop();
        }

        self.hub.close_all();
        if let Some(server) = self.server.take() {
            let _ = server.shutdown.send(());
            let mut task = server.task;
            if tokio::time::timeout(SERVER_STOP_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Server did not stop in time, aborting");
                task.abort();
            }
        }

        if let Some(aggregator) = self.aggregator.take() {
            aggregator.teardown();
        }
        tracing::info!("Gateway stopped");
    }
}
