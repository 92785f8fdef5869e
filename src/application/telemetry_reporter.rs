// Telemetry reporter - Best-effort periodic status push to the fleet endpoint
use crate::application::fleet_client::FleetClient;
use crate::application::status_service::StatusService;
use crate::domain::messages::TelemetryReport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, Clone)]
pub struct ReporterSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub device_kind: String,
}

pub struct TelemetryReporter {
    client: Arc<dyn FleetClient>,
    status: StatusService,
    settings: ReporterSettings,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryReporter {
    pub fn new(client: Arc<dyn FleetClient>, status: StatusService, settings: ReporterSettings) -> Self {
        Self {
            client,
            status,
            settings,
            task: Mutex::new(None),
        }
    }

    /// Wait the initial delay, then push every interval until stopped.
    /// Pushes still in flight are cancelled together with the schedule.
    pub fn start(&self) {
        let client = self.client.clone();
        let status = self.status.clone();
        let settings = self.settings.clone();

        let handle = tokio::spawn(async move {
            let first = tokio::time::Instant::now() + settings.initial_delay;
            let mut ticker = tokio::time::interval_at(first, settings.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Dropping the set aborts every push it still holds
            let mut pushes = JoinSet::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = build_report(&status, &settings.device_kind);
                        // Each push runs on its own so a slow endpoint never delays the schedule
                        pushes.spawn(push(client.clone(), report));
                    }
                    Some(_) = pushes.join_next() => {}
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        tracing::info!(
            "Telemetry reporting every {:?} after {:?}",
            self.settings.interval,
            self.settings.initial_delay
        );
    }

    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            tracing::info!("Telemetry reporting stopped");
        }
    }
}

pub fn build_report(status: &StatusService, device_kind: &str) -> TelemetryReport {
    let current = status.current_status();
    TelemetryReport {
        sn: current.serial_number.clone(),
        status: current,
        kind: device_kind.to_string(),
    }
}

async fn push(client: Arc<dyn FleetClient>, report: TelemetryReport) {
    match client.push_status(&report).await {
        Ok(()) => tracing::debug!("Status reported to fleet for {}", report.sn),
        Err(e) => tracing::warn!("Failed to report to fleet: {}", e),
    }
}
