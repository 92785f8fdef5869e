use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::application::event_aggregator::AggregatorSettings;
use crate::application::telemetry_reporter::ReporterSettings;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub fleet: FleetSettings,
    pub robot: RobotSettings,
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub service_name: String,
    pub welcome_message: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            service_name: "Robot Gateway".to_string(),
            welcome_message: "Connected to Robot Gateway".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FleetSettings {
    pub base_url: String,
    pub device_kind: String,
    /// `${kind}` is replaced by the device-kind tag
    pub status_path: String,
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            device_kind: "temi".to_string(),
            status_path: "/api/v1/robot/${kind}/status/update".to_string(),
            initial_delay_secs: 5,
            interval_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl FleetSettings {
    pub fn status_url(&self) -> String {
        let mut vars = HashMap::new();
        vars.insert("kind".to_string(), self.device_kind.clone());
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            prepare_path(&self.status_path, &vars)
        )
    }

    pub fn reporter_settings(&self) -> ReporterSettings {
        ReporterSettings {
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            interval: Duration::from_secs(self.interval_secs),
            device_kind: self.device_kind.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RobotSettings {
    pub battery_poll_secs: u64,
    pub position_throttle_ms: u64,
    pub tilt_min: i32,
    pub tilt_max: i32,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            battery_poll_secs: 10,
            position_throttle_ms: 5000,
            tilt_min: -25,
            tilt_max: 55,
        }
    }
}

impl RobotSettings {
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            battery_poll_interval: Duration::from_secs(self.battery_poll_secs),
            position_throttle: Duration::from_millis(self.position_throttle_ms),
            tilt_min: self.tilt_min,
            tilt_max: self.tilt_max,
        }
    }
}

/// In-process robot used when no hardware bridge is linked
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulatorSettings {
    pub serial_number: String,
    /// When false the robot refuses subscription, as an unreachable robot would
    pub available: bool,
    pub locations: Vec<String>,
    pub ready_delay_ms: u64,
    pub travel_step_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            serial_number: "SIM-00000001".to_string(),
            available: true,
            locations: vec!["home base".to_string(), "kitchen".to_string(), "lobby".to_string()],
            ready_delay_ms: 500,
            travel_step_ms: 1500,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.robot.tilt_min > self.robot.tilt_max {
            anyhow::bail!(
                "robot.tilt_min ({}) must not exceed robot.tilt_max ({})",
                self.robot.tilt_min,
                self.robot.tilt_max
            );
        }
        if self.robot.battery_poll_secs == 0 || self.fleet.interval_secs == 0 {
            anyhow::bail!("poll and report intervals must be greater than zero");
        }
        if !self.fleet.base_url.starts_with("http://") && !self.fleet.base_url.starts_with("https://") {
            anyhow::bail!("fleet.base_url must be an http(s) URL, got {}", self.fleet.base_url);
        }
        Ok(())
    }
}

/// Defaults, then `config/gateway.{toml,yaml,json}` if present, then
/// `GATEWAY__SECTION__KEY` environment variables.
pub fn load_gateway_config() -> anyhow::Result<GatewayConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/gateway").required(false))
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
    build_config(builder)
}

fn build_config(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<GatewayConfig> {
    let settings: GatewayConfig = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

/// Replace `${name}` placeholders in a path template
pub fn prepare_path(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
