mod calibration;
mod clock;
mod config;
mod error;
mod node;
mod publish;
mod sensors;
mod status;
mod store;
mod transport;

use anyhow::{Context, Result};
use calibration::{BootstrapSettings, CalibrationLifecycle};
use clock::Clock;
use config::{NodeConfig, RestartMode};
use node::{local_ip_address, Node, NodeParts, NodeSettings, RunExit};
use sensors::simulated_suite;
use status::{LogIndicator, Status, StatusIndicator};
use std::time::Duration;
use store::AqiLog;
use transport::MqttTransport;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// EX_TEMPFAIL, so a supervisor knows to start us again
const RESTART_EXIT_CODE: i32 = 75;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = NodeConfig::load()?;

    info!("[NODE] {} starting", config.device.plant_name);
    info!("  Broker: {}:{}", config.mqtt.host, config.mqtt.port);
    info!("  Telemetry topic: {}", config.telemetry_topic());
    info!("  AQI topic: {}", config.aqi_topic());

    loop {
        match boot_and_run(&config).await {
            Ok(RunExit::Restart { failures }) => {
                warn!("[NODE] Restart after {} consecutive publish failures", failures);
            }
            Err(e) => {
                error!("[NODE] Startup failed: {:#}", e);
                tokio::time::sleep(Duration::from_secs(config.resilience.restart_cooldown_secs)).await;
            }
        }

        if let Some(code) = exit_code(config.resilience.restart_mode) {
            info!("[NODE] Exiting with status {} for supervisor restart", code);
            std::process::exit(code);
        }
        info!("[NODE] Restarting");
    }
}

/// Build every runtime object from scratch and run until a restart is due
async fn boot_and_run(config: &NodeConfig) -> Result<RunExit> {
    let mut indicator: Box<dyn StatusIndicator> = Box::new(LogIndicator::new());
    indicator.set(Status::Idle);

    let clock = clock::synchronise(&config.time_sync, indicator.as_mut())
        .await
        .context("synchronising clock")?;

    let mut sensors = simulated_suite();
    let mut transport = MqttTransport::new(config.mqtt.clone());

    let calibration = CalibrationLifecycle::initialize(
        &BootstrapSettings::from_config(config),
        clock.now(),
        &mut transport,
        &mut sensors,
        indicator.as_mut(),
    )
    .await;

    let ip_address = config
        .device
        .ip_address
        .clone()
        .or_else(|| local_ip_address(&config.mqtt.host, config.mqtt.port))
        .unwrap_or_else(|| "unknown".into());

    let mut node = Node::new(
        NodeSettings::from_config(config),
        NodeParts {
            clock,
            sensors,
            transport,
            indicator,
            calibration,
            aqi_log: Some(AqiLog::new(&config.storage.aqi_log_path)),
            ip_address,
        },
    );

    let exit = node.run().await;
    let failures = node.scheduler().failures();
    info!(
        "[NODE] Stopping in {} state, {} telemetry / {} AQI failures outstanding, {} toward restart",
        node.calibration().state().label(),
        failures.telemetry,
        failures.aqi,
        node.restart_policy().consecutive_failures()
    );
    Ok(exit)
}

/// Process exit status for a restart, or `None` to restart in place
fn exit_code(mode: RestartMode) -> Option<i32> {
    match mode {
        RestartMode::InProcess => None,
        RestartMode::Exit => Some(RESTART_EXIT_CODE),
    }
}
