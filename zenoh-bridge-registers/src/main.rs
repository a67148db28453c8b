//! Zenoh bridge for polled field-bus registers.

use std::sync::Arc;

use anyhow::{Context, Result};
use regbridge_framework::{BridgeArgs, ZenohSink};
use tracing::info;
use zenoh_bridge_registers::modbus::ModbusSource;
use zenoh_bridge_registers::{Bridge, Catalog, RegisterBridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("registers.json5");

    let config = RegisterBridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Configuration error: failed to load {:?}", args.config))?;

    let mut log_config = config.logging.clone();
    if let Some(level) = &args.log_level {
        log_config.level = level.clone();
    }
    regbridge_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Loaded configuration from {:?}", args.config);

    if args.check {
        let catalog = Catalog::compile(&config.registers).context("Configuration error")?;
        info!(registers = catalog.len(), "Configuration is valid");
        return Ok(());
    }

    info!("Starting zenoh-bridge-registers");
    let sink = ZenohSink::connect(&config.zenoh_config())
        .await
        .context("Connection error: failed to open Zenoh session")?;
    info!("Connected to Zenoh");

    let sink = Arc::new(sink);
    let source = ModbusSource::new(config.device.clone());
    let mut bridge = Bridge::new(config, source, sink);
    let signal = bridge.lifecycle().stop_on_ctrl_c();

    let result = bridge.run().await;
    signal.abort();
    result?;

    Ok(())
}
