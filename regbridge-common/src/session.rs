use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

fn insert(config: &mut zenoh::Config, key: &str, value: &str) -> Result<()> {
    config
        .insert_json5(key, value)
        .map_err(|e| Error::Config(format!("Invalid zenoh setting '{}': {}", key, e)))
}

fn insert_endpoints(config: &mut zenoh::Config, key: &str, endpoints: &[String]) -> Result<()> {
    if endpoints.is_empty() {
        return Ok(());
    }
    let value = serde_json::to_string(endpoints)
        .map_err(|e| Error::Config(format!("Invalid endpoints for '{}': {}", key, e)))?;
    insert(config, key, &value)
}

/// Translate bridge settings into a `zenoh::Config`.
pub fn build_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    let mut zenoh_config = zenoh::Config::default();
    insert(&mut zenoh_config, "mode", &format!("\"{}\"", config.mode))?;
    insert_endpoints(&mut zenoh_config, "connect/endpoints", &config.connect)?;
    insert_endpoints(&mut zenoh_config, "listen/endpoints", &config.listen)?;
    Ok(zenoh_config)
}

/// Open a Zenoh session.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Opening Zenoh session"
    );
    let session = zenoh::open(zenoh_config).await?;
    tracing::info!(zid = %session.zid(), "Zenoh session open");

    Ok(session)
}
