//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the register bridge.
#[derive(Parser, Debug, Clone)]
#[command(about = "Bridges polled field-bus registers to Zenoh topics")]
#[command(version)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate the configuration and every register transform, then exit.
    #[arg(long)]
    pub check: bool,
}

impl BridgeArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches();

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_flag() {
        let args = BridgeArgs::try_parse_from([
            "zenoh-bridge-registers",
            "--config",
            "wattnode.json5",
            "--check",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("wattnode.json5"));
        assert!(args.check);
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn test_parse_log_level() {
        let args = BridgeArgs::try_parse_from([
            "zenoh-bridge-registers",
            "-c",
            "a.json5",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(!args.check);
    }

    #[test]
    fn test_config_required_without_default() {
        assert!(BridgeArgs::try_parse_from(["zenoh-bridge-registers"]).is_err());
    }
}
