//! CLI argument definitions for conntrail-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Conntrail router conntrack log daemon.
///
/// Receives connection-tracking syslog messages from routers, resolves
/// subscriber identities, and appends events to per-router hourly
/// partition files.
#[derive(Parser, Debug)]
#[command(name = "conntrail-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to conntrail.toml configuration file.
    #[arg(short, long, default_value = "/etc/conntrail/conntrail.toml")]
    pub config: PathBuf,

    /// Path to the router registry file (overrides the config file).
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and registry, then exit without starting.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["conntrail-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/conntrail/conntrail.toml"));
        assert!(cli.registry.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "conntrail-daemon",
            "--config",
            "/tmp/c.toml",
            "--registry",
            "/tmp/r.toml",
            "--log-level",
            "debug",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/c.toml"));
        assert_eq!(cli.registry, Some(PathBuf::from("/tmp/r.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.validate);
    }
}
