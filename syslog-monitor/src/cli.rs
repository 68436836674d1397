//! CLI argument parsing for the syslog monitor

use std::path::PathBuf;

use clap::Parser;

/// Syslog Health Monitor - detects GPU driver failures in kernel logs
#[derive(Debug, Parser)]
#[command(name = "syslog-monitor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/syslog-monitor/config.yaml")]
    pub config: PathBuf,

    /// Node name (overrides config and NODE_NAME env)
    #[arg(long, env = "NODE_NAME")]
    pub node_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SYSLOG_MONITOR_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long, default_value = "false", env = "SYSLOG_MONITOR_LOG_JSON")]
    pub log_json: bool,

    /// Log file to classify ("-" reads stdin)
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether lines come from stdin
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}
