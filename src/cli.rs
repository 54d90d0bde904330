use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use aria_exporter::config::{ConfigOverrides, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "aria-exporter")]
#[command(about = "Prometheus exporter for VMware Aria Operations", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect from Aria Operations and serve /metrics
    Run(ConfigArgs),
    /// Print the resolved configuration (password redacted) and exit
    CheckConfig(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (.yaml, .yml, .toml or .json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Aria Operations host
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    /// Falls back to VMWARE_ARIA_PASSWORD when unset
    #[arg(long)]
    pub password: Option<String>,

    /// Port for the metrics endpoint
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between collection cycles
    #[arg(long)]
    pub interval: Option<u64>,

    /// Verify the upstream TLS certificate
    #[arg(long)]
    pub verify_ssl: bool,

    #[arg(long, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,
}

impl ConfigArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides::builder()
            .maybe_host(self.host.clone())
            .maybe_username(self.username.clone())
            .maybe_password(self.password.clone())
            .maybe_port(self.port)
            .maybe_interval(self.interval)
            .maybe_verify_ssl(self.verify_ssl.then_some(true))
            .maybe_log_level(self.log_level)
            .build()
    }
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    value.parse()
}
