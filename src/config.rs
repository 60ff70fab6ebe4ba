//! Configuration management for trapsink

use crate::pdu::SnmpVersion;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub listener: TrapListenerConfig,
    pub query_server: QueryServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapListenerConfig {
    pub bind_address: String,
    pub port: u16,
    pub community_strings: Vec<String>,
    #[serde(default = "default_snmp_versions")]
    pub snmp_versions: Vec<SnmpVersion>,
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    pub file_output: Option<String>,
    #[serde(default = "default_rotation_strategy")]
    pub rotation_strategy: String,
}

fn default_snmp_versions() -> Vec<SnmpVersion> { vec![SnmpVersion::V1, SnmpVersion::V2c] }
fn default_max_packet_size() -> usize { 65535 }
fn default_rotation_strategy() -> String { "daily".to_string() }

impl Default for TrapListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 162,
            community_strings: vec!["public".to_string()],
            snmp_versions: default_snmp_versions(),
            max_packet_size: default_max_packet_size(),
        }
    }
}

impl Default for QueryServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: None,
            rotation_strategy: default_rotation_strategy(),
        }
    }
}

impl TrapListenerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.bind_address, self.port)
    }
}

impl QueryServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.bind_address, self.port)
    }
}

fn socket_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind_address))?;
    Ok(SocketAddr::new(ip, port))
}

impl Config {
    /// Load configuration from a JSON file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .context("Failed to read configuration file")?;

        let config: Config = serde_json::from_str(&content)
            .context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialise configuration")?;

        tokio::fs::write(path.as_ref(), content)
            .await
            .context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let listener = &self.listener;
        if listener.community_strings.is_empty() {
            anyhow::bail!("At least one community string must be configured");
        }
        if listener.snmp_versions.is_empty() {
            anyhow::bail!("At least one SNMP version must be accepted");
        }
        if !(484..=65535).contains(&listener.max_packet_size) {
            anyhow::bail!(
                "max_packet_size must be between 484 and 65535, got {}",
                listener.max_packet_size
            );
        }

        let trap_addr = listener.socket_addr()?;
        let http_addr = self.query_server.socket_addr()?;

        // Port 0 asks the OS for an ephemeral port, so it can never collide
        if trap_addr.port() != 0 && trap_addr.port() == http_addr.port() && overlaps(trap_addr.ip(), http_addr.ip()) {
            anyhow::bail!(
                "Port conflict: trap listener and query server both configured for port {}",
                trap_addr.port()
            );
        }

        match self.logging.rotation_strategy.as_str() {
            "daily" | "hourly" | "never" => {}
            other => anyhow::bail!("Unknown log rotation strategy: {}", other),
        }

        Ok(())
    }
}

fn overlaps(a: IpAddr, b: IpAddr) -> bool {
    a == b || a.is_unspecified() || b.is_unspecified()
}
