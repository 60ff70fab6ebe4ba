//! trapsink - main application entry point
//!
//! SNMP trap receiver with an HTTP polling API

use anyhow::{Context, Result};
use clap::{Arg, Command};
use futures_util::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::UdpSocket;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use trapsink::ber::Oid;
use trapsink::oids;
use trapsink::pdu::{Message, Pdu, SnmpValue, SnmpVersion, V1TrapPdu, V2TrapPdu, VarBind};
use trapsink::{Config, QueryServer, SnmpListener, TrapBuffer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("trapsink")
        .version(VERSION)
        .about("Receives SNMP traps and serves them over a polling HTTP API")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.json"),
        )
        .arg(
            Arg::new("daemon")
                .short('d')
                .long("daemon")
                .help("Run as daemon (suppress console output)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a default configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("send-test-trap")
                .long("send-test-trap")
                .value_name("VERSION")
                .help("Send a sample trap to the configured listener and exit")
                .value_parser(["v1", "v2c"]),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .context("Missing configuration path")?;
    let daemon_mode = matches.get_flag("daemon");

    if matches.get_flag("generate-config") {
        return generate_default_config(&config_path).await;
    }

    let config = load_configuration(&config_path).await?;
    config.validate().context("Configuration validation failed")?;

    if let Some(version) = matches.get_one::<String>("send-test-trap") {
        let version = if version == "v1" { SnmpVersion::V1 } else { SnmpVersion::V2c };
        return send_test_trap(&config, version).await;
    }

    // Keeps the file writer flushing until main returns
    let _log_guard = initialise_logging(&config, daemon_mode)?;

    info!("Starting trapsink v{}", VERSION);
    info!("Configuration loaded from: {}", config_path.display());

    run_application(config).await
}

/// Generate a default configuration file
async fn generate_default_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    Config::default()
        .save_to_file(config_path)
        .await
        .context("Failed to save default configuration")?;

    println!("Configuration generated: {}", config_path.display());
    println!("Contains: trap listener on 0.0.0.0:162 (community \"public\"), query server on 0.0.0.0:8080");
    Ok(())
}

/// Load configuration from file, writing the defaults first if it is missing
async fn load_configuration(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        let default_config = Config::default();
        default_config
            .save_to_file(config_path)
            .await
            .context("Failed to create default configuration file")?;
        eprintln!("Configuration file not found, created defaults at {}", config_path.display());
        return Ok(default_config);
    }

    Config::load_from_file(config_path)
        .await
        .context("Failed to load configuration file")
}

/// Initialize logging based on configuration
fn initialise_logging(
    config: &Config,
    daemon_mode: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = Vec::new();
    let mut guard = None;

    if config.logging.console_output && !daemon_mode {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_file_path) = config.logging.file_output {
        let log_path = Path::new(log_file_path);
        let log_dir = log_path.parent().unwrap_or(Path::new("."));
        let log_filename = log_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("trapsink.log");

        std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;

        let file_appender = match config.logging.rotation_strategy.as_str() {
            "hourly" => tracing_appender::rolling::hourly(log_dir, log_filename),
            "never" => tracing_appender::rolling::never(log_dir, log_filename),
            _ => tracing_appender::rolling::daily(log_dir, log_filename),
        };
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        layers.push(file_layer.boxed());
        guard = Some(file_guard);
    }

    if layers.is_empty() {
        let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        layers.push(stderr_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    Ok(guard)
}

/// Main application runtime
async fn run_application(config: Config) -> Result<()> {
    let buffer = TrapBuffer::new();

    // Both sockets are bound before either starts serving
    let listener = SnmpListener::bind(config.listener.clone(), buffer.clone())
        .await
        .context("Failed to start SNMP listener")?;
    let query_server = QueryServer::bind(&config.query_server, buffer.clone())
        .await
        .context("Failed to start query server")?;

    let mut listener_handle = tokio::spawn(listener.run());
    let mut server_handle = tokio::spawn(query_server.run());

    let mut signals = Signals::new([SIGTERM, SIGINT]).context("Failed to register signal handlers")?;
    let signals_handle = signals.handle();

    info!("trapsink started successfully");

    let outcome = tokio::select! {
        _ = signals.next() => {
            info!("Received shutdown signal, stopping");
            Ok(())
        }
        result = &mut listener_handle => {
            error!("SNMP listener stopped unexpectedly");
            task_outcome(result)
        }
        result = &mut server_handle => {
            error!("Query server stopped unexpectedly");
            task_outcome(result)
        }
    };

    signals_handle.close();
    listener_handle.abort();
    server_handle.abort();

    let discarded = buffer.len();
    if discarded > 0 {
        warn!("Discarding {} unflushed traps", discarded);
    }
    info!("trapsink stopped");
    outcome
}

fn task_outcome(result: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => anyhow::bail!("Background task exited"),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(e).context("Background task panicked"),
    }
}

/// Encode a sample trap and send it to the configured listener
async fn send_test_trap(config: &Config, version: SnmpVersion) -> Result<()> {
    let mut target = config.listener.socket_addr()?;
    if target.ip().is_unspecified() {
        target.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    let community = config
        .listener
        .community_strings
        .first()
        .context("No community string configured")?;

    let message = sample_trap(version, community)?;
    let bind_addr: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr).await.context("Failed to bind UDP socket")?;
    socket
        .send_to(&message.encode(), target)
        .await
        .with_context(|| format!("Failed to send trap to {}", target))?;

    println!("Sent SNMP {} test trap to {}", version, target);
    Ok(())
}

fn sample_trap(version: SnmpVersion, community: &str) -> Result<Message> {
    let uptime = Oid::from_arcs(oids::SYS_UPTIME)?;
    let description: Oid = "1.3.6.1.2.1.1.1.0".parse()?;
    let varbinds = vec![
        VarBind::new(uptime.clone(), SnmpValue::TimeTicks(12345)),
        VarBind::new(description, SnmpValue::OctetString(b"trapsink test trap".to_vec())),
    ];

    let pdu = match version {
        SnmpVersion::V1 => Pdu::TrapV1(V1TrapPdu {
            enterprise: "1.3.6.1.4.1.8072.3.2.10".parse()?,
            agent_addr: Ipv4Addr::LOCALHOST,
            generic_trap: 6,
            specific_trap: 1,
            time_stamp: 12345,
            varbinds,
        }),
        SnmpVersion::V2c => {
            let mut with_trap_oid = vec![
                VarBind::new(uptime, SnmpValue::TimeTicks(12345)),
                VarBind::new(
                    Oid::from_arcs(oids::SNMP_TRAP_OID)?,
                    // coldStart
                    SnmpValue::ObjectIdentifier("1.3.6.1.6.3.1.1.5.1".parse()?),
                ),
            ];
            with_trap_oid.extend(varbinds.into_iter().skip(1));
            Pdu::TrapV2(V2TrapPdu {
                request_id: 1,
                error_status: 0,
                error_index: 0,
                varbinds: with_trap_oid,
            })
        }
    };

    Ok(Message {
        version,
        community: community.as_bytes().to_vec(),
        pdu,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trapsink::TrapRecord;

    fn received(version: SnmpVersion) -> TrapRecord {
        let sent = sample_trap(version, "public").unwrap();
        let message = Message::decode(&sent.encode()).unwrap();
        assert_eq!(message, sent);
        TrapRecord::from_message(&message, IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap()
    }

    fn var_names(record: &TrapRecord) -> Vec<&str> {
        record.vars().iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn v1_test_trap_is_accepted() {
        let record = received(SnmpVersion::V1);
        let TrapRecord::V1(trap) = &record else {
            panic!("expected a v1 trap, got {record:?}");
        };
        assert_eq!(trap.enterprise, "1.3.6.1.4.1.8072.3.2.10");
        assert_eq!(trap.timestamp, "12345");
        assert_eq!(var_names(&record), vec!["sysUpTime", "sysDescr"]);
    }

    #[test]
    fn v2c_test_trap_is_accepted() {
        let record = received(SnmpVersion::V2c);
        let TrapRecord::V2(trap) = &record else {
            panic!("expected a v2 trap, got {record:?}");
        };
        assert_eq!(trap.oid, "1.3.6.1.6.3.1.1.5.1");
        assert_eq!(var_names(&record), vec!["sysUpTime", "snmpTrapOID", "sysDescr"]);
        assert_eq!(trap.vars[2].value, "trapsink test trap");
    }
}
