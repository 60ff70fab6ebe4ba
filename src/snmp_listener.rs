//! SNMP trap listener
//!
//! Receives trap datagrams on a UDP socket, decodes SNMPv1 and SNMPv2c traps,
//! checks the community string and appends each accepted trap to the shared
//! [`TrapBuffer`]. Anything that fails to decode is dropped.

use crate::ber::DecodeError;
use crate::config::TrapListenerConfig;
use crate::pdu::Message;
use crate::trap::TrapRecord;
use crate::trap_buffer::TrapBuffer;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

/// Largest UDP payload; datagrams are always received whole
const MAX_DATAGRAM: usize = 65535;

/// Datagram counters, logged periodically
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: u64,
    pub accepted: u64,
    pub dropped: u64,
}

pub struct SnmpListener {
    config: TrapListenerConfig,
    socket: UdpSocket,
    buffer: TrapBuffer,
}

impl SnmpListener {
    /// Bind the trap socket. Failing here is fatal for the process.
    pub async fn bind(config: TrapListenerConfig, buffer: TrapBuffer) -> Result<Self> {
        let bind_addr = config.socket_addr()?;
        let socket = UdpSocket::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind SNMP listener to {}", bind_addr))?;

        Ok(Self {
            config,
            socket,
            buffer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read SNMP listener address")
    }

    /// Receive traps until the task is cancelled
    pub async fn run(self) -> Result<()> {
        info!("SNMP listener started on {}", self.local_addr()?);

        let mut packet = vec![0u8; MAX_DATAGRAM];
        let mut stats = ListenerStats::default();

        loop {
            match self.socket.recv_from(&mut packet).await {
                Ok((len, src_addr)) => {
                    stats.received += 1;
                    // Datagrams are handled inline so buffer order matches arrival order
                    if self.process_datagram(&packet[..len], src_addr) {
                        stats.accepted += 1;
                    } else {
                        stats.dropped += 1;
                    }

                    if stats.received % 1000 == 0 {
                        info!(
                            "Processed {} UDP packets ({} accepted, {} dropped), {} traps buffered",
                            stats.received,
                            stats.accepted,
                            stats.dropped,
                            self.buffer.len()
                        );
                    }
                }
                Err(e) => {
                    error!("Failed to receive UDP packet: {}", e);
                }
            }
        }
    }

    /// Decode one datagram and buffer it; returns whether it was accepted
    fn process_datagram(&self, data: &[u8], src_addr: SocketAddr) -> bool {
        if data.len() > self.config.max_packet_size {
            debug!(
                "Dropped {} byte datagram from {}: exceeds max_packet_size of {}",
                data.len(),
                src_addr,
                self.config.max_packet_size
            );
            return false;
        }

        match self.decode_datagram(data, src_addr) {
            Ok(record) => {
                debug!(
                    "Accepted SNMPv{} trap from {} ({} varbinds)",
                    record.trap_version(),
                    src_addr,
                    record.vars().len()
                );
                self.buffer.append(record);
                true
            }
            Err(e) => {
                debug!("Dropped {} byte datagram from {}: {}", data.len(), src_addr, e);
                false
            }
        }
    }

    /// Turn a raw datagram into a trap record, or explain why it was rejected
    pub fn decode_datagram(&self, data: &[u8], src_addr: SocketAddr) -> Result<TrapRecord, DecodeError> {
        let message = Message::decode(data)?;

        if !self.config.snmp_versions.contains(&message.version) {
            return Err(DecodeError::VersionNotAccepted(message.version.as_str()));
        }

        let community_ok = self
            .config
            .community_strings
            .iter()
            .any(|c| c.as_bytes() == message.community.as_slice());
        if !community_ok {
            return Err(DecodeError::UnknownCommunity);
        }

        TrapRecord::from_message(&message, src_addr.ip())
    }
}
