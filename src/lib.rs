//! trapsink library
//!
//! Receives SNMPv1/v2c traps over UDP, keeps them in a volatile in-memory
//! buffer and serves that buffer over a small polling HTTP API.

pub mod ber;
pub mod client;
pub mod config;
pub mod oids;
pub mod pdu;
pub mod query_server;
pub mod snmp_listener;
pub mod trap;
pub mod trap_buffer;

pub use client::TrapClient;
pub use config::Config;
pub use query_server::QueryServer;
pub use snmp_listener::SnmpListener;
pub use trap::TrapRecord;
pub use trap_buffer::TrapBuffer;
