//! SNMP trap message model
//!
//! Decodes and encodes the two trap wire formats this service accepts:
//! the SNMPv1 Trap-PDU (RFC 1157) and the SNMPv2c SNMPv2-Trap-PDU (RFC 3416).
//! Everything else is reported as a [`DecodeError`].

use crate::ber::{self, tag, DecodeError, Oid, Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl SnmpVersion {
    fn from_wire(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Self::V1),
            1 => Ok(Self::V2c),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    fn to_wire(self) -> i64 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2c => "v2c",
        }
    }
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded varbind value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Application-class type with no dedicated variant, such as NsapAddress or UInteger32
    Application { tag: u8, bytes: Vec<u8> },
}

impl SnmpValue {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let (t, contents) = reader.read_tlv()?;
        let value = match t {
            tag::INTEGER => Self::Integer(ber::decode_integer(contents)?),
            tag::OCTET_STRING => Self::OctetString(contents.to_vec()),
            tag::NULL => Self::Null,
            tag::OBJECT_IDENTIFIER => Self::ObjectIdentifier(ber::decode_oid(contents)?),
            tag::IP_ADDRESS => Self::IpAddress(decode_ip_address(contents)?),
            tag::COUNTER32 => Self::Counter32(ber::decode_unsigned(contents, 32)? as u32),
            tag::GAUGE32 => Self::Gauge32(ber::decode_unsigned(contents, 32)? as u32),
            tag::TIMETICKS => Self::TimeTicks(ber::decode_unsigned(contents, 32)? as u32),
            tag::OPAQUE => Self::Opaque(contents.to_vec()),
            tag::COUNTER64 => Self::Counter64(ber::decode_unsigned(contents, 64)?),
            tag::NO_SUCH_OBJECT => Self::NoSuchObject,
            tag::NO_SUCH_INSTANCE => Self::NoSuchInstance,
            tag::END_OF_MIB_VIEW => Self::EndOfMibView,
            other if other & tag::CLASS_AND_FORM == tag::APPLICATION_PRIMITIVE => Self::Application {
                tag: other,
                bytes: contents.to_vec(),
            },
            other => return Err(DecodeError::UnsupportedValue(other)),
        };
        Ok(value)
    }

    fn encode(&self, w: &mut Writer) {
        match self {
            Self::Integer(v) => w.write_integer(*v),
            Self::OctetString(bytes) => w.write_octet_string(bytes),
            Self::Null => w.write_null(),
            Self::ObjectIdentifier(oid) => w.write_oid(oid),
            Self::IpAddress(addr) => w.write_tlv(tag::IP_ADDRESS, &addr.octets()),
            Self::Counter32(v) => w.write_unsigned(tag::COUNTER32, *v as u64),
            Self::Gauge32(v) => w.write_unsigned(tag::GAUGE32, *v as u64),
            Self::TimeTicks(v) => w.write_unsigned(tag::TIMETICKS, *v as u64),
            Self::Opaque(bytes) => w.write_tlv(tag::OPAQUE, bytes),
            Self::Counter64(v) => w.write_unsigned(tag::COUNTER64, *v),
            Self::NoSuchObject => w.write_tlv(tag::NO_SUCH_OBJECT, &[]),
            Self::NoSuchInstance => w.write_tlv(tag::NO_SUCH_INSTANCE, &[]),
            Self::EndOfMibView => w.write_tlv(tag::END_OF_MIB_VIEW, &[]),
            Self::Application { tag, bytes } => w.write_tlv(*tag, bytes),
        }
    }
}

/// Textual rendering used in trap records. Octet strings print as text when
/// they are printable UTF-8 and as `0x`-prefixed hex otherwise.
impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) if is_printable(text) => f.write_str(text),
                _ => write_hex(f, bytes),
            },
            Self::Null => Ok(()),
            Self::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Self::IpAddress(addr) => write!(f, "{addr}"),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => write!(f, "{v}"),
            Self::Opaque(bytes) | Self::Application { bytes, .. } => write_hex(f, bytes),
            Self::Counter64(v) => write!(f, "{v}"),
            Self::NoSuchObject => f.write_str("noSuchObject"),
            Self::NoSuchInstance => f.write_str("noSuchInstance"),
            Self::EndOfMibView => f.write_str("endOfMibView"),
        }
    }
}

fn is_printable(text: &str) -> bool {
    text.chars().all(|c| !c.is_control() || matches!(c, '\t' | '\r' | '\n'))
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

fn decode_ip_address(contents: &[u8]) -> Result<Ipv4Addr, DecodeError> {
    let octets: [u8; 4] = contents
        .try_into()
        .map_err(|_| DecodeError::BadIpAddress(contents.len()))?;
    Ok(Ipv4Addr::from(octets))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// Fields of an SNMPv1 Trap-PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1TrapPdu {
    pub enterprise: Oid,
    pub agent_addr: Ipv4Addr,
    pub generic_trap: i64,
    pub specific_trap: i64,
    pub time_stamp: u32,
    pub varbinds: Vec<VarBind>,
}

/// Fields of an SNMPv2-Trap-PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2TrapPdu {
    pub request_id: i64,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    TrapV1(V1TrapPdu),
    TrapV2(V2TrapPdu),
}

/// A complete community-based SNMP message carrying a trap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: SnmpVersion,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    /// Decode a raw datagram. The whole datagram must be exactly one message.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut outer = Reader::new(data);
        let mut message = outer.read_constructed(tag::SEQUENCE, "message")?;
        outer.finish()?;

        let version = SnmpVersion::from_wire(message.read_integer("version")?)?;
        let community = message.read_octet_string("community")?.to_vec();

        let (pdu_tag, pdu_contents) = message.read_tlv()?;
        message.finish()?;

        let mut body = Reader::new(pdu_contents);
        let pdu = match (version, pdu_tag) {
            (SnmpVersion::V1, tag::TRAP_V1) => Pdu::TrapV1(decode_v1_trap(&mut body)?),
            (SnmpVersion::V2c, tag::TRAP_V2) => Pdu::TrapV2(decode_v2_trap(&mut body)?),
            (version, tag::TRAP_V1 | tag::TRAP_V2) => {
                return Err(DecodeError::PduVersionMismatch {
                    version: version.as_str(),
                    pdu: pdu_tag,
                })
            }
            (_, other) => return Err(DecodeError::UnsupportedPdu(other)),
        };
        body.finish()?;

        Ok(Self {
            version,
            community,
            pdu,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_constructed(tag::SEQUENCE, |w| {
            w.write_integer(self.version.to_wire());
            w.write_octet_string(&self.community);
            match &self.pdu {
                Pdu::TrapV1(trap) => w.write_constructed(tag::TRAP_V1, |w| {
                    w.write_oid(&trap.enterprise);
                    w.write_tlv(tag::IP_ADDRESS, &trap.agent_addr.octets());
                    w.write_integer(trap.generic_trap);
                    w.write_integer(trap.specific_trap);
                    w.write_unsigned(tag::TIMETICKS, trap.time_stamp as u64);
                    encode_varbinds(w, &trap.varbinds);
                }),
                Pdu::TrapV2(trap) => w.write_constructed(tag::TRAP_V2, |w| {
                    w.write_integer(trap.request_id);
                    w.write_integer(trap.error_status);
                    w.write_integer(trap.error_index);
                    encode_varbinds(w, &trap.varbinds);
                }),
            }
        });
        w.into_bytes()
    }
}

fn decode_v1_trap(body: &mut Reader<'_>) -> Result<V1TrapPdu, DecodeError> {
    let enterprise = body.read_oid("enterprise")?;
    let agent_addr = decode_ip_address(body.expect(tag::IP_ADDRESS, "agent-addr")?)?;
    let generic_trap = body.read_integer("generic-trap")?;
    let specific_trap = body.read_integer("specific-trap")?;
    let time_stamp = ber::decode_unsigned(body.expect(tag::TIMETICKS, "time-stamp")?, 32)? as u32;
    let varbinds = decode_varbinds(body)?;
    Ok(V1TrapPdu {
        enterprise,
        agent_addr,
        generic_trap,
        specific_trap,
        time_stamp,
        varbinds,
    })
}

fn decode_v2_trap(body: &mut Reader<'_>) -> Result<V2TrapPdu, DecodeError> {
    let request_id = body.read_integer("request-id")?;
    let error_status = body.read_integer("error-status")?;
    let error_index = body.read_integer("error-index")?;
    let varbinds = decode_varbinds(body)?;
    Ok(V2TrapPdu {
        request_id,
        error_status,
        error_index,
        varbinds,
    })
}

fn decode_varbinds(body: &mut Reader<'_>) -> Result<Vec<VarBind>, DecodeError> {
    let mut list = body.read_constructed(tag::SEQUENCE, "varbind list")?;
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut entry = list.read_constructed(tag::SEQUENCE, "varbind")?;
        let oid = entry.read_oid("varbind name")?;
        let value = SnmpValue::decode(&mut entry)?;
        entry.finish()?;
        varbinds.push(VarBind { oid, value });
    }
    Ok(varbinds)
}

fn encode_varbinds(w: &mut Writer, varbinds: &[VarBind]) {
    w.write_constructed(tag::SEQUENCE, |w| {
        for vb in varbinds {
            w.write_constructed(tag::SEQUENCE, |w| {
                w.write_oid(&vb.oid);
                vb.value.encode(w);
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn v1_message() -> Message {
        Message {
            version: SnmpVersion::V1,
            community: b"public".to_vec(),
            pdu: Pdu::TrapV1(V1TrapPdu {
                enterprise: oid("1.3.6.1.4.1.8072.3.2.10"),
                agent_addr: Ipv4Addr::new(192, 0, 2, 7),
                generic_trap: 6,
                specific_trap: 42,
                time_stamp: 12345,
                varbinds: vec![
                    VarBind::new(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(12345)),
                    VarBind::new(oid("1.3.6.1.4.1.8072.2.3.2.1"), SnmpValue::OctetString(b"disk full".to_vec())),
                ],
            }),
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let message = v1_message();
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn decodes_net_snmp_v2c_trap() {
        // snmptrap -v 2c -c public host 123 1.3.6.1.6.3.1.1.5.1
        let datagram: &[u8] = &[
            0x30, 0x2e, 0x02, 0x01, 0x01, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa7,
            0x21, 0x02, 0x01, 0x05, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x16, 0x30, 0x0d,
            0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x03, 0x00, 0x43, 0x01, 0x7b, 0x30,
            0x05, 0x06, 0x01, 0x2b, 0x05, 0x00,
        ];
        let message = Message::decode(datagram).unwrap();
        assert_eq!(message.version, SnmpVersion::V2c);
        assert_eq!(message.community, b"public");
        let Pdu::TrapV2(trap) = message.pdu else {
            panic!("expected a v2 trap");
        };
        assert_eq!(trap.request_id, 5);
        assert_eq!(trap.varbinds.len(), 2);
        assert_eq!(trap.varbinds[0].value, SnmpValue::TimeTicks(123));
        assert_eq!(trap.varbinds[1].value, SnmpValue::Null);
    }

    #[test]
    fn rejects_truncated_datagrams() {
        let bytes = v1_message().encode();
        for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(Message::decode(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut bytes = v1_message().encode();
        bytes.push(0x00);
        assert_eq!(Message::decode(&bytes).unwrap_err(), DecodeError::TrailingBytes(1));
    }

    #[test]
    fn rejects_snmpv3_and_other_pdus() {
        let mut bytes = v1_message().encode();
        // version INTEGER sits right after the outer header
        bytes[4] = 3;
        assert_eq!(Message::decode(&bytes).unwrap_err(), DecodeError::UnsupportedVersion(3));

        let get_request: &[u8] = &[
            0x30, 0x1a, 0x02, 0x01, 0x01, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa0,
            0x0d, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x02, 0x30, 0x00,
        ];
        assert_eq!(Message::decode(get_request).unwrap_err(), DecodeError::UnsupportedPdu(0xa0));
    }

    #[test]
    fn rejects_pdu_from_other_version() {
        let mut message = v1_message();
        message.version = SnmpVersion::V2c;
        assert_eq!(
            Message::decode(&message.encode()).unwrap_err(),
            DecodeError::PduVersionMismatch {
                version: "v2c",
                pdu: tag::TRAP_V1
            }
        );
    }

    #[test]
    fn keeps_unknown_application_values_as_bytes() {
        let mut message = v1_message();
        if let Pdu::TrapV1(trap) = &mut message.pdu {
            trap.varbinds.push(VarBind::new(
                oid("1.3.6.1.4.1.8072.2.3.2.2"),
                SnmpValue::Application { tag: 0x47, bytes: vec![0x2a] },
            ));
            trap.varbinds.push(VarBind::new(
                oid("1.3.6.1.4.1.8072.2.3.2.3"),
                SnmpValue::Application { tag: 0x45, bytes: vec![0x47, 0x00, 0x0f] },
            ));
        }

        let decoded = Message::decode(&message.encode()).unwrap();
        assert_eq!(decoded, message);
        let Pdu::TrapV1(trap) = decoded.pdu else {
            panic!("expected a v1 trap");
        };
        assert_eq!(trap.varbinds[2].value.to_string(), "0x2a");
        assert_eq!(trap.varbinds[3].value.to_string(), "0x47000f");
    }

    #[test]
    fn rejects_unknown_context_values() {
        let mut message = v1_message();
        if let Pdu::TrapV1(trap) = &mut message.pdu {
            trap.varbinds.push(VarBind::new(
                oid("1.3.6.1.4.1.8072.2.3.2.2"),
                SnmpValue::Application { tag: 0x83, bytes: vec![] },
            ));
        }
        assert_eq!(
            Message::decode(&message.encode()).unwrap_err(),
            DecodeError::UnsupportedValue(0x83)
        );
    }

    #[test]
    fn value_rendering() {
        assert_eq!(SnmpValue::Integer(-4).to_string(), "-4");
        assert_eq!(SnmpValue::OctetString(b"link down".to_vec()).to_string(), "link down");
        assert_eq!(SnmpValue::OctetString(vec![0x00, 0x1b, 0xff]).to_string(), "0x001bff");
        assert_eq!(SnmpValue::Null.to_string(), "");
        assert_eq!(SnmpValue::IpAddress(Ipv4Addr::new(10, 0, 0, 1)).to_string(), "10.0.0.1");
        assert_eq!(SnmpValue::ObjectIdentifier(oid("1.3.6.1.6.3.1.1.5.3")).to_string(), "1.3.6.1.6.3.1.1.5.3");
        assert_eq!(SnmpValue::Counter64(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(SnmpValue::NoSuchInstance.to_string(), "noSuchInstance");
    }
}
