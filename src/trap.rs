//! Normalized trap records
//!
//! Both wire formats collapse into [`TrapRecord`], a tagged union that
//! serializes to a flat JSON object discriminated by `trap_version`.

use crate::ber::DecodeError;
use crate::oids;
use crate::pdu::{Message, Pdu, SnmpValue, VarBind};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One variable binding as exposed to pollers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub oid: String,
    pub value: String,
}

impl From<&VarBind> for Variable {
    fn from(vb: &VarBind) -> Self {
        Self {
            name: oids::display_name(&vb.oid),
            oid: vb.oid.to_string(),
            value: vb.value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V1Trap {
    pub enterprise: String,
    pub agent_addr: String,
    pub generic_trap: i64,
    pub specific_trap: i64,
    /// sysUpTime of the agent in hundredths of a second
    pub timestamp: String,
    pub source_ip: String,
    pub vars: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2Trap {
    /// Value of the snmpTrapOID.0 varbind
    pub oid: String,
    pub source_ip: String,
    pub vars: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapRecord {
    V1(V1Trap),
    V2(V2Trap),
}

impl TrapRecord {
    /// Normalize a decoded message received from `source`
    pub fn from_message(message: &Message, source: IpAddr) -> Result<Self, DecodeError> {
        let source_ip = source.to_string();
        match &message.pdu {
            Pdu::TrapV1(trap) => Ok(Self::V1(V1Trap {
                enterprise: trap.enterprise.to_string(),
                agent_addr: trap.agent_addr.to_string(),
                generic_trap: trap.generic_trap,
                specific_trap: trap.specific_trap,
                timestamp: trap.time_stamp.to_string(),
                source_ip,
                vars: trap.varbinds.iter().map(Variable::from).collect(),
            })),
            Pdu::TrapV2(trap) => {
                let trap_oid = trap
                    .varbinds
                    .iter()
                    .find(|vb| vb.oid.arcs() == oids::SNMP_TRAP_OID)
                    .and_then(|vb| match &vb.value {
                        SnmpValue::ObjectIdentifier(oid) => Some(oid.to_string()),
                        _ => None,
                    })
                    .ok_or(DecodeError::MissingTrapOid)?;
                Ok(Self::V2(V2Trap {
                    oid: trap_oid,
                    source_ip,
                    vars: trap.varbinds.iter().map(Variable::from).collect(),
                }))
            }
        }
    }

    pub fn trap_version(&self) -> u8 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }

    pub fn source_ip(&self) -> &str {
        match self {
            Self::V1(trap) => &trap.source_ip,
            Self::V2(trap) => &trap.source_ip,
        }
    }

    pub fn vars(&self) -> &[Variable] {
        match self {
            Self::V1(trap) => &trap.vars,
            Self::V2(trap) => &trap.vars,
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    trap_version: u8,
    #[serde(flatten)]
    trap: &'a T,
}

impl Serialize for TrapRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let trap_version = self.trap_version();
        match self {
            Self::V1(trap) => Tagged { trap_version, trap }.serialize(serializer),
            Self::V2(trap) => Tagged { trap_version, trap }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TrapRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let version = value
            .get("trap_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| de::Error::missing_field("trap_version"))?;
        match version {
            1 => serde_json::from_value(value).map(Self::V1).map_err(de::Error::custom),
            2 => serde_json::from_value(value).map(Self::V2).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("unknown trap_version {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::Oid;
    use crate::pdu::{SnmpVersion, V1TrapPdu, V2TrapPdu};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn v2_message(varbinds: Vec<VarBind>) -> Message {
        Message {
            version: SnmpVersion::V2c,
            community: b"public".to_vec(),
            pdu: Pdu::TrapV2(V2TrapPdu {
                request_id: 1,
                error_status: 0,
                error_index: 0,
                varbinds,
            }),
        }
    }

    #[test]
    fn v1_record_json_shape() {
        let message = Message {
            version: SnmpVersion::V1,
            community: b"public".to_vec(),
            pdu: Pdu::TrapV1(V1TrapPdu {
                enterprise: oid("1.3.6.1.4.1.8072.3.2.10"),
                agent_addr: Ipv4Addr::new(10, 1, 2, 3),
                generic_trap: 6,
                specific_trap: 1,
                time_stamp: 12345,
                varbinds: vec![VarBind::new(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(12345))],
            }),
        };
        let record = TrapRecord::from_message(&message, "127.0.0.1".parse().unwrap()).unwrap();

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "trap_version": 1,
                "enterprise": "1.3.6.1.4.1.8072.3.2.10",
                "agent_addr": "10.1.2.3",
                "generic_trap": 6,
                "specific_trap": 1,
                "timestamp": "12345",
                "source_ip": "127.0.0.1",
                "vars": [{"name": "sysUpTime", "oid": "1.3.6.1.2.1.1.3.0", "value": "12345"}],
            })
        );
    }

    #[test]
    fn v2_record_takes_trap_oid_from_varbinds() {
        let message = v2_message(vec![
            VarBind::new(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(99)),
            VarBind::new(
                oid("1.3.6.1.6.3.1.1.4.1.0"),
                SnmpValue::ObjectIdentifier(oid("1.3.6.1.6.3.1.1.5.3")),
            ),
            VarBind::new(oid("1.2.3"), SnmpValue::Integer(1)),
        ]);
        let record = TrapRecord::from_message(&message, "192.0.2.1".parse().unwrap()).unwrap();

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "trap_version": 2,
                "oid": "1.3.6.1.6.3.1.1.5.3",
                "source_ip": "192.0.2.1",
                "vars": [
                    {"name": "sysUpTime", "oid": "1.3.6.1.2.1.1.3.0", "value": "99"},
                    {"name": "snmpTrapOID", "oid": "1.3.6.1.6.3.1.1.4.1.0", "value": "1.3.6.1.6.3.1.1.5.3"},
                    {"name": "1.2.3", "oid": "1.2.3", "value": "1"},
                ],
            })
        );
    }

    #[test]
    fn v2_without_trap_oid_is_rejected() {
        let message = v2_message(vec![VarBind::new(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(1))]);
        assert_eq!(
            TrapRecord::from_message(&message, "::1".parse().unwrap()).unwrap_err(),
            DecodeError::MissingTrapOid
        );
    }

    #[test]
    fn deserializes_by_version_tag() {
        let record = TrapRecord::V2(V2Trap {
            oid: "1.0".to_string(),
            source_ip: "127.0.0.1".to_string(),
            vars: vec![],
        });
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(serde_json::from_str::<TrapRecord>(&text).unwrap(), record);

        let bogus = json!({"trap_version": 3, "source_ip": "127.0.0.1", "vars": []});
        assert!(serde_json::from_value::<TrapRecord>(bogus).is_err());
    }
}
