//! Well-known OIDs seen in trap varbinds.
//!
//! There is no MIB loader; only the SNMPv2-MIB scalars that agents routinely
//! attach to notifications get a symbolic name.

use crate::ber::Oid;

/// sysUpTime.0
pub const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
/// snmpTrapOID.0
pub const SNMP_TRAP_OID: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];
/// snmpTrapEnterprise.0
pub const SNMP_TRAP_ENTERPRISE: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 3, 0];

const NAMES: &[(&[u32], &str)] = &[
    (&[1, 3, 6, 1, 2, 1, 1, 1, 0], "sysDescr"),
    (&[1, 3, 6, 1, 2, 1, 1, 2, 0], "sysObjectID"),
    (SYS_UPTIME, "sysUpTime"),
    (&[1, 3, 6, 1, 2, 1, 1, 4, 0], "sysContact"),
    (&[1, 3, 6, 1, 2, 1, 1, 5, 0], "sysName"),
    (&[1, 3, 6, 1, 2, 1, 1, 6, 0], "sysLocation"),
    (SNMP_TRAP_OID, "snmpTrapOID"),
    (SNMP_TRAP_ENTERPRISE, "snmpTrapEnterprise"),
    (&[1, 3, 6, 1, 6, 3, 18, 1, 3, 0], "snmpTrapAddress"),
    (&[1, 3, 6, 1, 6, 3, 18, 1, 4, 0], "snmpTrapCommunity"),
];

pub fn symbolic_name(oid: &Oid) -> Option<&'static str> {
    NAMES
        .iter()
        .find(|(arcs, _)| oid.arcs() == *arcs)
        .map(|(_, name)| *name)
}

/// Symbolic name when known, dotted OID otherwise
pub fn display_name(oid: &Oid) -> String {
    symbolic_name(oid).map_or_else(|| oid.to_string(), str::to_string)
}
