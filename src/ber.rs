//! Minimal BER (ASN.1 Basic Encoding Rules) reader and writer
//!
//! Covers the subset SNMPv1/v2c messages use: definite lengths, INTEGER,
//! OCTET STRING, NULL, OBJECT IDENTIFIER and the SNMP application types.
//! Indefinite lengths are rejected.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Universal and SNMP application/context tags
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;

    pub const TRAP_V1: u8 = 0xa4;
    pub const TRAP_V2: u8 = 0xa7;

    /// Class and constructed bits of an identifier octet
    pub const CLASS_AND_FORM: u8 = 0xe0;
    pub const APPLICATION_PRIMITIVE: u8 = 0x40;
}

/// Reasons a datagram is rejected by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("expected {what} (tag 0x{expected:02x}), found tag 0x{found:02x}")]
    UnexpectedTag {
        what: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("unsupported length encoding 0x{0:02x}")]
    BadLength(u8),

    #[error("integer does not fit in {0} bits")]
    IntegerOverflow(u32),

    #[error("malformed object identifier")]
    BadOid,

    #[error("IpAddress must be 4 octets, got {0}")]
    BadIpAddress(usize),

    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),

    #[error("SNMP version {0} is not accepted by this listener")]
    VersionNotAccepted(&'static str),

    #[error("unsupported PDU type 0x{0:02x}")]
    UnsupportedPdu(u8),

    #[error("PDU type 0x{pdu:02x} is not valid for SNMP {version}")]
    PduVersionMismatch { version: &'static str, pdu: u8 },

    #[error("unexpected value type 0x{0:02x}")]
    UnsupportedValue(u8),

    #[error("{0} trailing bytes after element")]
    TrailingBytes(usize),

    #[error("community string not accepted")]
    UnknownCommunity,

    #[error("SNMPv2 trap without snmpTrapOID.0 varbind")]
    MissingTrapOid,
}

/// Numeric object identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Build an OID from its arcs. At least two arcs are required and the
    /// first arc is 0, 1 or 2 (second arc below 40 for the first two).
    pub fn from_arcs(arcs: &[u32]) -> Result<Self, DecodeError> {
        match arcs {
            [first, second, ..] if *first < 2 && *second < 40 => Ok(Self(arcs.to_vec())),
            [2, second, ..] if *second <= u32::MAX - 80 => Ok(Self(arcs.to_vec())),
            _ => Err(DecodeError::BadOid),
        }
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.0.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{first}")?;
        }
        for arc in arcs {
            write!(f, ".{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim_start_matches('.')
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| DecodeError::BadOid))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_arcs(&arcs)
    }
}

/// Cursor over a BER-encoded buffer
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Fail unless every byte has been consumed
    pub fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    /// Read one tag-length-value element, returning the tag and its contents
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), DecodeError> {
        let tag = *self.buf.get(self.pos).ok_or(DecodeError::Truncated("tag"))?;
        self.pos += 1;

        let first = *self.buf.get(self.pos).ok_or(DecodeError::Truncated("length"))?;
        self.pos += 1;

        let len = if first < 0x80 {
            first as usize
        } else {
            let octets = (first & 0x7f) as usize;
            if octets == 0 || octets > 4 {
                return Err(DecodeError::BadLength(first));
            }
            let bytes = self
                .buf
                .get(self.pos..self.pos + octets)
                .ok_or(DecodeError::Truncated("long-form length"))?;
            self.pos += octets;
            bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
        };

        if len > self.remaining() {
            return Err(DecodeError::Truncated("element contents"));
        }
        let contents = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok((tag, contents))
    }

    /// Read an element that must carry `expected` as its tag
    pub fn expect(&mut self, expected: u8, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let (found, contents) = self.read_tlv()?;
        if found != expected {
            return Err(DecodeError::UnexpectedTag {
                what,
                expected,
                found,
            });
        }
        Ok(contents)
    }

    /// Enter a constructed element, returning a reader over its contents
    pub fn read_constructed(&mut self, expected: u8, what: &'static str) -> Result<Reader<'a>, DecodeError> {
        self.expect(expected, what).map(Reader::new)
    }

    pub fn read_integer(&mut self, what: &'static str) -> Result<i64, DecodeError> {
        decode_integer(self.expect(tag::INTEGER, what)?)
    }

    pub fn read_octet_string(&mut self, what: &'static str) -> Result<&'a [u8], DecodeError> {
        self.expect(tag::OCTET_STRING, what)
    }

    pub fn read_oid(&mut self, what: &'static str) -> Result<Oid, DecodeError> {
        decode_oid(self.expect(tag::OBJECT_IDENTIFIER, what)?)
    }
}

/// Two's-complement INTEGER contents
pub fn decode_integer(bytes: &[u8]) -> Result<i64, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Truncated("integer"));
    }
    if bytes.len() > 8 {
        return Err(DecodeError::IntegerOverflow(64));
    }
    let seed: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(bytes.iter().fold(seed, |acc, b| (acc << 8) | *b as i64))
}

/// Unsigned contents (Counter32, Gauge32, TimeTicks, Counter64), allowing
/// the leading zero octet BER adds when the high bit is set.
pub fn decode_unsigned(bytes: &[u8], bits: u32) -> Result<u64, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Truncated("unsigned integer"));
    }
    let significant = match bytes {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => bytes,
    };
    if significant.len() > 8 {
        return Err(DecodeError::IntegerOverflow(bits));
    }
    let value = significant.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    if bits < 64 && value >> bits != 0 {
        return Err(DecodeError::IntegerOverflow(bits));
    }
    Ok(value)
}

pub fn decode_oid(bytes: &[u8]) -> Result<Oid, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::BadOid);
    }

    let mut subids = Vec::with_capacity(bytes.len() + 1);
    let mut acc: u64 = 0;
    let mut pending = false;
    for b in bytes {
        acc = (acc << 7) | (b & 0x7f) as u64;
        if acc > u32::MAX as u64 + 80 {
            return Err(DecodeError::BadOid);
        }
        pending = b & 0x80 != 0;
        if !pending {
            subids.push(acc);
            acc = 0;
        }
    }
    if pending {
        return Err(DecodeError::BadOid);
    }

    let first = subids[0];
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(subids.len() + 1);
    arcs.push(a as u32);
    arcs.push(u32::try_from(b).map_err(|_| DecodeError::BadOid)?);
    for subid in &subids[1..] {
        arcs.push(u32::try_from(*subid).map_err(|_| DecodeError::BadOid)?);
    }
    Oid::from_arcs(&arcs)
}

/// Growable BER output buffer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_tlv(&mut self, tag: u8, contents: &[u8]) {
        self.buf.push(tag);
        write_length(&mut self.buf, contents.len());
        self.buf.extend_from_slice(contents);
    }

    /// Write a constructed element whose contents are produced by `f`
    pub fn write_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Writer)) {
        let mut inner = Writer::new();
        f(&mut inner);
        self.write_tlv(tag, &inner.buf);
    }

    pub fn write_integer(&mut self, value: i64) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < bytes.len() - 1 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.write_tlv(tag::INTEGER, &bytes[start..]);
    }

    pub fn write_unsigned(&mut self, tag: u8, value: u64) {
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let mut contents = Vec::with_capacity(9);
        if bytes[start] & 0x80 != 0 {
            contents.push(0);
        }
        contents.extend_from_slice(&bytes[start..]);
        self.write_tlv(tag, &contents);
    }

    pub fn write_octet_string(&mut self, bytes: &[u8]) {
        self.write_tlv(tag::OCTET_STRING, bytes);
    }

    pub fn write_null(&mut self) {
        self.write_tlv(tag::NULL, &[]);
    }

    pub fn write_oid(&mut self, oid: &Oid) {
        let arcs = oid.arcs();
        let mut contents = Vec::with_capacity(arcs.len() + 4);
        push_subid(&mut contents, arcs[0] as u64 * 40 + arcs[1] as u64);
        for arc in &arcs[2..] {
            push_subid(&mut contents, *arc as u64);
        }
        self.write_tlv(tag::OBJECT_IDENTIFIER, &contents);
    }
}

fn write_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(3);
    buf.push(0x80 | (bytes.len() - start) as u8);
    buf.extend_from_slice(&bytes[start..]);
}

fn push_subid(buf: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7f) as u8;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        buf.push(groups[i] | continuation);
    }
}
