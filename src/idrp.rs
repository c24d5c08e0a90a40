//! IDRP (Inter-Domain Routing Protocol) decoder (component M).
//!
//! Grounded on `original_source/src/idrp.c`: a common header (PID,
//! length, type, sequence/ack numbers, credits, validation pattern)
//! followed by a type-specific body. spec.md §4.M names OPEN, UPDATE,
//! ERROR, KEEPALIVE, CEASE, RIB-REFRESH as the six PDU types.

use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};

const COMMON_HEADER_LEN: usize = 1 + 2 + 1 + 4 + 4 + 2 + 16;

/// IDRP PDU type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    /// Open.
    Open,
    /// Update.
    Update,
    /// Error.
    Error,
    /// Keepalive.
    Keepalive,
    /// Cease.
    Cease,
    /// RIB refresh.
    RibRefresh,
    /// Unrecognized type code.
    Unknown(u8),
}

impl PduType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PduType::Open,
            2 => PduType::Update,
            3 => PduType::Error,
            4 => PduType::Keepalive,
            5 => PduType::Cease,
            6 => PduType::RibRefresh,
            other => PduType::Unknown(other),
        }
    }
}

/// Common IDRP header, present on every PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonHeader {
    /// Protocol identifier.
    pub pid: u8,
    /// PDU length, including the header.
    pub length: u16,
    /// PDU type.
    pub pdu_type: PduType,
    /// Sequence number.
    pub seq: u32,
    /// Acknowledged sequence number.
    pub ack: u32,
    /// Flow-control credits offered.
    pub credits: u16,
}

fn parse_common_header(buf: &[u8]) -> Result<CommonHeader> {
    if buf.len() < COMMON_HEADER_LEN {
        return Err(Vdl2Error::too_short(buf.len(), COMMON_HEADER_LEN));
    }
    let pid = buf[0];
    let length = u16::from_be_bytes([buf[1], buf[2]]);
    let pdu_type = PduType::from_u8(buf[3]);
    let seq = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let ack = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    let credits = u16::from_be_bytes([buf[12], buf[13]]);
    Ok(CommonHeader { pid, length, pdu_type, seq, ack, credits })
}

fn decode_open(body: &[u8], n: &mut Node) {
    if body.len() < 4 {
        n.push("reason", FieldValue::Text("open body truncated".into()));
        return;
    }
    n.push("version", FieldValue::Int(body[0] as i64));
    n.push("max_pdu_size", FieldValue::Int(u16::from_be_bytes([body[1], body[2]]) as i64));
    n.push("rdc_type", FieldValue::Int(body[3] as i64));
}

fn decode_update(body: &[u8], n: &mut Node) {
    n.push("body_len", FieldValue::Int(body.len() as i64));
    if body.len() >= 2 {
        let withdrawn_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        n.push("withdrawn_len", FieldValue::Int(withdrawn_len as i64));
    }
}

fn decode_error(body: &[u8], n: &mut Node) {
    if body.len() >= 2 {
        n.push("error_code", FieldValue::Int(body[0] as i64));
        n.push("error_subcode", FieldValue::Int(body[1] as i64));
    }
}

/// Parse a length-prefixed TLV option list trailing a PDU body.
fn parse_options(buf: &[u8]) -> Result<Vec<(u8, Vec<u8>)>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        if i + 2 > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "idrp option header" });
        }
        let tag = buf[i];
        let len = buf[i + 1] as usize;
        i += 2;
        if i + len > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "idrp option value" });
        }
        out.push((tag, buf[i..i + len].to_vec()));
        i += len;
    }
    Ok(out)
}

/// Decode one IDRP PDU into a [`Node`].
pub fn decode(buf: &[u8]) -> Node {
    let header = match parse_common_header(buf) {
        Ok(h) => h,
        Err(e) => return Node::unparsed("idrp", buf, e.to_string()),
    };
    let mut n = Node::new("idrp");
    n.push("pid", FieldValue::Int(header.pid as i64));
    n.push("type", FieldValue::Text(format!("{:?}", header.pdu_type)));
    n.push("seq", FieldValue::Int(header.seq as i64));
    n.push("ack", FieldValue::Int(header.ack as i64));
    n.push("credits", FieldValue::Int(header.credits as i64));

    let body = &buf[COMMON_HEADER_LEN..];
    match header.pdu_type {
        PduType::Open => decode_open(body, &mut n),
        PduType::Update => decode_update(body, &mut n),
        PduType::Error => decode_error(body, &mut n),
        PduType::Keepalive | PduType::Cease | PduType::RibRefresh => {}
        PduType::Unknown(v) => {
            n.push("reason", FieldValue::Text(format!("unknown pdu type {v}")));
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pdu_type: u8, body: &[u8]) -> Vec<u8> {
        let mut h = vec![0u8; COMMON_HEADER_LEN];
        h[0] = 0x85;
        h[3] = pdu_type;
        h.extend_from_slice(body);
        h
    }

    #[test]
    fn open_pdu_decodes_fields() {
        let buf = header(1, &[2, 0x05, 0xdc, 1]);
        let n = decode(&buf);
        assert_eq!(n.fields.iter().find(|(k, _)| k == "type").unwrap().1, FieldValue::Text("Open".into()));
    }

    #[test]
    fn too_short_is_unparsed() {
        let n = decode(&[0u8; 5]);
        assert!(n.unparsed);
    }

    #[test]
    fn options_parser_rejects_truncated_value() {
        assert!(parse_options(&[0x01, 0x05, 0xaa]).is_err());
    }
}
