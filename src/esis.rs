//! ES-IS (End System to Intermediate System) decoder (component M).
//!
//! Grounded on `original_source/src/esis.c`: a 9-byte fixed header
//! (network-layer protocol id, length indicator, version, reserved,
//! holdtime, checksum) followed by a length-counted network address
//! and a trailing TLV option list. spec.md §4.M names the two PDU
//! types as ESH (2, "ES Hello") and ISH (4, "IS Hello").

use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};

const HEADER_LEN: usize = 9;

/// ES-IS PDU type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    /// ES Hello.
    Esh,
    /// IS Hello.
    Ish,
    /// Unrecognized type code.
    Unknown(u8),
}

impl PduType {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => PduType::Esh,
            4 => PduType::Ish,
            other => PduType::Unknown(other),
        }
    }
}

/// Parsed ES-IS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsisHeader {
    /// Network layer protocol identifier (fixed `0x82`).
    pub nlpid: u8,
    /// PDU type.
    pub pdu_type: PduType,
    /// Version/protocol id octet.
    pub version: u8,
    /// Holdtime, seconds.
    pub holdtime: u16,
}

fn parse_header(buf: &[u8]) -> Result<EsisHeader> {
    if buf.len() < HEADER_LEN {
        return Err(Vdl2Error::too_short(buf.len(), HEADER_LEN));
    }
    Ok(EsisHeader {
        nlpid: buf[0],
        pdu_type: PduType::from_u8(buf[2]),
        version: buf[3],
        holdtime: u16::from_be_bytes([buf[6], buf[7]]),
    })
}

/// One TLV option from the trailing option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Option_ {
    /// Option code.
    pub code: u8,
    /// Option value.
    pub value: Vec<u8>,
}

fn parse_options(buf: &[u8]) -> Result<Vec<Option_>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        if i + 2 > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "esis option header" });
        }
        let code = buf[i];
        let len = buf[i + 1] as usize;
        i += 2;
        if i + len > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "esis option value" });
        }
        out.push(Option_ { code, value: buf[i..i + len].to_vec() });
        i += len;
    }
    Ok(out)
}

fn decode_inner(buf: &[u8]) -> Result<Node> {
    let header = parse_header(buf)?;
    let mut n = Node::new("esis");
    n.push("type", FieldValue::Text(format!("{:?}", header.pdu_type)));
    n.push("version", FieldValue::Int(header.version as i64));
    n.push("holdtime", FieldValue::Int(header.holdtime as i64));

    let mut i = HEADER_LEN;
    if i >= buf.len() {
        return Ok(n);
    }
    let addr_len = buf[i] as usize;
    i += 1;
    if i + addr_len > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "esis network address" });
    }
    let addr = &buf[i..i + addr_len];
    n.push("net_addr", FieldValue::Bytes(addr.to_vec()));
    i += addr_len;

    if i < buf.len() {
        for opt in parse_options(&buf[i..])? {
            let mut opt_node = Node::new("option");
            opt_node.push("code", FieldValue::Int(opt.code as i64));
            opt_node.push("value", FieldValue::Bytes(opt.value));
            n.child(opt_node);
        }
    }
    Ok(n)
}

/// Decode one ES-IS PDU into a [`Node`].
pub fn decode(buf: &[u8]) -> Node {
    match decode_inner(buf) {
        Ok(n) => n,
        Err(e) => Node::unparsed("esis", buf, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pdu_type: u8) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[0] = 0x82;
        h[2] = pdu_type;
        h[6] = 0x00;
        h[7] = 0x1e; // holdtime = 30
        h
    }

    #[test]
    fn esh_header_decodes() {
        let buf = header(2);
        let n = decode(&buf);
        assert_eq!(n.fields.iter().find(|(k, _)| k == "type").unwrap().1, FieldValue::Text("Esh".into()));
        assert_eq!(n.fields.iter().find(|(k, _)| k == "holdtime").unwrap().1, FieldValue::Int(30));
    }

    #[test]
    fn ish_with_network_address_and_options() {
        let mut buf = header(4);
        buf.push(3); // addr len
        buf.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        buf.push(0x01); // option code
        buf.push(0x02); // option len
        buf.extend_from_slice(&[0x11, 0x22]);
        let n = decode(&buf);
        assert_eq!(n.children.len(), 1);
        assert_eq!(n.children[0].name, "option");
    }

    #[test]
    fn too_short_is_unparsed() {
        let n = decode(&[0u8; 3]);
        assert!(n.unparsed);
    }

    #[test]
    fn truncated_address_is_unparsed() {
        let mut buf = header(2);
        buf.push(10); // claims 10 bytes of address but none follow
        let n = decode(&buf);
        assert!(n.unparsed);
    }

    #[test]
    fn option_parser_rejects_truncated_value() {
        assert!(parse_options(&[0x01, 0x05, 0xaa]).is_err());
    }
}
