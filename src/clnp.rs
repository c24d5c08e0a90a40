//! CLNP (ConnectionLess Network Protocol) decoder (component L), both
//! full and compressed-initial header forms.
//!
//! Grounded on `original_source/src/clnp.c`. Per design note §9(c),
//! the "CLNP inside CLNP" guard here is exactly one level deep: a
//! nested CLNP payload is reported unparsed rather than recursively
//! decoded, matching the original's loop-avoidance strategy without
//! extending it.

use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};

/// CLNP protocol identifier, used to recognize (and reject) nested CLNP.
pub const CLNP_PROTO_ID: u8 = 0x81;

fn dispatch_payload(proto: u8, data: &[u8], nested: bool) -> Node {
    if proto == CLNP_PROTO_ID {
        return Node::unparsed("clnp", data, "nested CLNP rejected");
    }
    match proto {
        crate::x25::sn_proto::ES_IS => crate::esis::decode(data),
        crate::x25::sn_proto::IDRP => crate::idrp::decode(data),
        other => {
            let _ = nested;
            Node::unparsed("clnp_payload", data, format!("unknown network protocol {other:#x}"))
        }
    }
}

/// Decode a full-header CLNP PDU: skip `buf[1]` header-length octets,
/// then dispatch the payload by its protocol-id byte (spec.md §4.L).
pub fn decode_full(buf: &[u8]) -> Node {
    let mut n = Node::new("clnp");
    match decode_full_inner(buf) {
        Ok((skip, proto)) => {
            n.push("header_len", FieldValue::Int(skip as i64));
            n.push("proto", FieldValue::Int(proto as i64));
            if buf.len() > skip {
                n.child(dispatch_payload(proto, &buf[skip..], false));
            }
        }
        Err(e) => return Node::unparsed("clnp", buf, e.to_string()),
    }
    n
}

fn decode_full_inner(buf: &[u8]) -> Result<(usize, u8)> {
    if buf.len() < 2 {
        return Err(Vdl2Error::too_short(buf.len(), 2));
    }
    let proto = buf[0];
    let skip = buf[1] as usize;
    if skip > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "clnp header length" });
    }
    Ok((skip, proto))
}

/// Decode a compressed-initial-header CLNP PDU (spec.md §4.L): base
/// length 4 octets, with an extra locref byte when `buf[3] & 0x80`,
/// and two extra PDU-id bytes when `buf[0] & 0x10`.
pub fn decode_compressed(buf: &[u8]) -> Node {
    let mut n = Node::new("clnp_compressed");
    match decode_compressed_inner(buf) {
        Ok((skip, proto)) => {
            n.push("header_len", FieldValue::Int(skip as i64));
            if let Some(p) = proto {
                n.push("proto", FieldValue::Int(p as i64));
            }
            if buf.len() > skip {
                n.child(dispatch_payload(proto.unwrap_or(0), &buf[skip..], false));
            }
        }
        Err(e) => return Node::unparsed("clnp_compressed", buf, e.to_string()),
    }
    n
}

fn decode_compressed_inner(buf: &[u8]) -> Result<(usize, Option<u8>)> {
    const BASE_LEN: usize = 4;
    if buf.len() < BASE_LEN {
        return Err(Vdl2Error::too_short(buf.len(), BASE_LEN));
    }
    let mut skip = BASE_LEN;
    if buf[3] & 0x80 != 0 {
        skip += 1; // extra locref byte
    }
    let mut proto = None;
    if buf[0] & 0x10 != 0 {
        if buf.len() < skip + 2 {
            return Err(Vdl2Error::TruncatedField { what: "clnp compressed pdu-id" });
        }
        proto = Some(buf[skip]);
        skip += 2;
    }
    if skip > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "clnp compressed header" });
    }
    Ok((skip, proto))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_header_skips_declared_length() {
        let buf = [0x82u8, 0x02, 0xaa, 0xbb, 0xcc];
        let n = decode_full(&buf);
        assert_eq!(n.name, "clnp");
    }

    #[test]
    fn nested_clnp_is_rejected() {
        let buf = [CLNP_PROTO_ID, 0x02, 0xaa, 0xbb];
        let n = decode_full(&buf);
        assert!(n.children[0].unparsed);
    }

    #[test]
    fn compressed_base_length_without_extras() {
        let buf = [0x00u8, 0x00, 0x00, 0x00, 0x01, 0x02];
        let (skip, proto) = decode_compressed_inner(&buf).unwrap();
        assert_eq!(skip, 4);
        assert_eq!(proto, None);
    }

    #[test]
    fn compressed_with_locref_and_pdu_id() {
        let buf = [0x10u8, 0x00, 0x00, 0x80, 0xaa, CLNP_PROTO_ID, 0x00, 0xff];
        let (skip, proto) = decode_compressed_inner(&buf).unwrap();
        assert_eq!(skip, 7);
        assert_eq!(proto, Some(CLNP_PROTO_ID));
    }

    #[test]
    fn too_short_rejected() {
        assert!(decode_full_inner(&[0x01]).is_err());
        assert!(decode_compressed_inner(&[0x00, 0x00]).is_err());
    }
}
