//! ICAO APDU / ULCS decoder (component N): the X.225 short-form SPDU
//! vs. `Fully-encoded-data` classifier, a generic ACSE APDU decode,
//! and the speculative-PER type registry for user data.
//!
//! Grounded on `original_source/src/icao.c`'s `parse_icao_apdu`. Real
//! ASN.1 application schemas are out of scope (spec.md §1): this
//! module reproduces the classifier and dispatch *shape*, decoding
//! ACSE and the arbitrary-payload registry against the generic PER
//! primitives in [`per`] rather than compiled ASN.1 module types.

pub mod per;
pub mod registry;

use crate::direction::MsgDir;
use crate::tree::{FieldValue, Node};
use per::PerReader;

/// ACSE APDU kind, as carried by the CHOICE tag in
/// `original_source`'s `ACSE-apdu` type (`aarq`/`aare`/`rlrq`/`rlre`/`abrt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcseKind {
    /// Association request.
    Aarq,
    /// Association response.
    Aare,
    /// Release request.
    Rlrq,
    /// Release response.
    Rlre,
    /// Abort.
    Abrt,
    /// Value outside the 5-way CHOICE this decoder models.
    Unknown(u32),
}

fn acse_kind_from_tag(tag: u32) -> AcseKind {
    match tag {
        0 => AcseKind::Aarq,
        1 => AcseKind::Aare,
        2 => AcseKind::Rlrq,
        3 => AcseKind::Rlre,
        4 => AcseKind::Abrt,
        other => AcseKind::Unknown(other),
    }
}

/// Decode an ACSE APDU: a 3-bit CHOICE tag selecting the PDU kind,
/// followed by an OPTIONAL user-information octet string (the
/// `arbitrary`-encoded `Association-information` field in the
/// original). When present, user-information is handed to the
/// arbitrary-payload registry.
fn decode_ulcs_acse(buf: &[u8], dir: MsgDir) -> Node {
    let mut n = Node::new("acse");
    let mut r = PerReader::new(buf);
    let tag = match r.read_constrained_int(3) {
        Ok(t) => t,
        Err(e) => return Node::unparsed("acse", buf, e.to_string()),
    };
    let kind = acse_kind_from_tag(tag);
    n.push("kind", FieldValue::Text(format!("{kind:?}")));

    let has_user_info = match r.read_bit() {
        Ok(b) => b,
        Err(e) => return Node::unparsed("acse", buf, e.to_string()),
    };
    if !has_user_info {
        return n;
    }
    let user_info = match r.read_octet_string() {
        Ok(b) => b,
        Err(e) => {
            n.push("reason", FieldValue::Text(e.to_string()));
            return n;
        }
    };
    if let Some(child) = registry::decode_arbitrary_payload(&user_info, dir) {
        n.child(child);
    } else {
        n.push("user_information", FieldValue::Bytes(user_info));
    }
    n
}

/// Presentation-context-identifier values `Fully-encoded-data` carries
/// (named constants in the original's ASN.1 module).
mod presentation_context {
    pub const ACSE_APDU: u32 = 1;
    pub const USER_ASE_APDU: u32 = 2;
}

/// Decode `Fully-encoded-data`: a constrained presentation-context-id
/// integer selecting ACSE vs. raw user-ASE data, followed by a
/// length-determinant octet string carrying that data.
fn decode_fully_encoded_data(buf: &[u8], dir: MsgDir) -> Node {
    let mut n = Node::new("fully_encoded_data");
    let mut r = PerReader::new(buf);
    let ctx_id = match r.read_constrained_int(2) {
        Ok(v) => v,
        Err(e) => return Node::unparsed("fully_encoded_data", buf, e.to_string()),
    };
    n.push("presentation_context_id", FieldValue::Int(ctx_id as i64));
    let data = match r.read_octet_string() {
        Ok(b) => b,
        Err(e) => return Node::unparsed("fully_encoded_data", buf, e.to_string()),
    };
    match ctx_id {
        presentation_context::ACSE_APDU => n.child(decode_ulcs_acse(&data, dir)),
        presentation_context::USER_ASE_APDU => match registry::decode_arbitrary_payload(&data, dir) {
            Some(child) => n.child(child),
            None => n.push("user_data", FieldValue::Bytes(data)),
        },
        other => {
            n.push("reason", FieldValue::Text(format!("unsupported presentation-context-id {other}")));
        }
    }
    n
}

/// Classify and decode an ICAO APDU (spec.md §4.N): if the first byte
/// has bit 7 set, it's an X.225 short-form SPDU — skip two octets (the
/// second must carry PER encoding in its low 2 bits) and decode as
/// ACSE directly; otherwise it's a NULL-encoded session/presentation
/// layer carrying `Fully-encoded-data`.
pub fn parse(buf: &[u8], dir: MsgDir) -> Node {
    if buf.is_empty() {
        return Node::unparsed("icao_apdu", buf, "empty APDU");
    }
    if buf[0] & 0x80 != 0 {
        if buf.len() < 3 {
            return Node::unparsed("icao_apdu", buf, "short-form SPDU truncated");
        }
        if buf[1] & 0x02 != 0x02 {
            return Node::unparsed("icao_apdu", buf, format!("unknown PPDU encoding {:#x}", buf[1] & 0x03));
        }
        decode_ulcs_acse(&buf[2..], dir)
    } else {
        decode_fully_encoded_data(buf, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;

    fn acse_bytes(tag: u32, user_info: Option<&[u8]>) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(tag, 3);
        w.write_bit(user_info.is_some());
        if let Some(info) = user_info {
            w.write_bits(0, 4); // pad to octet boundary (3 + 1 + 4 = 8)
            w.write_bits(info.len() as u32, 8);
            for b in info {
                w.write_bits(*b as u32, 8);
            }
        } else {
            w.write_bits(0, 4);
        }
        w.into_bytes()
    }

    #[test]
    fn short_form_spdu_dispatches_to_acse() {
        let acse = acse_bytes(0, None); // aarq, no user-info
        let mut buf = vec![0x80u8, 0x02];
        buf.extend_from_slice(&acse);
        let n = parse(&buf, MsgDir::Unknown);
        assert_eq!(n.name, "acse");
        assert_eq!(n.fields.iter().find(|(k, _)| k == "kind").unwrap().1, FieldValue::Text("Aarq".into()));
    }

    #[test]
    fn short_form_spdu_rejects_non_per_encoding() {
        let buf = [0x80u8, 0x00, 0x00];
        let n = parse(&buf, MsgDir::Unknown);
        assert!(n.unparsed);
    }

    #[test]
    fn fully_encoded_data_dispatches_acse_by_context_id() {
        let acse = acse_bytes(2, None); // rlrq
        let mut w = BitWriter::new();
        w.write_bits(presentation_context::ACSE_APDU, 2);
        w.write_bits(0, 6);
        w.write_bits(acse.len() as u32, 8);
        for b in &acse {
            w.write_bits(*b as u32, 8);
        }
        let buf = w.into_bytes();
        let n = parse(&buf, MsgDir::Unknown);
        assert_eq!(n.name, "fully_encoded_data");
        assert_eq!(n.children[0].name, "acse");
    }

    #[test]
    fn empty_buffer_is_unparsed() {
        assert!(parse(&[], MsgDir::Unknown).unparsed);
    }
}
