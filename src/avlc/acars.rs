//! ACARS message parser, carried inside AVLC I-frames whose payload is
//! prefixed `FF FF 01` (component J).
//!
//! Grounded on `original_source/src/acars.c`: fixed-width header
//! fields over a 7-bit (odd-parity, unverified) channel, a 4-byte
//! trailer (`ETX`/`ETB` + CRC + `DEL`), and an optional application
//! layer (FANS-1/A ADS-C text embedded in labels `A6`/`B6`/`H1`).

use crate::adsc;
use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};

/// Minimum total ACARS message length (header + text + 4-byte trailer).
pub const MIN_ACARS_LEN: usize = 16;
/// Maximum text length retained (`ACARSMSG_BUFSIZE - 1`).
pub const ACARS_TEXT_MAX: usize = 2047;

/// One parsed ACARS message.
#[derive(Debug, Clone, PartialEq)]
pub struct AcarsMsg {
    /// Mode character.
    pub mode: char,
    /// Aircraft registration, 7 characters.
    pub reg: String,
    /// Acknowledgement character (`!` printed for `NAK`/`0x15`).
    pub ack: char,
    /// Two-character label.
    pub label: String,
    /// Block id character (space printed for `0x00`).
    pub block_id: char,
    /// Transmission-start / block-status byte.
    pub bs: u8,
    /// Message number (absent when `bs == 0x03` or ground-originated short form).
    pub msg_no: Option<String>,
    /// Flight id (absent under the same conditions as `msg_no`).
    pub flight_id: Option<String>,
    /// Free-form message text.
    pub text: String,
    /// Decoded ADS-C-over-ACARS application payload, if any.
    pub adsc: Option<adsc::AdscMsg>,
}

const ETX: u8 = 0x83;
const ETB: u8 = 0x97;
const DEL: u8 = 0x7f;

fn strip_parity(b: u8) -> u8 {
    b & 0x7f
}

/// Parse an ACARS message from the AVLC payload following the `FF FF
/// 01` application prefix (already stripped by the caller).
pub fn parse(buf: &[u8]) -> Result<AcarsMsg> {
    if buf.len() < MIN_ACARS_LEN {
        return Err(Vdl2Error::too_short(buf.len(), MIN_ACARS_LEN));
    }
    if buf[buf.len() - 1] != DEL {
        return Err(Vdl2Error::Parse("acars: missing trailing DEL".into()));
    }
    let trailer_byte = buf[buf.len() - 4];
    if trailer_byte != ETX && trailer_byte != ETB {
        return Err(Vdl2Error::Parse("acars: missing ETX/ETB trailer".into()));
    }
    let body = &buf[..buf.len() - 4];
    let stripped: Vec<u8> = body.iter().map(|&b| strip_parity(b)).collect();

    let mut i = 0usize;
    let mode = stripped[i] as char;
    i += 1;
    let reg: String = stripped[i..i + 7].iter().map(|&b| b as char).collect();
    i += 7;
    let ack_raw = stripped[i];
    let ack = if ack_raw == 0x15 { '!' } else { ack_raw as char };
    i += 1;
    let label_raw = &stripped[i..i + 2];
    let label = format!(
        "{}{}",
        label_raw[0] as char,
        if label_raw[1] == DEL { 'd' } else { label_raw[1] as char }
    );
    i += 2;
    let block_id_raw = stripped[i];
    let block_id = if block_id_raw == 0x00 { ' ' } else { block_id_raw as char };
    i += 1;
    let bs = stripped[i];
    i += 1;

    if bs == 0x03 {
        return Ok(AcarsMsg {
            mode,
            reg,
            ack,
            label,
            block_id,
            bs,
            msg_no: None,
            flight_id: None,
            text: String::new(),
            adsc: None,
        });
    }

    let (msg_no, flight_id) = if (mode as u8) <= b'Z' && (block_id as u8) <= b'9' {
        if stripped.len() < i + 10 {
            return Err(Vdl2Error::TruncatedField { what: "acars msg_no/flight_id" });
        }
        let msg_no: String = stripped[i..i + 4].iter().map(|&b| b as char).collect();
        let flight_id: String = stripped[i + 4..i + 10].iter().map(|&b| b as char).collect();
        i += 10;
        (Some(msg_no), Some(flight_id))
    } else {
        (None, None)
    };

    let mut text: String = stripped[i..].iter().map(|&b| b as char).collect();
    text.truncate(ACARS_TEXT_MAX);

    let adsc = maybe_decode_adsc(&label, &reg, &text);

    Ok(AcarsMsg { mode, reg, ack, label, block_id, bs, msg_no, flight_id, text, adsc })
}

/// FANS-1/A ADS-C text sentinel, per spec.md §4.J: `.ADS <reg> <hex>`.
fn maybe_decode_adsc(label: &str, reg: &str, text: &str) -> Option<adsc::AdscMsg> {
    if !matches!(label, "A6" | "B6" | "H1") {
        return None;
    }
    let rest = text.strip_prefix(".ADS ")?;
    if !rest.starts_with(reg.trim_end()) {
        return None;
    }
    let hex_part = rest[reg.trim_end().len()..].trim_start();
    let bytes = decode_hex(hex_part)?;
    adsc::parse_msg(&bytes).ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 || s.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

/// Build a [`Node`] for a parsed ACARS message.
pub fn to_node(msg: &AcarsMsg) -> Node {
    let mut n = Node::new("acars");
    n.push("mode", FieldValue::Text(msg.mode.to_string()));
    // Per design note §9(b): reg/flight only printed when mode < ']',
    // preserved as-is from the original with no further rationale.
    if (msg.mode as u8) < b']' {
        n.push("reg", FieldValue::Text(msg.reg.clone()));
        if let Some(f) = &msg.flight_id {
            n.push("flight_id", FieldValue::Text(f.clone()));
        }
    }
    n.push("ack", FieldValue::Text(msg.ack.to_string()));
    n.push("label", FieldValue::Text(msg.label.clone()));
    n.push("block_id", FieldValue::Text(msg.block_id.to_string()));
    if msg.bs == 0x03 {
        n.push("msg_type", FieldValue::Text("ACARS_NODATA".into()));
        return n;
    }
    if let Some(m) = &msg.msg_no {
        n.push("msg_no", FieldValue::Text(m.clone()));
    }
    n.push("text", FieldValue::Text(msg.text.clone()));
    if let Some(adsc) = &msg.adsc {
        n.child(adsc::to_node(adsc));
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(mode: char, reg: &str, ack: u8, label: &str, block_id: u8, bs: u8, rest: &[u8]) -> Vec<u8> {
        let mut out = vec![mode as u8, ];
        out.extend(reg.as_bytes());
        out.push(ack);
        out.extend(label.as_bytes());
        out.push(block_id);
        out.push(bs);
        out.extend_from_slice(rest);
        out.push(ETX);
        out.extend_from_slice(&[0, 0]); // fake CRC, unverified per spec
        out.push(DEL);
        out
    }

    #[test]
    fn no_data_message_has_empty_text() {
        let buf = build('2', "D-AIBC ", 0x15, "_d", b'1', 0x03, b"");
        let msg = parse(&buf).unwrap();
        assert_eq!(msg.ack, '!');
        assert_eq!(msg.bs, 0x03);
        assert_eq!(msg.text, "");
        assert!(msg.msg_no.is_none());
    }

    #[test]
    fn normal_message_parses_msgno_and_flight_and_text() {
        let buf = build('2', "D-AIBC ", b'A', "H1", b'1', b'A', b"0001LH123 hello world");
        let msg = parse(&buf).unwrap();
        assert_eq!(msg.msg_no.as_deref(), Some("0001"));
        assert_eq!(msg.flight_id.as_deref(), Some("LH123 "));
        assert_eq!(msg.text, "hello world");
    }

    #[test]
    fn ground_originated_short_form_skips_msgno_flight() {
        // mode above 'Z' => skip msgno/flight subfields.
        let buf = build('_', "D-AIBC ", b'A', "H1", b'1', b'A', b"short form text");
        let msg = parse(&buf).unwrap();
        assert!(msg.msg_no.is_none());
        assert_eq!(msg.text, "short form text");
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(parse(&[0u8; 5]).is_err());
    }

    #[test]
    fn missing_trailer_is_rejected() {
        let mut buf = build('2', "D-AIBC ", b'A', "H1", b'1', b'A', b"text");
        let n = buf.len();
        buf[n - 4] = 0x00; // neither ETX nor ETB
        assert!(parse(&buf).is_err());
    }
}
