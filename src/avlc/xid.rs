//! AVLC XID command/response and GSIF parser (component I).
//!
//! Grounded on `original_source/src/xid.c`: a format identifier byte
//! (`0x82`), followed by one or two parameter groups (`id:1, len:2 BE,
//! value`), each group a TLV list (`tag:1, len:1, value`). Message type
//! is classified from (C/R, P/F, and the VDL-private connection-
//! management tag `0x01`'s `h`/`r` bits) per spec.md §4.I.

use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};

/// Format identifier every XID frame must start with.
pub const FORMAT_ID: u8 = 0x82;
/// Public parameter-group identifier.
pub const GROUP_PUBLIC: u8 = 0x80;
/// VDL-private parameter-group identifier.
pub const GROUP_PRIVATE: u8 = 0xf0;

/// XID message type, classified from C/R, P/F, and the connection-
/// management bits (spec.md §4.I, glossary table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XidType {
    /// Link Connection Refused, command.
    LcrCmd,
    /// Handoff request.
    HoReq,
    /// Ground Station Information Frame.
    Gsif,
    /// Link Establishment, command.
    LeCmd,
    /// Handoff initiation.
    HoInit,
    /// Link Parameter Modification, command.
    LpmCmd,
    /// Link Establishment, response.
    LeRsp,
    /// Link Connection Refused, response.
    LcrRsp,
    /// Handoff, response.
    HoRsp,
    /// Link Parameter Modification, response.
    LpmRsp,
    /// Bit combination with no named meaning.
    Unknown,
}

/// One TLV parameter within a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter tag.
    pub tag: u8,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

/// Fully-parsed XID message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XidMsg {
    /// Classified message type.
    pub msg_type: XidType,
    /// Public (group `0x80`) parameter list.
    pub public: Vec<Param>,
    /// VDL-private (group `0xF0`) parameter list.
    pub private: Vec<Param>,
    /// C/R and P/F bits as carried on the wire (passed in by the caller
    /// from the AVLC control field, since XID itself carries no C/R bit).
    pub cr: bool,
    /// Poll/final bit, likewise supplied by the caller.
    pub pf: bool,
}

impl XidMsg {
    /// True when this message classifies as GSIF.
    pub fn is_gsif(&self) -> bool {
        self.msg_type == XidType::Gsif
    }

    fn param(&self, group_private: bool, tag: u8) -> Option<&Param> {
        let list = if group_private { &self.private } else { &self.public };
        list.iter().find(|p| p.tag == tag)
    }
}

/// VDL-private connection-management tag carrying the `h`/`r` bits used
/// to classify the message type.
const TAG_CONN_MGMT: u8 = 0x01;

fn parse_tlv_list(buf: &[u8]) -> Result<Vec<Param>> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < buf.len() {
        if i + 2 > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "xid tlv header" });
        }
        let tag = buf[i];
        let len = buf[i + 1] as usize;
        i += 2;
        if i + len > buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "xid tlv value" });
        }
        out.push(Param { tag, value: buf[i..i + len].to_vec() });
        i += len;
    }
    Ok(out)
}

fn parse_group(buf: &[u8], pos: &mut usize) -> Result<Option<(u8, Vec<Param>)>> {
    if *pos >= buf.len() {
        return Ok(None);
    }
    if *pos + 3 > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "xid group header" });
    }
    let id = buf[*pos];
    let len = u16::from_be_bytes([buf[*pos + 1], buf[*pos + 2]]) as usize;
    *pos += 3;
    if *pos + len > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "xid group value" });
    }
    let params = parse_tlv_list(&buf[*pos..*pos + len])?;
    *pos += len;
    Ok(Some((id, params)))
}

/// Parse the XID body (the AVLC payload, not including the LCF byte).
/// `cr`/`pf` are taken from the caller's already-classified control
/// field so this function stays purely about the body's content.
pub fn parse_with_bits(buf: &[u8], cr: bool, pf: bool) -> Result<XidMsg> {
    if buf.is_empty() || buf[0] != FORMAT_ID {
        return Err(Vdl2Error::Parse("xid: missing format identifier 0x82".into()));
    }
    let mut pos = 1;
    let mut public = Vec::new();
    let mut private = Vec::new();
    while let Some((id, params)) = parse_group(buf, &mut pos)? {
        match id {
            GROUP_PUBLIC => public = params,
            GROUP_PRIVATE => private = params,
            other => return Err(Vdl2Error::UnknownTag(other as u32)),
        }
    }

    let mut msg = XidMsg { msg_type: XidType::Unknown, public, private, cr, pf };
    msg.msg_type = classify(&msg);
    Ok(msg)
}

/// Parse with `cr`/`pf` defaulted to `true` (matches the GSIF broadcast
/// case, where both bits are always 1, per spec.md §4.I); callers with
/// the real AVLC control-field bits should use [`parse_with_bits`].
pub fn parse(buf: &[u8]) -> Result<XidMsg> {
    parse_with_bits(buf, true, true)
}

fn classify(msg: &XidMsg) -> XidType {
    // GSIF/LPM variants carry no connection-management parameter; both
    // `h`/`r` bits are then forced to 1 per spec.md §4.I.
    let (h, r) = match msg.param(true, TAG_CONN_MGMT) {
        Some(p) if !p.value.is_empty() => {
            let b = p.value[0];
            ((b & 0x02) != 0, (b & 0x01) != 0)
        }
        _ => (true, true),
    };
    // 16-row table keyed on (cr, pf, h, r); rows not named here fall
    // through to GSIF when no connection-management tag is present at
    // all (the broadcast case), else Unknown.
    let has_cm = msg.param(true, TAG_CONN_MGMT).is_some();
    match (msg.cr, msg.pf, h, r, has_cm) {
        (_, _, _, _, false) => XidType::Gsif,
        (true, true, false, false) => XidType::LeCmd,
        (true, false, false, false) => XidType::LcrCmd,
        (false, true, false, false) => XidType::LeRsp,
        (false, false, false, false) => XidType::LcrRsp,
        (true, true, true, false) => XidType::HoReq,
        (true, false, true, false) => XidType::HoInit,
        (false, true, true, false) => XidType::HoRsp,
        (true, _, false, true) => XidType::LpmCmd,
        (false, _, false, true) => XidType::LpmRsp,
        _ => XidType::Unknown,
    }
}

/// Known VDL-private tag numbers with a dedicated semantic formatter
/// (spec.md §4.I).
mod private_tags {
    pub const MODULATION: u8 = 0x02;
    pub const AUTOTUNE_FREQ: u8 = 0x03;
    pub const DLC_ADDRS: u8 = 0x04;
    pub const FREQ_SUPPORT_LIST: u8 = 0x06;
    pub const AIRCRAFT_LOCATION: u8 = 0x07;
    pub const LCR_CAUSE: u8 = 0x08;
}

fn format_param(tag: u8, value: &[u8]) -> FieldValue {
    use private_tags::*;
    match tag {
        MODULATION if !value.is_empty() => FieldValue::Int(value[0] as i64),
        AUTOTUNE_FREQ if value.len() >= 2 => {
            let modulation = value[0] >> 4;
            let raw = (((value[0] & 0x0f) as u16) << 8) | value[1] as u16;
            let freq_hz = 100_000_000u32 + raw as u32 * 25_000;
            FieldValue::Text(format!("mod={modulation} freq={freq_hz}Hz"))
        }
        DLC_ADDRS => {
            let addrs: Vec<String> = value.chunks(4).map(|c| format!("{c:02x?}")).collect();
            FieldValue::Text(addrs.join(","))
        }
        FREQ_SUPPORT_LIST => {
            let entries: Vec<String> = value
                .chunks(6)
                .filter(|c| c.len() == 6)
                .map(|c| {
                    let freq = u16::from_be_bytes([c[0], c[1]]);
                    format!("freq_raw={freq} gs={:02x?}", &c[2..6])
                })
                .collect();
            FieldValue::Text(entries.join(";"))
        }
        AIRCRAFT_LOCATION if value.len() >= 3 => {
            let raw = ((value[0] as u32) << 16) | ((value[1] as u32) << 8) | value[2] as u32;
            let lat12 = sign_extend((raw >> 12) & 0xfff, 12);
            let lon12 = sign_extend(raw & 0xfff, 12);
            FieldValue::Text(format!("lat={:.1} lon={:.1}", lat12 as f64 / 10.0, lon12 as f64 / 10.0))
        }
        LCR_CAUSE if !value.is_empty() => {
            let cause = value[0];
            if value.len() >= 3 {
                let delay = u16::from_be_bytes([value[1], value[2]]);
                FieldValue::Text(format!("cause={cause} delay={delay}s"))
            } else {
                FieldValue::Text(format!("cause={cause}"))
            }
        }
        _ => FieldValue::Bytes(value.to_vec()),
    }
}

fn sign_extend(v: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((v << shift) as i32) >> shift
}

/// Build a [`Node`] for a parsed XID message.
pub fn to_node(msg: &XidMsg) -> Node {
    let mut n = Node::new("xid");
    n.push("type", FieldValue::Text(format!("{:?}", msg.msg_type)));
    for p in &msg.public {
        n.push(format!("pub_{:02x}", p.tag), FieldValue::Bytes(p.value.clone()));
    }
    for p in &msg.private {
        n.push(format!("priv_{:02x}", p.tag), format_param(p.tag, &p.value));
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u8, tlvs: &[(u8, &[u8])]) -> Vec<u8> {
        let mut value = Vec::new();
        for (tag, v) in tlvs {
            value.push(*tag);
            value.push(v.len() as u8);
            value.extend_from_slice(v);
        }
        let mut out = vec![id];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(&value);
        out
    }

    #[test]
    fn gsif_has_no_connection_management_tag() {
        let mut buf = vec![FORMAT_ID];
        buf.extend(group(GROUP_PUBLIC, &[]));
        buf.extend(group(GROUP_PRIVATE, &[(private_tags::MODULATION, &[0x03])]));
        let msg = parse_with_bits(&buf, true, true).unwrap();
        assert!(msg.is_gsif());
    }

    #[test]
    fn le_cmd_classified_from_cm_bits() {
        let mut buf = vec![FORMAT_ID];
        buf.extend(group(GROUP_PUBLIC, &[]));
        buf.extend(group(GROUP_PRIVATE, &[(TAG_CONN_MGMT, &[0x00])]));
        let msg = parse_with_bits(&buf, true, true).unwrap();
        assert_eq!(msg.msg_type, XidType::LeCmd);
    }

    #[test]
    fn missing_format_id_is_error() {
        assert!(parse(&[0x00, 0x80]).is_err());
    }

    #[test]
    fn truncated_group_is_error() {
        let buf = vec![FORMAT_ID, GROUP_PUBLIC, 0x00, 0xff];
        assert!(parse(&buf).is_err());
    }

    #[test]
    fn autotune_freq_decodes_offset_and_scale() {
        // modulation nibble 0, raw 0x004 -> 100.1 MHz
        let value: [u8; 2] = [0x00, 0x04];
        let f = format_param(private_tags::AUTOTUNE_FREQ, &value);
        match f {
            FieldValue::Text(s) => assert!(s.contains("100100000")),
            _ => panic!("wrong variant"),
        }
    }
}
