//! AVLC (Aviation VHF Link Control) frame layer (component H) and its
//! upper-protocol dispatcher.
//!
//! Grounded on `original_source/src/avlc.c`: two 4-byte DLC addresses,
//! an 8-bit LCF classified into I/S/U frames, and an FCS-checked
//! payload dispatched to XID, ACARS, or X.25 depending on the control
//! field and payload prefix (spec.md §4.H).

pub mod acars;
pub mod xid;

use crate::config::{Config, MsgFilter};
use crate::crc::verify_fcs;
use crate::error::{Result, Vdl2Error};
use crate::tree::{FieldValue, Node};
use crate::x25;

/// Semantic type of a 24-bit DLC address, derived from its 3-bit type
/// subfield (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrType {
    /// Reserved / unused type code.
    Reserved,
    /// Aircraft station.
    Aircraft,
    /// Ground station, administrative role (e.g. airline ops).
    GroundAdmin,
    /// Ground station, delegated (ATC) role.
    GroundDelegated,
    /// All-stations broadcast address.
    AllStations,
}

impl AddrType {
    fn from_bits(t: u8) -> Self {
        match t & 0x7 {
            1 => AddrType::Aircraft,
            2 => AddrType::GroundDelegated,
            3 => AddrType::GroundAdmin,
            7 => AddrType::AllStations,
            _ => AddrType::Reserved,
        }
    }
}

/// One DLC address: 24-bit station address, its semantic type, and the
/// single C/R-or-status bit carried in the low bit of the on-air field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlcAddr {
    /// 24-bit station address.
    pub addr: u32,
    /// Semantic type of the address.
    pub kind: AddrType,
    /// Status/C-R bit (role depends on whether this is the source or
    /// destination address of the pair).
    pub bit: bool,
}

/// Parse one 4-byte on-air DLC address field (spec.md §4.H): collapse
/// the LSB-shifted layout `(b0>>1)|(b1<<6)|(b2<<13)|((b3&0xFE)<<20)`,
/// then bit-reverse the resulting 28 bits down to the 24-bit address
/// plus 3-bit type plus 1 status bit.
fn parse_addr(bytes: &[u8; 4]) -> DlcAddr {
    let (b0, b1, b2, b3) = (bytes[0] as u32, bytes[1] as u32, bytes[2] as u32, bytes[3] as u32);
    let raw28 = (b0 >> 1) | (b1 << 6) | (b2 << 13) | ((b3 & 0xfe) << 20);
    let rev28 = reverse_bits(raw28, 28);
    let bit = (bytes[0] & 1) != 0;
    let addr = (rev28 >> 4) & 0x00ff_ffff;
    let kind_bits = (rev28 & 0xf) >> 1;
    DlcAddr { addr, kind: AddrType::from_bits(kind_bits as u8), bit }
}

fn reverse_bits(v: u32, n: u32) -> u32 {
    let mut out = 0u32;
    for i in 0..n {
        if v & (1 << i) != 0 {
            out |= 1 << (n - 1 - i);
        }
    }
    out
}

/// Classification of the 8-bit link-control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lcf {
    /// Information frame, carrying a sequenced payload.
    Information {
        /// Send sequence number.
        ns: u8,
        /// Receive sequence number.
        nr: u8,
        /// Poll/final bit.
        pf: bool,
    },
    /// Supervisory frame.
    Supervisory {
        /// Supervisory subtype.
        kind: SType,
        /// Receive sequence number.
        nr: u8,
        /// Poll/final bit.
        pf: bool,
    },
    /// Unnumbered frame.
    Unnumbered {
        /// Unnumbered modifier.
        kind: UType,
        /// Poll/final bit.
        pf: bool,
    },
}

/// Supervisory-frame subtype, from `ctl` bits 2..3 (spec.md §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SType {
    /// Receive ready.
    Rr,
    /// Receive not ready.
    Rnr,
    /// Reject.
    Rej,
    /// Selective reject.
    Srej,
}

/// Unnumbered-frame modifier, from `ctl` bits 2..7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UType {
    /// Unnumbered information.
    Ui,
    /// Disconnect mode.
    Dm,
    /// Disconnect.
    Disc,
    /// Frame reject.
    Frmr,
    /// Exchange identification.
    Xid,
    /// Test.
    Test,
    /// Any other modifier bit pattern not otherwise named.
    Other(u8),
}

fn classify_lcf(ctl: u8) -> Lcf {
    if ctl & 1 == 0 {
        Lcf::Information { ns: (ctl >> 1) & 0x7, nr: (ctl >> 5) & 0x7, pf: (ctl >> 4) & 1 != 0 }
    } else if ctl & 3 == 1 {
        let kind = match (ctl >> 2) & 0x3 {
            0 => SType::Rr,
            1 => SType::Rnr,
            2 => SType::Rej,
            _ => SType::Srej,
        };
        Lcf::Supervisory { kind, nr: (ctl >> 5) & 0x7, pf: (ctl >> 4) & 1 != 0 }
    } else {
        let modifier = (ctl >> 2) & 0x3f;
        let pf = (ctl >> 4) & 1 != 0;
        let kind = match modifier & !0x10 {
            0x00 => UType::Ui,
            0x0f => UType::Dm,
            0x10 => UType::Disc,
            0x11 => UType::Frmr,
            0x2c | 0x3c => UType::Xid,
            0x1c => UType::Test,
            other => UType::Other(other),
        };
        Lcf::Unnumbered { kind, pf }
    }
}

/// Message direction, derived from the source address's semantic type
/// (spec.md §4.H): aircraft sources are downlink, ground sources are
/// uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Aircraft to ground station.
    AirToGround,
    /// Ground station to aircraft.
    GroundToAir,
    /// Ground station to ground station.
    GroundToGround,
    /// Aircraft broadcast to all stations.
    AirToAll,
    /// Ground broadcast to all stations.
    GroundToAll,
    /// Direction could not be classified from the address pair.
    Unknown,
}

impl Direction {
    /// Collapse to the coarse uplink/downlink hint the ICAO APDU
    /// registry (component N) uses to order its candidate types.
    pub fn simplify(self) -> crate::direction::MsgDir {
        use crate::direction::MsgDir;
        match self {
            Direction::AirToGround | Direction::AirToAll => MsgDir::Downlink,
            Direction::GroundToAir | Direction::GroundToAll => MsgDir::Uplink,
            Direction::GroundToGround | Direction::Unknown => MsgDir::Unknown,
        }
    }
}

fn derive_direction(src: AddrType, dst: AddrType) -> Direction {
    use AddrType::*;
    match (src, dst) {
        (Aircraft, AllStations) => Direction::AirToAll,
        (Aircraft, GroundAdmin | GroundDelegated) => Direction::AirToGround,
        (GroundAdmin | GroundDelegated, AllStations) => Direction::GroundToAll,
        (GroundAdmin | GroundDelegated, Aircraft) => Direction::GroundToAir,
        (GroundAdmin | GroundDelegated, GroundAdmin | GroundDelegated) => Direction::GroundToGround,
        _ => Direction::Unknown,
    }
}

fn direction_allowed(dir: Direction, filter: &MsgFilter) -> bool {
    match dir {
        Direction::AirToGround => filter.air2gnd,
        Direction::GroundToAir => filter.gnd2air,
        Direction::GroundToGround => filter.gnd2gnd,
        Direction::AirToAll => filter.air2all,
        Direction::GroundToAll => filter.gnd2all,
        Direction::Unknown => true,
    }
}

/// A parsed AVLC frame, prior to upper-layer dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvlcFrame<'a> {
    /// Destination DLC address.
    pub dst: DlcAddr,
    /// Source DLC address.
    pub src: DlcAddr,
    /// Classified link-control field.
    pub lcf: Lcf,
    /// Payload (everything between the LCF byte and the trailing FCS).
    pub payload: &'a [u8],
    /// Message direction derived from the address pair.
    pub direction: Direction,
}

/// Parse a raw AVLC frame: two 4-byte addresses, one LCF byte, payload,
/// then verify (and strip) the trailing 2-byte FCS.
pub fn parse_frame(frame: &[u8]) -> Result<AvlcFrame<'_>> {
    const MIN_LEN: usize = 4 + 4 + 1 + 2;
    if frame.len() < MIN_LEN {
        return Err(Vdl2Error::too_short(frame.len(), MIN_LEN));
    }
    if !verify_fcs(frame) {
        return Err(Vdl2Error::BadFcs);
    }
    let body = &frame[..frame.len() - 2];
    let dst = parse_addr(body[0..4].try_into().unwrap());
    let src = parse_addr(body[4..8].try_into().unwrap());
    let ctl = body[8];
    let lcf = classify_lcf(ctl);
    let payload = &body[9..];
    let direction = derive_direction(src.kind, dst.kind);
    Ok(AvlcFrame { dst, src, lcf, payload, direction })
}

fn addr_field(n: &mut Node, prefix: &str, a: &DlcAddr) {
    n.push(format!("{prefix}_addr"), FieldValue::Int(a.addr as i64));
    n.push(format!("{prefix}_type"), FieldValue::Text(format!("{:?}", a.kind)));
}

/// Decode one raw AVLC frame into a [`Node`] tree, dispatching the
/// payload to XID/ACARS/X.25 per spec.md §4.H, honoring `cfg`'s message
/// filter (dropped messages still increment `stats`). Single-shot
/// convenience wrapper: fragmented X.25 DATA packets get their own
/// throwaway reassembly table, so a session split across calls to this
/// function never completes (use [`decode_frame_with_table`] from the
/// decoder thread, which keeps one table alive across frames).
pub fn decode_frame(frame: &[u8], cfg: &Config, stats: &crate::stats::Stats) -> Option<Node> {
    let mut table = x25::SessionTable::new(cfg.reassembly_cleanup_interval);
    decode_frame_with_table(frame, cfg, stats, &mut table, 0, 0)
}

/// Decode one raw AVLC frame, threading a caller-owned X.25 reassembly
/// table through to the network layer (spec.md §4.P, §5: "owned by the
/// decoder thread"). `channel_freq` and `timestamp_sec` key and time-
/// stamp any fragment this frame contributes to that table.
pub fn decode_frame_with_table(
    frame: &[u8],
    cfg: &Config,
    stats: &crate::stats::Stats,
    table: &mut x25::SessionTable,
    channel_freq: u32,
    timestamp_sec: i64,
) -> Option<Node> {
    let parsed = match parse_frame(frame) {
        Ok(p) => p,
        Err(e) => {
            crate::stats::Stats::incr(&stats.avlc_fcs_fail);
            log::warn!("avlc: {e}");
            return Some(Node::unparsed("avlc", frame, e.to_string()));
        }
    };
    crate::stats::Stats::incr(&stats.avlc_fcs_ok);

    let mut node = Node::new("avlc");
    addr_field(&mut node, "dst", &parsed.dst);
    addr_field(&mut node, "src", &parsed.src);
    node.push("direction", FieldValue::Text(format!("{:?}", parsed.direction)));

    let (is_gsif, msg_class_ok) = classify_and_filter(&parsed, cfg);
    node.push("lcf", FieldValue::Text(describe_lcf(&parsed.lcf)));
    if is_gsif {
        node.push("msg_type", FieldValue::Text("GSIF".into()));
    }

    if !msg_class_ok || !direction_allowed(parsed.direction, &cfg.filter) {
        crate::stats::Stats::incr(&stats.filtered_out);
        return None;
    }

    match parsed.lcf {
        Lcf::Unnumbered { kind: UType::Xid, .. } => {
            let child = match xid::parse(parsed.payload) {
                Ok(x) => xid::to_node(&x),
                Err(e) => Node::unparsed("xid", parsed.payload, e.to_string()),
            };
            node.child(child);
        }
        Lcf::Information { .. } => {
            let child = if parsed.payload.starts_with(&[0xff, 0xff, 0x01]) {
                match acars::parse(&parsed.payload[3..]) {
                    Ok(m) => acars::to_node(&m),
                    Err(e) => Node::unparsed("acars", parsed.payload, e.to_string()),
                }
            } else {
                match x25::parse(parsed.payload) {
                    Ok(p) => x25::to_node_with_context(
                        &p,
                        table,
                        channel_freq,
                        timestamp_sec,
                        cfg.reassembly_timeout_sec,
                        parsed.direction.simplify(),
                    ),
                    Err(e) => Node::unparsed("x25", parsed.payload, e.to_string()),
                }
            };
            node.child(child);
        }
        Lcf::Supervisory { .. } => {}
    }
    Some(node)
}

fn describe_lcf(lcf: &Lcf) -> String {
    match lcf {
        Lcf::Information { ns, nr, pf } => format!("I ns={ns} nr={nr} pf={pf}"),
        Lcf::Supervisory { kind, nr, pf } => format!("{kind:?} nr={nr} pf={pf}"),
        Lcf::Unnumbered { kind, pf } => format!("{kind:?} pf={pf}"),
    }
}

/// Classify a frame as GSIF (XID with no connection-management
/// parameter, per spec.md §4.I) and decide which filter bit governs
/// whether it should be kept.
fn classify_and_filter(parsed: &AvlcFrame, cfg: &Config) -> (bool, bool) {
    match parsed.lcf {
        Lcf::Unnumbered { kind: UType::Xid, .. } => {
            let is_gsif = xid::parse(parsed.payload).map(|x| x.is_gsif()).unwrap_or(false);
            let ok = if is_gsif { cfg.filter.gsif } else { cfg.filter.xid };
            (is_gsif, ok)
        }
        Lcf::Information { .. } => {
            let ok = if parsed.payload.starts_with(&[0xff, 0xff, 0x01]) {
                cfg.filter.acars
            } else {
                cfg.filter.x25
            };
            (false, ok)
        }
        _ => (false, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc16_ccitt_reversed;

    fn mkaddr(addr24: u32, kind: u8, bit: bool) -> [u8; 4] {
        let rev28 = ((addr24 & 0x00ff_ffff) << 4) | ((kind as u32 & 0x7) << 1) | (bit as u32);
        let raw28 = reverse_bits(rev28, 28);
        let b0 = ((raw28 & 0x3f) << 1) as u8 | (bit as u8);
        let b1 = ((raw28 >> 6) & 0x7f) as u8;
        let b2 = ((raw28 >> 13) & 0x7f) as u8;
        let b3 = ((raw28 >> 20) & 0x7f) as u8;
        [b0, b1, b2, b3]
    }

    #[test]
    fn address_roundtrips_through_parse() {
        let bytes = mkaddr(0x123456, 1, true);
        let a = parse_addr(&bytes);
        assert_eq!(a.addr, 0x123456);
        assert_eq!(a.kind, AddrType::Aircraft);
    }

    #[test]
    fn classify_information_vs_supervisory_vs_unnumbered() {
        assert!(matches!(classify_lcf(0b0000_0000), Lcf::Information { .. }));
        assert!(matches!(classify_lcf(0b0000_0001), Lcf::Supervisory { .. }));
        assert!(matches!(classify_lcf(0b0000_0011), Lcf::Unnumbered { .. }));
    }

    fn build_frame(dst: [u8; 4], src: [u8; 4], ctl: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&dst);
        body.extend_from_slice(&src);
        body.push(ctl);
        body.extend_from_slice(payload);
        let fcs = crc16_ccitt_reversed(&body);
        body.extend_from_slice(&fcs.to_le_bytes());
        body
    }

    #[test]
    fn bad_fcs_is_rejected() {
        let dst = mkaddr(1, 3, false);
        let src = mkaddr(2, 1, true);
        let mut frame = build_frame(dst, src, 0x03, &[0x82]);
        let n = frame.len();
        frame[n - 1] ^= 0xff;
        assert!(parse_frame(&frame).is_err());
    }

    #[test]
    fn direction_derives_from_address_types() {
        assert_eq!(derive_direction(AddrType::Aircraft, AddrType::GroundAdmin), Direction::AirToGround);
        assert_eq!(derive_direction(AddrType::GroundDelegated, AddrType::Aircraft), Direction::GroundToAir);
        assert_eq!(derive_direction(AddrType::Aircraft, AddrType::AllStations), Direction::AirToAll);
    }

    #[test]
    fn decode_frame_dispatches_xid() {
        let dst = mkaddr(1, 3, false);
        let src = mkaddr(2, 1, true);
        // Minimal XID: format id 0x82, then an empty public group.
        let payload = [0x2c, 0x82, 0x80, 0x00, 0x00];
        let frame = build_frame(dst, src, payload[0], &payload[1..]);
        let cfg = Config::new(1_050_000, 10, 136_000_000, vec![136_000_000], "GND1");
        let stats = crate::stats::Stats::default();
        let node = decode_frame(&frame, &cfg, &stats).unwrap();
        assert_eq!(node.children[0].name, "xid");
    }
}
