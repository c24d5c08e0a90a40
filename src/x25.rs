//! X.25 packet layer and SNDCF dispatch (component K).
//!
//! Grounded on spec.md §4.K (the `x25.c`/`x25.h` pair themselves were
//! not retrieved into `original_source/`, so the field layout follows
//! the spec text directly): a 2-byte GFI/LCN header, a packet-type
//! byte classifying S/DATA/control packets, and (for CALL packets) an
//! address block, facilities TLV list, and an SNDCF compression block
//! preceding the SN-protocol-tagged user data.

use crate::clnp;
use crate::error::{Result, Vdl2Error};
use crate::icao;
use crate::reassembly::{FragmentInfo, ReasmStatus, Reassembly};
use crate::tree::{FieldValue, Node};

/// Reassembly table keyed on (channel frequency, logical channel
/// number) — the per-session key an X.25 DATA stream shares across
/// fragments on one AVLC channel (spec.md §4.K/§4.P). Owned by the
/// AVLC decoder thread (§5: the only place that touches it) and
/// threaded through explicitly rather than kept as global state.
pub type SessionTable = Reassembly<(u32, u8)>;

/// SN-protocol identifiers dispatched after SNDCF decompression
/// (spec.md §4.K).
pub mod sn_proto {
    /// CLNP, full header.
    pub const CLNP_FULL: u8 = 0x81;
    /// CLNP, compressed initial header.
    pub const CLNP_COMPRESSED: u8 = 0x01;
    /// ES-IS.
    pub const ES_IS: u8 = 0x82;
    /// IDRP.
    pub const IDRP: u8 = 0x85;
}

/// Classified X.25 packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Supervisory frame (RR/REJ).
    Supervisory {
        /// Receive ready when true, reject otherwise.
        rr: bool,
        /// Receive sequence number.
        rseq: u8,
    },
    /// Data packet.
    Data {
        /// Send sequence number.
        sseq: u8,
        /// Receive sequence number.
        rseq: u8,
        /// More-data (fragmentation) bit.
        more: bool,
    },
    /// Call request.
    CallRequest,
    /// Call accepted.
    CallAccepted,
    /// Clear request.
    ClearRequest,
    /// Clear confirm.
    ClearConfirm,
    /// Reset request.
    ResetRequest,
    /// Reset confirm.
    ResetConfirm,
    /// Restart request.
    RestartRequest,
    /// Restart confirm.
    RestartConfirm,
    /// Diagnostic.
    Diagnostic,
}

fn classify_type(b: u8) -> PacketType {
    if b & 1 == 1 {
        PacketType::Supervisory { rr: (b >> 2) & 0x3 == 0, rseq: (b >> 5) & 0x7 }
    } else if b & 1 == 0 && b & 0x10 != 0x10 {
        // bit pattern xxx xx0: DATA, unless it matches one of the fixed
        // control-packet byte values handled below.
        match b {
            0x0b => PacketType::CallRequest,
            0x0f => PacketType::CallAccepted,
            0x13 => PacketType::ClearRequest,
            0x17 => PacketType::ClearConfirm,
            0x1b => PacketType::ResetRequest,
            0x1f => PacketType::ResetConfirm,
            0xfb => PacketType::RestartRequest,
            0xff => PacketType::RestartConfirm,
            0xf1 => PacketType::Diagnostic,
            _ => PacketType::Data { sseq: (b >> 1) & 0x7, more: (b >> 4) & 1 != 0, rseq: (b >> 5) & 0x7 },
        }
    } else {
        match b {
            0x0b => PacketType::CallRequest,
            0x0f => PacketType::CallAccepted,
            0x13 => PacketType::ClearRequest,
            0x17 => PacketType::ClearConfirm,
            0x1b => PacketType::ResetRequest,
            0x1f => PacketType::ResetConfirm,
            0xfb => PacketType::RestartRequest,
            0xff => PacketType::RestartConfirm,
            0xf1 => PacketType::Diagnostic,
            _ => PacketType::Data { sseq: (b >> 1) & 0x7, more: (b >> 4) & 1 != 0, rseq: (b >> 5) & 0x7 },
        }
    }
}

/// One decoded X.25 address (variable-length nibble-packed decimal digits).
fn parse_digits(buf: &[u8], pos: &mut usize, ndigits: usize) -> Result<String> {
    let nbytes = ndigits.div_ceil(2);
    if *pos + nbytes > buf.len() {
        return Err(Vdl2Error::TruncatedField { what: "x25 address digits" });
    }
    let mut s = String::with_capacity(ndigits);
    for i in 0..ndigits {
        let byte = buf[*pos + i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0xf };
        s.push(std::char::from_digit(nibble as u32, 16).unwrap_or('?'));
    }
    *pos += nbytes;
    Ok(s)
}

/// Fully-parsed X.25 packet.
#[derive(Debug, Clone, PartialEq)]
pub struct X25Packet {
    /// General format identifier (should be modulo-8, value `1`).
    pub gfi: u8,
    /// Logical channel group number.
    pub chan_group: u8,
    /// Logical channel number.
    pub chan_num: u8,
    /// Classified packet type.
    pub kind: PacketType,
    /// Calling/called addresses, present on CALL packets.
    pub addresses: Option<(String, String)>,
    /// SNDCF compression byte, present on CALL packets.
    pub sndcf_compression: Option<u8>,
    /// SN-protocol id of the user data, if present.
    pub sn_proto: Option<u8>,
    /// User data following the SN-protocol id (or the whole payload on
    /// DATA packets).
    pub user_data: Vec<u8>,
}

/// Parse an X.25 packet from an AVLC I-frame payload.
pub fn parse(buf: &[u8]) -> Result<X25Packet> {
    if buf.len() < 3 {
        return Err(Vdl2Error::too_short(buf.len(), 3));
    }
    let gfi = buf[0] >> 4;
    if gfi != 1 {
        return Err(Vdl2Error::Parse(format!("x25: non-modulo-8 gfi {gfi}")));
    }
    let chan_group = buf[0] & 0xf;
    let chan_num = buf[1];
    let kind = classify_type(buf[2]);

    let mut pos = 3;
    let mut addresses = None;
    let mut sndcf_compression = None;

    if matches!(kind, PacketType::CallRequest | PacketType::CallAccepted) {
        if pos >= buf.len() {
            return Err(Vdl2Error::TruncatedField { what: "x25 address length byte" });
        }
        let lenbyte = buf[pos];
        pos += 1;
        let called_len = (lenbyte >> 4) as usize;
        let calling_len = (lenbyte & 0xf) as usize;
        let called = parse_digits(buf, &mut pos, called_len)?;
        let calling = parse_digits(buf, &mut pos, calling_len)?;
        addresses = Some((called, calling));

        if pos < buf.len() {
            let fac_len = buf[pos] as usize;
            pos += 1;
            if pos + fac_len > buf.len() {
                return Err(Vdl2Error::TruncatedField { what: "x25 facilities" });
            }
            pos += fac_len; // facilities TLVs themselves are opaque pass-through here.
        }

        if pos + 3 <= buf.len() && buf[pos] == 0xc1 {
            // SNDCF block: id 0xC1, version, compression byte.
            sndcf_compression = Some(buf[pos + 2]);
            pos += 3;
        }
    }

    let (sn_proto, user_data) = match kind {
        PacketType::Data { .. } => (None, buf[pos..].to_vec()),
        _ => {
            if pos < buf.len() {
                (Some(buf[pos]), buf[pos + 1..].to_vec())
            } else {
                (None, Vec::new())
            }
        }
    };

    Ok(X25Packet { gfi, chan_group, chan_num, kind, addresses, sndcf_compression, sn_proto, user_data })
}

/// Dispatch an SN-protocol payload to the appropriate network-layer
/// decoder (spec.md §4.K). Any SN-protocol id outside the four
/// network-layer ones named in spec.md §4.K is, in practice, ATN
/// upper-layer traffic (CM/CPDLC/ADS-C) riding directly over the
/// X.25/SNDCF connection without a CLNP network-layer wrapper — the
/// same arrangement spec.md §8 scenario 5 (CPDLC uplink reassembled
/// straight off an X.25 DATA stream) exercises — so it is handed to
/// the ICAO APDU classifier (component N) rather than reported
/// unparsed.
fn dispatch_sn(proto: u8, data: &[u8], dir: crate::direction::MsgDir) -> Node {
    match proto {
        sn_proto::CLNP_FULL => clnp::decode_full(data),
        sn_proto::CLNP_COMPRESSED => clnp::decode_compressed(data),
        sn_proto::ES_IS => crate::esis::decode(data),
        sn_proto::IDRP => crate::idrp::decode(data),
        _ => icao::parse(data, dir),
    }
}

/// Build a [`Node`] for a parsed X.25 packet, reassembling fragmented
/// DATA packets (keyed by `channel_freq` + logical channel) before
/// dispatching to the network layer. `table` is the AVLC decoder
/// thread's single reassembly table (spec.md §4.P), passed in rather
/// than held as global state.
pub fn to_node_with_context(
    pkt: &X25Packet,
    table: &mut SessionTable,
    channel_freq: u32,
    timestamp_sec: i64,
    reassembly_timeout_sec: u32,
    dir: crate::direction::MsgDir,
) -> Node {
    let mut n = Node::new("x25");
    n.push("gfi", FieldValue::Int(pkt.gfi as i64));
    n.push("chan", FieldValue::Int(((pkt.chan_group as u32) << 8 | pkt.chan_num as u32) as i64));
    n.push("type", FieldValue::Text(format!("{:?}", pkt.kind)));

    if let Some((called, calling)) = &pkt.addresses {
        n.push("called", FieldValue::Text(called.clone()));
        n.push("calling", FieldValue::Text(calling.clone()));
    }
    if let Some(c) = pkt.sndcf_compression {
        n.push("sndcf_compression", FieldValue::Int(c as i64));
    }

    match pkt.kind {
        PacketType::Data { more, .. } => {
            if let Some(proto) = pkt.sn_proto {
                n.push("sn_proto", FieldValue::Int(proto as i64));
            }
            let key = (channel_freq, pkt.chan_num);
            let already_in_progress = table.collected_len(&key).is_some();
            if !more && !already_in_progress {
                // Single, unfragmented DATA packet: dispatch immediately
                // using the leading octet as the SN-protocol id.
                if !pkt.user_data.is_empty() {
                    let proto = pkt.user_data[0];
                    n.child(dispatch_sn(proto, &pkt.user_data[1..], dir));
                }
                return n;
            }
            let info = FragmentInfo {
                offset: 0, // offset tracking is per-session; the original derives
                // position from sequence number, approximated here via the
                // reassembly table's insertion order (first fragment is at 0).
                data: pkt.user_data.clone(),
                total_pdu_len: usize::MAX, // unknown until the final fragment arrives
                timestamp_sec,
                timeout_sec: reassembly_timeout_sec as i64,
                is_final: !more,
            };
            let status = segment_insert(table, key, info);
            n.push("reassembly", FieldValue::Text(format!("{status:?}")));
            if status == ReasmStatus::Complete {
                if let Some(payload) = table.payload_get(&key) {
                    if !payload.is_empty() {
                        let proto = payload[0];
                        n.child(dispatch_sn(proto, &payload[1..payload.len() - 1], dir));
                    }
                }
            }
        }
        _ => {
            if let Some(proto) = pkt.sn_proto {
                n.push("sn_proto", FieldValue::Int(proto as i64));
                n.child(dispatch_sn(proto, &pkt.user_data, dir));
            }
        }
    }
    n
}

/// Simplified helper: since this decoder sees fragments one at a time
/// with no out-of-band total length, track running offset via a
/// session-local counter rather than the engine's offset validation.
/// Segments always arrive in order on a single AVLC channel thread
/// (§5: "within one channel, bursts are processed in reception
/// order"), so appending at the current collected length is exact.
fn segment_insert(
    table: &mut Reassembly<(u32, u8)>,
    key: (u32, u8),
    mut info: FragmentInfo,
) -> ReasmStatus {
    // Probe the table for how much has already been collected for this
    // key, so the fragment's offset can be computed.
    let offset = table.collected_len(&key).unwrap_or(0);
    info.offset = offset;
    if info.is_final {
        info.total_pdu_len = offset + info.data.len();
    } else {
        // Total length isn't known until the final fragment; use a
        // provisional cap large enough that `BadLen`/`BadOffset` never
        // spuriously trigger on in-progress fragments.
        info.total_pdu_len = usize::MAX / 2;
    }
    table.add_fragment(key, info)
}

/// Build a [`Node`] for a parsed X.25 packet without reassembly context
/// (single-fragment or non-DATA packets only; fragmented DATA packets
/// seen through this path are reported `InProgress`/`Complete` against
/// a throwaway table).
pub fn to_node(pkt: &X25Packet) -> Node {
    let mut table = SessionTable::new(100);
    to_node_with_context(pkt, &mut table, 0, 0, 60, crate::direction::MsgDir::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisory_classified() {
        assert!(matches!(classify_type(0b0000_0001), PacketType::Supervisory { rr: true, .. }));
    }

    #[test]
    fn data_classified_with_more_bit() {
        let b = 0b0001_0000; // more bit set, sseq=0, rseq=0
        assert!(matches!(classify_type(b), PacketType::Data { more: true, .. }));
    }

    #[test]
    fn call_request_parses_addresses_and_sndcf() {
        let mut buf = vec![0x10, 0x01, 0x0b];
        buf.push(0x21); // 2 called digits, 1 calling digit
        buf.push(0x12); // called digits "12"
        buf.push(0x30); // calling digit "3" + pad
        buf.push(0x00); // zero facilities
        buf.extend_from_slice(&[0xc1, 0x01, 0x00]); // sndcf: id, version, compression
        buf.push(sn_proto::CLNP_FULL);
        let pkt = parse(&buf).unwrap();
        assert_eq!(pkt.addresses, Some(("12".into(), "3".into())));
        assert_eq!(pkt.sndcf_compression, Some(0));
        assert_eq!(pkt.sn_proto, Some(sn_proto::CLNP_FULL));
    }

    #[test]
    fn too_short_rejected() {
        assert!(parse(&[0x10, 0x01]).is_err());
    }

    #[test]
    fn non_modulo8_gfi_rejected() {
        assert!(parse(&[0x00, 0x01, 0x03]).is_err());
    }
}
