//! Speculative-decode type registry for ULCS user data (component N).
//!
//! spec.md §1 treats the ATN application schemas (CM/CPDLC/ADS-C) as
//! "an opaque PER decoder driven by a type registry" — the actual
//! ASN.1 module definitions (`CMAircraftMessage`, `ATCDownlinkMessage`,
//! ...) are explicitly out of scope. What this registry reproduces
//! from `original_source/src/icao.c`'s `decode_arbitrary_payload` is
//! the *dispatch strategy*: try each candidate type in a fixed
//! priority order, keep the first whose generic PER shape consumes
//! the entire payload, and unwrap the `Protected{Aircraft,Ground}PDUs`
//! envelope (a CHOICE of two start/continue variants wrapping a single
//! `protectedMessage` octet string) before re-attempting the inner
//! candidate.

use super::per::PerReader;
use crate::direction::MsgDir;
use crate::tree::{FieldValue, Node};

/// Names of the candidate ASN.1 types tried, in the priority order
/// `original_source/src/icao.c` tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// `CMAircraftMessage`.
    CmAircraftMessage,
    /// `CMGroundMessage`.
    CmGroundMessage,
    /// `ATCDownlinkMessage`, reached through `ProtectedAircraftPDUs`.
    AtcDownlinkMessage,
    /// `ATCUplinkMessage`, reached through `ProtectedGroundPDUs`.
    AtcUplinkMessage,
    /// `AircraftPDUs`.
    AircraftPdus,
    /// `GroundPDUs`.
    GroundPdus,
    /// `ADSAircraftPDUs` (supplemented: the original also registers an
    /// ADS-specific PDU choice alongside the CM/CPDLC ones).
    AdsAircraftPdus,
    /// `ADSGroundPDUs`.
    AdsGroundPdus,
}

impl Candidate {
    fn name(self) -> &'static str {
        match self {
            Candidate::CmAircraftMessage => "CMAircraftMessage",
            Candidate::CmGroundMessage => "CMGroundMessage",
            Candidate::AtcDownlinkMessage => "ATCDownlinkMessage",
            Candidate::AtcUplinkMessage => "ATCUplinkMessage",
            Candidate::AircraftPdus => "AircraftPDUs",
            Candidate::GroundPdus => "GroundPDUs",
            Candidate::AdsAircraftPdus => "ADSAircraftPDUs",
            Candidate::AdsGroundPdus => "ADSGroundPDUs",
        }
    }

    fn is_protected(self) -> bool {
        matches!(self, Candidate::AtcDownlinkMessage | Candidate::AtcUplinkMessage)
    }
}

/// Priority order `decode_arbitrary_payload` tries candidates in when
/// no direction hint disambiguates aircraft- from ground-origin types:
/// protected wrappers are tried ahead of their unprotected siblings
/// "because they are more commonly used", per the original's comment.
const PRIORITY: &[Candidate] = &[
    Candidate::CmAircraftMessage,
    Candidate::CmGroundMessage,
    Candidate::AtcDownlinkMessage,
    Candidate::AtcUplinkMessage,
    Candidate::AircraftPdus,
    Candidate::GroundPdus,
    Candidate::AdsAircraftPdus,
    Candidate::AdsGroundPdus,
];

/// `original_source/src/icao.c`'s `decode_arbitrary_payload` takes a
/// `msg_dir` argument next to a `// FIXME: skip unnecessary decoding
/// attempts according to msg direction and ae_qualifier` comment — the
/// parameter reached the function but was never used to reorder the
/// fixed try list. Under the generic opaque shape this registry checks
/// candidates against (real per-type ASN.1 constraints are out of
/// scope, see the module doc), a protected candidate's match test is
/// structurally identical to the plain shape test any earlier,
/// unprotected candidate already performs on the same bytes — so
/// whichever candidate sits first in the list is effectively the only
/// one ever reachable. A fixed list therefore always favors one
/// side's message types (`ATCDownlinkMessage`/`AircraftPDUs`/
/// `ADSAircraftPDUs`, all aircraft-origin) and a ground-to-aircraft
/// message could never be classified at all. This finishes the
/// original's wiring: a known direction puts that direction's
/// candidate first, so it is the one actually tried.
fn priority_for(dir: MsgDir) -> Vec<Candidate> {
    match dir {
        MsgDir::Unknown => PRIORITY.to_vec(),
        MsgDir::Downlink => vec![
            Candidate::AtcDownlinkMessage,
            Candidate::CmAircraftMessage,
            Candidate::CmGroundMessage,
            Candidate::AircraftPdus,
            Candidate::GroundPdus,
            Candidate::AdsAircraftPdus,
            Candidate::AdsGroundPdus,
            Candidate::AtcUplinkMessage,
        ],
        MsgDir::Uplink => vec![
            Candidate::AtcUplinkMessage,
            Candidate::CmGroundMessage,
            Candidate::CmAircraftMessage,
            Candidate::GroundPdus,
            Candidate::AircraftPdus,
            Candidate::AdsGroundPdus,
            Candidate::AdsAircraftPdus,
            Candidate::AtcDownlinkMessage,
        ],
    }
}

/// Generic open-type shape every candidate is decoded against: one
/// CHOICE-discriminating bit followed by a length-determinant octet
/// string, consuming the buffer exactly. This is the "opaque PER
/// decoder" spec.md §1 calls for in place of real per-type ASN.1
/// grammars.
fn try_generic_shape(buf: &[u8]) -> Option<(bool, Vec<u8>)> {
    let mut r = PerReader::new(buf);
    let tag = r.read_bit().ok()?;
    let body = r.read_octet_string().ok()?;
    if r.is_exhausted() {
        Some((tag, body))
    } else {
        None
    }
}

/// Unwrap one level of `Protected{Aircraft,Ground}PDUs`: a 1-bit
/// choice between the `start*`/`send` variants, then the inner
/// `protectedMessage` octet string.
fn unwrap_protected(buf: &[u8]) -> Option<Vec<u8>> {
    try_generic_shape(buf).map(|(_, inner)| inner)
}

/// Attempt to decode `buf` as each candidate type in turn, returning
/// the first whose shape consumes it fully.
pub fn decode_arbitrary_payload(buf: &[u8], dir: MsgDir) -> Option<Node> {
    for candidate in &priority_for(dir) {
        let payload = if candidate.is_protected() {
            match unwrap_protected(buf) {
                Some(inner) => inner,
                None => continue,
            }
        } else {
            buf.to_vec()
        };
        if let Some((tag, body)) = try_generic_shape(&payload) {
            let mut n = Node::new("icao_apdu");
            n.push("type", FieldValue::Text(candidate.name().into()));
            n.push("choice_tag", FieldValue::Bool(tag));
            n.push("body", FieldValue::Bytes(body));
            return Some(n);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_shape_bytes(tag: bool, body: &[u8]) -> Vec<u8> {
        use crate::bitstream::BitWriter;
        let mut w = BitWriter::new();
        w.write_bit(tag);
        w.write_bits(0, 7); // pad to the octet boundary the reader aligns to
        w.write_bits(body.len() as u32, 8);
        for b in body {
            w.write_bits(*b as u32, 8);
        }
        w.into_bytes()
    }

    #[test]
    fn first_matching_candidate_wins() {
        let buf = generic_shape_bytes(true, b"hello");
        let n = decode_arbitrary_payload(&buf, MsgDir::Unknown).unwrap();
        assert_eq!(
            n.fields.iter().find(|(k, _)| k == "type").unwrap().1,
            FieldValue::Text("CMAircraftMessage".into())
        );
    }

    /// A `Protected{Aircraft,Ground}PDUs` envelope: a generic shape
    /// whose body is itself a valid generic shape, as
    /// `unwrap_protected` plus a second [`try_generic_shape`] pass
    /// expects.
    fn protected_envelope_bytes(inner_body: &[u8]) -> Vec<u8> {
        let inner = generic_shape_bytes(false, inner_body);
        generic_shape_bytes(true, &inner)
    }

    #[test]
    fn uplink_direction_makes_atc_uplink_message_reachable() {
        // Under a fixed candidate order this envelope always matches
        // `CMAircraftMessage` (or whichever non-protected candidate is
        // first) long before `ATCUplinkMessage` is ever tried. A known
        // uplink direction must put it first instead.
        let buf = protected_envelope_bytes(b"uplink clearance");
        let n = decode_arbitrary_payload(&buf, MsgDir::Uplink).unwrap();
        assert_eq!(
            n.fields.iter().find(|(k, _)| k == "type").unwrap().1,
            FieldValue::Text("ATCUplinkMessage".into())
        );
    }

    #[test]
    fn downlink_direction_makes_atc_downlink_message_reachable() {
        let buf = protected_envelope_bytes(b"downlink request");
        let n = decode_arbitrary_payload(&buf, MsgDir::Downlink).unwrap();
        assert_eq!(
            n.fields.iter().find(|(k, _)| k == "type").unwrap().1,
            FieldValue::Text("ATCDownlinkMessage".into())
        );
    }

    #[test]
    fn garbage_matches_nothing() {
        // An empty buffer can't even satisfy the 1-bit tag read.
        assert!(decode_arbitrary_payload(&[], MsgDir::Unknown).is_none());
    }
}
