//! Coarse message-direction hint threaded from the AVLC address pair
//! (component H) down to the ICAO APDU registry (component N), so a
//! speculative-decode attempt can prefer the candidate types that
//! actually originate from that direction.
//!
//! `original_source/icao.c`'s own `decode_arbitrary_payload` carries a
//! `// FIXME: skip unnecessary decoding attempts according to msg
//! direction` comment next to its always-fixed try order — the
//! direction parameter was wired up but never used to reorder
//! candidates. This crate finishes that wiring (see `DESIGN.md`'s
//! Open Question on X.25 -> ICAO dispatch): ATC uplink and downlink
//! messages are structurally generic enough in the opaque-PER registry
//! that without a direction hint, the ground-to-aircraft candidate is
//! never reachable — it is always shadowed by the aircraft-to-ground
//! one tried first.

/// Coarse direction of a decoded message, derived from its AVLC source
/// address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgDir {
    /// Ground station to aircraft (or ground station broadcast).
    Uplink,
    /// Aircraft to ground station (or aircraft broadcast).
    Downlink,
    /// Ground-to-ground or otherwise unclassifiable.
    Unknown,
}
