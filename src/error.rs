//! Error types shared across the VDL2 receive pipeline.
//!
//! Every layer (§7 of the design) reports failure as a typed result to its
//! immediate caller rather than panicking. Callers either recover by emitting
//! an "unparseable" node, or abort the whole burst for framing failures.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Vdl2Error>;

/// Failure kinds that can be produced by any decoding layer.
///
/// These map directly onto the error kinds named in the design: each
/// is handled by its caller according to the propagation policy, not
/// unwound across thread boundaries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Vdl2Error {
    /// Input buffer shorter than the minimum for the current layer.
    #[error("too short: have {have}, need {need}")]
    TooShort {
        /// Bytes or bits available.
        have: usize,
        /// Bytes or bits required.
        need: usize,
    },

    /// Header or frame checksum mismatch.
    #[error("bad crc: want {want:04x}, got {got:04x}")]
    BadCrc {
        /// Expected value.
        want: u32,
        /// Computed value.
        got: u32,
    },

    /// AVLC FCS mismatch.
    #[error("bad fcs")]
    BadFcs,

    /// Reed-Solomon decoder could not correct the block.
    #[error("bad fec: block {block} uncorrectable")]
    BadFec {
        /// Index of the offending RS block.
        block: usize,
    },

    /// HDLC bit-stuffing sequence was invalid (7+ ones in a row).
    #[error("bad bit sequence")]
    BadBitSequence,

    /// Computed length exceeds an implementation cap.
    #[error("too long: {got} > {max}")]
    TooLong {
        /// Computed length.
        got: usize,
        /// Implementation cap.
        max: usize,
    },

    /// A TLV, tag, or bit-field runs past the end of the buffer.
    #[error("truncated field: {what}")]
    TruncatedField {
        /// Name of the field being parsed.
        what: &'static str,
    },

    /// Dispatch table had no entry for this tag/type.
    #[error("unknown tag/type: {0:#x}")]
    UnknownTag(u32),

    /// Generic parse failure that doesn't fit a more specific kind.
    #[error("parse error: {0}")]
    Parse(String),
}

impl Vdl2Error {
    /// Build a [`Vdl2Error::TooShort`] from a `(have, need)` pair.
    pub fn too_short(have: usize, need: usize) -> Self {
        Vdl2Error::TooShort { have, need }
    }
}
