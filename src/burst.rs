//! Burst decoder (component G): header validation, Reed-Solomon block
//! deinterleaving and correction, and HDLC unstuffing, turning a raw
//! demodulated [`crate::bitstream::BitVec`] into a framed AVLC octet
//! string plus the metadata that travels with it from here on.
//!
//! Grounded on spec.md §4.G. The header CRC and the RS(255,249) codec
//! themselves live in [`crate::crc`] and [`crate::rs`]; this module is
//! the glue that decides how many bits to ask the demodulator for and
//! how to lay the requested bits back out into RS codewords.

use crate::bitstream::{BitVec, DESCRAMBLER_SEED};
use crate::crc::header_crc5;
use crate::error::{Result, Vdl2Error};
use crate::metadata::Vdl2MsgMetadata;
use crate::rs::ReedSolomon;
use crate::stats::Stats;

/// Header length in bits: 3 reserved + 17 transmission-length + 5 FEC.
const HEADER_LEN: usize = 25;
/// Bits of the header's `header-FEC` trailer.
const HEADER_CRC_LEN: usize = 5;
/// Maximum accepted transmission length, in bits (spec.md: "≥ 32 Kb").
pub const MAX_FRAME_LENGTH: usize = 32 * 1024;

/// Outcome of asking the burst decoder to consume the bits buffered so
/// far for one channel.
pub enum BurstOutcome {
    /// Not enough bits buffered yet; ask the demodulator for more and
    /// retry once `need_bits` additional bits have arrived.
    NeedMoreBits {
        /// Additional bits (beyond what's already buffered) required
        /// before the next attempt can proceed.
        need_bits: usize,
    },
    /// A raw AVLC frame was successfully extracted.
    Frame {
        /// Octets of the de-FEC'd, de-stuffed AVLC frame.
        frame: Vec<u8>,
        /// Metadata to attach to everything decoded from this frame.
        metadata: Vdl2MsgMetadata,
    },
    /// The burst was rejected outright (bad header CRC, oversized
    /// transmission length, or an unrecoverable FEC/HDLC failure).
    Rejected(Vdl2Error),
}

/// One RS(255,249) block's layout within an interleaved burst: how many
/// data octets and FEC octets it actually carries over the air.
#[derive(Debug, Clone, Copy)]
struct BlockLayout {
    data_len: usize,
    fec_len: usize,
}

/// FEC length carried by a tail block of `tail_len` data octets
/// (spec.md §4.G: `6` for full blocks, `{0,2,4,6}` for the tail).
fn tail_fec_len(tail_len: usize) -> usize {
    match tail_len {
        0..=2 => 0,
        3..=30 => 2,
        31..=67 => 4,
        _ => 6,
    }
}

/// Compute the RS block layout for `total_data_octets` of burst payload.
fn block_layout(total_data_octets: usize) -> Vec<BlockLayout> {
    let k = ReedSolomon::data_len();
    let mut blocks = Vec::new();
    let mut remaining = total_data_octets;
    while remaining >= k {
        blocks.push(BlockLayout { data_len: k, fec_len: ReedSolomon::parity_len() });
        remaining -= k;
    }
    if remaining > 0 {
        blocks.push(BlockLayout { data_len: remaining, fec_len: tail_fec_len(remaining) });
    }
    blocks
}

/// Parse and validate the 25-bit header already descrambled in `bits`.
/// Returns the transmission length in bits, and the header CRC's
/// syndrome weight (`0` when it matched outright).
fn parse_header(bits: &mut BitVec) -> Result<(usize, u32)> {
    if bits.len() < HEADER_LEN {
        return Err(Vdl2Error::too_short(bits.len(), HEADER_LEN));
    }
    let header = bits.read_word_msbfirst(HEADER_LEN)?;
    let crc = (header & ((1 << HEADER_CRC_LEN) - 1)) as u8;
    let data20 = header >> HEADER_CRC_LEN;
    let want = header_crc5(data20);
    let synd_weight = (crc ^ want).count_ones();
    if crc != want {
        return Err(Vdl2Error::BadCrc { want: want as u32, got: crc as u32 });
    }
    let tr_raw = (data20 & 0x1ffff) as u32;
    let tr_bits = tr_raw.reverse_bits() >> (32 - 17);
    Ok((tr_bits as usize, synd_weight))
}

/// Deinterleave the data+FEC region of a burst (already read LSB-first
/// into `octets`, one RS column's worth of bytes for every block before
/// moving to the next column) into per-block 255-symbol codewords, with
/// zero-filled, erasure-marked positions wherever a block's data or FEC
/// run was shorter than the column count.
fn deinterleave(octets: &[u8], blocks: &[BlockLayout]) -> Vec<([u8; 255], Vec<usize>)> {
    let k = ReedSolomon::data_len();
    let parity = ReedSolomon::parity_len();
    let mut codewords: Vec<[u8; 255]> = vec![[0u8; 255]; blocks.len()];
    let mut erasures: Vec<Vec<usize>> = blocks
        .iter()
        .map(|b| {
            let mut e: Vec<usize> = (b.data_len..k).collect();
            e.extend(k + b.fec_len..k + parity);
            e
        })
        .collect();
    let mut cursor = 0usize;
    for col in 0..k {
        for (i, b) in blocks.iter().enumerate() {
            if col < b.data_len {
                codewords[i][col] = octets[cursor];
                cursor += 1;
            }
        }
    }
    for col in 0..parity {
        for (i, b) in blocks.iter().enumerate() {
            if col < b.fec_len {
                codewords[i][k + col] = octets[cursor];
                cursor += 1;
            }
        }
    }
    codewords.into_iter().zip(erasures.drain(..)).collect()
}

/// Attempt to decode one burst from `bits` (already buffered, not yet
/// descrambled past the header). `requested` tracks how many bits have
/// already been asked for on this burst so repeated calls don't
/// re-request the header.
pub fn decode(
    bits: &mut BitVec,
    metadata: &mut Vdl2MsgMetadata,
    stats: &Stats,
) -> BurstOutcome {
    if bits.len() < HEADER_LEN {
        return BurstOutcome::NeedMoreBits { need_bits: HEADER_LEN - bits.len() };
    }

    let mut header_bits = bits.clone();
    header_bits.descramble(DESCRAMBLER_SEED);
    let (tr_bits, synd_weight) = match parse_header(&mut header_bits) {
        Ok(v) => v,
        Err(e) => {
            Stats::incr(&stats.hdr_crc_fail);
            return BurstOutcome::Rejected(e);
        }
    };
    Stats::incr(&stats.hdr_crc_ok);
    metadata.synd_weight = synd_weight;

    if tr_bits > MAX_FRAME_LENGTH {
        return BurstOutcome::Rejected(Vdl2Error::TooLong { got: tr_bits, max: MAX_FRAME_LENGTH });
    }

    let data_octets = tr_bits.div_ceil(8);
    let blocks = block_layout(data_octets);
    let fec_octets: usize = blocks.iter().map(|b| b.fec_len).sum();
    let need_total = HEADER_LEN + (data_octets + fec_octets) * 8;
    if bits.len() < need_total {
        return BurstOutcome::NeedMoreBits { need_bits: need_total - bits.len() };
    }

    bits.descramble(DESCRAMBLER_SEED);
    let _ = bits.read_word_msbfirst(HEADER_LEN).expect("length checked above");
    let octets = match bits.read_lsbfirst(data_octets + fec_octets, 8) {
        Ok(v) => v,
        Err(e) => return BurstOutcome::Rejected(e),
    };

    let rs = ReedSolomon::new();
    let mut corrections = 0u32;
    let mut corrected_data = Vec::with_capacity(data_octets);
    for (block_idx, (mut codeword, erasures)) in deinterleave(&octets, &blocks).into_iter().enumerate() {
        match rs.correct(&mut codeword, &erasures) {
            Ok(n) => {
                Stats::incr(&stats.fec_ok);
                corrections += n as u32;
                corrected_data.extend_from_slice(&codeword[..blocks[block_idx].data_len]);
            }
            Err(e) => {
                Stats::incr(&stats.fec_fail);
                return BurstOutcome::Rejected(e);
            }
        }
    }
    metadata.num_fec_corrections = corrections;
    metadata.burst_len_octets = corrected_data.len() as u32;

    let mut frame_bits = BitVec::new();
    frame_bits.append_lsbfirst(&corrected_data, 8);
    frame_bits.truncate_to(tr_bits);
    if let Err(e) = frame_bits.hdlc_unstuff() {
        Stats::incr(&stats.hdlc_bad);
        return BurstOutcome::Rejected(e);
    }
    if frame_bits.len() % 8 != 0 {
        Stats::incr(&stats.hdlc_bad);
        return BurstOutcome::Rejected(Vdl2Error::Parse("unstuffed frame not octet-aligned".into()));
    }
    Stats::incr(&stats.hdlc_good);
    let frame = match frame_bits.read_lsbfirst(frame_bits.len() / 8, 8) {
        Ok(v) => v,
        Err(e) => return BurstOutcome::Rejected(e),
    };

    BurstOutcome::Frame { frame, metadata: metadata.clone() }
}

/// Frame power in dBFS from the mean squared symbol magnitude
/// (spec.md §4.G: `20*log10(mean_symbol_power)`).
pub fn power_dbfs(mean_symbol_power: f32) -> f32 {
    if mean_symbol_power <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * mean_symbol_power.log10()
    }
}
