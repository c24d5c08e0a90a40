//! Per-message metadata that travels with a decoded frame through every
//! protocol layer (§3 "VDL2 message metadata").

use serde::{Deserialize, Serialize};

/// Immutable metadata attached to a burst at the moment the burst decoder
/// (component G) successfully extracts a raw AVLC frame, and carried
/// unchanged (deep-copied per output, never mutated) through every
/// subsequent layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vdl2MsgMetadata {
    /// Receive timestamp, seconds since the Unix epoch.
    pub timestamp_sec: i64,
    /// Receive timestamp, microsecond remainder.
    pub timestamp_usec: u32,
    /// Tuned channel carrier frequency, in Hz.
    pub frequency_hz: u32,
    /// Frame power, dBFS.
    pub frame_pwr_dbfs: f32,
    /// Noise-floor power, dBFS.
    pub noise_pwr_dbfs: f32,
    /// Estimated carrier frequency error, parts per million.
    pub ppm_error: f32,
    /// Number of RS octets corrected across all blocks of this burst.
    pub num_fec_corrections: u32,
    /// Header-CRC syndrome weight (0 when the header CRC matched outright).
    pub synd_weight: u32,
    /// Burst length, in octets, after FEC removal.
    pub burst_len_octets: u32,
    /// Station identifier configured for this receiver instance.
    pub station_id: String,
}

impl Vdl2MsgMetadata {
    /// Construct metadata for a channel/burst pair; all derived fields
    /// default to zero until the burst decoder fills them in.
    #[allow(clippy::too_many_arguments)]
    pub fn new(station_id: impl Into<String>, frequency_hz: u32) -> Self {
        Vdl2MsgMetadata {
            timestamp_sec: 0,
            timestamp_usec: 0,
            frequency_hz,
            frame_pwr_dbfs: f32::NEG_INFINITY,
            noise_pwr_dbfs: f32::NEG_INFINITY,
            ppm_error: 0.0,
            num_fec_corrections: 0,
            synd_weight: 0,
            burst_len_octets: 0,
            station_id: station_id.into(),
        }
    }
}
