//! Read-only configuration, populated once before any worker thread
//! starts (§5: "no global mutable state except ... the read-only
//! `Config` struct").

/// Sample rate multiplier applied on top of the VDL2 symbol rate.
pub const SYMBOL_RATE: u32 = 10_500;
/// Samples per symbol after decimation.
pub const SPS: u32 = 10;

/// One tuned channel: its carrier frequency and a human label.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Channel carrier frequency, Hz.
    pub frequency_hz: u32,
}

/// Message-direction / message-class filter, mirroring the bit-grouped
/// filter enum of the original `fmt.c`. Every bit defaults to `true`
/// (accept everything); `avlc::decode_frame` consults this before
/// dispatch and still counts dropped messages (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFilter {
    /// Accept GSIF (ground station information frame) messages.
    pub gsif: bool,
    /// Accept XID messages other than GSIF.
    pub xid: bool,
    /// Accept ACARS messages.
    pub acars: bool,
    /// Accept X.25 messages.
    pub x25: bool,
    /// Accept CLNP/IDRP/ES-IS network-layer messages.
    pub clnp: bool,
    /// Accept air-to-ground messages.
    pub air2gnd: bool,
    /// Accept ground-to-air messages.
    pub gnd2air: bool,
    /// Accept ground-to-ground messages.
    pub gnd2gnd: bool,
    /// Accept air-to-all-stations broadcasts.
    pub air2all: bool,
    /// Accept ground-to-all-stations broadcasts.
    pub gnd2all: bool,
}

impl Default for MsgFilter {
    fn default() -> Self {
        MsgFilter {
            gsif: true,
            xid: true,
            acars: true,
            x25: true,
            clnp: true,
            air2gnd: true,
            gnd2air: true,
            gnd2gnd: true,
            air2all: true,
            gnd2all: true,
        }
    }
}

/// Immutable receiver configuration, shared (via `Arc`) by every
/// worker thread once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Raw I/Q sample rate feeding the DSP front end, Hz.
    pub sample_rate: u32,
    /// Integer decimation factor applied by the input filter (component D).
    pub oversample: u32,
    /// Center frequency the SDR (or file) was tuned to, Hz.
    pub center_freq_hz: u32,
    /// Per-channel tuned frequencies, each downmixed from `center_freq_hz`.
    pub channels: Vec<ChannelConfig>,
    /// Station identifier stamped onto every message's metadata.
    pub station_id: String,
    /// Default reassembly entry timeout, in fragment-timestamp seconds.
    pub reassembly_timeout_sec: u32,
    /// Reassembly table cleanup runs every this-many processed fragments.
    pub reassembly_cleanup_interval: u32,
    /// Message filter applied at AVLC dispatch time.
    pub filter: MsgFilter,
}

impl Config {
    /// Build a configuration for `channels` tuned relative to
    /// `center_freq_hz`, sampled at `sample_rate` after `oversample`
    /// decimation, identified to downstream consumers as `station_id`.
    pub fn new(
        sample_rate: u32,
        oversample: u32,
        center_freq_hz: u32,
        channels: Vec<u32>,
        station_id: impl Into<String>,
    ) -> Self {
        Config {
            sample_rate,
            oversample,
            center_freq_hz,
            channels: channels.into_iter().map(|frequency_hz| ChannelConfig { frequency_hz }).collect(),
            station_id: station_id.into(),
            reassembly_timeout_sec: 60,
            reassembly_cleanup_interval: 100,
            filter: MsgFilter::default(),
        }
    }

    /// Post-decimation complex sample rate seen by each channel demod.
    pub fn decimated_rate(&self) -> u32 {
        self.sample_rate / self.oversample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimated_rate_divides_evenly_in_default_case() {
        let cfg = Config::new(1_050_000, 10, 136_000_000, vec![136_000_000], "GND1");
        assert_eq!(cfg.decimated_rate(), 105_000);
    }

    #[test]
    fn filter_defaults_accept_everything() {
        assert_eq!(MsgFilter::default(), MsgFilter {
            gsif: true, xid: true, acars: true, x25: true, clnp: true,
            air2gnd: true, gnd2air: true, gnd2gnd: true, air2all: true, gnd2all: true,
        });
    }
}
