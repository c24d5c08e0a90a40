//! Per-channel VDL2 receive state (spec.md §3 "VDL2 channel state").
//!
//! One [`Channel`] is created per tuned frequency and owned exclusively
//! by its own demod thread (§5): the DSP front end (components D-F),
//! the burst decoder (component G), and the running power/noise
//! estimates that feed each burst's metadata all live here so the
//! runtime (components Q-R) only has to hand it samples.

use crate::burst::{self, BurstOutcome};
use crate::dsp::demod::{DemodEvent, Demodulator};
use crate::dsp::downmix::Downmixer;
use crate::dsp::filter::InputFilter;
use crate::metadata::Vdl2MsgMetadata;
use crate::stats::Stats;
use crate::Complex;

/// Exponential-moving-average time constant for the power/noise-floor
/// estimators (not named in spec.md; chosen to smooth over several
/// symbol periods without lagging burst-to-burst).
const POWER_LPF_ALPHA: f32 = 0.05;

/// Channel decoder state, independent of the demodulator's own
/// `Init`/`Sync` state machine: `Idle` between bursts, `Header` while
/// the burst decoder hasn't yet seen a full, CRC-valid header, `Data`
/// once the header is known and the decoder is waiting on the
/// remaining FEC-coded payload bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No burst in progress; samples are only used for noise-floor and
    /// sync-acquisition tracking.
    Idle,
    /// Sync was just acquired; the burst decoder hasn't resolved a
    /// header yet (too few bits buffered).
    Header,
    /// The header resolved; waiting for the FEC-coded payload.
    Data,
}

/// Per-channel receive state: DSP front end, demodulator, and the
/// burst-in-progress bookkeeping.
pub struct Channel {
    frequency_hz: u32,
    station_id: String,
    filter: InputFilter,
    downmixer: Downmixer,
    demod: Demodulator,
    decoder_state: DecoderState,
    signal_lpf: f32,
    noise_lpf: f32,
    burst_timestamp: (i64, u32),
    pending_metadata: Option<Vdl2MsgMetadata>,
}

impl Channel {
    /// Build channel state tuned to `frequency_hz`, downmixed from
    /// `center_freq_hz`, fed at `sample_rate` after `oversample`
    /// decimation.
    pub fn new(
        station_id: impl Into<String>,
        frequency_hz: u32,
        center_freq_hz: u32,
        sample_rate: u32,
        oversample: u32,
    ) -> Self {
        Channel {
            frequency_hz,
            station_id: station_id.into(),
            filter: InputFilter::new(sample_rate, oversample),
            downmixer: Downmixer::new(center_freq_hz, frequency_hz, sample_rate),
            demod: Demodulator::new(),
            decoder_state: DecoderState::Idle,
            signal_lpf: 0.0,
            noise_lpf: 0.0,
            burst_timestamp: (0, 0),
            pending_metadata: None,
        }
    }

    /// This channel's tuned carrier frequency, in Hz.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Current decoder state (exposed for tests and introspection).
    pub fn decoder_state(&self) -> DecoderState {
        self.decoder_state
    }

    fn update_power_estimates(&mut self, magnitude: f32) {
        let power = magnitude * magnitude;
        match self.decoder_state {
            DecoderState::Idle => {
                self.noise_lpf += (power - self.noise_lpf) * POWER_LPF_ALPHA;
            }
            DecoderState::Header | DecoderState::Data => {
                self.signal_lpf += (power - self.signal_lpf) * POWER_LPF_ALPHA;
            }
        }
    }

    /// Stamp the receive timestamp for a burst about to start, in
    /// seconds and microseconds since the Unix epoch.
    fn stamp_timestamp() -> (i64, u32) {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        (now.as_secs() as i64, now.subsec_micros())
    }

    /// Feed one decimated-rate complex sample through the filter,
    /// downmixer and demodulator, advancing the burst decoder whenever
    /// a burst is in progress. Returns the raw AVLC frame and its
    /// metadata once a burst is fully decoded (successfully or not;
    /// rejected bursts return `None` but still reset channel state).
    pub fn process_sample(&mut self, raw: Complex, stats: &Stats) -> Option<(Vec<u8>, Vdl2MsgMetadata)> {
        let filtered = self.filter.process(raw)?;
        let mixed = self.downmixer.process(filtered);
        let magnitude = (mixed.re * mixed.re + mixed.im * mixed.im).sqrt();
        self.update_power_estimates(magnitude);

        match self.demod.process(mixed) {
            DemodEvent::SyncAcquired => {
                self.decoder_state = DecoderState::Header;
                self.burst_timestamp = Self::stamp_timestamp();
                let mut metadata = Vdl2MsgMetadata::new(self.station_id.clone(), self.frequency_hz);
                metadata.timestamp_sec = self.burst_timestamp.0;
                metadata.timestamp_usec = self.burst_timestamp.1;
                metadata.frame_pwr_dbfs = burst::power_dbfs(self.signal_lpf.sqrt());
                metadata.noise_pwr_dbfs = burst::power_dbfs(self.noise_lpf.sqrt());
                self.pending_metadata = Some(metadata);
            }
            DemodEvent::SyncLost => {
                self.reset_burst();
                return None;
            }
            DemodEvent::None => {}
        }

        if self.decoder_state == DecoderState::Idle {
            return None;
        }

        let mut metadata = self.pending_metadata.clone()?;
        metadata.ppm_error = self.demod.freq_err();
        let outcome = burst::decode(self.demod.bits(), &mut metadata, stats);
        self.pending_metadata = Some(metadata);

        match outcome {
            BurstOutcome::NeedMoreBits { .. } => {
                self.decoder_state = DecoderState::Data;
                None
            }
            BurstOutcome::Frame { frame, metadata } => {
                self.reset_burst();
                Some((frame, metadata))
            }
            BurstOutcome::Rejected(_) => {
                self.reset_burst();
                None
            }
        }
    }

    /// Return to `Idle`, dropping the in-progress burst's accumulated
    /// bits and resetting the demodulator to re-acquire sync.
    fn reset_burst(&mut self) {
        self.demod.lose_sync();
        self.decoder_state = DecoderState::Idle;
        self.pending_metadata = None;
    }

    /// Unread bits currently buffered for the in-progress burst, if any
    /// (exposed for tests).
    #[cfg(test)]
    fn buffered_bits(&mut self) -> &mut crate::bitstream::BitVec {
        self.demod.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_zero_power_estimates() {
        let ch = Channel::new("GND1", 136_000_000, 136_000_000, 2_100_000, 10);
        assert_eq!(ch.decoder_state(), DecoderState::Idle);
        assert_eq!(ch.signal_lpf, 0.0);
    }

    #[test]
    fn noise_floor_tracks_idle_samples() {
        let mut ch = Channel::new("GND1", 136_000_000, 136_000_000, 2_100_000, 1);
        let stats = Stats::default();
        for _ in 0..200 {
            ch.process_sample(Complex::new(0.01, 0.0), &stats);
        }
        assert!(ch.noise_lpf > 0.0);
        assert_eq!(ch.decoder_state(), DecoderState::Idle);
    }

    #[test]
    fn sync_loss_clears_buffered_bits() {
        let mut ch = Channel::new("GND1", 136_000_000, 136_000_000, 2_100_000, 1);
        ch.decoder_state = DecoderState::Header;
        ch.buffered_bits().append_msbfirst(0b101, 3);
        ch.reset_burst();
        assert_eq!(ch.decoder_state(), DecoderState::Idle);
        assert!(ch.pending_metadata.is_none());
    }
}
