//! DSP front-end: the per-channel decimating lowpass filter
//! (component D), complex downmixer (component E), and burst
//! sync/demodulator (component F) that together turn raw I/Q samples
//! into a stream of D8PSK-decoded bits for one tuned channel.

pub mod demod;
pub mod downmix;
pub mod filter;
