#![warn(missing_docs)]
/*! A ground-station receiver and protocol decoder for VDL Mode 2
(VDL-2), the digital datalink used by ACARS-over-AVLC aircraft
communication.

The crate is organized as a pipeline: a [`dsp`] front end turns raw I/Q
samples into D8PSK symbol bits per tuned [`channel::Channel`]; [`burst`]
synchronizes on a burst, descrambles and de-FECs it with [`rs`], and
unstuffs it into a raw AVLC frame; [`avlc`] parses the HDLC-derived link
layer and dispatches its payload into the protocol stack ([`x25`],
[`clnp`], [`idrp`], [`esis`], [`icao`], [`adsc`]); [`tree`] is the
common decoded-message representation, serializable via `serde`.
[`runtime`] wires the per-channel demod threads, the [`queue`] hand-off,
and the single AVLC decoder thread together per the producer/consumer
model described in this crate's design notes.

# Example

```no_run
use vdl2::config::Config;
use vdl2::runtime::Runtime;

let cfg = Config::new(2_100_000, 10, 136_000_000, vec![136_000_000], "GND1");
let rt = Runtime::new(cfg);
# let _ = rt;
```
 */

// VDL Mode 2 receive pipeline and protocol decoder stack.
pub mod adsc;
pub mod avlc;
pub mod bitstream;
pub mod burst;
pub mod channel;
pub mod clnp;
pub mod config;
pub mod crc;
pub mod direction;
pub mod dsp;
pub mod error;
pub mod esis;
pub mod icao;
pub mod idrp;
pub mod metadata;
pub mod queue;
pub mod raw;
pub mod reassembly;
pub mod rs;
pub mod runtime;
pub mod stats;
pub mod tree;
pub mod x25;

/// Float type used. Usually f32, but not guaranteed.
pub type Float = f32;

/// Complex (I/Q) data.
pub type Complex = num_complex::Complex<Float>;

