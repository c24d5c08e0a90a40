//! Sample-dispatch and decoder runtime (spec.md §4.Q-R, §5): one
//! producer thread, one demod thread per configured channel, and a
//! single AVLC decoder thread, wired together the way `mtgraph.rs`
//! wires a graph's blocks into threads -- a named `std::thread::Builder`
//! per worker, a shared cancellation token polled by every outer loop,
//! and `log` for startup/shutdown tracing.
//!
//! The producer/demod hand-off itself can't reuse `mtgraph.rs`'s
//! per-edge MPSC channel, since §4.Q calls for the same sample buffer
//! fanned out to every channel rather than routed to one consumer; this
//! uses a two-sided `std::sync::Barrier` rendezvous instead, guarded by
//! a `Mutex` around the shared buffer rather than the unsynchronized
//! aliasing the design notes describe, so the hand-off stays in safe
//! Rust.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::avlc;
use crate::channel::Channel;
use crate::config::Config;
use crate::queue::{decoder_queue, RawFrame};
use crate::stats::Stats;
use crate::tree::ProtoTree;
use crate::x25::SessionTable;
use crate::Complex;

/// Number of samples the producer fills and each demod thread consumes
/// per barrier round. Not named in spec.md; large enough to amortize
/// the barrier round-trip, small enough to keep burst-detection latency
/// under a symbol period or two at the channel sample rate.
const SBUF_LEN: usize = 4096;

/// Depth of the MPSC hand-off from demod threads to the decoder thread
/// (spec.md §4.Q: "AVLC queue"). Chosen generously relative to
/// `SBUF_LEN` since bursts are rare relative to raw samples.
const DECODER_QUEUE_CAPACITY: usize = 64;

/// Cooperative shutdown flag, polled by every worker thread's outer
/// loop (spec.md §5: "any thread observing `do_exit=true` at its next
/// loop iteration exits cleanly; no forced cancellation"). Named after
/// `graph.rs`'s own cancellation token rather than spec.md's `do_exit`,
/// since it plays the identical role.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Build a token in the not-cancelled state.
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    /// Request shutdown. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source of normalized complex samples fed to the producer thread.
/// Implementors translate a wire-specific format (raw `u8` offset-binary
/// or `s16` little-endian per spec.md §6, or a live SDR's own API) into
/// this crate's [`Complex`] representation; that translation, like the
/// SDR driver itself, lives outside this crate's scope.
pub trait SampleSource: Send {
    /// Fill `buf` with up to `buf.len()` samples, returning how many
    /// were written. Returning `0` signals end of stream.
    fn fill(&mut self, buf: &mut [Complex]) -> usize;
}

/// Handle to a running [`Runtime`]: the decoded-tree output queue, plus
/// the means to request shutdown and wait for every worker to exit.
pub struct RuntimeHandle {
    /// Decoded protocol trees, one per successfully parsed AVLC frame,
    /// in the order the decoder thread produced them (spec.md §5: "the
    /// output queue is FIFO per-output").
    pub output: Receiver<ProtoTree>,
    cancel: CancellationToken,
    threads: Vec<thread::JoinHandle<()>>,
}

impl RuntimeHandle {
    /// Request cooperative shutdown. Workers finish their current loop
    /// iteration and the in-flight decoder queue before exiting; output
    /// already queued remains available on `self.output` until drained.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until every worker thread has exited.
    pub fn join(self) {
        for t in self.threads {
            if t.join().is_err() {
                warn!("runtime: worker thread panicked");
            }
        }
    }
}

/// Owns the configuration shared by every worker thread and starts the
/// producer, per-channel demod, and AVLC decoder threads described in
/// spec.md §4.Q-R.
pub struct Runtime {
    cfg: Arc<Config>,
    stats: Arc<Stats>,
}

impl Runtime {
    /// Build a runtime for `cfg`. `cfg` is never mutated once workers
    /// start (spec.md §5: "the read-only `Config` struct populated once
    /// before threads start").
    pub fn new(cfg: Config) -> Self {
        Runtime { cfg: Arc::new(cfg), stats: Arc::new(Stats::default()) }
    }

    /// Statistics counters shared by every worker (spec.md §R).
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Start every worker thread, consuming samples from `source` until
    /// it signals end of stream or the caller cancels.
    pub fn run(&self, mut source: Box<dyn SampleSource>) -> RuntimeHandle {
        let cancel = CancellationToken::new();
        let channels = &self.cfg.channels;
        let n = channels.len().max(1);

        let demods_ready = Arc::new(Barrier::new(n + 1));
        let samples_ready = Arc::new(Barrier::new(n + 1));
        let sbuf: Arc<Mutex<Vec<Complex>>> = Arc::new(Mutex::new(Vec::with_capacity(SBUF_LEN)));

        let (queue_tx, queue_rx) = decoder_queue(DECODER_QUEUE_CAPACITY);
        let (output_tx, output_rx) = std::sync::mpsc::sync_channel::<ProtoTree>(DECODER_QUEUE_CAPACITY);

        let mut threads = Vec::with_capacity(n + 2);

        for ch_cfg in channels {
            let frequency_hz = ch_cfg.frequency_hz;
            let mut channel = Channel::new(
                self.cfg.station_id.clone(),
                frequency_hz,
                self.cfg.center_freq_hz,
                self.cfg.sample_rate,
                self.cfg.oversample,
            );
            let demods_ready = demods_ready.clone();
            let samples_ready = samples_ready.clone();
            let sbuf = sbuf.clone();
            let sender = queue_tx.clone();
            let stats = self.stats.clone();
            let cancel = cancel.clone();
            let name = format!("vdl2-demod-{frequency_hz}");
            let th = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    debug!("{name}: starting");
                    loop {
                        demods_ready.wait();
                        if cancel.is_canceled() {
                            break;
                        }
                        samples_ready.wait();
                        let samples = sbuf.lock().unwrap();
                        for &s in samples.iter() {
                            if let Some((frame, metadata)) = channel.process_sample(s, &stats) {
                                if !sender.push(RawFrame { data: frame, metadata }) {
                                    break;
                                }
                            }
                        }
                    }
                    debug!("{name}: exiting");
                })
                .expect("failed to spawn channel demod thread");
            threads.push(th);
        }
        drop(queue_tx);

        {
            let cancel = cancel.clone();
            let cfg = self.cfg.clone();
            let stats = self.stats.clone();
            let th = thread::Builder::new()
                .name("vdl2-decoder".to_string())
                .spawn(move || {
                    debug!("vdl2-decoder: starting");
                    let mut table = SessionTable::new(cfg.reassembly_cleanup_interval);
                    loop {
                        if cancel.is_canceled() {
                            for frame in queue_rx.drain() {
                                decode_one(&frame, &cfg, &stats, &mut table, &output_tx);
                            }
                            break;
                        }
                        match queue_rx.pop_timeout(Duration::from_millis(100)) {
                            Some(frame) => {
                                if !decode_one(&frame, &cfg, &stats, &mut table, &output_tx) {
                                    break;
                                }
                            }
                            None => continue,
                        }
                    }
                    debug!("vdl2-decoder: exiting");
                })
                .expect("failed to spawn decoder thread");
            threads.push(th);
        }

        {
            let cancel = cancel.clone();
            let th = thread::Builder::new()
                .name("vdl2-producer".to_string())
                .spawn(move || {
                    info!("vdl2-producer: starting");
                    let mut local = vec![Complex::new(0.0, 0.0); SBUF_LEN];
                    loop {
                        demods_ready.wait();
                        if cancel.is_canceled() {
                            break;
                        }
                        let n = source.fill(&mut local);
                        {
                            let mut guard = sbuf.lock().unwrap();
                            guard.clear();
                            guard.extend_from_slice(&local[..n]);
                        }
                        samples_ready.wait();
                        if n == 0 {
                            info!("vdl2-producer: end of stream");
                            cancel.cancel();
                        }
                    }
                    info!("vdl2-producer: exiting");
                })
                .expect("failed to spawn producer thread");
            threads.push(th);
        }

        RuntimeHandle { output: output_rx, cancel, threads }
    }
}

/// Decode one dequeued frame and forward it to `output_tx`. Returns
/// `false` when the output receiver has gone away, signaling the
/// decoder thread itself should stop (spec.md §5: output threads may
/// exit once nothing is listening).
fn decode_one(
    frame: &RawFrame,
    cfg: &Config,
    stats: &Stats,
    table: &mut SessionTable,
    output_tx: &std::sync::mpsc::SyncSender<ProtoTree>,
) -> bool {
    let Some(root) = avlc::decode_frame_with_table(
        &frame.data,
        cfg,
        stats,
        table,
        frame.metadata.frequency_hz,
        frame.metadata.timestamp_sec,
    ) else {
        return true;
    };
    output_tx.send(ProtoTree { metadata: frame.metadata.clone(), root }).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Feeds a fixed number of zero-valued rounds, then signals EOF.
    struct ZeroSource {
        remaining_rounds: usize,
    }

    impl SampleSource for ZeroSource {
        fn fill(&mut self, buf: &mut [Complex]) -> usize {
            if self.remaining_rounds == 0 {
                return 0;
            }
            self.remaining_rounds -= 1;
            for s in buf.iter_mut() {
                *s = Complex::new(0.0, 0.0);
            }
            buf.len()
        }
    }

    #[test]
    fn runtime_drains_cleanly_on_end_of_stream() {
        let cfg = Config::new(1_050_000, 10, 136_000_000, vec![136_000_000], "GND1");
        let rt = Runtime::new(cfg);
        let handle = rt.run(Box::new(ZeroSource { remaining_rounds: 3 }));
        // Silent (noise-only) input produces no decoded trees, and the
        // output channel closes once every worker exits.
        let (done_tx, done_rx) = mpsc::channel();
        let output = handle.output;
        let collector = thread::spawn(move || {
            let count = output.iter().count();
            let _ = done_tx.send(count);
        });
        handle.cancel.cancel();
        collector.join().unwrap();
        assert_eq!(done_rx.recv().unwrap(), 0);
        for t in handle.threads {
            let _ = t.join();
        }
    }

    #[test]
    fn cancellation_token_starts_uncanceled() {
        let tok = CancellationToken::new();
        assert!(!tok.is_canceled());
        tok.cancel();
        assert!(tok.is_canceled());
    }
}
