//! Decoder queue: the MPSC hand-off from channel-demod threads to the
//! single AVLC decoder thread (spec.md §4.Q-R, §5).
//!
//! Grounded on `mtgraph.rs`'s own use of `std::sync::mpsc::sync_channel`
//! for inter-thread block hand-off: bounded, blocking-send, FIFO,
//! exactly the ordering guarantee §5 calls for ("The decoder queue is
//! FIFO").

use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use crate::metadata::Vdl2MsgMetadata;

/// One raw AVLC frame plus the metadata stamped on it by the burst
/// decoder, as pushed by a channel-demod thread.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Octets of the de-FEC'd, de-stuffed AVLC frame.
    pub data: Vec<u8>,
    /// Metadata captured at burst-decode time.
    pub metadata: Vdl2MsgMetadata,
}

/// Producer handle held by each channel-demod thread.
#[derive(Clone)]
pub struct DecoderQueueSender {
    inner: SyncSender<RawFrame>,
}

impl DecoderQueueSender {
    /// Push a frame, blocking if the queue is momentarily full. Returns
    /// `false` if the decoder thread has already shut down (the
    /// receiving end was dropped), matching §5's best-effort shutdown
    /// semantics: the caller should stop trying to enqueue and exit.
    pub fn push(&self, frame: RawFrame) -> bool {
        self.inner.send(frame).is_ok()
    }

    /// Non-blocking push, for callers that would rather drop a frame
    /// than stall the demod thread (not used by the default runtime,
    /// which accepts the backpressure; kept for alternative wiring).
    pub fn try_push(&self, frame: RawFrame) -> Result<(), TrySendError<RawFrame>> {
        self.inner.try_send(frame)
    }
}

/// Consumer handle held by the single AVLC decoder thread.
pub struct DecoderQueueReceiver {
    inner: Receiver<RawFrame>,
}

impl DecoderQueueReceiver {
    /// Block until a frame arrives or every sender has been dropped.
    pub fn pop(&self) -> Option<RawFrame> {
        self.inner.recv().ok()
    }

    /// Block up to `timeout`, so the decoder thread's outer loop can
    /// still poll `do_exit` without a dedicated wakeup channel.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RawFrame> {
        match self.inner.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain whatever is currently queued without blocking (used at
    /// shutdown to finish in-flight work per §5's drain semantics).
    pub fn drain(&self) -> Vec<RawFrame> {
        self.inner.try_iter().collect()
    }
}

/// Build a bounded decoder queue. `capacity` bounds how far channel
/// threads can run ahead of the decoder before `push` blocks.
pub fn decoder_queue(capacity: usize) -> (DecoderQueueSender, DecoderQueueReceiver) {
    let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
    (DecoderQueueSender { inner: tx }, DecoderQueueReceiver { inner: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u8) -> RawFrame {
        RawFrame { data: vec![n], metadata: Vdl2MsgMetadata::new("GND1", 136_000_000) }
    }

    #[test]
    fn preserves_fifo_order() {
        let (tx, rx) = decoder_queue(8);
        for n in 0..5 {
            assert!(tx.push(frame(n)));
        }
        for n in 0..5 {
            assert_eq!(rx.pop().unwrap().data, vec![n]);
        }
    }

    #[test]
    fn pop_returns_none_once_senders_are_dropped() {
        let (tx, rx) = decoder_queue(1);
        drop(tx);
        assert!(rx.pop().is_none());
    }

    #[test]
    fn pop_timeout_returns_none_without_a_sender() {
        let (_tx, rx) = decoder_queue(1);
        assert!(rx.pop_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn drain_collects_everything_buffered() {
        let (tx, rx) = decoder_queue(4);
        for n in 0..3 {
            assert!(tx.push(frame(n)));
        }
        drop(tx);
        assert_eq!(rx.drain().len(), 3);
    }
}
