//! Offset-based fragment reassembly engine (component P).
//!
//! Grounded on `original_source/src/reassembly.c`/`.h` (`reasm_status`,
//! `reasm_fragment_info`, `reasm_fragment_add`) and spec.md §4.P: entries
//! are keyed by an opaque PDU key, fragments carry `{start_offset,
//! end_offset, data}`, and a table-wide cleanup pass runs every
//! `cleanup_interval` fragments relative to the most recently processed
//! fragment's timestamp so that replaying historical data stays
//! deterministic (no wall-clock timers). The validation order and error
//! codes in [`Reassembly::add_fragment`] follow `reasm_fragment_add`
//! (`reassembly.c:132-269`) precisely: argument sanity first, then the
//! non-fragmented-packet short circuit, then the zero-timeout guard,
//! then the offset/length bound checks, and only then the table lookup
//! and duplicate/overlap scan.

use std::collections::HashMap;

/// Outcome of inserting one fragment into the reassembly table.
///
/// Mirrors `reasm_status` from the original decoder one-for-one, per
/// spec.md §4.P's list of states a test must exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasmStatus {
    /// All fragments received; the payload is ready via [`Reassembly::payload_get`].
    Complete,
    /// Fragment accepted but the PDU is not yet complete.
    InProgress,
    /// A single non-fragmented "fragment" that covers the whole PDU; the
    /// table was never touched.
    Skipped,
    /// Exact duplicate of a previously-seen fragment.
    Duplicate,
    /// Fragment's byte range overlaps one already stored.
    Overlap,
    /// `offset + fragment_len` exceeds `total_pdu_len`, or `is_final`
    /// disagrees with whether the fragment's end reaches `total_pdu_len`.
    BadOffset,
    /// A non-fragmented packet (`is_final` with `offset == 0`) whose
    /// length doesn't match `total_pdu_len`.
    BadLen,
    /// Caller-supplied arguments are malformed on their own terms,
    /// independent of any other fragment: `total_pdu_len == 0`, an empty
    /// fragment, or a zero reassembly timeout (which would otherwise
    /// leak the entry forever, since it could never expire).
    ArgsInvalid,
}

#[derive(Debug, Clone)]
struct Fragment {
    start: usize,
    end: usize, // exclusive
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Entry {
    total_pdu_len: usize,
    collected_len: usize,
    first_seen_sec: i64,
    timeout_sec: i64,
    fragments: Vec<Fragment>,
}

impl Entry {
    fn expired_at(&self, now_sec: i64) -> bool {
        now_sec > self.first_seen_sec + self.timeout_sec
    }
}

/// One fragment as presented to the engine by a caller (X.25 DATA
/// segmentation, per spec.md §4.K/§4.P).
#[derive(Debug, Clone)]
pub struct FragmentInfo {
    /// Start offset of this fragment within the reassembled PDU.
    pub offset: usize,
    /// Fragment payload.
    pub data: Vec<u8>,
    /// Total length of the fully reassembled PDU, as declared by the protocol.
    pub total_pdu_len: usize,
    /// Arrival timestamp, seconds (caller-supplied; used only for expiry math).
    pub timestamp_sec: i64,
    /// Reassembly timeout for this PDU, seconds.
    pub timeout_sec: i64,
    /// Whether this is the final fragment (per-protocol "more fragments" bit).
    pub is_final: bool,
}

/// Table of in-progress reassemblies, keyed by an opaque per-session key
/// (e.g. `(channel freq, X.25 logical channel)`).
#[derive(Debug, Default)]
pub struct Reassembly<K: std::hash::Hash + Eq + Clone> {
    table: HashMap<K, Entry>,
    cleanup_interval: u32,
    processed_since_cleanup: u32,
}

impl<K: std::hash::Hash + Eq + Clone> Reassembly<K> {
    /// Build a table that runs its expiry sweep every `cleanup_interval`
    /// processed fragments.
    pub fn new(cleanup_interval: u32) -> Self {
        Reassembly {
            table: HashMap::new(),
            cleanup_interval: cleanup_interval.max(1),
            processed_since_cleanup: 0,
        }
    }

    /// Process one fragment for `key`, returning its outcome. On
    /// [`ReasmStatus::Complete`], call [`Reassembly::payload_get`] to take
    /// ownership of the reassembled buffer (this also drops the entry).
    ///
    /// Follows `reasm_fragment_add`'s validation order exactly
    /// (`reassembly.c:132-170`): argument sanity, then the
    /// non-fragmented-packet short circuit (which returns before ever
    /// touching the cleanup counter or the table), then the zero-timeout
    /// guard, then the offset/length bound checks, and only then the
    /// table lookup and duplicate/overlap scan.
    pub fn add_fragment(&mut self, key: K, info: FragmentInfo) -> ReasmStatus {
        if info.total_pdu_len == 0 || info.data.is_empty() {
            return ReasmStatus::ArgsInvalid;
        }

        // end is exclusive; the original's `frag_end` is the last byte's
        // inclusive index, i.e. `end - 1`.
        let end = info.offset + info.data.len();

        // Skip non-fragmented packets (reassembly.c:144-150): a single
        // "fragment" that is both final and starts at offset 0. This
        // never reaches the cleanup-counter bookkeeping below.
        if info.is_final && info.offset == 0 {
            return if end == info.total_pdu_len {
                self.table.remove(&key);
                ReasmStatus::Skipped
            } else {
                ReasmStatus::BadLen
            };
        }

        // Don't allow a zero timeout: it would prevent stale entries
        // from ever expiring (reassembly.c:152-156).
        if info.timeout_sec == 0 {
            return ReasmStatus::ArgsInvalid;
        }

        // Does the fragment extend past total PDU length?
        if end > info.total_pdu_len {
            return ReasmStatus::BadOffset;
        }
        // A final fragment must end exactly at total_pdu_len; a
        // non-final one must not (this also disallows 0-length
        // fragments, already rejected above as ArgsInvalid).
        if info.is_final != (end == info.total_pdu_len) {
            return ReasmStatus::BadOffset;
        }

        self.processed_since_cleanup += 1;
        if self.processed_since_cleanup >= self.cleanup_interval {
            self.cleanup(info.timestamp_sec);
            self.processed_since_cleanup = 0;
        }

        if let Some(entry) = self.table.get(&key) {
            if entry.expired_at(info.timestamp_sec) {
                self.table.remove(&key);
            }
        }

        let entry = self.table.entry(key).or_insert_with(|| Entry {
            total_pdu_len: info.total_pdu_len,
            collected_len: 0,
            first_seen_sec: info.timestamp_sec,
            timeout_sec: info.timeout_sec,
            fragments: Vec::new(),
        });

        for f in &entry.fragments {
            if f.start == info.offset && f.end == end {
                return ReasmStatus::Duplicate;
            }
            if info.offset < f.end && f.start < end {
                return ReasmStatus::Overlap;
            }
        }

        entry.collected_len += info.data.len();
        entry.fragments.push(Fragment {
            start: info.offset,
            end,
            data: info.data,
        });

        if entry.collected_len == entry.total_pdu_len {
            ReasmStatus::Complete
        } else {
            ReasmStatus::InProgress
        }
    }

    /// Drop entries whose timeout has elapsed relative to `now_sec`.
    fn cleanup(&mut self, now_sec: i64) {
        self.table.retain(|_, e| !e.expired_at(now_sec));
    }

    /// Take ownership of the reassembled, contiguous payload for `key`
    /// once [`ReasmStatus::Complete`] has been returned. Scans fragments
    /// in ascending offset order and concatenates them, appending a
    /// trailing NUL byte for convenience (matching the original's
    /// `reasm_payload_get`, which null-terminates for safe use with
    /// C string routines). Removes the table entry.
    pub fn payload_get(&mut self, key: &K) -> Option<Vec<u8>> {
        let mut entry = self.table.remove(key)?;
        entry.fragments.sort_by_key(|f| f.start);
        let mut out = Vec::with_capacity(entry.total_pdu_len + 1);
        for f in &entry.fragments {
            out.extend_from_slice(&f.data);
        }
        out.push(0);
        Some(out)
    }

    /// Bytes collected so far for `key`, if an entry exists. Lets a
    /// caller that only ever appends fragments in order (e.g. X.25
    /// segments on one AVLC channel thread) derive the next fragment's
    /// offset without tracking it separately.
    pub fn collected_len(&self, key: &K) -> Option<usize> {
        self.table.get(key).map(|e| e.collected_len)
    }

    /// Number of entries currently tracked (for tests/diagnostics).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no reassembly is in progress.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(offset: usize, data: &[u8], total: usize, final_: bool) -> FragmentInfo {
        FragmentInfo {
            offset,
            data: data.to_vec(),
            total_pdu_len: total,
            timestamp_sec: 1000,
            timeout_sec: 60,
            is_final: final_,
        }
    }

    #[test]
    fn single_fragment_is_skipped() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        let st = r.add_fragment(1, frag(0, b"hello", 5, true));
        assert_eq!(st, ReasmStatus::Skipped);
        assert!(r.is_empty());
    }

    #[test]
    fn three_fragments_complete_in_any_order() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        assert_eq!(r.add_fragment(1, frag(5, b"World", 10, true)), ReasmStatus::InProgress);
        assert_eq!(r.add_fragment(1, frag(0, b"Hello", 10, false)), ReasmStatus::Complete);
        let payload = r.payload_get(&1).unwrap();
        assert_eq!(&payload[..10], b"HelloWorld");
        assert_eq!(payload[10], 0);
        assert!(r.is_empty());
    }

    #[test]
    fn duplicate_fragment_detected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        r.add_fragment(1, frag(0, b"Hello", 10, false));
        assert_eq!(r.add_fragment(1, frag(0, b"Hello", 10, false)), ReasmStatus::Duplicate);
    }

    #[test]
    fn overlapping_fragments_detected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        r.add_fragment(1, frag(0, &[0u8; 10], 20, false));
        assert_eq!(r.add_fragment(1, frag(5, &[0u8; 10], 20, false)), ReasmStatus::Overlap);
    }

    #[test]
    fn bad_offset_and_bad_len_rejected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        assert_eq!(r.add_fragment(1, frag(10, b"x", 10, false)), ReasmStatus::BadOffset);
        assert_eq!(r.add_fragment(1, frag(0, b"toolong", 3, true)), ReasmStatus::BadLen);
    }

    #[test]
    fn zero_length_fragment_rejected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        assert_eq!(r.add_fragment(1, frag(0, b"", 10, false)), ReasmStatus::ArgsInvalid);
    }

    #[test]
    fn zero_total_pdu_len_rejected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        assert_eq!(r.add_fragment(1, frag(0, b"abc", 0, false)), ReasmStatus::ArgsInvalid);
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        let mut f = frag(0, b"Hello", 10, false);
        f.timeout_sec = 0;
        assert_eq!(r.add_fragment(1, f), ReasmStatus::ArgsInvalid);
    }

    #[test]
    fn final_flag_mismatch_at_zero_offset_is_bad_len() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        // offset == 0 and is_final: this is the skip-non-fragmented
        // branch, not a bounds check, so a length mismatch here is
        // BadLen rather than BadOffset.
        assert_eq!(r.add_fragment(1, frag(0, b"abc", 10, true)), ReasmStatus::BadLen);
    }

    #[test]
    fn final_flag_mismatch_at_nonzero_offset_is_bad_offset() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        // Nonzero offset with is_final but the fragment doesn't reach
        // total_pdu_len: goes through the general bounds check instead
        // of the skip-non-fragmented branch, so it's BadOffset.
        assert_eq!(r.add_fragment(1, frag(5, b"abc", 10, true)), ReasmStatus::BadOffset);
    }

    #[test]
    fn expired_entry_is_replaced_with_fresh_in_progress() {
        let mut r: Reassembly<u32> = Reassembly::new(100);
        let mut f = frag(0, b"Hello", 10, false);
        f.timeout_sec = 5;
        r.add_fragment(1, f);
        let mut f2 = frag(0, b"Hello", 10, false);
        f2.timestamp_sec = 2000; // well past the 5s timeout
        assert_eq!(r.add_fragment(1, f2), ReasmStatus::InProgress);
    }

    #[test]
    fn cleanup_interval_sweeps_expired_entries() {
        let mut r: Reassembly<u32> = Reassembly::new(2);
        let mut f = frag(0, b"Hello", 10, false);
        f.timeout_sec = 1;
        r.add_fragment(1, f);
        assert_eq!(r.len(), 1);
        // Two more fragments (for a different key) push processed count
        // past the cleanup interval with a much later timestamp.
        let mut f2 = frag(0, b"x", 10, false);
        f2.timestamp_sec = 5000;
        r.add_fragment(2, f2.clone());
        f2.timestamp_sec = 5001;
        r.add_fragment(2, f2);
        assert!(r.table.get(&1).is_none());
    }

    #[test]
    fn skipped_fragment_does_not_advance_cleanup_counter() {
        // cleanup_interval of 1 means every fragment that reaches the
        // counter bookkeeping triggers an immediate sweep. A Skipped
        // (non-fragmented-packet) fragment must never reach it.
        let mut r: Reassembly<u32> = Reassembly::new(1);
        let mut f1 = frag(0, b"Hello", 10, false);
        f1.timeout_sec = 1;
        f1.timestamp_sec = 1000;
        r.add_fragment(1, f1); // InProgress: bumps counter, sweeps (nothing expired yet)
        assert_eq!(r.len(), 1);

        // A Skipped fragment, far enough past key 1's timeout that a
        // sweep would have evicted it if the counter were bumped here.
        let mut skip = frag(0, b"hi", 2, true);
        skip.timestamp_sec = 5000;
        assert_eq!(r.add_fragment(2, skip), ReasmStatus::Skipped);
        assert_eq!(r.len(), 1, "Skipped fragment must not trigger a cleanup sweep");

        // A real fragment now bumps the counter and triggers the sweep
        // key 1 was due for all along.
        let mut f3 = frag(0, b"x", 10, false);
        f3.timestamp_sec = 5001;
        r.add_fragment(3, f3);
        assert!(r.table.get(&1).is_none());
    }
}
