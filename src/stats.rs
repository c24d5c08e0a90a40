//! In-process statistics counters (§B of SPEC_FULL.md). StatsD emission
//! itself is out of scope; this is the seam an emitter would read from.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($field:ident => $name:literal),+ $(,)?) => {
        /// Atomic counters incremented throughout the decode path.
        /// All fields start at zero, matching the original's practice of
        /// registering every counter with StatsD at startup so aggregators
        /// see a complete set from the first report.
        #[derive(Debug, Default)]
        pub struct Stats {
            $(pub $field: AtomicU64,)+
        }

        impl Stats {
            /// Take a point-in-time snapshot keyed by the StatsD-style
            /// dotted counter name.
            pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
                let mut m = BTreeMap::new();
                $(m.insert($name, self.$field.load(Ordering::Relaxed));)+
                m
            }
        }
    };
}

counters! {
    hdr_crc_ok => "decoder.hdr.crc_ok",
    hdr_crc_fail => "decoder.hdr.crc_fail",
    fec_ok => "decoder.blocks.fec_ok",
    fec_fail => "decoder.blocks.fec_fail",
    hdlc_good => "decoder.hdlc.good",
    hdlc_bad => "decoder.hdlc.bad",
    avlc_fcs_ok => "avlc.fcs_ok",
    avlc_fcs_fail => "avlc.fcs_fail",
    filtered_out => "decoder.msg.filtered",
    reassembly_complete => "reassembly.complete",
    reassembly_duplicate => "reassembly.duplicate",
    reassembly_overlap => "reassembly.overlap",
    reassembly_bad_offset => "reassembly.bad_offset",
    reassembly_bad_len => "reassembly.bad_len",
}

impl Stats {
    /// Increment a counter by one, relaxed ordering (matching the
    /// original's lock-free StatsD counter increments — exact
    /// inter-thread ordering of stats is not a correctness requirement).
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_all_zero() {
        let stats = Stats::default();
        for (_, v) in stats.snapshot() {
            assert_eq!(v, 0);
        }
    }

    #[test]
    fn incr_is_reflected_in_snapshot() {
        let stats = Stats::default();
        Stats::incr(&stats.fec_ok);
        Stats::incr(&stats.fec_ok);
        assert_eq!(stats.snapshot()["decoder.blocks.fec_ok"], 2);
    }
}
