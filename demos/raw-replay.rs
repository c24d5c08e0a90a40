/*! Replay a raw-frame file (§6's length-prefixed record format) through
the AVLC decoder stack, bypassing the DSP front end entirely. Useful
for regression-testing the protocol decoders against frames captured
by a previous `vdl2-rx` run, without needing I/Q samples or a radio.

```no_run
$ raw-replay -r capture.vdl2raw
```
*/
use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vdl2::config::Config;
use vdl2::stats::Stats;
use vdl2::tree::ProtoTree;
use vdl2::x25::SessionTable;
use vdl2::{avlc, raw};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    #[arg(short = 'r', long = "read", help = "Raw-frame file to replay")]
    read: PathBuf,

    #[arg(long = "station-id", default_value = "GND1")]
    station_id: String,

    #[arg(short = 'v', default_value = "0")]
    verbose: usize,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("vdl2")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let mut f = File::open(&opt.read)?;
    let cfg = Config::new(2_100_000, 10, 136_000_000, vec![136_000_000], opt.station_id);
    let stats = Stats::default();
    let mut table = SessionTable::new(cfg.reassembly_cleanup_interval);

    let mut count = 0usize;
    while let Some(rec) = raw::read_record(&mut f)? {
        let channel_freq = rec.metadata.frequency_hz;
        let timestamp_sec = rec.metadata.timestamp_sec;
        if let Some(root) =
            avlc::decode_frame_with_table(&rec.data, &cfg, &stats, &mut table, channel_freq, timestamp_sec)
        {
            let tree = ProtoTree { metadata: rec.metadata, root };
            println!("{}", serde_json::to_string(&tree)?);
            count += 1;
        }
    }
    log::info!("replayed {count} decoded frames");
    for (name, value) in stats.snapshot() {
        log::debug!("{name} = {value}");
    }
    Ok(())
}
