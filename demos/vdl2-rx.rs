/*! VDL Mode 2 ground receiver, reading raw I/Q from a file and printing
one decoded protocol tree per line as JSON.

```no_run
$ vdl2-rx -r capture.c32 --format u8 --sample-rate 2100000 \
      --center-freq 136000000 --channel 136975000 --channel 136725000
```

Live SDR input, StatsD emission, and the named output-sink surface are
out of scope for this binary; it drives the pipeline end to end against
a file so the decoder stack can be exercised without a radio attached.
*/
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vdl2::config::Config;
use vdl2::runtime::{Runtime, SampleSource};
use vdl2::Complex;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Format {
    /// Unsigned 8-bit, offset-binary (RTL-SDR's native format).
    U8,
    /// Signed 16-bit little-endian.
    S16,
}

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    #[arg(short = 'r', long = "read", help = "Read raw I/Q from file, or '-' for stdin")]
    read: Option<PathBuf>,

    #[arg(long = "format", value_enum, default_value = "u8")]
    format: Format,

    #[arg(long = "sample_rate", default_value = "2100000")]
    sample_rate: u32,

    #[arg(long = "oversample", default_value = "10")]
    oversample: u32,

    #[arg(long = "center-freq", default_value = "136000000")]
    center_freq_hz: u32,

    #[arg(long = "channel", help = "Tuned channel frequency, Hz; may repeat")]
    channels: Vec<u32>,

    #[arg(long = "station-id", default_value = "GND1")]
    station_id: String,

    #[arg(short = 'v', default_value = "0")]
    verbose: usize,
}

struct IqReaderSource {
    reader: Box<dyn Read + Send>,
    format: Format,
}

impl SampleSource for IqReaderSource {
    fn fill(&mut self, buf: &mut [Complex]) -> usize {
        let bytes_per_sample = match self.format {
            Format::U8 => 2,
            Format::S16 => 4,
        };
        let mut raw = vec![0u8; buf.len() * bytes_per_sample];
        let got = read_fully(&mut self.reader, &mut raw);
        let n = got / bytes_per_sample;
        match self.format {
            Format::U8 => {
                for (i, slot) in buf.iter_mut().take(n).enumerate() {
                    let re = (raw[2 * i] as f32 - 127.5) / 127.5;
                    let im = (raw[2 * i + 1] as f32 - 127.5) / 127.5;
                    *slot = Complex::new(re, im);
                }
            }
            Format::S16 => {
                for (i, slot) in buf.iter_mut().take(n).enumerate() {
                    let re = i16::from_le_bytes([raw[4 * i], raw[4 * i + 1]]) as f32 / 32768.0;
                    let im = i16::from_le_bytes([raw[4 * i + 2], raw[4 * i + 3]]) as f32 / 32768.0;
                    *slot = Complex::new(re, im);
                }
            }
        }
        n
    }
}

fn read_fully(r: &mut dyn Read, buf: &mut [u8]) -> usize {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => {
                log::error!("read error: {e}");
                break;
            }
        }
    }
    total
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

    let reader: Box<dyn Read + Send> = match opt.read.as_deref() {
        None => Box::new(io::stdin()),
        Some(path) if path == std::path::Path::new("-") => Box::new(io::stdin()),
        Some(path) => Box::new(File::open(path)?),
    };
    let source = Box::new(IqReaderSource { reader, format: opt.format });

    let channels = if opt.channels.is_empty() { vec![opt.center_freq_hz] } else { opt.channels };
    let cfg = Config::new(opt.sample_rate, opt.oversample, opt.center_freq_hz, channels, opt.station_id);
    let rt = Runtime::new(cfg);
    let handle = rt.run(source);

    for tree in handle.output.iter() {
        println!("{}", serde_json::to_string(&tree)?);
    }
    log::info!("input exhausted, {} workers shutting down", "vdl2-rx");
    handle.join();
    Ok(())
}
