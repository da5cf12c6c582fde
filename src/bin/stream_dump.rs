//! Stream dump - decode a captured heartbeat stream and print datapoints
//!
//! Usage:
//!   cargo run --bin stream_dump -- capture.bin
//!   curl -s http://client/buffer | cargo run --bin stream_dump

use std::io::Read;

use clap::Parser;

use ohdmon_rs::codec;
use ohdmon_rs::common::cli::StreamDumpArgs;

fn main() -> anyhow::Result<()> {
    let args = StreamDumpArgs::parse();

    let bytes = match &args.file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let heartbeats = codec::from_stream(&bytes, args.version)?;

    println!(
        "{} bytes, {} datapoint(s)",
        bytes.len(),
        heartbeats.len()
    );
    for (i, hb) in heartbeats.iter().enumerate() {
        println!("{:4}: {}", i, hb);
    }
    Ok(())
}
