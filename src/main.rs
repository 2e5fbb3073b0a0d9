// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Inspects media command streams and runs the media pipeline against a software command
//! streamer.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use argh::FromArgs;
use hw_cmd::Generation;
use log::info;
use mediacmd::codec::default_registry;
use mediacmd::codec::Codec;
use mediacmd::config::MediaConfig;
use mediacmd::pipeline::MediaPipeline;
use mediacmd::platform::Platform;
use mediacmd::sim::CommandStreamer;
use status_report::FrameParams;
use status_report::GpuVaAllocator;
use status_report::MediaStatusFormat;
use status_report::StatusReport;

// GPU virtual address range handed to status memory.
const STATUS_POOL_BASE: u64 = 0x1_0000_0000;
const STATUS_POOL_SIZE: u64 = 64 << 20;
const STATUS_POOL_ALIGN: u64 = 0x1000;

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "defaults",
    description = "Print the default dwords of each instruction."
)]
struct DefaultsCommand {
    /// hardware generation (default xe2_lpm)
    #[argh(option, default = "Generation::default()")]
    generation: Generation,
    /// only print this instruction, e.g. MI_FLUSH_DW
    #[argh(option)]
    kind: Option<String>,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "decode",
    description = "Decode a little-endian command stream file."
)]
struct DecodeCommand {
    #[argh(positional)]
    file: PathBuf,
    /// hardware generation (default xe2_lpm)
    #[argh(option, default = "Generation::default()")]
    generation: Generation,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "simulate",
    description = "Run frames through the pipeline and a software command streamer."
)]
struct SimulateCommand {
    /// JSON config file
    #[argh(option)]
    cfg: Option<PathBuf>,
    /// codec to run (default hevc)
    #[argh(option, default = "Codec::Hevc")]
    codec: Codec,
    /// hardware generation, overrides the config file
    #[argh(option)]
    generation: Option<Generation>,
    /// status ring size, overrides the config file
    #[argh(option)]
    ring_size: Option<u32>,
    /// number of frames to submit
    #[argh(option, default = "4")]
    frames: u32,
    /// number of frames the command streamer finishes, the rest hang (default all)
    #[argh(option)]
    complete: Option<u32>,
    /// number of reports to read, at most 65535 (default all frames)
    #[argh(option)]
    report: Option<u16>,
    /// write the command stream of the first frame to this file
    #[argh(option)]
    dump: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Defaults(DefaultsCommand),
    Decode(DecodeCommand),
    Simulate(SimulateCommand),
}

#[derive(FromArgs)]
#[argh(description = "Media command streamer tools")]
struct Options {
    #[argh(subcommand)]
    command: Command,
}

fn print_defaults(cmd: DefaultsCommand) -> Result<()> {
    let registry = cmd.generation.registry();
    let defs = match &cmd.kind {
        Some(kind) => vec![registry.by_name(kind)?],
        None => registry.iter().collect(),
    };
    for def in defs {
        let dwords: Vec<String> = def.defaults.iter().map(|d| format!("{:08x}", d)).collect();
        println!("{:<32} {}", def.name, dwords.join(" "));
    }
    Ok(())
}

fn decode(cmd: DecodeCommand) -> Result<()> {
    let bytes = fs::read(&cmd.file).with_context(|| format!("failed to read {:?}", cmd.file))?;
    let records = cmd
        .generation
        .registry()
        .decode_stream(&bytes)
        .with_context(|| format!("failed to decode {:?}", cmd.file))?;
    for (offset, record) in records {
        println!("{:#06x}  {}", offset, record);
    }
    Ok(())
}

fn simulate(cmd: SimulateCommand) -> Result<()> {
    let mut config = match &cmd.cfg {
        Some(path) => MediaConfig::load(path)?,
        None => MediaConfig::default(),
    };
    if let Some(generation) = cmd.generation {
        config.generation = generation;
    }
    if let Some(ring_size) = cmd.ring_size {
        config.status_ring_size = ring_size;
    }
    config.validate().context("invalid configuration")?;

    let platform = Platform::new(config.generation);
    let mut alloc = GpuVaAllocator::new(STATUS_POOL_BASE, STATUS_POOL_SIZE, STATUS_POOL_ALIGN)?;
    let tracker = Arc::new(
        StatusReport::create(
            MediaStatusFormat::default(),
            &config.tracker_config(),
            &mut alloc,
        )
        .context("failed to create status report")?,
    );
    let workload = default_registry()
        .create(&cmd.codec, config.generation)
        .ok_or_else(|| anyhow!("no workload registered for {}", cmd.codec))?;
    let pipeline = MediaPipeline::new(platform.clone(), &config, workload, tracker.clone())?;
    let mut streamer = CommandStreamer::for_platform(&alloc, &platform);

    let complete = cmd.complete.unwrap_or(cmd.frames);
    if complete > cmd.frames {
        bail!("cannot complete {} of {} frames", complete, cmd.frames);
    }
    for frame in 0..cmd.frames {
        let submission = pipeline
            .submit_frame(FrameParams { feedback: frame })
            .with_context(|| format!("failed to build frame {}", frame))?;
        if frame == 0 {
            if let Some(path) = &cmd.dump {
                fs::write(path, &submission.stream)
                    .with_context(|| format!("failed to write {:?}", path))?;
            }
        }
        // Frames past `complete` stop before the completion count is published.
        let limit = if frame < complete { None } else { Some(1) };
        let summary = streamer.run(platform.registry(), &submission.stream, limit)?;
        info!(
            "submission {} executed {} commands, finished: {}",
            submission.id, summary.executed, summary.finished
        );
        if summary.finished {
            continue;
        }
        // Later frames cannot complete behind a hung one.
        for queued in frame + 1..cmd.frames {
            let submission = pipeline.submit_frame(FrameParams { feedback: queued })?;
            info!("submission {} queued behind a hang", submission.id);
        }
        break;
    }

    let num = match cmd.report {
        Some(num) => num,
        None => u16::try_from(cmd.frames).unwrap_or(u16::MAX),
    };
    let reports = tracker.get_report(num)?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    match argh::from_env::<Options>().command {
        Command::Defaults(cmd) => print_defaults(cmd),
        Command::Decode(cmd) => decode(cmd),
        Command::Simulate(cmd) => simulate(cmd),
    }
}
