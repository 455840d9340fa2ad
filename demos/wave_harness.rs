//! WAVE harness - Pipes the PCM samples of a WAVE file into a raw file
//!
//! Run with: cargo run --example wave_harness -- <input.wav> <output.raw>
//!
//! This example demonstrates:
//! - Creating stages from the built-in `StageRegistry`
//! - Sniffing the container with a non-consuming peek and `Stage::check`
//! - Connecting a demuxer to a source and tuning its buffer watermarks
//! - Draining the terminal buffer until the stream is exhausted
//!
//! # Pipeline
//!
//! ```text
//!   input.wav ──► source/file-0 ──► [buffer] ──► demux/wave-0 ──► [buffer 10..20] ──► output.raw
//! ```

use std::path::PathBuf;

use media_pipeline::pipeline::{InputPipeline, Pipeline};
use media_pipeline::stage::StageRegistry;
use tokio::io::AsyncWriteExt;

fn print_usage() {
    eprintln!("Usage: wave_harness <INPUT> <OUTPUT>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  INPUT     RIFF/WAVE file to read");
    eprintln!("  OUTPUT    File receiving the raw PCM samples");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") || args.len() != 3 {
        print_usage();
        std::process::exit(if args.len() == 3 { 0 } else { 1 });
    }

    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("media_pipeline=info".parse()?)
                .add_directive("wave_harness=info".parse()?),
        )
        .init();

    let registry = StageRegistry::new();
    let mut pipeline = InputPipeline::new("input_test");

    let mut source = registry.create("source/file")?;
    if let Err(e) = source.open_uri(&input.to_string_lossy()).await {
        eprintln!("Can't open {} for reading: {}", input.display(), e);
        std::process::exit(1);
    }
    let mut sink = tokio::fs::File::create(&output).await?;

    let source_id = pipeline.add_stage(source)?;
    let demux_id = pipeline.add_stage(registry.create("demux/wave")?)?;
    tracing::info!(source = %source_id, demux = %demux_id, "Stages added");

    // Check that the demuxer can handle the input
    let source_buffer = pipeline.buffer(&source_id, 0)?;
    let recognised = match source_buffer.peek_packet().await {
        Some(packet) => pipeline.stage(&demux_id)?.lock().await.check(&packet),
        None => false,
    };
    if !recognised {
        eprintln!("{} is not a RIFF WAVE file", input.display());
        pipeline.shutdown().await;
        std::process::exit(1);
    }

    pipeline.connect(&demux_id, &source_id, 0).await?;

    let output_buffer = pipeline.buffer(&demux_id, 0)?;
    output_buffer.set_min_max(10, 20)?;

    let mut written = 0usize;
    while let Some(packet) = output_buffer.next_packet().await {
        sink.write_all(packet.data()).await?;
        written += packet.len();
        pipeline.free_packet(packet);

        tracing::debug!(
            source_fill = source_buffer.count(),
            output_fill = output_buffer.count(),
            "Buffer fill"
        );
    }
    sink.flush().await?;

    for fill in pipeline.fill_levels() {
        tracing::info!(stage = %fill.stage, output = fill.output, queued = fill.queued, "Final fill");
    }
    tracing::info!(bytes = written, path = %output.display(), "Done");

    pipeline.stop().await?;
    pipeline.shutdown().await;
    Ok(())
}
