// Record a board for a fixed period
//
// This example finds the board, records its readings to a CSV file and
// closes the connection again.

use clap::Parser;
use serial_acq::recording::destination_path;
use serial_acq::{load_recording, AcquisitionConfig, AcquisitionEngine};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "acquire")]
#[command(about = "Record analog readings streamed by an Arduino")]
struct Args {
    /// Destination file, without extension
    dest: PathBuf,

    /// Acquisition period in seconds
    #[arg(short, long, default_value_t = 30.0)]
    seconds: f64,

    /// TOML file with acquisition settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, skips board discovery
    #[arg(short, long)]
    port: Option<String>,

    /// Maximum sample rate in Hz
    #[arg(short, long)]
    rate: Option<u32>,

    /// Baud rate of the board sketch
    #[arg(short, long)]
    baud: Option<u32>,

    /// Show debug information and detailed logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let mut config = match &args.config {
        Some(path) => AcquisitionConfig::from_file(path)?,
        None => AcquisitionConfig::default(),
    };
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(rate) = args.rate {
        config.sample_rate = rate;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }

    let mut engine = AcquisitionEngine::new(config)?;
    engine.setup()?;

    let result = engine.run(Duration::from_secs_f64(args.seconds), &args.dest);
    engine.finish()?;
    result?;

    let recording = load_recording(destination_path(&args.dest))?;
    println!("Recorded {} samples", recording.height());
    Ok(())
}
