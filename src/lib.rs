//! # serial-acq
//!
//! A Rust library for recording the analog readings an Arduino streams over
//! USB serial.
//!
//! The board is expected to print one reading per line (for example
//! `Serial.println(analogRead(A0))`). The host side finds the board, opens
//! the port, samples lines for a fixed wall-clock period at a bounded rate
//! and writes each sample to a one-column CSV file, optionally handing
//! every sample to a callback first.
//!
//! ## Features
//!
//! - **Board discovery**: Uses `serialport` enumeration and a manufacturer prefix
//! - **Rate-capped sampling**: Never accepts samples closer than `1 / sample_rate`
//! - **CSV output**: One record per sample, readable back into `polars`
//! - **Callback hook**: Forward samples anywhere from a closure
//! - **Simulated board**: Run everything without hardware
//!
//! The sample rate is an upper bound, not a schedule. Every accepted sample
//! waits on a blocking serial read, so a slow board lowers the achieved rate.
//!
//! ## Examples
//!
//! ### Recording
//!
//! ```rust,no_run
//! use serial_acq::{AcquisitionConfig, AcquisitionEngine};
//! use std::time::Duration;
//!
//! let mut engine = AcquisitionEngine::new(AcquisitionConfig::default())?;
//! engine.setup()?;
//!
//! // Writes /tmp/trial_1.csv
//! engine.run(Duration::from_secs(30), "/tmp/trial_1")?;
//!
//! engine.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Forwarding samples
//!
//! ```rust,no_run
//! use serial_acq::{AcquisitionConfig, AcquisitionEngine, Sample};
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! let (tx, rx) = mpsc::channel::<Sample>();
//! let mut engine = AcquisitionEngine::new(AcquisitionConfig::default())?;
//! engine.setup()?;
//!
//! engine.run_with_callback(Duration::from_secs(5), "/tmp/trial_2", |sample| {
//!     tx.send(sample.clone())
//! })?;
//! println!("Forwarded {} samples", rx.try_iter().count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Without hardware
//!
//! ```rust
//! use serial_acq::simulated::{ScriptedLine, SimulatedBackend};
//! use serial_acq::{AcquisitionConfig, AcquisitionEngine};
//! use std::time::Duration;
//!
//! let backend = SimulatedBackend::new(vec![
//!     ScriptedLine::new(Duration::ZERO, "1.23\r\n"),
//! ]);
//! let config = AcquisitionConfig::new(9600, 100, Duration::from_millis(20))
//!     .with_port("/dev/ttyACM0");
//!
//! let mut engine = AcquisitionEngine::with_backend(config, backend)?;
//! engine.setup()?;
//! let dest = std::env::temp_dir().join("serial_acq_doc");
//! engine.run(Duration::from_millis(50), &dest)?;
//! engine.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod port_resolver;
pub mod recording;
pub mod sample;
pub mod sampling;
pub mod serial_link;
pub mod simulated;

pub use config::{AcquisitionConfig, ConfigError};

pub use engine::{
    AcquisitionEngine, ConnectionError, EngineError, EngineState, FinishError, HookError,
};

pub use port_resolver::{ArduinoDevice, PortResolver, PortResolverError};

pub use recording::{load_recording, CsvSink};

pub use sample::Sample;

pub use serial_link::{LineSource, SerialBackend, SerialLink, SystemSerial};
