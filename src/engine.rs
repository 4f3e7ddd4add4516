use crate::config::{AcquisitionConfig, ConfigError};
use crate::port_resolver::{PortResolver, PortResolverError};
use crate::recording::{destination_path, CsvSink};
use crate::sample::Sample;
use crate::sampling::{sample_until, AcquisitionRun, SampleHook};
use crate::serial_link::{LineSource, SerialBackend, SystemSerial};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error type a sample hook may fail with.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unconfigured,
    Ready,
    Running,
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Resolve(#[from] PortResolverError),

    #[error("Could not open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("A connection is already open")]
    AlreadyConnected,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine is {state}, call setup() before running an acquisition")]
    NotReady { state: EngineState },

    #[error("Could not create {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write sample: {0}")]
    Sink(#[from] csv::Error),

    #[error("Serial link failed: {0}")]
    Link(#[source] std::io::Error),

    #[error(transparent)]
    Hook(HookError),
}

#[derive(Debug, thiserror::Error)]
pub enum FinishError {
    #[error("There is no open connection with the board")]
    NotConnected,
}

/// Puts the engine back to `Ready` once sampling stops, even when a hook
/// panics out of the loop.
struct RunningGuard<'a> {
    state: &'a mut EngineState,
}

impl<'a> RunningGuard<'a> {
    fn enter(state: &'a mut EngineState) -> Self {
        *state = EngineState::Running;
        Self { state }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.state = EngineState::Ready;
    }
}

/// Owns the link to one board and runs acquisitions over it.
///
/// Lifecycle: [`setup`](Self::setup) opens the link, any number of
/// [`run`](Self::run) calls sample it, [`finish`](Self::finish) closes it.
pub struct AcquisitionEngine<B: SerialBackend = SystemSerial> {
    config: AcquisitionConfig,
    backend: B,
    state: EngineState,
    link: Option<B::Link>,
    port: Option<String>,
}

impl AcquisitionEngine<SystemSerial> {
    pub fn new(config: AcquisitionConfig) -> Result<Self, ConfigError> {
        Self::with_backend(config, SystemSerial)
    }
}

impl<B: SerialBackend> AcquisitionEngine<B> {
    pub fn with_backend(config: AcquisitionConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            state: EngineState::Unconfigured,
            link: None,
            port: None,
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Device path of the open link.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Find the board and open the link to it.
    pub fn setup(&mut self) -> Result<(), ConnectionError> {
        if self.link.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }

        let port = PortResolver::resolve(&self.backend, &self.config)?;
        let link = self
            .backend
            .open(&port, self.config.baud_rate, self.config.timeout())
            .map_err(|source| ConnectionError::Open {
                port: port.clone(),
                source,
            })?;

        log::info!("Established connection with board at port {}", port);
        self.link = Some(link);
        self.port = Some(port);
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Acquire for `period`, writing to `<destination>.csv`.
    pub fn run(
        &mut self,
        period: Duration,
        destination: impl AsRef<Path>,
    ) -> Result<(), EngineError> {
        self.acquire(period, destination.as_ref(), None)
    }

    /// Acquire for `period`, handing every sample to `hook` before it is
    /// written to `<destination>.csv`.
    ///
    /// A hook error stops the acquisition and is returned as is. Samples
    /// accepted before the failure stay in the file.
    pub fn run_with_callback<F, E>(
        &mut self,
        period: Duration,
        destination: impl AsRef<Path>,
        mut hook: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&Sample) -> Result<(), E>,
        E: Into<HookError>,
    {
        let mut hook =
            |sample: &Sample| -> Result<(), HookError> { hook(sample).map_err(Into::into) };
        self.acquire(period, destination.as_ref(), Some(&mut hook))
    }

    #[tracing::instrument(
        name = "acquisition",
        skip_all,
        fields(period = ?period, destination = %destination.display())
    )]
    fn acquire(
        &mut self,
        period: Duration,
        destination: &Path,
        hook: Option<SampleHook<'_>>,
    ) -> Result<(), EngineError> {
        let link = match (self.state, self.link.as_mut()) {
            (EngineState::Ready, Some(link)) => link,
            (state, _) => return Err(EngineError::NotReady { state }),
        };

        let path = destination_path(destination);
        let mut sink = CsvSink::create(&path).map_err(|source| EngineError::Destination {
            path: path.clone(),
            source,
        })?;

        log::info!(
            "Beginning acquisition of {:.3} seconds, writing to file: {}",
            period.as_secs_f64(),
            path.display()
        );

        let running = RunningGuard::enter(&mut self.state);
        let run = AcquisitionRun::new(period, &path);
        let result = sample_until(link, &run, self.config.sample_interval(), &mut sink, hook);
        drop(running);

        match result {
            Ok(stats) => {
                let records = sink.finish()?;
                log::info!(
                    "Acquisition finished: {} records ({} without data), {} throttled polls",
                    records,
                    stats.no_data,
                    stats.throttled_polls
                );
                Ok(())
            }
            Err(e) => {
                if let Err(flush) = sink.finish() {
                    log::warn!(
                        "Could not flush {} after aborted acquisition: {}",
                        path.display(),
                        flush
                    );
                }
                if let EngineError::Link(cause) = &e {
                    log::warn!("Lost connection with board, closing it: {}", cause);
                    self.release();
                }
                Err(e)
            }
        }
    }

    /// Close the link to the board.
    ///
    /// Fails with [`FinishError::NotConnected`] whenever no link is open,
    /// including a second call after a successful one.
    pub fn finish(&mut self) -> Result<(), FinishError> {
        if self.link.is_none() {
            log::warn!("finish() called with no open connection");
            return Err(FinishError::NotConnected);
        }

        self.release();
        log::info!("Closed connection with board");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close() {
                log::warn!("Error while closing serial link: {}", e);
            }
        }
        self.port = None;
        self.state = EngineState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{usb_port, ScriptedLine, SimulatedBackend};

    fn config(sample_rate: u32, timeout_ms: u64) -> AcquisitionConfig {
        AcquisitionConfig::new(9600, sample_rate, Duration::from_millis(timeout_ms))
            .with_port("/dev/ttyACM0")
    }

    #[test]
    fn test_new_engine_is_unconfigured() {
        let engine = AcquisitionEngine::with_backend(config(10, 10), SimulatedBackend::new(vec![]))
            .unwrap();
        assert_eq!(engine.state(), EngineState::Unconfigured);
        assert_eq!(engine.port(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = AcquisitionEngine::with_backend(config(0, 10), SimulatedBackend::new(vec![]));
        assert!(matches!(result, Err(ConfigError::ZeroSampleRate)));
    }

    #[test]
    fn test_setup_resolves_and_opens() {
        let backend = SimulatedBackend::new(vec![])
            .with_ports(vec![usb_port("/dev/ttyACM2", "Arduino (www.arduino.cc)")]);
        let config = AcquisitionConfig::new(9600, 10, Duration::from_millis(10));
        let mut engine = AcquisitionEngine::with_backend(config, backend).unwrap();

        engine.setup().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.port(), Some("/dev/ttyACM2"));
    }

    #[test]
    fn test_setup_twice_is_rejected() {
        let mut engine =
            AcquisitionEngine::with_backend(config(10, 10), SimulatedBackend::new(vec![])).unwrap();
        engine.setup().unwrap();

        assert!(matches!(engine.setup(), Err(ConnectionError::AlreadyConnected)));
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_open_failure_keeps_cause() {
        let backend = SimulatedBackend::new(vec![]).failing_open(serialport::ErrorKind::NoDevice);
        let mut engine = AcquisitionEngine::with_backend(config(10, 10), backend).unwrap();

        match engine.setup() {
            Err(ConnectionError::Open { port, source }) => {
                assert_eq!(port, "/dev/ttyACM0");
                assert_eq!(source.kind(), serialport::ErrorKind::NoDevice);
            }
            other => unreachable!("unexpected setup result: {:?}", other),
        }
        assert_eq!(engine.state(), EngineState::Unconfigured);
    }

    #[test]
    fn test_missing_board_is_port_not_found() {
        let backend = SimulatedBackend::new(vec![]);
        let config = AcquisitionConfig::new(9600, 10, Duration::from_millis(10));
        let mut engine = AcquisitionEngine::with_backend(config, backend).unwrap();

        assert!(matches!(
            engine.setup(),
            Err(ConnectionError::Resolve(PortResolverError::PortNotFound { .. }))
        ));
        assert_eq!(engine.state(), EngineState::Unconfigured);
    }

    #[test]
    fn test_finish_is_not_repeatable() {
        let mut engine =
            AcquisitionEngine::with_backend(config(10, 10), SimulatedBackend::new(vec![])).unwrap();
        engine.setup().unwrap();

        assert!(engine.finish().is_ok());
        assert_eq!(engine.state(), EngineState::Closed);
        assert!(matches!(engine.finish(), Err(FinishError::NotConnected)));
        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[test]
    fn test_setup_again_after_finish() {
        let mut engine =
            AcquisitionEngine::with_backend(config(10, 10), SimulatedBackend::new(vec![])).unwrap();
        engine.setup().unwrap();
        engine.finish().unwrap();

        engine.setup().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_run_after_finish_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            AcquisitionEngine::with_backend(config(10, 10), SimulatedBackend::new(vec![])).unwrap();
        engine.setup().unwrap();
        engine.finish().unwrap();

        let dest = dir.path().join("late");
        let result = engine.run(Duration::from_millis(10), &dest);
        assert!(matches!(
            result,
            Err(EngineError::NotReady { state: EngineState::Closed })
        ));
        assert!(!destination_path(&dest).exists());
    }

    #[test]
    fn test_lost_link_closes_engine() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SimulatedBackend::new(vec![
            ScriptedLine::new(Duration::ZERO, "1\r\n"),
            ScriptedLine::disconnect(Duration::ZERO),
        ]);
        let mut engine = AcquisitionEngine::with_backend(config(100, 50), backend).unwrap();
        engine.setup().unwrap();

        let dest = dir.path().join("unplugged");
        let result = engine.run(Duration::from_secs(1), &dest);

        assert!(matches!(result, Err(EngineError::Link(_))));
        assert_eq!(engine.state(), EngineState::Closed);
        assert_eq!(std::fs::read_to_string(destination_path(&dest)).unwrap(), "1\n");
        assert!(matches!(engine.finish(), Err(FinishError::NotConnected)));
    }

    #[test]
    fn test_panicking_hook_leaves_engine_ready() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SimulatedBackend::streaming("8\n", 100);
        let mut engine = AcquisitionEngine::with_backend(config(100, 50), backend).unwrap();
        engine.setup().unwrap();

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.run_with_callback(
                Duration::from_secs(1),
                dir.path().join("exploded"),
                |_: &Sample| -> Result<(), std::io::Error> {
                    std::panic::resume_unwind(Box::new("hook exploded"))
                },
            )
        }));

        assert!(unwound.is_err());
        assert_eq!(engine.state(), EngineState::Ready);
        engine.run(Duration::from_millis(30), dir.path().join("after")).unwrap();
        assert!(engine.finish().is_ok());
    }

    #[test]
    fn test_engine_ready_again_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SimulatedBackend::streaming("8\n", 100);
        let mut engine = AcquisitionEngine::with_backend(config(100, 50), backend).unwrap();
        engine.setup().unwrap();

        engine.run(Duration::from_millis(30), dir.path().join("first")).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        engine.run(Duration::from_millis(30), dir.path().join("second")).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);

        assert!(dir.path().join("first.csv").exists());
        assert!(dir.path().join("second.csv").exists());
    }
}
