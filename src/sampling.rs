use crate::engine::{EngineError, HookError};
use crate::recording::CsvSink;
use crate::sample::Sample;
use crate::serial_link::LineSource;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Caller-supplied function seeing every accepted sample before it is
/// persisted.
pub type SampleHook<'a> = &'a mut dyn FnMut(&Sample) -> Result<(), HookError>;

/// One bounded acquisition.
#[derive(Debug, Clone)]
pub struct AcquisitionRun {
    pub period: Duration,
    pub destination: PathBuf,
    pub started_at: Instant,
}

impl AcquisitionRun {
    pub fn new(period: Duration, destination: &Path) -> Self {
        Self {
            period,
            destination: destination.to_path_buf(),
            started_at: Instant::now(),
        }
    }

    pub fn is_over(&self, now: Instant) -> bool {
        now.duration_since(self.started_at) >= self.period
    }
}

/// Caps the accepted sample rate.
///
/// This only keeps samples at least `interval` apart. Every accepted
/// sample still waits on a blocking read, so the achieved rate can be
/// well below the nominal one.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last: Instant,
}

impl Throttle {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    pub fn ready(&self, now: Instant) -> bool {
        now.duration_since(self.last) >= self.interval
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = now;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub accepted: usize,
    pub no_data: usize,
    pub throttled_polls: u64,
}

/// Poll `link` until `run.period` has elapsed, fanning each accepted
/// sample out to `hook` and then `sink`.
pub(crate) fn sample_until<L, W>(
    link: &mut L,
    run: &AcquisitionRun,
    interval: Duration,
    sink: &mut CsvSink<W>,
    mut hook: Option<SampleHook<'_>>,
) -> Result<RunStats, EngineError>
where
    L: LineSource + ?Sized,
    W: Write,
{
    let mut throttle = Throttle::new(interval, run.started_at);
    let mut stats = RunStats::default();

    loop {
        let now = Instant::now();
        if run.is_over(now) {
            break;
        }
        if !throttle.ready(now) {
            stats.throttled_polls += 1;
            continue;
        }

        let bytes = link.read_line().map_err(EngineError::Link)?;
        let sample = Sample::decode(&bytes);
        if sample.is_no_data() {
            log::warn!("Read timed out without data, recording an empty sample");
            stats.no_data += 1;
        }

        if let Some(hook) = hook.as_mut() {
            hook(&sample).map_err(EngineError::Hook)?;
        }

        sink.append(&sample)?;
        stats.accepted += 1;
        throttle.mark(Instant::now());
    }

    Ok(stats)
}
