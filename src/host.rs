/// Cooperative scheduling of the sampling engine onto a display sink

use crate::error::{Error, Result};
use crate::sampling::SamplingEngine;
use rand::Rng;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Pause before checking a sink that was not ready again
pub const SINK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

pub trait DisplaySink {
    /// False while the sink cannot take a line yet
    fn is_ready(&self) -> bool;

    fn present(&mut self, text: &str) -> Result<()>;
}

pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn is_ready(&self) -> bool {
        true
    }

    fn present(&mut self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}").map_err(|_| Error::SinkClosed)
    }
}

/// Bounded queue of lines; not ready while full, closed once the receiver drops
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelSink { tx }, rx)
    }
}

impl DisplaySink for ChannelSink {
    fn is_ready(&self) -> bool {
        // A closed channel reports ready so `present` can surface the closure
        self.tx.is_closed() || self.tx.capacity() > 0
    }

    fn present(&mut self, text: &str) -> Result<()> {
        // The driver is the only sender, so a ready check leaves room for one line
        self.tx
            .try_send(text.to_string())
            .map_err(|_| Error::SinkClosed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call any number of times
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    WaitingForSink,
    Sampling,
    Stopped,
    Exhausted,
}

/// What the scheduler should do after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Drew and presented one molecule; run again soon
    Presented,
    /// Sink not ready; retry after a pause
    Waiting,
    /// Nothing further will be scheduled
    Finished,
}

pub struct Driver<R: Rng, S: DisplaySink> {
    engine: SamplingEngine<R>,
    sink: S,
    state: DriverState,
    presented: u64,
}

impl<R: Rng, S: DisplaySink> Driver<R, S> {
    pub fn new(engine: SamplingEngine<R>, sink: S) -> Self {
        Driver {
            engine,
            sink,
            state: DriverState::WaitingForSink,
            presented: 0,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn engine(&self) -> &SamplingEngine<R> {
        &self.engine
    }

    pub fn stop(&mut self) {
        if matches!(self.state, DriverState::WaitingForSink | DriverState::Sampling) {
            info!(presented = self.presented, "sampling stopped");
            self.state = DriverState::Stopped;
        }
    }

    /// Runs a single turn. Never recurses and never draws before the sink is ready.
    pub fn turn(&mut self) -> Result<Turn> {
        match self.state {
            DriverState::Stopped | DriverState::Exhausted => return Ok(Turn::Finished),
            DriverState::WaitingForSink | DriverState::Sampling => {}
        }

        if !self.sink.is_ready() {
            if self.state == DriverState::Sampling {
                debug!("sink backed up, waiting");
            }
            self.state = DriverState::WaitingForSink;
            return Ok(Turn::Waiting);
        }
        if self.state == DriverState::WaitingForSink {
            debug!("sink ready, sampling");
            self.state = DriverState::Sampling;
        }

        let emission = match self.engine.draw_next() {
            Ok(emission) => emission,
            Err(Error::Exhausted) => {
                warn!(presented = self.presented, "atmosphere exhausted, no further draws");
                self.state = DriverState::Exhausted;
                return Ok(Turn::Finished);
            }
            Err(err) => return Err(err),
        };
        self.sink.present(&emission.to_string())?;
        self.presented += 1;
        Ok(Turn::Presented)
    }
}

/// Drives turns until stopped, exhausted or the sink closes. Yields to the
/// runtime after every draw so other tasks keep running.
pub async fn run<R: Rng, S: DisplaySink>(driver: &mut Driver<R, S>, stop: &StopHandle) -> Result<()> {
    run_observed(driver, stop, |_| {}).await
}

/// Same as `run`, calling `observe` after every presented molecule
pub async fn run_observed<R, S, F>(driver: &mut Driver<R, S>, stop: &StopHandle, mut observe: F) -> Result<()>
where
    R: Rng,
    S: DisplaySink,
    F: FnMut(&Driver<R, S>),
{
    loop {
        if stop.is_stopped() {
            driver.stop();
            return Ok(());
        }
        match driver.turn() {
            Ok(Turn::Presented) => {
                observe(driver);
                tokio::task::yield_now().await;
            }
            Ok(Turn::Waiting) => tokio::time::sleep(SINK_RETRY_INTERVAL).await,
            Ok(Turn::Finished) => return Ok(()),
            Err(Error::SinkClosed) => {
                info!(presented = driver.presented(), "display sink closed");
                driver.stop();
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }
}
