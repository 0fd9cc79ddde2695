use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use keyevent::{
    BackendMode, Config, Driver, EventHandler, GpioSampler, KeyDescriptor, KeyEvent,
    MatrixSampler, Sampler, SnapshotSampler,
};
use log::debug;

use crate::board::SimBoard;
use crate::trace::Trace;

/// An event together with the replay time it was dispatched at.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub at_ms: u32,
    pub name: &'static str,
    pub id: u16,
    pub event: KeyEvent,
}

/// Handler that timestamps and collects events.
#[derive(Default)]
pub struct EventLog {
    now_ms: u32,
    events: Vec<LoggedEvent>,
}

impl EventHandler for EventLog {
    fn on_event(&mut self, name: &'static str, key_id: u16, event: KeyEvent) {
        self.events.push(LoggedEvent {
            at_ms: self.now_ms,
            name,
            id: key_id,
            event,
        });
    }
}

/// Outcome of a replay.
#[derive(Debug)]
pub struct Replay {
    pub events: Vec<LoggedEvent>,
    /// Tick times whose snapshot scan failed.
    pub dropped_ticks: Vec<u32>,
    pub ticks: u64,
}

/// Registration summary of a trace.
#[derive(Debug, PartialEq)]
pub struct Check {
    pub keys: usize,
    pub pool_used: usize,
    pub pool_capacity: usize,
}

/// Number of ticks a replay of `trace` takes.
pub fn tick_count(trace: &Trace, tick_ms: u32) -> u64 {
    u64::from(trace.end_ms).div_ceil(u64::from(tick_ms.max(1)))
}

/// Replay `trace` through a key driver polled every `tick_ms`.
pub fn replay(
    trace: &Trace,
    config: Config,
    tick_ms: u32,
    progress: Option<&ProgressBar>,
) -> Result<Replay> {
    if tick_ms == 0 {
        bail!("tick must be at least 1 ms");
    }
    let config = config.with_backend(trace.mode);
    let board = SimBoard::new(&config);
    match trace.mode {
        BackendMode::Gpio => run(trace, config, GpioSampler::new(board), tick_ms, progress),
        BackendMode::Matrix => run(trace, config, MatrixSampler::new(board), tick_ms, progress),
        BackendMode::Custom => run(trace, config, SnapshotSampler::new(board), tick_ms, progress),
    }
}

/// Bring up a driver for `trace` and register its keys without polling.
pub fn check(trace: &Trace, config: Config) -> Result<Check> {
    let config = config.with_backend(trace.mode);
    let board = SimBoard::new(&config);
    let (keys, (pool_used, pool_capacity)) = match trace.mode {
        BackendMode::Gpio => summary(&bring_up(trace, config, GpioSampler::new(board))?),
        BackendMode::Matrix => summary(&bring_up(trace, config, MatrixSampler::new(board))?),
        BackendMode::Custom => summary(&bring_up(trace, config, SnapshotSampler::new(board))?),
    };
    Ok(Check {
        keys,
        pool_used,
        pool_capacity,
    })
}

/// Samplers that sit on top of a [`SimBoard`].
trait OnBoard: Sampler {
    fn board(&mut self) -> &mut SimBoard;
}

impl OnBoard for GpioSampler<SimBoard> {
    fn board(&mut self) -> &mut SimBoard {
        self.inner_mut()
    }
}

impl OnBoard for MatrixSampler<SimBoard> {
    fn board(&mut self) -> &mut SimBoard {
        self.inner_mut()
    }
}

impl OnBoard for SnapshotSampler<SimBoard> {
    fn board(&mut self) -> &mut SimBoard {
        self.inner_mut()
    }
}

fn summary<S: OnBoard>(driver: &Driver<S, EventLog>) -> (usize, (usize, usize)) {
    (driver.key_count(), driver.pool_usage())
}

fn bring_up<S: OnBoard>(trace: &Trace, config: Config, sampler: S) -> Result<Driver<S, EventLog>> {
    let mut driver =
        Driver::new(config, sampler, EventLog::default()).context("bringing up the key driver")?;

    for key in &trace.keys {
        // The driver keeps key names for its whole life, and a replay runs
        // once per process.
        let name: &'static str = Box::leak(key.name.clone().into_boxed_str());
        driver
            .register(KeyDescriptor::new(name, key.id, key.locator))
            .with_context(|| format!("registering key {}", key.name))?;
        driver.sampler_mut().board().attach(key.locator);
    }

    Ok(driver)
}

fn run<S: OnBoard>(
    trace: &Trace,
    config: Config,
    sampler: S,
    tick_ms: u32,
    progress: Option<&ProgressBar>,
) -> Result<Replay> {
    let mut driver = bring_up(trace, config, sampler)?;
    let mut steps = trace.steps.iter().peekable();
    let mut failures = trace.failures.iter().peekable();
    let mut dropped_ticks = Vec::new();
    let mut ticks = 0u64;
    let mut now = 0u32;

    while now < trace.end_ms {
        now = now.saturating_add(tick_ms);
        ticks += 1;

        while let Some(step) = steps.next_if(|s| s.at_ms <= now) {
            let locator = trace.keys[step.key].locator;
            driver.sampler_mut().board().set(locator, step.pressed);
        }
        let mut fail = false;
        while failures.next_if(|&&at| at <= now).is_some() {
            fail = true;
        }
        if fail {
            driver.sampler_mut().board().fail_next_scan();
        }

        driver.handler_mut().now_ms = now;
        if let Err(err) = driver.poll(tick_ms) {
            debug!("t={} {}", now, err);
            dropped_ticks.push(now);
        }

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    let events = std::mem::take(&mut driver.handler_mut().events);
    Ok(Replay {
        events,
        dropped_ticks,
        ticks,
    })
}
