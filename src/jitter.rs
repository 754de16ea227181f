//! Jitter monitor — drift-free periodic loop with lateness statistics
//!
//! A fixed-period loop tracks an absolute ideal wake time. Each cycle it
//! sleeps until that deadline, measures how late the host actually woke
//! it, then advances the deadline by exactly one period (never from "now").
//!
//! Author: Moroya Sakamoto

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::task::CancelToken;
use crate::timer::{self, Deadline};

/// Cycles per statistics window
pub const DEFAULT_JITTER_WINDOW: usize = 100;

/// Loop period (10 ms = 100 Hz)
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// Time source and absolute-deadline wait for the periodic loop
pub trait WakeSource {
    /// Current time in microseconds
    fn now_us(&mut self) -> u64;

    /// Suspend until `deadline_us` (may return late, should not return early)
    fn sleep_until_us(&mut self, deadline_us: u64);
}

/// [`WakeSource`] backed by the process-wide clock
#[derive(Debug, Clone, Copy, Default)]
pub struct HostWake;

impl WakeSource for HostWake {
    fn now_us(&mut self) -> u64 {
        timer::now_us()
    }

    fn sleep_until_us(&mut self, deadline_us: u64) {
        timer::sleep_until_us(deadline_us);
    }
}

/// Jitter monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterConfig {
    /// Loop period
    pub period: Duration,
    /// Cycles per reported window
    pub window: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            window: DEFAULT_JITTER_WINDOW,
        }
    }
}

/// Jitter monitor setup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JitterError {
    /// Period or window outside the usable range
    #[error("invalid jitter config: {0}")]
    InvalidConfig(&'static str),
}

/// Statistics for one full window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterReport {
    /// Worst lateness in the window (µs)
    pub max_us: u64,
    /// Mean lateness, `sum / samples` rounded down (µs)
    pub mean_us: u64,
    /// Samples aggregated (the window size)
    pub samples: usize,
}

/// Rolling max/sum accumulator over a fixed number of samples
#[derive(Debug, Clone)]
pub struct JitterWindow {
    size: usize,
    count: usize,
    max_us: u64,
    sum_us: u64,
}

impl JitterWindow {
    /// Window of `size` samples (must be non-zero)
    pub fn new(size: usize) -> Result<Self, JitterError> {
        if size == 0 {
            return Err(JitterError::InvalidConfig("window must hold at least one sample"));
        }
        Ok(Self {
            size,
            count: 0,
            max_us: 0,
            sum_us: 0,
        })
    }

    /// Record one lateness sample
    ///
    /// Returns the window summary when this sample fills the window, then
    /// starts a fresh window.
    pub fn record(&mut self, lateness_us: u64) -> Option<JitterReport> {
        self.max_us = self.max_us.max(lateness_us);
        self.sum_us = self.sum_us.saturating_add(lateness_us);
        self.count += 1;

        if self.count < self.size {
            return None;
        }

        let report = JitterReport {
            max_us: self.max_us,
            mean_us: self.sum_us / self.count as u64,
            samples: self.count,
        };
        self.reset();
        Some(report)
    }

    /// Samples recorded in the current window
    pub fn len(&self) -> usize {
        self.count
    }

    /// Is the current window empty?
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Window size
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Discard the current window
    pub fn reset(&mut self) {
        self.count = 0;
        self.max_us = 0;
        self.sum_us = 0;
    }
}

/// Fixed-period loop measuring wake-up lateness
#[derive(Debug, Clone)]
pub struct JitterMonitor {
    period_us: u64,
    /// Ideal next wake; `None` until the first cycle
    next_wake: Option<Deadline>,
    window: JitterWindow,
    /// Cycles run since construction
    cycles: u64,
}

impl JitterMonitor {
    /// Create a monitor; rejects a zero period or an empty window
    pub fn new(config: JitterConfig) -> Result<Self, JitterError> {
        let period_us = u64::try_from(config.period.as_micros())
            .map_err(|_| JitterError::InvalidConfig("period does not fit in u64 µs"))?;
        if period_us == 0 {
            return Err(JitterError::InvalidConfig("period must be at least 1 µs"));
        }
        Ok(Self {
            period_us,
            next_wake: None,
            window: JitterWindow::new(config.window)?,
            cycles: 0,
        })
    }

    /// Loop period in microseconds
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Ideal time of the next wake (µs), once the loop has begun
    pub fn next_wake_us(&self) -> Option<u64> {
        self.next_wake.map(|d| d.at_us())
    }

    /// Cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle: wait for the ideal wake time, measure, advance
    ///
    /// Returns a report whenever a window completes.
    pub fn step<W: WakeSource>(&mut self, source: &mut W) -> Option<JitterReport> {
        let period_us = self.period_us;
        let deadline = self
            .next_wake
            .get_or_insert_with(|| Deadline::new(source.now_us(), period_us));

        source.sleep_until_us(deadline.at_us());
        let actual = source.now_us();
        // Early wakes count as zero; late wakes are reported unclamped.
        let lateness_us = deadline.lateness(actual);
        deadline.advance(period_us);

        self.cycles += 1;
        self.window.record(lateness_us)
    }

    /// Run forever, logging each window summary
    pub fn run<W: WakeSource>(&mut self, source: &mut W) -> ! {
        self.log_start();
        loop {
            if let Some(report) = self.step(source) {
                log_report(&report);
            }
        }
    }

    /// Run until `token` is cancelled; returns the number of reports emitted
    pub fn run_until<W: WakeSource>(&mut self, source: &mut W, token: &CancelToken) -> u64 {
        self.log_start();
        let mut reports = 0;
        while !token.is_cancelled() {
            if let Some(report) = self.step(source) {
                log_report(&report);
                reports += 1;
            }
        }
        debug!(cycles = self.cycles, reports, "jitter loop cancelled");
        reports
    }

    fn log_start(&self) {
        info!(
            period_us = self.period_us,
            window = self.window.capacity(),
            "jitter loop starting"
        );
    }
}

fn log_report(report: &JitterReport) {
    info!(
        max_us = report.max_us,
        mean_us = report.mean_us,
        samples = report.samples,
        "jitter window: max {} us, avg {} us",
        report.max_us,
        report.mean_us
    );
}
