//! System clock — process-wide tick source and blocking delays
//!
//! On a real target this wraps SysTick (Cortex-M) or MTIME (RISC-V).
//! On the host the tick source is a monotonic TSC-backed instant captured
//! once per process; every task reads the same epoch.
//!
//! Author: Moroya Sakamoto

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use minstant::Instant;

/// Milliseconds since the process-wide epoch
pub type Tick = u64;

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

fn elapsed() -> Duration {
    Instant::now().duration_since(epoch())
}

/// Whole microseconds in `duration`, saturating at `u64::MAX`
pub fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Current tick count (milliseconds since the epoch)
///
/// Monotonic: never decreases across calls, from any thread.
pub fn now_ticks() -> Tick {
    elapsed().as_millis() as Tick
}

/// Current time in microseconds since the epoch
pub fn now_us() -> u64 {
    duration_us(elapsed())
}

/// Suspend the calling task for at least `duration`
///
/// Only the calling thread sleeps. A zero duration returns immediately.
/// Resumption may be arbitrarily late, never early.
pub fn delay(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let deadline_us = now_us().saturating_add(duration_us(duration));
    // now_us() truncates; +1 keeps the wait >= duration.
    sleep_until_us(deadline_us.saturating_add(1));
}

/// Delay in milliseconds (vTaskDelay-style)
pub fn delay_ms(ms: u64) {
    delay(Duration::from_millis(ms));
}

/// Suspend until the absolute time `deadline_us` (µs since the epoch)
///
/// Returns immediately if the deadline has already passed.
pub fn sleep_until_us(deadline_us: u64) {
    loop {
        let now = now_us();
        if now >= deadline_us {
            return;
        }
        thread::sleep(Duration::from_micros(deadline_us - now));
    }
}

/// Absolute deadline tracker for a periodic activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Absolute deadline (µs since the epoch)
    at_us: u64,
}

impl Deadline {
    /// Deadline `period_us` after `start_us`
    pub fn new(start_us: u64, period_us: u64) -> Self {
        Self {
            at_us: start_us.saturating_add(period_us),
        }
    }

    /// Absolute deadline in microseconds
    pub fn at_us(&self) -> u64 {
        self.at_us
    }

    /// How far past the deadline `current_us` is (0 if early or on time)
    pub fn lateness(&self, current_us: u64) -> u64 {
        current_us.saturating_sub(self.at_us)
    }

    /// Move the deadline forward by exactly one period
    ///
    /// Always relative to the previous deadline, never to the current time,
    /// so late wake-ups do not accumulate drift.
    pub fn advance(&mut self, period_us: u64) {
        self.at_us = self.at_us.saturating_add(period_us);
    }
}
