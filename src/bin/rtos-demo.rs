//! Sensor pipeline demo on the simulated RTOS.
//!
//! Four tasks, as on the target board:
//! - `Sensor` (prio 1): samples a temperature once a second and queues it
//! - `Process` (prio 2): blocks on the queue, "processes" each sample for 200 ms
//! - `Monitor` (prio 3): heartbeat every 5 s
//! - `Jitter` (prio 4): 100 Hz loop reporting wake-up lateness once a second
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=rtos_sim=info,rtos_demo=info cargo run --features demo --bin rtos-demo
//! ```
//!
//! # Signals
//!
//! - `SIGINT`: cancel every task, join, exit

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use rtos_sim::jitter::{HostWake, JitterConfig, JitterError, JitterMonitor};
use rtos_sim::{
    delay, logging, now_ticks, CancelToken, Kernel, MessageQueue, TaskError, TaskPriority, Tick,
};

/// Sensor sampling period.
const SENSOR_PERIOD: Duration = Duration::from_millis(1000);

/// Simulated processing time per sample.
const PROCESSING_TIME: Duration = Duration::from_millis(200);

/// Heartbeat period.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// How long the consumer waits before re-checking for cancellation.
const RECEIVE_POLL: Duration = Duration::from_millis(500);

/// Granularity of cancellable sleeps.
const CANCEL_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct SensorData {
    id: u32,
    value: f32,
    timestamp: Tick,
}

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Jitter(#[from] JitterError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("rtos-demo: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    logging::init_tracing_with("rtos_sim=info,rtos_demo=info");
    info!("MiniRTOS simulation starting");

    let token = CancelToken::new();
    let on_signal = token.clone();
    ctrlc::set_handler(move || on_signal.cancel())?;

    let queue: Arc<MessageQueue<SensorData>> = Arc::new(MessageQueue::new());
    let mut jitter = JitterMonitor::new(JitterConfig::default())?;

    let mut kernel = Kernel::new();

    let (tx, cancel) = (Arc::clone(&queue), token.clone());
    kernel.spawn_task("Sensor", TaskPriority(1), move || sensor_task(&tx, &cancel))?;

    let (rx, cancel) = (Arc::clone(&queue), token.clone());
    kernel.spawn_task("Process", TaskPriority(2), move || processing_task(&rx, &cancel))?;

    let cancel = token.clone();
    kernel.spawn_task("Monitor", TaskPriority(3), move || monitor_task(&cancel))?;

    let cancel = token.clone();
    kernel.spawn_task("Jitter", TaskPriority(4), move || {
        jitter.run_until(&mut HostWake, &cancel);
    })?;

    kernel.start()?;

    for (task, outcome) in kernel.join_all() {
        if let Err(e) = outcome {
            warn!(%task, error = %e, "task did not end cleanly");
        }
    }
    info!(pending = queue.len(), "MiniRTOS simulation stopped");
    Ok(())
}

fn sensor_task(queue: &MessageQueue<SensorData>, cancel: &CancelToken) {
    let mut rng = rand::thread_rng();
    let mut id = 0;

    while !cancel.is_cancelled() {
        id += 1;
        let value: f32 = rng.gen_range(20.0..30.0);
        info!(value = f64::from(value), "read sample, sending to queue");
        queue.send(SensorData {
            id,
            value,
            timestamp: now_ticks(),
        });
        cancellable_delay(SENSOR_PERIOD, cancel);
    }
}

fn processing_task(queue: &MessageQueue<SensorData>, cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        let Ok(data) = queue.receive(Some(RECEIVE_POLL)) else {
            continue;
        };
        info!(
            id = data.id,
            value = f64::from(data.value),
            timestamp = data.timestamp,
            latency_ms = now_ticks().saturating_sub(data.timestamp),
            "received sample"
        );
        delay(PROCESSING_TIME);
    }
}

fn monitor_task(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        info!("system heartbeat OK");
        cancellable_delay(HEARTBEAT_PERIOD, cancel);
    }
}

/// Delay in short slices so a cancelled task exits promptly.
fn cancellable_delay(total: Duration, cancel: &CancelToken) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let slice = remaining.min(CANCEL_POLL);
        delay(slice);
        remaining -= slice;
    }
}
