//! RTOS-Sim — RTOS primitives on a desktop host
//!
//! Run code written against an RTOS-style API on a general-purpose,
//! preemptively scheduled OS:
//! - Named tasks on host threads, with advisory (unenforced) priority
//! - Unbounded thread-safe message queues for task-to-task handoff
//! - A process-wide millisecond tick and blocking delays
//! - A drift-free periodic loop that measures wake-up jitter
//!
//! Soft real-time only: the host scheduler decides when tasks actually
//! run, and the jitter monitor exists to show how far that drifts from
//! the ideal schedule.
//!
//! Author: Moroya Sakamoto

pub mod jitter;
pub mod kernel;
pub mod logging;
pub mod queue;
pub mod task;
pub mod timer;

pub use jitter::{HostWake, JitterConfig, JitterError, JitterMonitor, JitterReport, WakeSource};
pub use kernel::Kernel;
pub use queue::{MessageQueue, ReceiveTimeout};
pub use task::{CancelToken, TaskError, TaskFn, TaskPriority, TaskRunner, TaskState};
pub use timer::{delay, now_ticks, Tick};
