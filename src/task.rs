//! Task runner — named, independently scheduled units of work
//!
//! Each task is backed by its own host thread. Priority is carried as
//! metadata and surfaced in logs; the host scheduler never sees it.
//!
//! Author: Moroya Sakamoto

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{error, info};

/// Task body — by convention an unbounded loop
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// Advisory task priority (higher number = more important)
///
/// Logged only. It has no effect on host scheduling order, and any
/// integer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskPriority(pub i32);

impl TaskPriority {
    /// Background (non-real-time)
    pub const IDLE: TaskPriority = TaskPriority(0);
    /// Low priority (sensor sampling)
    pub const LOW: TaskPriority = TaskPriority(1);
    /// Normal priority (processing)
    pub const NORMAL: TaskPriority = TaskPriority(2);
    /// High priority (supervision)
    pub const HIGH: TaskPriority = TaskPriority(3);
    /// Highest priority (timing-critical loops)
    pub const CRITICAL: TaskPriority = TaskPriority(4);
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Constructed, `start()` not yet called
    NotStarted = 0,
    /// Body is executing
    Running = 1,
    /// Body returned or faulted
    Ended = 2,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::NotStarted,
            1 => TaskState::Running,
            _ => TaskState::Ended,
        }
    }
}

/// Task lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// `start()` called on a task that was already started
    #[error("task `{task}` already started")]
    DoubleStart { task: String },
    /// The host refused to create a thread
    #[error("failed to spawn task `{task}`: {reason}")]
    Spawn { task: String, reason: String },
    /// The body panicked
    #[error("task `{task}` ended abnormally: {message}")]
    BodyFault { task: String, message: String },
}

/// Cooperative cancellation flag
///
/// Tasks run until process exit by default. Bodies that want an orderly
/// shutdown can poll a token; `cancel()` never interrupts a running body.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation (visible to every clone)
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type Outcome = Result<(), String>;

/// A named task wrapping a body on its own host thread
///
/// `NotStarted --start()--> Running --(body returns or panics)--> Ended`
pub struct TaskRunner {
    name: String,
    priority: TaskPriority,
    body: Option<TaskFn>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<Outcome>>,
    /// Recorded after the first successful join
    outcome: Option<Outcome>,
}

impl TaskRunner {
    /// Create a task; nothing runs until `start()`
    pub fn new<F>(name: impl Into<String>, priority: TaskPriority, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            body: Some(Box::new(body)),
            state: Arc::new(AtomicU8::new(TaskState::NotStarted as u8)),
            handle: None,
            outcome: None,
        }
    }

    /// Task name (not guaranteed unique)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advisory priority
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Begin concurrent execution of the body
    ///
    /// Fails with [`TaskError::DoubleStart`] on every call after the first.
    pub fn start(&mut self) -> Result<(), TaskError> {
        let Some(body) = self.body.take() else {
            return Err(TaskError::DoubleStart {
                task: self.name.clone(),
            });
        };

        let name = self.name.clone();
        let priority = self.priority;
        let state = Arc::clone(&self.state);
        state.store(TaskState::Running as u8, Ordering::Release);

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                info!(task = %name, priority = priority.0, "task started");
                let result = panic::catch_unwind(AssertUnwindSafe(body));
                state.store(TaskState::Ended as u8, Ordering::Release);
                match result {
                    Ok(()) => {
                        info!(task = %name, "task ended");
                        Ok(())
                    }
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        error!(task = %name, %message, "task faulted");
                        Err(message)
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.store(TaskState::Ended as u8, Ordering::Release);
                error!(task = %self.name, error = %e, "failed to spawn task thread");
                Err(TaskError::Spawn {
                    task: self.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Wait for the body to finish
    ///
    /// Returns [`TaskError::BodyFault`] if the body panicked. Joining again
    /// returns the recorded outcome without blocking; joining a task that
    /// was never started returns immediately.
    pub fn join(&mut self) -> Result<(), TaskError> {
        if let Some(handle) = self.handle.take() {
            // The body runs under catch_unwind, so the thread itself only
            // panics if logging did.
            let outcome = handle
                .join()
                .unwrap_or_else(|payload| Err(panic_message(&*payload)));
            self.outcome = Some(outcome);
        }

        match &self.outcome {
            Some(Err(message)) => Err(TaskError::BodyFault {
                task: self.name.clone(),
                message: message.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Has the body finished (normally or not)?
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Ended
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &self.state())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MessageQueue;
    use std::time::Duration;

    #[test]
    fn test_task_creation() {
        let task = TaskRunner::new("sensor", TaskPriority::LOW, || {});
        assert_eq!(task.name(), "sensor");
        assert_eq!(task.priority(), TaskPriority::LOW);
        assert_eq!(task.state(), TaskState::NotStarted);
    }

    #[test]
    fn test_start_and_join() {
        let queue = Arc::new(MessageQueue::new());
        let tx = Arc::clone(&queue);
        let mut task = TaskRunner::new("producer", TaskPriority::NORMAL, move || {
            tx.send(1u32);
        });

        task.start().unwrap();
        task.join().unwrap();

        assert_eq!(task.state(), TaskState::Ended);
        assert_eq!(queue.try_receive(), Some(1));
    }

    #[test]
    fn test_double_start() {
        let mut task = TaskRunner::new("once", TaskPriority::NORMAL, || {});
        task.start().unwrap();

        for _ in 0..2 {
            assert_eq!(
                task.start(),
                Err(TaskError::DoubleStart {
                    task: "once".to_string()
                })
            );
        }
        task.join().unwrap();
        assert!(matches!(task.start(), Err(TaskError::DoubleStart { .. })));
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut task = TaskRunner::new("short", TaskPriority::IDLE, || {});
        task.start().unwrap();
        task.join().unwrap();
        task.join().unwrap();
        assert!(task.is_finished());
    }

    #[test]
    fn test_join_before_start_returns() {
        let mut task = TaskRunner::new("idle", TaskPriority::IDLE, || {});
        assert_eq!(task.join(), Ok(()));
        assert_eq!(task.state(), TaskState::NotStarted);
    }

    #[test]
    fn test_body_fault_surfaces_on_join() {
        let mut task = TaskRunner::new("faulty", TaskPriority::HIGH, || {
            panic!("sensor bus error");
        });
        task.start().unwrap();

        let err = task.join().unwrap_err();
        assert_eq!(
            err,
            TaskError::BodyFault {
                task: "faulty".to_string(),
                message: "sensor bus error".to_string(),
            }
        );
        // Recorded outcome, no second wait
        assert!(matches!(task.join(), Err(TaskError::BodyFault { .. })));
        assert_eq!(task.state(), TaskState::Ended);
    }

    #[test]
    fn test_fault_isolated_from_siblings() {
        let queue = Arc::new(MessageQueue::new());
        let tx = Arc::clone(&queue);

        let mut faulty = TaskRunner::new("faulty", TaskPriority::HIGH, || panic!("boom"));
        let mut healthy = TaskRunner::new("healthy", TaskPriority::LOW, move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send("alive");
        });

        faulty.start().unwrap();
        healthy.start().unwrap();

        assert!(faulty.join().is_err());
        assert_eq!(healthy.join(), Ok(()));
        assert_eq!(queue.try_receive(), Some("alive"));
    }

    #[test]
    fn test_priority_is_any_integer() {
        let task = TaskRunner::new("odd", TaskPriority(-17), || {});
        assert_eq!(task.priority().0, -17);
        assert!(TaskPriority::CRITICAL > TaskPriority::LOW);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let seen = token.clone();
        let mut task = TaskRunner::new("loop", TaskPriority::NORMAL, move || {
            while !seen.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        task.start().unwrap();
        token.cancel();
        task.join().unwrap();
        assert!(token.is_cancelled());
    }
}
