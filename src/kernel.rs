//! Kernel — top-level RTOS manager
//!
//! Owns the task table and starts every task together, the way
//! `vTaskStartScheduler` hands control to the scheduler on a real target.
//! On the host the "scheduler" is the OS: starting the kernel spawns one
//! thread per task and the coordinating thread is free to join them.
//!
//! Author: Moroya Sakamoto

use std::time::Duration;

use tracing::{info, warn};

use crate::task::{TaskError, TaskPriority, TaskRunner, TaskState};
use crate::timer::{self, Tick};

/// Per-task outcome from [`Kernel::join_all`]
pub type JoinOutcome = (String, Result<(), TaskError>);

/// RTOS kernel facade over host threads
#[derive(Debug, Default)]
pub struct Kernel {
    /// Registered tasks, in registration order
    tasks: Vec<TaskRunner>,
    /// Kernel state
    running: bool,
}

impl Kernel {
    /// Create an empty kernel
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; it starts with the kernel (or immediately if the
    /// kernel is already running). Returns the task's slot index.
    pub fn spawn_task<F>(
        &mut self,
        name: impl Into<String>,
        priority: TaskPriority,
        body: F,
    ) -> Result<usize, TaskError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut task = TaskRunner::new(name, priority, body);
        if self.running {
            task.start()?;
        }
        self.tasks.push(task);
        Ok(self.tasks.len() - 1)
    }

    /// Start every registered task
    ///
    /// Fails with [`TaskError::DoubleStart`] if the kernel is already running.
    /// A task that fails to spawn does not keep the rest from starting; the
    /// first failure is returned once every task has been tried.
    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.running {
            return Err(TaskError::DoubleStart {
                task: "kernel".to_string(),
            });
        }
        self.running = true;
        info!(tasks = self.tasks.len(), "scheduler started");

        start_pending(&mut self.tasks, TaskRunner::start)
    }

    /// Wait for every task to end, in registration order
    ///
    /// A faulted task does not stop the others from being joined.
    pub fn join_all(&mut self) -> Vec<JoinOutcome> {
        let outcomes: Vec<JoinOutcome> = self
            .tasks
            .iter_mut()
            .map(|task| (task.name().to_string(), task.join()))
            .collect();

        let faulted = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        if faulted > 0 {
            warn!(faulted, "some tasks ended abnormally");
        }
        info!(tasks = outcomes.len(), "all tasks joined");
        outcomes
    }

    /// Is the kernel running?
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Get task by index
    pub fn get_task(&self, idx: usize) -> Option<&TaskRunner> {
        self.tasks.get(idx)
    }

    /// Process-wide tick count (xTaskGetTickCount)
    pub fn tick_count() -> Tick {
        timer::now_ticks()
    }

    /// Block the calling task (vTaskDelay)
    pub fn delay(duration: Duration) {
        timer::delay(duration);
    }
}

/// Run `start` on every not-yet-started task, returning the first error
fn start_pending<F>(tasks: &mut [TaskRunner], mut start: F) -> Result<(), TaskError>
where
    F: FnMut(&mut TaskRunner) -> Result<(), TaskError>,
{
    let mut first_err = None;
    for task in tasks.iter_mut() {
        if task.state() != TaskState::NotStarted {
            continue;
        }
        if let Err(e) = start(&mut *task) {
            warn!(task = %task.name(), error = %e, "task failed to start");
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}
