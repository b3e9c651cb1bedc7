//! Deferred execution of observer dispatch callbacks.

use std::fmt;

use tokio::runtime::Handle;

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Priority hint for scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchedulerPriority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

impl SchedulerPriority {
    /// Whether work at this priority should yield to everything else first.
    pub fn is_background(self) -> bool {
        matches!(self, SchedulerPriority::Low | SchedulerPriority::Idle)
    }
}

impl fmt::Display for SchedulerPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPriority::Immediate => write!(f, "immediate"),
            SchedulerPriority::UserBlocking => write!(f, "user_blocking"),
            SchedulerPriority::Normal => write!(f, "normal"),
            SchedulerPriority::Low => write!(f, "low"),
            SchedulerPriority::Idle => write!(f, "idle"),
        }
    }
}

/// Runs tasks asynchronously, out of band from the caller.
///
/// `schedule` must not run the task before returning.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, priority: SchedulerPriority, task: Task);
}

/// Scheduler that spawns tasks onto a tokio runtime.
///
/// Background priorities yield once before running so already-queued work
/// goes first.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler for the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler for the runtime this thread is running in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, priority: SchedulerPriority, task: Task) {
        tracing::trace!(target: "performance::scheduler", %priority, "task scheduled");
        self.handle.spawn(async move {
            if priority.is_background() {
                tokio::task::yield_now().await;
            }
            task();
        });
    }
}
