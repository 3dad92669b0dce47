use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Identifier of a task, unique for the lifetime of one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Fired,
    Cancelled,
}

/// Shared between a queued task and its handle. Whoever moves it out of
/// `PENDING` first wins: either the driver fires the task or the handle
/// cancels it, never both.
#[derive(Debug, Default)]
pub(crate) struct TaskState(AtomicU8);

impl TaskState {
    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn claim_fire(&self) -> bool {
        self.transition(FIRED)
    }

    pub(crate) fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    pub(crate) fn status(&self) -> TaskStatus {
        match self.0.load(Ordering::Acquire) {
            PENDING => TaskStatus::Pending,
            FIRED => TaskStatus::Fired,
            _ => TaskStatus::Cancelled,
        }
    }
}

pub(crate) type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// A scheduled callback sitting in one bucket of the wheel.
pub(crate) struct Task<T> {
    pub(crate) id: TaskId,
    pub(crate) delay_ms: u64,
    /// Bucket the task lives in; fixed once inserted.
    pub(crate) slot: usize,
    /// Revolutions still to pass over `slot` before the task is due.
    pub(crate) remaining_rounds: u64,
    payload: T,
    callback: Callback<T>,
    state: Arc<TaskState>,
}

impl<T> Task<T> {
    pub(crate) fn new(id: TaskId, delay_ms: u64, payload: T, callback: Callback<T>) -> Self {
        Task {
            id,
            delay_ms,
            slot: 0,
            remaining_rounds: 0,
            payload,
            callback,
            state: Arc::new(TaskState::default()),
        }
    }

    pub(crate) fn handle(&self) -> TaskHandle {
        TaskHandle {
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.status() == TaskStatus::Cancelled
    }

    pub(crate) fn claim_fire(&self) -> bool {
        self.state.claim_fire()
    }

    /// Hands the payload to the callback. Only called after `claim_fire`.
    pub(crate) fn fire(self) {
        (self.callback)(self.payload)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("delay_ms", &self.delay_ms)
            .field("slot", &self.slot)
            .field("remaining_rounds", &self.remaining_rounds)
            .field("status", &self.state.status())
            .finish()
    }
}

/// Returned by `add_task`; lets the owner cancel the task before it fires.
///
/// Cancelling only marks the task. It stays in its bucket until the driver
/// drains that bucket and discards it without calling the callback.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns `true` if the task was still pending and will now never fire.
    /// Cancelling a fired or already-cancelled task is a no-op returning
    /// `false`.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == TaskStatus::Pending
    }
}
