use parking_lot::{Mutex, MutexGuard};
use std::mem;

use super::slot::Task;

/// One slot of the wheel: the tasks due whenever the cursor reaches it,
/// across any number of future revolutions.
///
/// Producers push under the lock; the driver detaches the whole vector in
/// one go so it never iterates while anybody else is appending.
pub(crate) struct Bucket<T> {
    tasks: Mutex<Vec<Task<T>>>,
}

impl<T> Bucket<T> {
    pub(crate) fn new() -> Self {
        Bucket {
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Task<T>>> {
        self.tasks.lock()
    }

    /// Swaps the contents out for an empty vector, running `under_lock`
    /// before the lock is released.
    pub(crate) fn detach<F: FnOnce()>(&self, under_lock: F) -> Vec<Task<T>> {
        let mut tasks = self.tasks.lock();
        let detached = mem::take(&mut *tasks);
        under_lock();
        detached
    }

    /// Puts back tasks that still have rounds to wait.
    pub(crate) fn requeue(&self, tasks: Vec<Task<T>>) {
        if tasks.is_empty() {
            return;
        }
        self.tasks.lock().extend(tasks);
    }
}
