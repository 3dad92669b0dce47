use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{bucket::Bucket, slot::Task};

/// What one call to [`Wheel::advance`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Advance {
    pub(crate) slot: usize,
    pub(crate) fired: usize,
    pub(crate) requeued: usize,
    pub(crate) cancelled: usize,
}

/// Ring of buckets without any notion of wall-clock time.
///
/// `ticks` counts completed drains. Drain number `i` (0-based) empties slot
/// `i % slot_count`, so the slot of the next drain, the current index, is
/// `ticks % slot_count`. Positions are handed to [`Wheel::schedule`] as an
/// absolute drain number, which keeps the round arithmetic exact no matter
/// how the caller's view of `ticks` races with the driver.
pub(crate) struct Wheel<T> {
    buckets: Box<[Bucket<T>]>,
    ticks: AtomicU64,
    pending: AtomicUsize,
}

impl<T> Wheel<T> {
    pub(crate) fn new(slot_count: usize) -> Self {
        debug_assert!(slot_count > 0, "slot count is not allow zero");

        let buckets = (0..slot_count).map(|_| Bucket::new()).collect();
        Wheel {
            buckets,
            ticks: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub(crate) fn current_index(&self) -> usize {
        (self.ticks() % self.slot_count() as u64) as usize
    }

    /// Queued tasks, cancelled ones included until their bucket is drained.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Queues `task` to fire in drain number `target`. A target the driver
    /// has already passed is moved up to the next drain.
    ///
    /// The round count is computed while holding the target bucket's lock.
    /// The driver bumps `ticks` under the lock of the bucket it drains, so
    /// the only drain that could move `ticks` under our feet without us
    /// noticing is one of a different slot, which doesn't change
    /// `(target - ticks) / slot_count`.
    ///
    /// `accept` is asked under the same lock. A caller that flips it to
    /// `false` before [`Wheel::clear`] can't have a task slip in behind the
    /// clear: the task comes back as `Err` instead and is dropped by the
    /// caller, outside the lock.
    pub(crate) fn schedule<A>(
        &self,
        mut task: Task<T>,
        target: u64,
        accept: A,
    ) -> Result<(), Task<T>>
    where
        A: Fn() -> bool,
    {
        let slot_count = self.slot_count() as u64;
        let mut target = target.max(self.ticks());

        loop {
            let slot = (target % slot_count) as usize;
            let mut bucket = self.buckets[slot].lock();

            if !accept() {
                return Err(task);
            }

            let ticks = self.ticks();
            if target < ticks {
                drop(bucket);
                target = ticks;
                continue;
            }

            task.slot = slot;
            task.remaining_rounds = (target - ticks) / slot_count;
            bucket.push(task);
            self.pending.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
    }

    /// Queues `task` `offset` drains after the current one, so `offset == 0`
    /// means the very next drain.
    #[cfg(test)]
    pub(crate) fn schedule_after(&self, task: Task<T>, offset: u64) {
        let target = self.ticks().saturating_add(offset);
        if self.schedule(task, target, || true).is_err() {
            unreachable!("unconditional schedule was refused");
        }
    }

    /// Drains the current slot and moves the cursor on.
    ///
    /// Due tasks are handed to `fire`; tasks with rounds left are put back
    /// in the same slot one round closer; cancelled tasks are dropped.
    /// Must only be called from one thread at a time.
    pub(crate) fn advance<F>(&self, mut fire: F) -> Advance
    where
        F: FnMut(Task<T>),
    {
        let slot = self.current_index();
        let drained = self.buckets[slot].detach(|| {
            self.ticks.fetch_add(1, Ordering::AcqRel);
        });

        let mut advance = Advance {
            slot,
            ..Advance::default()
        };
        let mut requeue = Vec::new();

        for mut task in drained {
            if task.is_cancelled() {
                advance.cancelled += 1;
                self.pending.fetch_sub(1, Ordering::AcqRel);
            } else if task.remaining_rounds > 0 {
                task.remaining_rounds -= 1;
                requeue.push(task);
            } else if task.claim_fire() {
                advance.fired += 1;
                self.pending.fetch_sub(1, Ordering::AcqRel);
                fire(task);
            } else {
                // lost the race against a concurrent cancel
                advance.cancelled += 1;
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
        }

        advance.requeued = requeue.len();
        self.buckets[slot].requeue(requeue);

        advance
    }

    /// Drops every queued task without firing it, returning how many there
    /// were.
    pub(crate) fn clear(&self) -> usize {
        let mut cleared = 0;
        for bucket in self.buckets.iter() {
            cleared += bucket.detach(|| {}).len();
        }
        self.pending.fetch_sub(cleared, Ordering::AcqRel);
        cleared
    }
}
