use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, OnceLock,
    },
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use crate::core::{Task, TaskHandle, TaskId, Wheel};
use crate::{TimerError, TimerResult, WheelConfig};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

const NANOS_PER_MILLI: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelState {
    Created,
    Running,
    Stopped,
}

/// Counters since the wheel was created. `fired` counts every callback
/// invoked, the ones that panicked included.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WheelStats {
    pub scheduled: u64,
    pub fired: u64,
    pub cancelled: u64,
    pub panicked: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
    panicked: AtomicU64,
    rejected: AtomicU64,
}

struct Shared<T> {
    config: WheelConfig,
    wheel: Wheel<T>,
    state: AtomicU8,
    /// Instant of tick boundary 0, set by `start`.
    epoch: OnceLock<Instant>,
    driver_thread: OnceLock<ThreadId>,
    next_id: AtomicU64,
    counters: Counters,
}

struct Driver {
    handle: JoinHandle<()>,
    /// Dropping it wakes the driver out of its wait.
    stop: Sender<()>,
}

/// A single-level hashed time wheel driven by its own thread.
///
/// Tasks are plain callbacks run on the driver thread once their delay has
/// passed, quantized up to the next tick boundary: a task added with
/// `delay_ms` fires within `[delay, delay + tick_interval)` of the call,
/// give or take scheduling jitter on the driver thread.
///
/// ```no_run
/// use std::time::Duration;
/// use slot_wheel::TimeWheel;
///
/// let wheel = TimeWheel::new(Duration::from_secs(1), 5, "instance ttl")?;
/// wheel.start()?;
/// wheel.add_task(3000, "instance-1".to_string(), |id| println!("{id} expired"))?;
/// wheel.stop();
/// # Ok::<(), slot_wheel::TimerError>(())
/// ```
pub struct TimeWheel<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    driver: Mutex<Option<Driver>>,
}

impl<T: Send + 'static> TimeWheel<T> {
    pub fn new(
        tick_interval: Duration,
        slot_count: usize,
        name: impl Into<String>,
    ) -> TimerResult<Self> {
        let config = WheelConfig::builder()
            .tick_interval(tick_interval)
            .slot_count(slot_count)
            .name(name)
            .build()?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: WheelConfig) -> Self {
        let wheel = Wheel::new(config.slot_count());
        TimeWheel {
            shared: Arc::new(Shared {
                config,
                wheel,
                state: AtomicU8::new(CREATED),
                epoch: OnceLock::new(),
                driver_thread: OnceLock::new(),
                next_id: AtomicU64::new(0),
                counters: Counters::default(),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.shared.config.name()
    }

    pub fn tick_interval(&self) -> Duration {
        self.shared.config.tick_interval()
    }

    pub fn slot_count(&self) -> usize {
        self.shared.config.slot_count()
    }

    pub fn state(&self) -> WheelState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == WheelState::Running
    }

    /// Slot the driver will drain on its next tick.
    pub fn current_index(&self) -> usize {
        self.shared.wheel.current_index()
    }

    /// Tasks still queued. Cancelled tasks count until the driver reaches
    /// their slot.
    pub fn pending(&self) -> usize {
        self.shared.wheel.pending()
    }

    pub fn stats(&self) -> WheelStats {
        let counters = &self.shared.counters;
        WheelStats {
            scheduled: counters.scheduled.load(Ordering::Relaxed),
            fired: counters.fired.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Launches the driver thread. A wheel starts once: a second call
    /// returns `AlreadyStarted`, a call after `stop` returns `Stopped`.
    pub fn start(&self) -> TimerResult<()> {
        // callbacks may call this on the driver thread while `stop` holds the
        // driver lock, so answer the started cases without taking it
        self.shared.ensure_created()?;

        let mut driver = self.driver.lock();

        let epoch = *self.shared.epoch.get_or_init(Instant::now);
        if let Err(state) =
            self.shared
                .state
                .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            return Err(self.shared.state_error(state));
        }

        let (stop, stopped) = crossbeam_channel::bounded(0);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("timewheel-{}", self.name()))
            .spawn(move || drive(shared, epoch, stopped));

        match spawned {
            Ok(handle) => {
                *driver = Some(Driver { handle, stop });
                debug!(
                    "time wheel [{}] started, tick {:?}, {} slots",
                    self.name(),
                    self.tick_interval(),
                    self.slot_count()
                );
                Ok(())
            }
            Err(err) => {
                self.shared.abandon();
                Err(TimerError::Spawn(err.to_string()))
            }
        }
    }

    /// Stops the driver and waits for it to finish the tick it is in.
    /// Nothing fires once this returns; tasks still queued are dropped.
    ///
    /// Safe to call repeatedly, before `start`, and from inside a callback.
    /// In the last case the call can't wait for the driver, which is the
    /// calling thread, but no further tick starts.
    pub fn stop(&self) {
        let previous = self.shared.state.swap(STOPPED, Ordering::AcqRel);
        if previous != STOPPED {
            debug!("time wheel [{}] stopping", self.name());
        }

        if self.shared.on_driver_thread() {
            return;
        }

        let mut driver = self.driver.lock();
        match driver.take() {
            Some(Driver { handle, stop }) => {
                drop(stop);
                if handle.join().is_err() {
                    error!("time wheel [{}] driver thread panicked", self.name());
                }
            }
            None if previous == CREATED => self.shared.abandon(),
            None => {}
        }
    }

    /// Schedules `callback(payload)` to run on the driver thread after
    /// `delay_ms` milliseconds, rounded up to a tick boundary. A zero delay
    /// fires on the next tick.
    ///
    /// Tasks added before `start` count their delay from `start`. Adding to
    /// a stopped wheel fails with `Stopped`; payload and callback are
    /// dropped.
    pub fn add_task<F>(&self, delay_ms: u64, payload: T, callback: F) -> TimerResult<TaskHandle>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let shared = &self.shared;
        if shared.state() == WheelState::Stopped {
            return Err(shared.reject());
        }

        let id = TaskId(shared.next_id.fetch_add(1, Ordering::Relaxed));
        let task = Task::new(id, delay_ms, payload, Box::new(callback));
        let handle = task.handle();

        // every path to STOPPED clears the wheel afterwards, so re-checking
        // under the bucket lock keeps a racing stop from stranding the task
        let target = shared.target_tick(delay_ms);
        if let Err(task) = shared
            .wheel
            .schedule(task, target, || shared.state() != WheelState::Stopped)
        {
            drop(task);
            return Err(shared.reject());
        }

        shared.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    /// Same as [`TaskHandle::cancel`].
    pub fn cancel(&self, handle: &TaskHandle) -> bool {
        handle.cancel()
    }
}

impl<T: Send + 'static> Drop for TimeWheel<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: Send + 'static> fmt::Debug for TimeWheel<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimeWheel")
            .field("name", &self.name())
            .field("tick_interval", &self.tick_interval())
            .field("slot_count", &self.slot_count())
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T: Send + 'static> Shared<T> {
    fn state(&self) -> WheelState {
        match self.state.load(Ordering::Acquire) {
            CREATED => WheelState::Created,
            RUNNING => WheelState::Running,
            _ => WheelState::Stopped,
        }
    }

    fn is_running(&self) -> bool {
        self.state() == WheelState::Running
    }

    fn ensure_created(&self) -> TimerResult<()> {
        match self.state.load(Ordering::Acquire) {
            CREATED => Ok(()),
            state => Err(self.state_error(state)),
        }
    }

    fn state_error(&self, state: u8) -> TimerError {
        let name = self.config.name().to_string();
        if state == RUNNING {
            TimerError::AlreadyStarted(name)
        } else {
            TimerError::Stopped(name)
        }
    }

    /// Marks a wheel that never got a driver as stopped and drops what was
    /// queued for it.
    fn abandon(&self) {
        self.state.store(STOPPED, Ordering::Release);
        let discarded = self.wheel.clear();
        if discarded > 0 {
            debug!(
                "time wheel [{}] stopped before start, dropped {} tasks",
                self.config.name(),
                discarded
            );
        }
    }

    /// Only the first rejection is a warning; the rest are counted in
    /// `stats().rejected`.
    fn reject(&self) -> TimerError {
        let name = self.config.name();
        if self.counters.rejected.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!("time wheel [{}] is stopped, rejecting new tasks", name);
        } else {
            debug!("time wheel [{}] is stopped, task rejected", name);
        }
        TimerError::Stopped(name.to_string())
    }

    fn on_driver_thread(&self) -> bool {
        self.driver_thread.get() == Some(&thread::current().id())
    }

    /// Absolute drain number a task with `delay_ms` belongs to.
    ///
    /// Boundary `k` sits at `epoch + k * tick` and is served by drain `k - 1`.
    /// A running wheel picks the first boundary at or after `now + delay`;
    /// before `start` the delay counts from boundary 0.
    fn target_tick(&self, delay_ms: u64) -> u64 {
        let interval = self.config.tick_interval().as_nanos();
        let delay = delay_ms as u128 * NANOS_PER_MILLI;

        match (self.state(), self.epoch.get()) {
            (WheelState::Running, Some(epoch)) => {
                let deadline = epoch.elapsed().as_nanos() + delay;
                let boundary = div_ceil(deadline, interval).max(1);
                saturate(boundary - 1)
            }
            _ => {
                let ticks = div_ceil(delay, interval).max(1);
                self.wheel.ticks().saturating_add(saturate(ticks - 1))
            }
        }
    }

    fn tick(&self) {
        let advance = self.wheel.advance(|task| self.fire(task));

        if advance.cancelled > 0 {
            self.counters
                .cancelled
                .fetch_add(advance.cancelled as u64, Ordering::Relaxed);
        }

        trace!(
            "time wheel [{}] drained slot {}: fired {}, requeued {}, cancelled {}",
            self.config.name(),
            advance.slot,
            advance.fired,
            advance.requeued,
            advance.cancelled
        );
    }

    fn fire(&self, task: Task<T>) {
        let id = task.id;
        self.counters.fired.fetch_add(1, Ordering::Relaxed);

        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(move || task.fire())) {
            self.counters.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                "time wheel [{}] callback of {} panicked: {}",
                self.config.name(),
                id,
                panic_message(cause.as_ref())
            );
        }
    }
}

/// Driver loop: catch up on every boundary that has passed, then park until
/// the next one or until the stop channel disconnects.
fn drive<T: Send + 'static>(shared: Arc<Shared<T>>, epoch: Instant, stopped: Receiver<()>) {
    let _ = shared.driver_thread.set(thread::current().id());

    let name = shared.config.name();
    let interval = shared.config.tick_interval().as_nanos();
    let slot_count = shared.wheel.slot_count() as u64;

    'driving: while shared.is_running() {
        let due = saturate(epoch.elapsed().as_nanos() / interval);

        let behind = due.saturating_sub(shared.wheel.ticks());
        if behind > slot_count {
            warn!(
                "time wheel [{}] is {} ticks behind, callbacks are too slow for the tick",
                name, behind
            );
        }

        while shared.wheel.ticks() < due {
            if !shared.is_running() {
                break 'driving;
            }
            shared.tick();
        }

        let next_boundary = (shared.wheel.ticks() as u128 + 1) * interval;
        let wait = next_boundary.saturating_sub(epoch.elapsed().as_nanos());

        match stopped.recv_timeout(Duration::from_nanos(saturate(wait))) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let discarded = shared.wheel.clear();
    debug!(
        "time wheel [{}] driver exited after {} ticks, dropped {} pending tasks",
        name,
        shared.wheel.ticks(),
        discarded
    );
}

fn div_ceil(value: u128, divisor: u128) -> u128 {
    (value + divisor - 1) / divisor
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    const TICK: u64 = 20;
    const WAIT: Duration = Duration::from_secs(5);

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn wheel<T: Send + 'static>(name: &str) -> TimeWheel<T> {
        init_log();
        TimeWheel::new(Duration::from_millis(TICK), 5, name).unwrap()
    }

    #[test]
    fn rejects_bad_shape() {
        let result = TimeWheel::<()>::new(Duration::from_secs(1), 0, "zero slots");
        assert!(matches!(result, Err(TimerError::InvalidSlotCount(0))));

        let result = TimeWheel::<()>::new(Duration::ZERO, 5, "zero tick");
        assert!(matches!(result, Err(TimerError::InvalidTickInterval(_))));
    }

    #[test]
    fn lifecycle() {
        let wheel = wheel::<()>("lifecycle");
        assert_eq!(wheel.state(), WheelState::Created);
        assert_eq!(wheel.name(), "lifecycle");

        wheel.start().unwrap();
        assert!(wheel.is_running());
        assert!(matches!(wheel.start(), Err(TimerError::AlreadyStarted(_))));

        wheel.stop();
        assert_eq!(wheel.state(), WheelState::Stopped);
        wheel.stop();
        assert!(matches!(wheel.start(), Err(TimerError::Stopped(_))));
    }

    #[test]
    fn add_after_stop_is_rejected() {
        let wheel = wheel::<u32>("late");
        wheel.start().unwrap();
        wheel.stop();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let result = wheel.add_task(0, 1, move |_| flag.store(true, Ordering::SeqCst));

        assert!(matches!(result, Err(TimerError::Stopped(_))));
        assert_eq!(wheel.stats().rejected, 1);
        assert_eq!(wheel.pending(), 0);
        thread::sleep(Duration::from_millis(3 * TICK));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn rejections_are_counted() {
        let wheel = wheel::<u32>("rejections");
        wheel.stop();

        for n in 0..5 {
            assert!(matches!(
                wheel.add_task(0, n, |_| {}),
                Err(TimerError::Stopped(_))
            ));
        }
        assert_eq!(wheel.stats().rejected, 5);
        assert_eq!(wheel.stats().scheduled, 0);
    }

    #[test]
    fn failed_start_drops_tasks() {
        let wheel = wheel::<u32>("spawn failed");
        wheel.add_task(10, 1, |_| panic!("must not fire")).unwrap();
        assert_eq!(wheel.pending(), 1);

        // what `start` does when the driver thread can't be spawned
        wheel.shared.abandon();
        assert_eq!(wheel.pending(), 0);
        assert_eq!(wheel.state(), WheelState::Stopped);
        assert!(matches!(wheel.start(), Err(TimerError::Stopped(_))));
    }

    #[test]
    fn stop_racing_producers_leaves_nothing_queued() {
        const PRODUCERS: usize = 4;

        for round in 0..100 {
            let wheel = Arc::new(wheel::<usize>("stop race"));
            if round % 2 == 0 {
                wheel.start().unwrap();
            }

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|_| {
                    let wheel = Arc::clone(&wheel);
                    thread::spawn(move || {
                        let mut added = 0;
                        while wheel.add_task(10_000, added, |_| {}).is_ok() {
                            added += 1;
                        }
                        added
                    })
                })
                .collect();

            thread::sleep(Duration::from_millis(2));
            wheel.stop();

            let added: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
            assert_eq!(
                wheel.pending(),
                0,
                "round {round}: tasks left queued after stop"
            );
            assert_eq!(wheel.stats().scheduled, added as u64);
            assert_eq!(wheel.stats().rejected, PRODUCERS as u64);
        }
    }

    #[test]
    fn stop_before_start_drops_tasks() {
        let wheel = wheel::<u32>("never started");
        wheel.add_task(10, 1, |_| panic!("must not fire")).unwrap();
        assert_eq!(wheel.pending(), 1);

        wheel.stop();
        assert_eq!(wheel.pending(), 0);
        assert_eq!(wheel.state(), WheelState::Stopped);
    }

    #[test]
    fn fires_within_one_tick_of_delay() {
        let wheel = wheel::<u64>("latency");
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        let delays = [0u64, 5, TICK, 35, 100, 250];
        for delay in delays {
            let sender = sender.clone();
            let inserted = Instant::now();
            wheel
                .add_task(delay, delay, move |delay| {
                    let _ = sender.send((delay, inserted.elapsed()));
                })
                .unwrap();
        }

        for _ in delays {
            let (delay, elapsed) = receiver.recv_timeout(WAIT).unwrap();
            assert!(
                elapsed >= Duration::from_millis(delay),
                "delay {delay}ms fired early after {elapsed:?}"
            );
            // one tick of quantization plus room for a busy machine
            assert!(
                elapsed < Duration::from_millis(delay + TICK + 100),
                "delay {delay}ms fired late after {elapsed:?}"
            );
        }
        wheel.stop();
        assert_eq!(wheel.stats().fired, delays.len() as u64);
    }

    #[test]
    fn zero_delay_fires_on_driver_thread() {
        let wheel = wheel::<()>("zero");
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        wheel
            .add_task(0, (), move |_| {
                let name = thread::current().name().map(str::to_string);
                let _ = sender.send(name);
            })
            .unwrap();

        let name = receiver.recv_timeout(WAIT).unwrap();
        assert_eq!(name.as_deref(), Some("timewheel-zero"));
    }

    #[test]
    fn multi_round_delay() {
        // 5 slots of 20ms: a 330ms delay needs three revolutions
        let wheel = wheel::<()>("rounds");
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        let inserted = Instant::now();
        wheel
            .add_task(330, (), move |_| {
                let _ = sender.send(inserted.elapsed());
            })
            .unwrap();

        let elapsed = receiver.recv_timeout(WAIT).unwrap();
        assert!(elapsed >= Duration::from_millis(330));
        assert!(elapsed < Duration::from_millis(330 + TICK + 100));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn concurrent_producers_fire_exactly_once() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let wheel = Arc::new(wheel::<usize>("producers"));
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let wheel = Arc::clone(&wheel);
                let sender = sender.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let sender = sender.clone();
                        wheel
                            .add_task(30, p * PER_PRODUCER + i, move |id| {
                                let _ = sender.send(id);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut seen = HashSet::new();
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let id = receiver.recv_timeout(WAIT).unwrap();
            assert!(seen.insert(id), "task {id} fired twice");
        }
        assert!(receiver.recv_timeout(Duration::from_millis(3 * TICK)).is_err());
        assert_eq!(wheel.stats().fired, (PRODUCERS * PER_PRODUCER) as u64);
        assert_eq!(wheel.pending(), 0);
        wheel.stop();
    }

    #[test]
    fn panicking_callback_spares_siblings() {
        let wheel = wheel::<u32>("panics");
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        for n in 0..3 {
            let sender = sender.clone();
            wheel
                .add_task(40, n, move |n| {
                    if n == 1 {
                        panic!("callback {n} failed");
                    }
                    let _ = sender.send(n);
                })
                .unwrap();
        }

        let mut got = vec![
            receiver.recv_timeout(WAIT).unwrap(),
            receiver.recv_timeout(WAIT).unwrap(),
        ];
        got.sort();
        assert_eq!(got, vec![0, 2]);

        // the driver survived
        let sender = sender.clone();
        wheel.add_task(0, 9, move |n| drop(sender.send(n))).unwrap();
        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), 9);

        let stats = wheel.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.fired, 4);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let wheel = wheel::<&'static str>("cancel");
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        let keep_sender = sender.clone();
        let keep = wheel
            .add_task(60, "keep", move |s| drop(keep_sender.send(s)))
            .unwrap();
        let gone = wheel
            .add_task(60, "gone", move |s| drop(sender.send(s)))
            .unwrap();

        assert!(wheel.cancel(&gone));
        assert!(!gone.cancel());
        assert_eq!(gone.status(), crate::TaskStatus::Cancelled);
        assert_ne!(keep.id(), gone.id());

        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), "keep");
        assert!(receiver.recv_timeout(Duration::from_millis(3 * TICK)).is_err());
        assert!(!keep.cancel());
        assert_eq!(keep.status(), crate::TaskStatus::Fired);
        assert_eq!(wheel.stats().cancelled, 1);
    }

    #[test]
    fn nothing_fires_after_stop() {
        let wheel = wheel::<()>("stop quiet");
        wheel.start().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let fired = Arc::clone(&fired);
            wheel
                .add_task(200, (), move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        wheel.stop();
        assert_eq!(wheel.pending(), 0);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_waits_for_in_flight_tick() {
        let wheel = wheel::<()>("stop drains");
        wheel.start().unwrap();

        let (started, entered) = unbounded();
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);
        wheel
            .add_task(0, (), move |_| {
                let _ = started.send(());
                thread::sleep(Duration::from_millis(100));
                done.store(true, Ordering::SeqCst);
            })
            .unwrap();

        entered.recv_timeout(WAIT).unwrap();
        wheel.stop();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn callbacks_can_reschedule_and_stop() {
        let wheel = Arc::new(wheel::<u32>("reentrant"));
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        let inner = Arc::clone(&wheel);
        wheel
            .add_task(0, 1, move |n| {
                let _ = sender.send(n);
                let sender = sender.clone();
                let stopper = Arc::clone(&inner);
                inner
                    .add_task(TICK, n + 1, move |n| {
                        let _ = sender.send(n);
                        stopper.stop();
                    })
                    .unwrap();
            })
            .unwrap();

        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), 1);
        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), 2);

        // stopped from its own callback without deadlocking
        let deadline = Instant::now() + WAIT;
        while wheel.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(wheel.state(), WheelState::Stopped);
        wheel.stop();
    }

    #[test]
    fn tasks_added_before_start_wait_for_start() {
        let wheel = wheel::<()>("pre-start");

        let (sender, receiver) = unbounded();
        wheel
            .add_task(40, (), move |_| drop(sender.send(Instant::now())))
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(receiver.try_recv().is_err());

        let started = Instant::now();
        wheel.start().unwrap();
        let fired_at = receiver.recv_timeout(WAIT).unwrap();
        assert!(fired_at.duration_since(started) >= Duration::from_millis(40));
    }

    #[test]
    fn independent_wheels() {
        let a = wheel::<char>("a");
        let b = wheel::<char>("b");
        a.start().unwrap();
        b.start().unwrap();

        let (sender, receiver) = unbounded();
        let sender_b = sender.clone();
        a.add_task(20, 'a', move |c| drop(sender.send(c))).unwrap();
        b.add_task(20, 'b', move |c| drop(sender_b.send(c))).unwrap();

        let mut got = vec![
            receiver.recv_timeout(WAIT).unwrap(),
            receiver.recv_timeout(WAIT).unwrap(),
        ];
        got.sort();
        assert_eq!(got, vec!['a', 'b']);

        a.stop();
        assert!(b.is_running());
    }

    #[test]
    #[ignore] // takes about ten seconds
    fn one_second_five_slots() {
        init_log();
        let wheel = TimeWheel::new(Duration::from_secs(1), 5, "test tw").unwrap();
        wheel.start().unwrap();

        let (sender, receiver) = unbounded();
        for (delay, label) in [(1000, "a"), (7000, "b")] {
            let sender = sender.clone();
            let inserted = Instant::now();
            wheel
                .add_task(delay, label, move |label| {
                    let _ = sender.send((label, inserted.elapsed()));
                })
                .unwrap();
        }

        let (label, elapsed) = receiver.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(label, "a");
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(2100));

        let (label, elapsed) = receiver.recv_timeout(Duration::from_secs(9)).unwrap();
        assert_eq!(label, "b");
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_millis(8100));
    }
}
