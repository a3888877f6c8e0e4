//! # Timer Scheduler
//!
//! Cancellable one-shot and repeating timers over a virtual clock.
//!
//! ## Design
//!
//! Time only moves when [`Scheduler::advance`] is called. Tests call it
//! directly to step races deterministically; live processes hand the
//! scheduler to a [`TimerDriver`], which advances it from wall-clock time on
//! a dedicated thread.
//!
//! - Timers fire in deadline order, FIFO among equal deadlines.
//! - Callbacks run with no scheduler lock held, so they may schedule and
//!   cancel timers freely.
//! - Only one `advance` fires timers at a time. Two callbacks never run
//!   concurrently, which keeps every race's ticks strictly sequential.
//! - Calling `advance` from inside a callback deadlocks.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shortest period accepted for repeating timers.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timer callback type.
type Callback = Arc<dyn Fn() + Send + Sync>;

/// A scheduled timer.
struct Scheduled {
    callback: Callback,
    period: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

/// Queue state, keyed by (deadline, sequence number).
struct TimerQueue {
    now: Duration,
    next_seq: u64,
    timers: BTreeMap<(Duration, u64), Scheduled>,
}

impl TimerQueue {
    fn insert(&mut self, deadline: Duration, timer: Scheduled) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert((deadline, seq), timer);
    }

    /// Pops the earliest timer due at or before `target`, re-arming it first
    /// when it repeats.
    fn pop_due(&mut self, target: Duration) -> Option<Scheduled> {
        let key = *self.timers.keys().next()?;
        if key.0 > target {
            return None;
        }
        let timer = self.timers.remove(&key)?;
        self.now = key.0;

        if let Some(period) = timer.period {
            if !timer.cancelled.load(Ordering::Acquire) {
                self.insert(
                    key.0 + period,
                    Scheduled {
                        callback: Arc::clone(&timer.callback),
                        period: Some(period),
                        cancelled: Arc::clone(&timer.cancelled),
                    },
                );
            }
        }
        Some(timer)
    }
}

struct SchedulerShared {
    queue: Mutex<TimerQueue>,
    firing: Mutex<()>,
}

/// Handle to a scheduled timer.
#[derive(Clone, Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Cancels the timer. Idempotent; cancelling a fired one-shot is a no-op.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`TimerHandle::cancel`] has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Virtual-time timer scheduler. Cloning yields another handle to the same
/// clock.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    /// Creates a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                queue: Mutex::new(TimerQueue {
                    now: Duration::ZERO,
                    next_seq: 0,
                    timers: BTreeMap::new(),
                }),
                firing: Mutex::new(()),
            }),
        }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.shared.queue.lock().now
    }

    /// Runs `callback` once, `delay` from now.
    pub fn schedule_once(
        &self,
        delay: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        self.schedule(delay, None, Arc::new(callback))
    }

    /// Runs `callback` every `period`, first one `period` from now.
    ///
    /// Periods below [`MIN_PERIOD`] are raised to it.
    pub fn schedule_repeating(
        &self,
        period: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        self.schedule(period, Some(period), Arc::new(callback))
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, callback: Callback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut queue = self.shared.queue.lock();
        let deadline = queue.now + delay;
        queue.insert(
            deadline,
            Scheduled {
                callback,
                period,
                cancelled: Arc::clone(&cancelled),
            },
        );
        TimerHandle { cancelled }
    }

    /// Moves the clock forward by `delta`, firing every timer that comes due.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, delta: Duration) -> usize {
        let _firing = self.shared.firing.lock();
        let target = self.shared.queue.lock().now + delta;
        let mut fired = 0;

        loop {
            let next = self.shared.queue.lock().pop_due(target);
            let Some(timer) = next else { break };
            if timer.cancelled.load(Ordering::Acquire) {
                continue;
            }
            (timer.callback)();
            fired += 1;
        }

        let mut queue = self.shared.queue.lock();
        if queue.now < target {
            queue.now = target;
        }
        fired
    }

    /// Returns the number of timers that are scheduled and not cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .timers
            .values()
            .filter(|t| !t.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Returns the delay until the next live timer, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        let queue = self.shared.queue.lock();
        queue
            .timers
            .iter()
            .find(|(_, t)| !t.cancelled.load(Ordering::Acquire))
            .map(|((deadline, _), _)| deadline.saturating_sub(queue.now))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Advances a [`Scheduler`] from wall-clock time on its own thread.
///
/// The thread stops on [`TimerDriver::stop`] or when the driver is dropped.
pub struct TimerDriver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    /// Spawns the driver thread, waking every `resolution`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(scheduler: Scheduler, resolution: Duration) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let resolution = resolution.max(MIN_PERIOD);

        let handle = thread::Builder::new()
            .name("furlong-timer".into())
            .spawn(move || {
                let mut last = Instant::now();
                while flag.load(Ordering::Relaxed) {
                    thread::sleep(resolution);
                    let now = Instant::now();
                    scheduler.advance(now.duration_since(last));
                    last = now;
                }
                tracing::debug!("timer driver stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stops the driver thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("timer driver thread panicked");
            }
        }
    }

    /// Returns whether the driver thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Relaxed)
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn() + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &'static str| {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(name)) as Box<dyn Fn() + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        let _c = scheduler.schedule_once(Duration::from_secs(3), make("c"));
        let _a = scheduler.schedule_once(Duration::from_secs(1), make("a"));
        let _b = scheduler.schedule_once(Duration::from_secs(1), make("b"));

        assert_eq!(scheduler.advance(Duration::from_secs(2)), 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_repeating_timer_and_cancel() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        let handle = scheduler.schedule_repeating(Duration::from_millis(100), make("tick"));
        scheduler.advance(Duration::from_millis(350));
        assert_eq!(log.lock().len(), 3);

        handle.cancel();
        handle.cancel();
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(log.lock().len(), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_callback_can_schedule_follow_up() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicBool::new(false));

        let inner = scheduler.clone();
        let flag = Arc::clone(&fired);
        let _outer = scheduler.schedule_once(Duration::from_secs(1), move || {
            let flag = Arc::clone(&flag);
            let _ = inner.schedule_once(Duration::from_secs(1), move || {
                flag.store(true, Ordering::SeqCst);
            });
        });

        scheduler.advance(Duration::from_secs(1));
        assert!(!fired.load(Ordering::SeqCst));
        scheduler.advance(Duration::from_secs(1));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let scheduler = Scheduler::new();
        let early = scheduler.schedule_once(Duration::from_secs(1), || {});
        let _late = scheduler.schedule_once(Duration::from_secs(5), || {});

        early.cancel();
        assert_eq!(scheduler.next_deadline(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_driver_advances_wall_clock() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let _h = scheduler.schedule_once(Duration::from_millis(5), move || {
            flag.store(true, Ordering::SeqCst);
        });

        let mut driver = TimerDriver::spawn(scheduler.clone(), Duration::from_millis(1)).unwrap();
        let start = Instant::now();
        while !fired.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
        driver.stop();

        assert!(fired.load(Ordering::SeqCst));
        assert!(!driver.is_running());
    }
}
