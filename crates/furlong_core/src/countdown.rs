//! # Countdown Timer
//!
//! One-shot, one-second-granularity countdown on top of the [`Scheduler`].
//!
//! `start(5, ..)` emits `5` immediately, then `4, 3, 2, 1, 0` once per
//! second, then calls the completion callback exactly once. The initial
//! emission never completes a countdown, so `start(0, ..)` emits `0` twice
//! (now and one second later) before completing.

use crate::signal::Signal;
use crate::timer::{Scheduler, TimerHandle};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Countdown step.
pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

type Completion = Box<dyn FnOnce() + Send>;

struct CountdownState {
    /// Incremented on every start; ticks of older runs are ignored.
    run: u64,
    running: bool,
    remaining: u32,
    ticker: Option<TimerHandle>,
    on_complete: Option<Completion>,
    sink: Option<Signal<u32>>,
}

/// Cancellable countdown.
pub struct CountdownTimer {
    scheduler: Scheduler,
    state: Arc<Mutex<CountdownState>>,
    value: Signal<u32>,
}

impl CountdownTimer {
    /// Creates an idle countdown on `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            state: Arc::new(Mutex::new(CountdownState {
                run: 0,
                running: false,
                remaining: 0,
                ticker: None,
                on_complete: None,
                sink: None,
            })),
            value: Signal::new(0),
        }
    }

    /// Starts counting down from `seconds`, cancelling any run in flight.
    ///
    /// Every value is published to [`CountdownTimer::value`] and, when given,
    /// to `sink`.
    pub fn start(
        &self,
        seconds: u32,
        on_complete: impl FnOnce() + Send + 'static,
        sink: Option<Signal<u32>>,
    ) {
        let run = {
            let mut state = self.state.lock();
            if let Some(ticker) = state.ticker.take() {
                ticker.cancel();
            }
            state.run += 1;
            state.running = true;
            state.remaining = seconds;
            state.on_complete = Some(Box::new(on_complete));
            state.sink.clone_from(&sink);
            state.run
        };

        self.value.publish(seconds);
        if let Some(sink) = &sink {
            sink.publish(seconds);
        }

        let weak = Arc::downgrade(&self.state);
        let value = self.value.clone();
        let ticker = self
            .scheduler
            .schedule_repeating(COUNTDOWN_STEP, move || Self::on_tick(&weak, run, &value));

        let mut state = self.state.lock();
        if state.run == run && state.running {
            state.ticker = Some(ticker);
        } else {
            ticker.cancel();
        }
    }

    fn on_tick(state: &Weak<Mutex<CountdownState>>, run: u64, value: &Signal<u32>) {
        let Some(state) = state.upgrade() else { return };

        let (remaining, sink, completion) = {
            let mut state = state.lock();
            if state.run != run || !state.running {
                return;
            }
            state.remaining = state.remaining.saturating_sub(1);
            let completion = if state.remaining == 0 {
                state.running = false;
                if let Some(ticker) = state.ticker.take() {
                    ticker.cancel();
                }
                state.on_complete.take()
            } else {
                None
            };
            (state.remaining, state.sink.clone(), completion)
        };

        value.publish(remaining);
        if let Some(sink) = sink {
            sink.publish(remaining);
        }
        if let Some(completion) = completion {
            completion();
        }
    }

    /// Cancels the countdown. Idempotent; a pending completion never fires.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.on_complete = None;
        if let Some(ticker) = state.ticker.take() {
            ticker.cancel();
        }
    }

    /// Returns true while a countdown is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns the last emitted value.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.state.lock().remaining
    }

    /// Stream of emitted values.
    #[must_use]
    pub fn value(&self) -> &Signal<u32> {
        &self.value
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collect(signal: &Signal<u32>) -> (Arc<Mutex<Vec<u32>>>, crate::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = signal.subscribe(move |v| sink.lock().push(*v));
        seen.lock().clear();
        (seen, sub)
    }

    #[test]
    fn test_counts_down_and_completes_once() {
        let scheduler = Scheduler::new();
        let countdown = CountdownTimer::new(scheduler.clone());
        let (seen, _sub) = collect(countdown.value());

        let completions = Arc::new(AtomicUsize::new(0));
        let emissions_at_completion = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);
        let e = Arc::clone(&emissions_at_completion);
        let log = Arc::clone(&seen);
        countdown.start(
            5,
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                e.store(log.lock().len(), Ordering::SeqCst);
            },
            None,
        );

        scheduler.advance(Duration::from_secs(10));

        assert_eq!(*seen.lock(), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(emissions_at_completion.load(Ordering::SeqCst), 6);
        assert!(!countdown.is_running());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_external_sink_mirrors_values() {
        let scheduler = Scheduler::new();
        let countdown = CountdownTimer::new(scheduler.clone());
        let sink = Signal::new(99u32);
        let (seen, _sub) = collect(&sink);

        countdown.start(2, || {}, Some(sink.clone()));
        scheduler.advance(Duration::from_secs(2));

        assert_eq!(*seen.lock(), vec![2, 1, 0]);
        assert_eq!(sink.get(), 0);
    }

    #[test]
    fn test_stop_suppresses_completion() {
        let scheduler = Scheduler::new();
        let countdown = CountdownTimer::new(scheduler.clone());
        let completions = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);

        countdown.start(3, move || {
            c.fetch_add(1, Ordering::SeqCst);
        }, None);
        scheduler.advance(Duration::from_secs(1));
        countdown.stop();
        countdown.stop();
        scheduler.advance(Duration::from_secs(5));

        assert_eq!(completions.load(Ordering::SeqCst), 0);
        assert_eq!(countdown.remaining(), 2);
    }

    #[test]
    fn test_restart_cancels_previous_run() {
        let scheduler = Scheduler::new();
        let countdown = CountdownTimer::new(scheduler.clone());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&first);
        let s = Arc::clone(&second);

        countdown.start(2, move || {
            f.fetch_add(1, Ordering::SeqCst);
        }, None);
        scheduler.advance(Duration::from_secs(1));
        countdown.start(3, move || {
            s.fetch_add(1, Ordering::SeqCst);
        }, None);
        let (seen, _sub) = collect(countdown.value());

        scheduler.advance(Duration::from_secs(10));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn test_zero_seconds_completes_after_one_step() {
        let scheduler = Scheduler::new();
        let countdown = CountdownTimer::new(scheduler.clone());
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);

        countdown.start(0, move || {
            d.fetch_add(1, Ordering::SeqCst);
        }, None);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        scheduler.advance(COUNTDOWN_STEP);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
