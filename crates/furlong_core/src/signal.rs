//! # Signals and Event Streams
//!
//! Publish/subscribe primitives that carry race and pool state to downstream
//! consumers (renderers, UI, the pool aggregator).
//!
//! ## Contract
//!
//! - [`Signal`] holds a current value. New subscribers receive it immediately
//!   (latest-value replay), then every subsequent publication.
//! - [`EventStream`] has no current value. Subscribers only see events
//!   published after they subscribed.
//! - Delivery is synchronous, on the publishing thread, in subscription order.
//! - No lock is held while a listener runs, so listeners may read from or
//!   publish to any signal, including the one that called them.
//! - A [`Subscription`] detaches its listener on [`Subscription::unsubscribe`]
//!   or when dropped.
//!
//! ```text
//! RaceInstance ──publish──> Signal<RaceState> ──┬──> renderer
//!                                               ├──> UI badge
//!                                               └──> Feed (crossbeam channel)
//! ```

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Listener callback type.
type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registered listeners of one signal or stream.
struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> Listeners<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, listener: Listener<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        before != self.entries.len()
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Shared listener registry with detachable subscriptions.
struct Broadcaster<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> Broadcaster<T> {
    fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners::new())),
        }
    }

    fn attach(&self, listener: Listener<T>) -> Subscription
    where
        T: Send,
    {
        let id = self.listeners.lock().insert(listener);
        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.lock().remove(id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        self.listeners.lock().snapshot()
    }

    fn len(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

/// Handle to an attached listener.
///
/// Dropping the handle detaches the listener.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detaches the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Returns true while the listener is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Channel-backed subscription.
///
/// Values are pushed with non-blocking sends; when the channel is full the
/// value is dropped for this feed only.
pub struct Feed<T> {
    receiver: Receiver<T>,
    subscription: Subscription,
}

impl<T> Feed<T> {
    /// Receives one value (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next value.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receives all pending values (non-blocking).
    pub fn drain(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.receiver.len());
        while let Ok(value) = self.receiver.try_recv() {
            values.push(value);
        }
        values
    }

    /// Returns the number of pending values.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Detaches the feed from its source. Pending values stay readable.
    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
    }
}

fn channel_listener<T: Clone + Send + 'static>(capacity: usize) -> (Listener<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    let listener: Listener<T> = Arc::new(move |value: &T| {
        match tx.try_send(value.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("feed full, value dropped");
            }
        }
    });
    (listener, rx)
}

/// A value that changes over time, with latest-value replay.
pub struct Signal<T> {
    value: Arc<Mutex<T>>,
    listeners: Broadcaster<T>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Creates a signal holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
            listeners: Broadcaster::new(),
        }
    }

    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    /// Replaces the current value and delivers it to every listener.
    pub fn publish(&self, value: T) {
        let listeners = {
            let mut current = self.value.lock();
            *current = value.clone();
            self.listeners.snapshot()
        };
        for listener in listeners {
            listener(&value);
        }
    }

    /// Attaches a listener. It is called with the current value before this
    /// returns, then on every publication.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let listener: Listener<T> = Arc::new(listener);
        let (subscription, current) = {
            let current = self.value.lock();
            (self.listeners.attach(Arc::clone(&listener)), current.clone())
        };
        listener(&current);
        subscription
    }

    /// Attaches a bounded channel that receives the current value and every
    /// publication.
    pub fn subscribe_channel(&self, capacity: usize) -> Feed<T> {
        let (listener, receiver) = channel_listener(capacity);
        let subscription = self.subscribe(move |value| listener(value));
        Feed {
            receiver,
            subscription,
        }
    }

    /// Returns the number of attached listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            listeners: self.listeners.clone(),
        }
    }
}

impl<T: Clone + Send + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.value.lock())
            .finish_non_exhaustive()
    }
}

/// A stream of discrete events, without replay.
pub struct EventStream<T> {
    listeners: Broadcaster<T>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    /// Creates a stream with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Broadcaster::new(),
        }
    }

    /// Delivers `event` to every listener.
    pub fn emit(&self, event: &T) {
        for listener in self.listeners.snapshot() {
            listener(event);
        }
    }

    /// Attaches a listener for events emitted from now on.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.listeners.attach(Arc::new(listener))
    }

    /// Attaches a bounded channel that receives events emitted from now on.
    pub fn subscribe_channel(&self, capacity: usize) -> Feed<T> {
        let (listener, receiver) = channel_listener(capacity);
        let subscription = self.listeners.attach(listener);
        Feed {
            receiver,
            subscription,
        }
    }

    /// Returns the number of attached listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Clone + Send + 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_replays_latest_value() {
        let signal = Signal::new(1u32);
        signal.publish(7);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = signal.subscribe(move |v| sink.lock().push(*v));

        signal.publish(8);
        assert_eq!(*seen.lock(), vec![7, 8]);
        assert_eq!(signal.get(), 8);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let signal = Signal::new(0u32);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut sub = signal.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.publish(1);
        sub.unsubscribe();
        sub.unsubscribe();
        signal.publish(2);

        // replay + one publication
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(signal.subscriber_count(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_drop_detaches_listener() {
        let stream: EventStream<u8> = EventStream::new();
        {
            let _sub = stream.subscribe(|_| {});
            assert_eq!(stream.subscriber_count(), 1);
        }
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_event_stream_has_no_replay() {
        let stream = EventStream::new();
        stream.emit(&"early");

        let feed = stream.subscribe_channel(8);
        stream.emit(&"late");

        assert_eq!(feed.drain(), vec!["late"]);
    }

    #[test]
    fn test_listener_may_publish_reentrantly() {
        let signal = Signal::new(0u32);
        let echo = Signal::new(0u32);
        let echo_handle = echo.clone();
        let _sub = signal.subscribe(move |v| echo_handle.publish(*v * 10));

        signal.publish(4);
        assert_eq!(echo.get(), 40);
    }

    #[test]
    fn test_full_feed_drops_values() {
        let signal = Signal::new(0u32);
        let feed = signal.subscribe_channel(2);
        signal.publish(1);
        signal.publish(2);

        assert_eq!(feed.pending_count(), 2);
        assert_eq!(feed.drain(), vec![0, 1]);
    }
}
