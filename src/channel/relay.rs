//! Unbounded event relay
//!
//! A producer hands events to a dedicated worker task over an unbounded
//! mpsc channel, so sending never waits on the consumer. The worker keeps
//! its own queue and forwards events one at a time as the consumer becomes
//! ready. Closing drains everything already accepted before the consumer
//! observes closure.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::events::Event;

pub use tokio::sync::mpsc::error::TryRecvError;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Control messages from producer handles to the relay worker
enum Signal<T> {
    Event(T),
    Close,
}

/// The relay worker is gone, so the event was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event channel {channel} is closed")]
pub struct ChannelClosed {
    /// Id of the channel that rejected the event
    pub channel: u64,
}

/// Create a new event channel and spawn its relay worker.
///
/// Must be called from within a Tokio runtime context; use
/// [`channel_on`] elsewhere. The returned sender may be used from any
/// thread, runtime or not.
pub fn channel<T: Send + 'static>() -> (EventSender<T>, EventReceiver<T>) {
    channel_on(&Handle::current())
}

/// Create a new event channel whose relay worker runs on `runtime`.
///
/// Safe to call from threads outside any Tokio context.
pub fn channel_on<T: Send + 'static>(runtime: &Handle) -> (EventSender<T>, EventReceiver<T>) {
    let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::channel(1);

    runtime.spawn(relay(id, input_rx, output_tx));
    trace!(channel = id, "event channel created");

    (
        EventSender { id, tx: input_tx },
        EventReceiver {
            id,
            rx: Arc::new(Mutex::new(output_rx)),
        },
    )
}

/// Worker loop owning the queue for one channel
async fn relay<T>(
    id: u64,
    mut input: mpsc::UnboundedReceiver<Signal<T>>,
    output: mpsc::Sender<T>,
) {
    let mut queue: VecDeque<T> = VecDeque::new();

    loop {
        if queue.is_empty() {
            match input.recv().await {
                Some(Signal::Event(event)) => queue.push_back(event),
                Some(Signal::Close) | None => break,
            }
            continue;
        }

        tokio::select! {
            signal = input.recv() => match signal {
                Some(Signal::Event(event)) => queue.push_back(event),
                Some(Signal::Close) | None => break,
            },
            permit = output.reserve() => match permit {
                Ok(permit) => {
                    if let Some(event) = queue.pop_front() {
                        permit.send(event);
                    }
                }
                Err(_) => {
                    debug!(channel = id, dropped = queue.len(), "consumer gone, relay exiting");
                    return;
                }
            },
        }
    }

    // Reject anything fired after close, even while the drain is pending
    input.close();

    if !queue.is_empty() {
        debug!(channel = id, pending = queue.len(), "channel closed, draining queue");
    }

    while let Some(event) = queue.pop_front() {
        if output.send(event).await.is_err() {
            debug!(channel = id, dropped = queue.len() + 1, "consumer gone while draining");
            return;
        }
    }

    trace!(channel = id, "relay exited");
}

/// Producer side of an event channel.
///
/// There is exactly one sender per channel. Closing consumes it and
/// dropping it closes the channel as well, so a channel can only be closed
/// once and nothing can be sent through this handle afterwards.
pub struct EventSender<T = Event> {
    id: u64,
    tx: mpsc::UnboundedSender<Signal<T>>,
}

impl<T> EventSender<T> {
    /// Queue an event for the consumer.
    ///
    /// Returns immediately regardless of whether anyone is reading. Fails
    /// only once the relay has stopped because every consumer handle was
    /// dropped.
    pub fn send(&self, event: T) -> Result<(), ChannelClosed> {
        self.tx
            .send(Signal::Event(event))
            .map_err(|_| ChannelClosed { channel: self.id })
    }

    /// Hand out a send-only capability for callback contexts.
    pub fn trigger(&self) -> EventTrigger<T> {
        EventTrigger {
            id: self.id,
            tx: self.tx.clone(),
        }
    }

    /// Close the channel. Events already sent are still delivered.
    pub fn close(self) {
        drop(self);
    }

    /// Process-unique id of this channel
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Drop for EventSender<T> {
    fn drop(&mut self) {
        if self.tx.send(Signal::Close).is_ok() {
            trace!(channel = self.id, "close requested");
        }
    }
}

impl<T> fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender").field("channel", &self.id).finish()
    }
}

/// Send-only producer capability handed to backend callbacks.
///
/// A trigger cannot close its channel. Once the relay has processed the
/// owning [`EventSender`]'s close, `fire` is rejected with
/// [`ChannelClosed`].
pub struct EventTrigger<T = Event> {
    id: u64,
    tx: mpsc::UnboundedSender<Signal<T>>,
}

impl<T> EventTrigger<T> {
    /// Queue an event without waiting for the consumer
    pub fn fire(&self, event: T) -> Result<(), ChannelClosed> {
        self.tx
            .send(Signal::Event(event))
            .map_err(|_| ChannelClosed { channel: self.id })
    }

    /// Id of the channel this trigger feeds
    pub fn channel_id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for EventTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for EventTrigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTrigger").field("channel", &self.id).finish()
    }
}

/// Consumer side of an event channel.
///
/// Cloning yields another handle to the same stream; clones compete for
/// events rather than each seeing every event.
pub struct EventReceiver<T = Event> {
    id: u64,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> EventReceiver<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the channel is closed and every buffered event
    /// has been delivered.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take the next event if one is ready right now
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match self.rx.try_lock() {
            Ok(mut rx) => rx.try_recv(),
            // Another clone is mid-receive
            Err(_) => Err(TryRecvError::Empty),
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for consumers outside an
    /// async context.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&self) -> Option<T> {
        self.rx.blocking_lock().blocking_recv()
    }

    /// Whether both handles read from the same channel
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }

    /// Process-unique id of this channel
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for EventReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> fmt::Debug for EventReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver").field("channel", &self.id).finish()
    }
}
