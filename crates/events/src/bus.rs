//! Notification publishing/subscription abstraction (mechanics only).
//!
//! The bus makes minimal assumptions:
//!
//! - **Transport-agnostic**: in-memory channels, Redis pub/sub, etc.
//! - **At-least-once delivery**: a message may arrive more than once; consumers must be idempotent
//! - **No ordering guarantees** relative to a subscriber's own in-flight writes
//! - **No persistence**: the override repository is the source of truth, the bus only distributes

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a notification stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Dropping the subscription detaches it from
/// the bus.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(msg) => reconcile(msg),
///         Err(RecvTimeoutError::Timeout) => continue,      // check for cancellation
///         Err(RecvTimeoutError::Disconnected) => break,    // bus closed
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic pub/sub bus.
///
/// `publish()` is only called after the authoritative write succeeded, so a
/// failed publish never loses data: subscribers catch up on the next
/// notification or when they re-hydrate from storage.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
