//! Async Delivery Handle
//!
//! [`AsyncDelivery`] resolves to the original event once every async observer
//! has run, or to an [`AsyncDeliveryError`] carrying each observer failure.
//! It can be awaited from async code or waited on from a plain thread. It
//! only observes completion; it cannot cancel a delivery in flight.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::event::error::AsyncDeliveryError;
use crate::event::observer::Event;

/// Outcome of an async delivery
pub type DeliveryResult = Result<Arc<dyn Event>, AsyncDeliveryError>;

enum State {
    Ready(Option<DeliveryResult>),
    Pending(oneshot::Receiver<DeliveryResult>),
}

/// Future for the completion of one async delivery
#[must_use = "async observer failures are only reported through the delivery handle"]
pub struct AsyncDelivery {
    state: State,
}

impl AsyncDelivery {
    /// A delivery that has already completed with `event`
    pub fn completed(event: Arc<dyn Event>) -> Self {
        Self {
            state: State::Ready(Some(Ok(event))),
        }
    }

    /// A pending delivery plus the sender its task completes it with
    pub(crate) fn pending() -> (DeliveryCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (
            DeliveryCompleter { sender: tx },
            Self {
                state: State::Pending(rx),
            },
        )
    }

    /// Block the current thread until the delivery completes
    pub fn wait(self) -> DeliveryResult {
        futures::executor::block_on(self)
    }

    /// True if the delivery completed without scheduling any work
    pub fn is_immediate(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }
}

impl Future for AsyncDelivery {
    type Output = DeliveryResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(result) => match result.take() {
                Some(result) => Poll::Ready(result),
                None => panic!("AsyncDelivery polled after completion"),
            },
            State::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(AsyncDeliveryError::Abandoned)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl fmt::Debug for AsyncDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(_) => "ready",
            State::Pending(_) => "pending",
        };
        f.debug_struct("AsyncDelivery").field("state", &state).finish()
    }
}

/// Completes an [`AsyncDelivery`] from the worker thread
pub(crate) struct DeliveryCompleter {
    sender: oneshot::Sender<DeliveryResult>,
}

impl DeliveryCompleter {
    pub(crate) fn complete(self, result: DeliveryResult) {
        // The caller may have dropped the handle; nobody is left to tell
        let _ = self.sender.send(result);
    }
}
