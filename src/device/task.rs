//! Completion handles for asynchronous device work.
//!
//! A [`GpuTask`] carries exactly one completion. The device keeps the paired
//! [`TaskCompleter`] and resolves it from `poll`. Dropping the task cancels
//! interest in the result; the completer notices through
//! [`TaskCompleter::is_canceled`] and the outcome is discarded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use super::DeviceError;

type Outcome<T> = Result<T, DeviceError>;

/// Future resolving to the outcome of one asynchronous device operation.
#[must_use = "dropping a GpuTask cancels it"]
#[derive(Debug)]
pub struct GpuTask<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
}

/// Device-side half of a [`GpuTask`].
#[derive(Debug)]
pub struct TaskCompleter<T> {
    sender: oneshot::Sender<Outcome<T>>,
}

impl<T> GpuTask<T> {
    pub fn pending() -> (TaskCompleter<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (TaskCompleter { sender }, Self { receiver })
    }

    /// A task that is already resolved.
    pub fn ready(outcome: Outcome<T>) -> Self {
        let (completer, task) = Self::pending();
        completer.complete(outcome);
        task
    }

    /// Non-blocking check. Returns `None` while the operation is in flight.
    ///
    /// A completer dropped without resolving counts as a failure.
    pub fn try_complete(&mut self) -> Option<Outcome<T>> {
        match self.receiver.try_recv() {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(DeviceError::InvalidState(
                "operation abandoned by the device".to_string(),
            ))),
        }
    }
}

impl<T> Future for GpuTask<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(DeviceError::InvalidState(
                "operation abandoned by the device".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> TaskCompleter<T> {
    pub fn complete(self, outcome: Outcome<T>) {
        // The task may already be gone; the outcome is simply dropped then.
        let _ = self.sender.send(outcome);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.sender.is_canceled()
    }
}
