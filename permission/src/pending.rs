//! Single-shot result slots for requests answered later by the platform.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

/// Identifies one outstanding dialog or settings request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type CancelHook = Box<dyn FnOnce(RequestId) + Send>;

/// Registry of outstanding requests, keyed by a fresh [`RequestId`] per call.
pub struct PendingRequests<T> {
    next_id: AtomicU64,
    senders: Mutex<HashMap<RequestId, oneshot::Sender<T>>>,
}

impl<T> fmt::Debug for PendingRequests<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequests")
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            senders: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingRequests<T> {
    fn senders(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<T>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new request. The returned future resolves once the request
    /// is completed or dismissed, and deregisters it when dropped.
    pub fn register(self: &Arc<Self>) -> Pending<T> {
        let (sender, receiver) = oneshot::channel();
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.senders().insert(id, sender);

        Pending {
            id,
            receiver,
            registry: Arc::clone(self),
            on_cancel: None,
        }
    }

    /// Deliver the result for `id`. Returns `false` if nobody is waiting any more.
    pub fn complete(&self, id: RequestId, value: T) -> bool {
        let sender = self.senders().remove(&id);
        sender.is_some_and(|sender| sender.send(value).is_ok())
    }

    /// Resolve `id` without a value, as when the UI went away.
    /// Returns `false` if the request was not pending.
    pub fn dismiss(&self, id: RequestId) -> bool {
        self.senders().remove(&id).is_some()
    }

    /// Number of requests still waiting for a result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders().len()
    }

    /// Whether no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Future for one registered request.
///
/// Yields `Some(value)` when completed and `None` when dismissed. Dropping it
/// before that deregisters the request, so a late completion is ignored.
#[must_use = "dropping a pending request cancels it"]
pub struct Pending<T> {
    id: RequestId,
    receiver: oneshot::Receiver<T>,
    registry: Arc<PendingRequests<T>>,
    on_cancel: Option<CancelHook>,
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T> Pending<T> {
    /// Identifier to hand to the platform.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Run `hook` if this request is dropped while still registered.
    pub fn on_cancel(mut self, hook: impl FnOnce(RequestId) + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }
}

impl<T> Future for Pending<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        // Only still-registered requests count as cancelled.
        if self.registry.dismiss(self.id) {
            if let Some(hook) = self.on_cancel.take() {
                hook(self.id);
            }
        }
    }
}
