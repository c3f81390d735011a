//! Caller-side cancellation of in-flight calls
//!
//! Cancelling drops the call's future at its current suspension point. If
//! that is the network await, neither recorder hook runs, so a call settles
//! at most once: success, failure, or not at all.

use std::future::Future;

use futures::future::{AbortHandle, Abortable, Aborted};

use crate::error::{Result, ServiceError};

/// Handle that cancels the call it was created with
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: AbortHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_aborted()
    }
}

/// Wrap a call so it can be cancelled from elsewhere.
///
/// A cancelled call resolves to [`ServiceError::Cancelled`]. Cancelling
/// after the call already settled has no effect on its result.
pub fn cancellable<F, T>(call: F) -> (impl Future<Output = Result<T>>, CancelHandle)
where
    F: Future<Output = Result<T>>,
{
    let (handle, registration) = AbortHandle::new_pair();
    let future = async move {
        match Abortable::new(call, registration).await {
            Ok(result) => result,
            Err(Aborted) => Err(ServiceError::cancelled("Query was cancelled")),
        }
    };

    (future, CancelHandle { inner: handle })
}
