//! Request-reply helpers for callers outside the actor system.
//!
//! A caller puts a [`ResponseChannel`] into its message and awaits the
//! matching receiver. The sender sits in `Arc<Mutex<Option<..>>>` because
//! messages have to be `Clone` while a oneshot sender can be used only once.

use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Response channel carried inside agent messages.
pub type ResponseChannel<T> = Arc<Mutex<Option<oneshot::Sender<T>>>>;

/// Create a response channel and the receiver to await.
#[must_use]
pub fn create_request_reply<T>() -> (ResponseChannel<T>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

/// Send `value` back to the caller.
///
/// # Errors
///
/// Returns `Err(value)` if the receiver was dropped or the channel was
/// already used.
pub async fn send_response<T>(response_tx: ResponseChannel<T>, value: T) -> Result<(), T> {
    // Take the sender first so the lock is not held while sending
    let tx = response_tx.lock().await.take();
    match tx {
        Some(tx) => tx.send(value),
        None => Err(value),
    }
}
