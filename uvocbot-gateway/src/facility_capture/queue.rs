//! Unbounded FIFO of facility capture events awaiting resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::Stream;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uvocbot_core::{FacilityControlEvent, MapRegion};

/// Error returned by a capture callback. Logged by the loop, never retried.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CallbackError(String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type CallbackFuture = BoxFuture<'static, Result<(), CallbackError>>;

/// Invoked once with the resolved map region and the loop's cancellation
/// token.
pub type CaptureCallback = Box<dyn FnOnce(MapRegion, CancellationToken) -> CallbackFuture + Send>;

pub struct QueueItem {
    pub event: FacilityControlEvent,
    pub callback: CaptureCallback,
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueItem")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("the facility resolution queue already has a consumer")]
    AlreadyConsumed,
}

/// Many producers, one consumer. The receiver is handed out once by
/// [`FacilityResolutionQueue::dequeue_all`].
#[derive(Debug)]
pub struct FacilityResolutionQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<QueueItem>>>,
    len: Arc<AtomicUsize>,
}

impl FacilityResolutionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            len: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add an item to the back of the queue.
    pub fn enqueue(&self, event: FacilityControlEvent, callback: CaptureCallback) {
        self.push(QueueItem { event, callback });
    }

    /// Put an item that failed to resolve back at the end of the queue.
    pub fn requeue(&self, item: QueueItem) {
        self.push(item);
    }

    fn push(&self, item: QueueItem) {
        self.len.fetch_add(1, Ordering::SeqCst);
        if let Err(rejected) = self.tx.send(item) {
            // Only possible once the consumer has shut down and dropped the receiver.
            self.len.fetch_sub(1, Ordering::SeqCst);
            warn!(
                "Facility queue consumer has stopped, dropping event for facility {}",
                rejected.0.event.facility_id
            );
        }
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the consuming end of the queue as a stream.
    ///
    /// The stream waits while the queue is empty and ends once `cancel`
    /// fires. Only one consumer may ever exist.
    pub fn dequeue_all(
        &self,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = QueueItem> + Send + use<>, QueueError> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(QueueError::AlreadyConsumed)?;
        let len = Arc::clone(&self.len);

        Ok(async_stream::stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => next,
                };
                match next {
                    Some(item) => {
                        len.fetch_sub(1, Ordering::SeqCst);
                        yield item;
                    }
                    None => break,
                }
            }
        })
    }
}

impl Default for FacilityResolutionQueue {
    fn default() -> Self {
        Self::new()
    }
}
