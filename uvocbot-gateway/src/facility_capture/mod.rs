//! Facility capture pipeline.
//!
//! Capture events from the Census stream are queued, resolved to their map
//! region one at a time through a rate-limited and breaker-protected
//! resolver, then handed to a per-event callback that posts notifications.
//! Failed resolutions go to the back of the queue; an open breaker pauses
//! the loop before the retry.

pub mod notifier;
pub mod queue;
pub mod resolver;
pub mod service;

pub use notifier::{CaptureNotice, CaptureNotifier, CaptureSink, OutfitDirectory};
pub use queue::{
    CallbackError, CallbackFuture, CaptureCallback, FacilityResolutionQueue, QueueError, QueueItem,
};
pub use resolver::{CensusMapRegionResolver, MapRegionResolver, ResolveError};
pub use service::{
    DEFAULT_BREAKER_BACKOFF, DEFAULT_PACING, FacilityCaptureError, FacilityCaptureService,
};
