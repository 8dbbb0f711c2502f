//! The facility capture resolution loop.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uvocbot_core::{FacilityCaptureSettings, FacilityControlEvent, MapRegion};

use super::queue::{CaptureCallback, FacilityResolutionQueue, QueueError, QueueItem};
use super::resolver::MapRegionResolver;

/// Minimum time between the start of one callback and the next.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Pause before retrying an item whose resolver reported an open breaker.
pub const DEFAULT_BREAKER_BACKOFF: Duration = Duration::from_secs(15);

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum FacilityCaptureError {
    #[error("the facility capture loop is already running")]
    AlreadyRunning,

    #[error("the facility capture loop has already stopped")]
    Stopped,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Marks the loop stopped however `run` exits, including when its future
/// is dropped.
struct StopOnDrop<'a>(&'a AtomicU8);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(STOPPED, Ordering::SeqCst);
    }
}

/// Serializes capture events through map region resolution and their
/// callbacks, one at a time.
pub struct FacilityCaptureService {
    queue: FacilityResolutionQueue,
    resolver: Arc<dyn MapRegionResolver>,
    state: AtomicU8,
    pacing: Duration,
    breaker_backoff: Duration,
}

impl FacilityCaptureService {
    pub fn new(resolver: Arc<dyn MapRegionResolver>) -> Self {
        Self::with_timing(resolver, DEFAULT_PACING, DEFAULT_BREAKER_BACKOFF)
    }

    pub fn from_settings(
        resolver: Arc<dyn MapRegionResolver>,
        settings: &FacilityCaptureSettings,
    ) -> Self {
        Self::with_timing(
            resolver,
            Duration::from_millis(settings.pacing_ms),
            Duration::from_secs(settings.breaker_backoff_seconds),
        )
    }

    pub fn with_timing(
        resolver: Arc<dyn MapRegionResolver>,
        pacing: Duration,
        breaker_backoff: Duration,
    ) -> Self {
        Self {
            queue: FacilityResolutionQueue::new(),
            resolver,
            state: AtomicU8::new(NOT_STARTED),
            pacing,
            breaker_backoff,
        }
    }

    /// Queue a capture event. Never blocks and never rejects.
    pub fn enqueue(&self, event: FacilityControlEvent, callback: CaptureCallback) {
        debug!("Queued capture of facility {}", event.facility_id);
        self.queue.enqueue(event, callback);
    }

    /// Number of events waiting to be resolved.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Consume the queue until `cancel` fires.
    ///
    /// Fails immediately if the loop is already running or has run before.
    /// Cancellation is a normal exit and returns `Ok(())`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), FacilityCaptureError> {
        if let Err(current) =
            self.state
                .compare_exchange(NOT_STARTED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            return Err(if current == RUNNING {
                FacilityCaptureError::AlreadyRunning
            } else {
                FacilityCaptureError::Stopped
            });
        }
        let _stopped = StopOnDrop(&self.state);

        let items = self.queue.dequeue_all(cancel.clone())?;
        let mut items = std::pin::pin!(items);

        info!("Facility capture loop started");
        while let Some(item) = items.next().await {
            if self.process(item, &cancel).await.is_break() {
                break;
            }
        }
        info!("Facility capture loop stopped");

        Ok(())
    }

    async fn process(&self, item: QueueItem, cancel: &CancellationToken) -> ControlFlow<()> {
        let facility_id = item.event.facility_id;

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ControlFlow::Break(()),
            resolved = self.resolver.resolve_facility_region(facility_id) => resolved,
        };

        match resolved {
            Ok(Some(region)) => self.invoke(item, region, cancel).await,
            Ok(None) => {
                warn!(
                    "Facility {} has no map region, dropping capture event",
                    facility_id
                );
                ControlFlow::Continue(())
            }
            Err(e) if e.is_backoff_worthy() => {
                warn!(
                    "Could not resolve facility {} ({}), retrying in {:?}",
                    facility_id, e, self.breaker_backoff
                );
                if wait(self.breaker_backoff, cancel).await.is_break() {
                    return ControlFlow::Break(());
                }
                self.queue.requeue(item);
                ControlFlow::Continue(())
            }
            Err(e) => {
                warn!("Could not resolve facility {} ({}), requeueing", facility_id, e);
                self.queue.requeue(item);
                ControlFlow::Continue(())
            }
        }
    }

    async fn invoke(
        &self,
        item: QueueItem,
        region: MapRegion,
        cancel: &CancellationToken,
    ) -> ControlFlow<()> {
        let QueueItem { event, callback } = item;
        let token = cancel.clone();
        let started = Instant::now();

        // The callback is called inside the future so a panic while building
        // its future is caught too.
        let outcome = AssertUnwindSafe(async move { callback(region, token).await }).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ControlFlow::Break(()),
            outcome = outcome => outcome,
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(())) => {
                debug!(
                    "Capture callback for facility {} finished in {:?}",
                    event.facility_id, elapsed
                );
                wait(self.pacing.saturating_sub(elapsed), cancel).await
            }
            Ok(Err(e)) => {
                error!(
                    "Capture callback for facility {} failed: {}",
                    event.facility_id, e
                );
                wait(self.pacing, cancel).await
            }
            Err(panic) => {
                error!(
                    "Capture callback for facility {} panicked: {}",
                    event.facility_id,
                    panic_message(panic.as_ref())
                );
                wait(self.pacing, cancel).await
            }
        }
    }
}

async fn wait(duration: Duration, cancel: &CancellationToken) -> ControlFlow<()> {
    if duration.is_zero() {
        return ControlFlow::Continue(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => ControlFlow::Break(()),
        _ = sleep(duration) => ControlFlow::Continue(()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::facility_capture::queue::{CallbackError, CallbackFuture};
    use crate::facility_capture::resolver::ResolveError;

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        NotFound,
        Fail,
        Unhealthy,
        Hang,
    }

    /// Resolves every facility unless a scripted outcome is queued for it.
    #[derive(Default)]
    struct ScriptedResolver {
        script: Mutex<HashMap<u64, VecDeque<Outcome>>>,
        calls: Mutex<HashMap<u64, usize>>,
    }

    impl ScriptedResolver {
        fn with(script: &[(u64, Outcome)]) -> Arc<Self> {
            let resolver = Self::default();
            {
                let mut map = resolver.script.lock().unwrap();
                for (id, outcome) in script {
                    map.entry(*id).or_default().push_back(*outcome);
                }
            }
            Arc::new(resolver)
        }

        fn calls(&self, facility_id: u64) -> usize {
            self.calls.lock().unwrap().get(&facility_id).copied().unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl MapRegionResolver for ScriptedResolver {
        async fn resolve_facility_region(
            &self,
            facility_id: u64,
        ) -> Result<Option<MapRegion>, ResolveError> {
            *self.calls.lock().unwrap().entry(facility_id).or_default() += 1;
            let scripted = self
                .script
                .lock()
                .unwrap()
                .get_mut(&facility_id)
                .and_then(VecDeque::pop_front);
            match scripted {
                None => Ok(Some(region(facility_id))),
                Some(Outcome::NotFound) => Ok(None),
                Some(Outcome::Fail) => Err(ResolveError::Failed("timeout".into())),
                Some(Outcome::Unhealthy) => Err(ResolveError::DependencyUnhealthy("open".into())),
                Some(Outcome::Hang) => std::future::pending().await,
            }
        }
    }

    fn region(facility_id: u64) -> MapRegion {
        MapRegion {
            map_region_id: facility_id + 1000,
            facility_id,
            facility_name: format!("Facility {}", facility_id),
            facility_type: None,
            zone_id: 2,
        }
    }

    fn event(facility_id: u64) -> FacilityControlEvent {
        FacilityControlEvent {
            facility_id,
            world_id: 1,
            zone_id: 2,
            old_faction_id: 1,
            new_faction_id: 3,
            outfit_id: None,
            duration_held: 0,
            timestamp: Utc::now(),
        }
    }

    #[derive(Debug)]
    struct Invocation {
        facility_id: u64,
        started: Instant,
        finished: Instant,
    }

    /// Callback that takes `duration` and reports when it ran.
    fn recording(tx: &mpsc::UnboundedSender<Invocation>, duration: Duration) -> CaptureCallback {
        let tx = tx.clone();
        Box::new(move |region: MapRegion, _: CancellationToken| -> CallbackFuture {
            async move {
                let started = Instant::now();
                if !duration.is_zero() {
                    sleep(duration).await;
                }
                let _ = tx.send(Invocation {
                    facility_id: region.facility_id,
                    started,
                    finished: Instant::now(),
                });
                Ok(())
            }
            .boxed()
        })
    }

    fn failing() -> CaptureCallback {
        Box::new(|_: MapRegion, _: CancellationToken| -> CallbackFuture {
            async { Err(CallbackError::new("discord is down")) }.boxed()
        })
    }

    fn panicking() -> CaptureCallback {
        Box::new(|_: MapRegion, _: CancellationToken| -> CallbackFuture {
            async { panic!("callback exploded") }.boxed()
        })
    }

    fn start(
        service: &Arc<FacilityCaptureService>,
    ) -> (
        CancellationToken,
        tokio::task::JoinHandle<Result<(), FacilityCaptureError>>,
    ) {
        let cancel = CancellationToken::new();
        let svc = Arc::clone(service);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { svc.run(token).await });
        (cancel, handle)
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<Invocation>, n: usize) -> Vec<Invocation> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(rx.recv().await.expect("callback channel closed"));
        }
        out
    }

    async fn stop(
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<Result<(), FacilityCaptureError>>,
    ) {
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn processes_items_in_fifo_order() {
        let resolver = ScriptedResolver::with(&[]);
        let service = Arc::new(FacilityCaptureService::new(resolver));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for id in 1..=5 {
            service.enqueue(event(id), recording(&tx, Duration::ZERO));
        }
        let (cancel, handle) = start(&service);

        let order: Vec<u64> = collect(&mut rx, 5).await.iter().map(|i| i.facility_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_requeued_behind_later_items() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::Fail)]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::ZERO));
        service.enqueue(event(2), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let order: Vec<u64> = collect(&mut rx, 2).await.iter().map(|i| i.facility_id).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(resolver.calls(1), 2);

        // Exactly once: nothing else arrives
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_waits_before_retrying() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::Unhealthy)]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let begin = Instant::now();
        service.enqueue(event(1), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let invocation = collect(&mut rx, 1).await.remove(0);
        assert!(invocation.started - begin >= DEFAULT_BREAKER_BACKOFF);
        assert_eq!(resolver.calls(1), 2);

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_retry_without_delay() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::Fail), (1, Outcome::Fail)]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let begin = Instant::now();
        service.enqueue(event(1), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let invocation = collect(&mut rx, 1).await.remove(0);
        assert!(invocation.started - begin < Duration::from_millis(1));
        assert_eq!(resolver.calls(1), 3);

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fast_callbacks_are_paced() {
        let service = Arc::new(FacilityCaptureService::new(ScriptedResolver::with(&[])));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::from_millis(10)));
        service.enqueue(event(2), recording(&tx, Duration::from_millis(10)));
        let (cancel, handle) = start(&service);

        let runs = collect(&mut rx, 2).await;
        assert!(runs[1].started - runs[0].finished >= Duration::from_millis(90));

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_callbacks_get_no_extra_delay() {
        let service = Arc::new(FacilityCaptureService::new(ScriptedResolver::with(&[])));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::from_millis(150)));
        service.enqueue(event(2), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let runs = collect(&mut rx, 2).await;
        assert!(runs[1].started - runs[0].finished < Duration::from_millis(1));

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callbacks_do_not_stop_the_loop() {
        let resolver = ScriptedResolver::with(&[]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), failing());
        service.enqueue(event(2), panicking());
        service.enqueue(event(3), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let runs = collect(&mut rx, 1).await;
        assert_eq!(runs[0].facility_id, 3);
        // Failed callbacks are not retried
        assert_eq!(resolver.calls(1), 1);
        assert_eq!(resolver.calls(2), 1);
        assert!(service.is_running());

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_dropped_without_callback() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::NotFound)]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::ZERO));
        service.enqueue(event(2), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let runs = collect(&mut rx, 1).await;
        assert_eq!(runs[0].facility_id, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(resolver.calls(1), 1);

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_rejected_while_first_continues() {
        let service = Arc::new(FacilityCaptureService::new(ScriptedResolver::with(&[])));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (cancel, handle) = start(&service);

        while !service.is_running() {
            tokio::task::yield_now().await;
        }
        let second = service.run(CancellationToken::new()).await;
        assert!(matches!(second, Err(FacilityCaptureError::AlreadyRunning)));

        service.enqueue(event(7), recording(&tx, Duration::ZERO));
        assert_eq!(collect(&mut rx, 1).await[0].facility_id, 7);

        stop(cancel, handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unwinds_a_running_callback() {
        let service = Arc::new(FacilityCaptureService::new(ScriptedResolver::with(&[])));
        let (tx, _rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::from_secs(3600)));
        let (cancel, handle) = start(&service);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let begin = Instant::now();
        stop(cancel, handle).await;
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(!service.is_running());

        let restart = service.run(CancellationToken::new()).await;
        assert!(matches!(restart, Err(FacilityCaptureError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_hung_lookup() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::Hang)]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(1), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(resolver.calls(1), 1);
        assert!(service.is_running());

        let begin = Instant::now();
        stop(cancel, handle).await;
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(!service.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_breaker_backoff() {
        let resolver = ScriptedResolver::with(&[(1, Outcome::Unhealthy)]);
        let service = Arc::new(FacilityCaptureService::new(resolver));
        let (cancel, handle) = start(&service);

        service.enqueue(event(1), failing());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let begin = Instant::now();
        stop(cancel, handle).await;
        assert!(begin.elapsed() < DEFAULT_BREAKER_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_events_are_all_processed() {
        let resolver = ScriptedResolver::with(&[]);
        let service = Arc::new(FacilityCaptureService::new(resolver.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.enqueue(event(4), recording(&tx, Duration::ZERO));
        service.enqueue(event(4), recording(&tx, Duration::ZERO));
        let (cancel, handle) = start(&service);

        let runs = collect(&mut rx, 2).await;
        assert!(runs.iter().all(|r| r.facility_id == 4));
        assert_eq!(resolver.calls(4), 2);

        stop(cancel, handle).await;
    }

    #[tokio::test]
    async fn queued_reports_pending_items() {
        let service = FacilityCaptureService::new(ScriptedResolver::with(&[]));
        assert!(!service.is_running());

        service.enqueue(event(1), failing());
        service.enqueue(event(2), failing());
        assert_eq!(service.queued(), 2);
    }
}
