//! Turns streamed facility control events into capture notifications for
//! the guilds tracking the capturing outfit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uvocbot_core::{Faction, FacilityControlEvent, MapRegion, Outfit, WorldId, ZoneId};
use uvocbot_db::{DbResult, OutfitSubscription, PlanetsideSettingsRepository};

use super::queue::{CallbackError, CallbackFuture, CaptureCallback};
use super::service::FacilityCaptureService;
use crate::census::CensusClient;
use crate::census::stream::FacilityEventStream;

/// Everything needed to render one capture notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNotice {
    pub facility_name: String,
    pub facility_type: Option<String>,
    pub zone: Option<ZoneId>,
    pub world: Option<WorldId>,
    pub outfit: Option<Outfit>,
    pub new_faction: Option<Faction>,
    pub old_faction: Option<Faction>,
    pub timestamp: DateTime<Utc>,
}

impl CaptureNotice {
    pub fn new(event: &FacilityControlEvent, region: &MapRegion, outfit: Option<Outfit>) -> Self {
        Self {
            facility_name: region.facility_name.clone(),
            facility_type: region.facility_type.clone(),
            zone: region.zone().or_else(|| event.zone()),
            world: WorldId::from_id(event.world_id),
            outfit,
            new_faction: event.new_faction(),
            old_faction: event.old_faction(),
            timestamp: event.timestamp,
        }
    }

    pub fn outfit_name(&self) -> String {
        self.outfit
            .as_ref()
            .map(Outfit::display_name)
            .unwrap_or_else(|| "An outfit".to_string())
    }

    /// `[UVOC] Under Valhalla Our Castle captured The Crown`
    pub fn headline(&self) -> String {
        format!("{} captured {}", self.outfit_name(), self.facility_name)
    }

    /// `Large Outpost on Indar (Connery), taken from the VS`
    pub fn details(&self) -> String {
        let mut details = self
            .facility_type
            .clone()
            .unwrap_or_else(|| "Facility".to_string());
        if let Some(zone) = self.zone {
            details.push_str(&format!(" on {}", zone));
        }
        if let Some(world) = self.world {
            details.push_str(&format!(" ({})", world));
        }
        if let Some(old) = self.old_faction.filter(|f| *f != Faction::None) {
            details.push_str(&format!(", taken from the {}", old));
        }
        details
    }

    pub fn colour(&self) -> u32 {
        self.new_faction.unwrap_or(Faction::None).colour()
    }
}

/// Where capture notifications are delivered.
#[async_trait::async_trait]
pub trait CaptureSink: Send + Sync {
    async fn post_capture(&self, channel_id: u64, notice: &CaptureNotice) -> Result<(), CallbackError>;
}

/// Resolves the capturing outfit for display. Lookup failures are not
/// fatal to a notification.
#[async_trait::async_trait]
pub trait OutfitDirectory: Send + Sync {
    async fn outfit(&self, outfit_id: u64) -> Option<Outfit>;
}

#[async_trait::async_trait]
impl OutfitDirectory for CensusClient {
    async fn outfit(&self, outfit_id: u64) -> Option<Outfit> {
        match self.outfit_by_id(outfit_id).await {
            Ok(outfit) => outfit,
            Err(e) => {
                warn!("Failed to look up outfit {}: {}", outfit_id, e);
                None
            }
        }
    }
}

pub struct CaptureNotifier {
    service: Arc<FacilityCaptureService>,
    pool: SqlitePool,
    outfits: Arc<dyn OutfitDirectory>,
    sink: Arc<dyn CaptureSink>,
}

impl CaptureNotifier {
    pub fn new(
        service: Arc<FacilityCaptureService>,
        pool: SqlitePool,
        outfits: Arc<dyn OutfitDirectory>,
        sink: Arc<dyn CaptureSink>,
    ) -> Self {
        Self {
            service,
            pool,
            outfits,
            sink,
        }
    }

    /// Queue a notification for `event` if it is a capture by a tracked
    /// outfit. Returns the number of channels that will be notified.
    pub async fn handle_event(&self, event: FacilityControlEvent) -> DbResult<usize> {
        if !event.is_capture() {
            return Ok(0);
        }
        let Some(outfit_id) = event.outfit_id else {
            return Ok(0);
        };

        let subscriptions =
            PlanetsideSettingsRepository::subscriptions_for_outfit(&self.pool, outfit_id).await?;
        if subscriptions.is_empty() {
            return Ok(0);
        }

        debug!(
            "Outfit {} captured facility {}, notifying {} guild(s)",
            outfit_id,
            event.facility_id,
            subscriptions.len()
        );
        let count = subscriptions.len();
        let callback = self.callback(event.clone(), outfit_id, subscriptions);
        self.service.enqueue(event, callback);
        Ok(count)
    }

    fn callback(
        &self,
        event: FacilityControlEvent,
        outfit_id: u64,
        subscriptions: Vec<OutfitSubscription>,
    ) -> CaptureCallback {
        let outfits = Arc::clone(&self.outfits);
        let sink = Arc::clone(&self.sink);

        Box::new(move |region: MapRegion, cancel: CancellationToken| -> CallbackFuture {
            async move {
                let outfit = outfits.outfit(outfit_id).await;
                let notice = CaptureNotice::new(&event, &region, outfit);

                let mut failures = Vec::new();
                for subscription in &subscriptions {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if let Err(e) = sink.post_capture(subscription.channel_id, &notice).await {
                        warn!(
                            "Failed to post capture to channel {} in guild {}: {}",
                            subscription.channel_id, subscription.guild_id, e
                        );
                        failures.push(subscription.channel_id);
                    }
                }

                if !failures.is_empty() && failures.len() == subscriptions.len() {
                    return Err(CallbackError::new(format!(
                        "capture notification failed for every channel ({:?})",
                        failures
                    )));
                }
                Ok(())
            }
            .boxed()
        })
    }

    /// Feed events from the Census stream into the capture queue until the
    /// stream ends or `cancel` fires.
    pub async fn consume(&self, mut events: FacilityEventStream, cancel: CancellationToken) {
        info!("Capture notifier listening for facility control events");
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };
            let Some(event) = event else {
                break;
            };

            if let Err(e) = self.handle_event(event).await {
                warn!("Failed to look up capture subscriptions: {}", e);
            }
        }
        info!("Capture notifier stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use uvocbot_db::PlanetsideSettings;
    use uvocbot_db::test_helpers::create_test_settings_pool;

    use super::*;
    use crate::facility_capture::resolver::{MapRegionResolver, ResolveError};

    const UVOC: u64 = 37_570_391_403_474_619;

    struct FixedResolver;

    #[async_trait::async_trait]
    impl MapRegionResolver for FixedResolver {
        async fn resolve_facility_region(
            &self,
            facility_id: u64,
        ) -> Result<Option<MapRegion>, ResolveError> {
            Ok(Some(MapRegion {
                map_region_id: 2201,
                facility_id,
                facility_name: "The Crown".to_string(),
                facility_type: Some("Large Outpost".to_string()),
                zone_id: 2,
            }))
        }
    }

    struct KnownOutfits;

    #[async_trait::async_trait]
    impl OutfitDirectory for KnownOutfits {
        async fn outfit(&self, outfit_id: u64) -> Option<Outfit> {
            (outfit_id == UVOC).then(|| Outfit {
                id: UVOC,
                name: "Under Valhalla Our Castle".to_string(),
                tag: Some("UVOC".to_string()),
                member_count: 120,
                world_id: Some(1),
            })
        }
    }

    struct RecordingSink {
        tx: mpsc::UnboundedSender<(u64, CaptureNotice)>,
        fail_channels: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl CaptureSink for RecordingSink {
        async fn post_capture(
            &self,
            channel_id: u64,
            notice: &CaptureNotice,
        ) -> Result<(), CallbackError> {
            if self.fail_channels.lock().unwrap().contains(&channel_id) {
                return Err(CallbackError::new("missing permissions"));
            }
            let _ = self.tx.send((channel_id, notice.clone()));
            Ok(())
        }
    }

    fn capture(outfit_id: Option<u64>, old: u32, new: u32) -> FacilityControlEvent {
        FacilityControlEvent {
            facility_id: 222_280,
            world_id: 1,
            zone_id: 2,
            old_faction_id: old,
            new_faction_id: new,
            outfit_id,
            duration_held: 3600,
            timestamp: Utc::now(),
        }
    }

    async fn setup() -> (
        CaptureNotifier,
        Arc<FacilityCaptureService>,
        mpsc::UnboundedReceiver<(u64, CaptureNotice)>,
    ) {
        let db = create_test_settings_pool().await.unwrap();
        let pool = db.pool().clone();

        let mut tracking = PlanetsideSettings::new(1);
        tracking.base_capture_channel_id = Some(100);
        tracking.tracked_outfit_ids.insert(UVOC);
        PlanetsideSettingsRepository::upsert(&pool, &tracking)
            .await
            .unwrap();

        let service = Arc::new(FacilityCaptureService::new(Arc::new(FixedResolver)));
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink {
            tx,
            fail_channels: Mutex::new(Vec::new()),
        });
        let notifier = CaptureNotifier::new(service.clone(), pool, Arc::new(KnownOutfits), sink);
        (notifier, service, rx)
    }

    #[tokio::test]
    async fn tracked_capture_is_posted() {
        let (notifier, service, mut rx) = setup().await;
        let cancel = CancellationToken::new();
        let svc = service.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { svc.run(token).await });

        assert_eq!(notifier.handle_event(capture(Some(UVOC), 1, 3)).await.unwrap(), 1);

        let (channel_id, notice) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(channel_id, 100);
        assert_eq!(
            notice.headline(),
            "[UVOC] Under Valhalla Our Castle captured The Crown"
        );
        assert_eq!(
            notice.details(),
            "Large Outpost on Indar (Connery), taken from the VS"
        );
        assert_eq!(notice.colour(), Faction::Tr.colour());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn ignored_events_are_not_queued() {
        let (notifier, service, _rx) = setup().await;

        // Defense
        assert_eq!(notifier.handle_event(capture(Some(UVOC), 3, 3)).await.unwrap(), 0);
        // No outfit credited
        assert_eq!(notifier.handle_event(capture(None, 1, 3)).await.unwrap(), 0);
        // Outfit nobody tracks
        assert_eq!(notifier.handle_event(capture(Some(42), 1, 3)).await.unwrap(), 0);

        assert_eq!(service.queued(), 0);
    }

    #[test]
    fn notice_without_outfit_or_type() {
        let event = capture(Some(5), 0, 2);
        let region = MapRegion {
            map_region_id: 1,
            facility_id: 222_280,
            facility_name: "Ascent Bio Lab".to_string(),
            facility_type: None,
            zone_id: (3 << 16) | 344,
        };

        let notice = CaptureNotice::new(&event, &region, None);
        assert_eq!(notice.headline(), "An outfit captured Ascent Bio Lab");
        assert_eq!(notice.details(), "Facility on Oshur (Connery)");
    }
}
