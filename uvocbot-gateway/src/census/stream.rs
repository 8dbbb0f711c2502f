//! Census event streaming (push.planetside2.com) client.

use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uvocbot_core::FacilityControlEvent;

use super::{CensusError, models::parse_num};

pub const FACILITY_CONTROL: &str = "FacilityControl";

pub type FacilityEventStream = Pin<Box<dyn Stream<Item = FacilityControlEvent> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Build the streaming endpoint URL for a service id.
pub fn stream_url(base: &str, service_id: &str) -> Result<Url, StreamError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("environment", "ps2")
        .append_pair("service-id", &format!("s:{}", service_id));
    Ok(url)
}

/// Subscription for facility control events on every world.
pub fn subscribe_message() -> String {
    serde_json::json!({
        "service": "event",
        "action": "subscribe",
        "worlds": ["all"],
        "eventNames": [FACILITY_CONTROL],
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    payload: Option<FacilityControlPayload>,
}

#[derive(Debug, Deserialize)]
struct FacilityControlPayload {
    event_name: String,
    facility_id: String,
    world_id: String,
    zone_id: String,
    old_faction_id: String,
    new_faction_id: String,
    #[serde(default)]
    outfit_id: Option<String>,
    #[serde(default)]
    duration_held: Option<String>,
    timestamp: String,
}

impl TryFrom<FacilityControlPayload> for FacilityControlEvent {
    type Error = CensusError;

    fn try_from(raw: FacilityControlPayload) -> Result<Self, Self::Error> {
        let outfit_id = match raw.outfit_id.as_deref() {
            None | Some("") | Some("0") => None,
            Some(id) => Some(parse_num(id, "outfit_id")?),
        };
        let duration_held = match raw.duration_held.as_deref() {
            Some(held) => parse_num(held, "duration_held")?,
            None => 0,
        };
        let seconds: i64 = parse_num(&raw.timestamp, "timestamp")?;
        let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| CensusError::Decode(format!("timestamp out of range: {}", seconds)))?;

        Ok(FacilityControlEvent {
            facility_id: parse_num(&raw.facility_id, "facility_id")?,
            world_id: parse_num(&raw.world_id, "world_id")?,
            zone_id: parse_num(&raw.zone_id, "zone_id")?,
            old_faction_id: parse_num(&raw.old_faction_id, "old_faction_id")?,
            new_faction_id: parse_num(&raw.new_faction_id, "new_faction_id")?,
            outfit_id,
            duration_held,
            timestamp,
        })
    }
}

/// Parse one text frame. Heartbeats, subscription acks and other events
/// yield `None`.
pub fn parse_event(text: &str) -> Option<FacilityControlEvent> {
    let message: StreamMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring unparseable stream frame: {}", e);
            return None;
        }
    };

    if message.kind.as_deref() != Some("serviceMessage") {
        return None;
    }
    let payload = message.payload?;
    if payload.event_name != FACILITY_CONTROL {
        return None;
    }

    match FacilityControlEvent::try_from(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Dropping malformed FacilityControl event: {}", e);
            None
        }
    }
}

/// Facility control events from the Census stream, reconnecting after
/// `reconnect_delay` whenever the socket drops. Ends when `cancel` fires.
pub fn facility_control_events(
    url: Url,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) -> FacilityEventStream {
    Box::pin(async_stream::stream! {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            info!("Connecting to Census event stream at {}", url.host_str().unwrap_or_default());
            match connect_async(url.as_str()).await {
                Ok((mut ws, _)) => {
                    if let Err(e) = ws.send(Message::Text(subscribe_message().into())).await {
                        error!("Failed to subscribe to Census events: {}", e);
                    } else {
                        info!("Subscribed to {} events", FACILITY_CONTROL);
                        loop {
                            let frame = tokio::select! {
                                _ = cancel.cancelled() => break,
                                frame = ws.next() => frame,
                            };

                            match frame {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(event) = parse_event(text.as_str()) {
                                        yield event;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    warn!("Census event stream closed");
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!("Census event stream error: {}", e);
                                    break;
                                }
                                Some(Ok(_)) => {}
                            }
                        }
                    }
                    let _ = ws.close(None).await;
                }
                Err(e) => {
                    error!("Failed to connect to Census event stream: {}", e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(reconnect_delay) => {}
            }
        }
        info!("Census event stream stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = r#"{
        "payload": {
            "duration_held": "1800",
            "event_name": "FacilityControl",
            "facility_id": "222280",
            "new_faction_id": "3",
            "old_faction_id": "1",
            "outfit_id": "37570391403474619",
            "timestamp": "1700000000",
            "world_id": "1",
            "zone_id": "2"
        },
        "service": "event",
        "type": "serviceMessage"
    }"#;

    #[test]
    fn test_stream_url() {
        let url = stream_url("wss://push.planetside2.com/streaming", "uvocbot").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://push.planetside2.com/streaming?environment=ps2&service-id=s%3Auvocbot"
        );
    }

    #[test]
    fn test_subscribe_message() {
        let value: serde_json::Value = serde_json::from_str(&subscribe_message()).unwrap();
        assert_eq!(value["action"], "subscribe");
        assert_eq!(value["worlds"][0], "all");
        assert_eq!(value["eventNames"][0], "FacilityControl");
    }

    #[test]
    fn test_parse_capture() {
        let event = parse_event(CAPTURE).unwrap();
        assert_eq!(event.facility_id, 222_280);
        assert_eq!(event.outfit_id, Some(37_570_391_403_474_619));
        assert_eq!(event.duration_held, 1800);
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert!(event.is_capture());
    }

    #[test]
    fn test_zero_outfit_is_none() {
        let text = CAPTURE.replace("37570391403474619", "0");
        assert_eq!(parse_event(&text).unwrap().outfit_id, None);
    }

    #[test]
    fn test_ignores_other_frames() {
        assert!(parse_event(r#"{"online":{},"service":"event","type":"heartbeat"}"#).is_none());
        assert!(
            parse_event(r#"{"connected":"true","service":"push","type":"connectionStateChanged"}"#)
                .is_none()
        );
        assert!(parse_event(r#"{"subscription":{"eventNames":["FacilityControl"]}}"#).is_none());
        assert!(parse_event("not json").is_none());

        let other_event = CAPTURE.replace("FacilityControl", "PlayerFacilityCapture");
        assert!(parse_event(&other_event).is_none());
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let text = CAPTURE.replace("\"222280\"", "\"abc\"");
        assert!(parse_event(&text).is_none());
    }
}
