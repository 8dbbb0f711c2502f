mod bot;
mod commands;
mod custom_id;
mod embeds;
mod interactions;
mod members;
mod options;

use std::num::NonZeroU64;
use std::sync::Arc;

use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tracing::info;

pub use bot::Bot;
pub use custom_id::ComponentAction;

use crate::facility_capture::{CallbackError, CaptureNotice, CaptureSink};

/// Start the Discord bot (optional - returns Ok(None) if no token)
pub async fn start_discord_bot(
    token: Option<String>,
    state: Arc<crate::state::AppState>,
) -> Result<Option<Client>, DiscordError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => {
            info!("No DISCORD_BOT_TOKEN set, skipping Discord bot");
            return Ok(None);
        }
    };

    info!("Starting Discord bot...");

    // Member events need the privileged server members intent.
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let client = Client::builder(&token, intents)
        .event_handler(Bot::new(state))
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))?;

    Ok(Some(client))
}

/// Convert a stored id into a serenity id. Zero is not a snowflake and
/// would panic in the id constructors.
pub(crate) fn snowflake<T: From<NonZeroU64>>(id: u64) -> Option<T> {
    NonZeroU64::new(id).map(T::from)
}

/// Discord-related errors
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Failed to create Discord client: {0}")]
    ClientError(String),
}

/// Posts capture notifications as embeds.
pub struct DiscordCaptureSink {
    http: Arc<Http>,
}

impl DiscordCaptureSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl CaptureSink for DiscordCaptureSink {
    async fn post_capture(&self, channel_id: u64, notice: &CaptureNotice) -> Result<(), CallbackError> {
        let channel = snowflake::<ChannelId>(channel_id)
            .ok_or_else(|| CallbackError::new(format!("invalid channel id {}", channel_id)))?;
        channel
            .send_message(
                &self.http,
                CreateMessage::new().embed(embeds::capture_embed(notice)),
            )
            .await
            .map(|_| ())
            .map_err(|e| CallbackError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serenity::model::id::RoleId;

    use super::*;

    #[test]
    fn test_zero_is_not_a_snowflake() {
        assert_eq!(snowflake::<ChannelId>(0), None);
        assert_eq!(snowflake::<RoleId>(0), None);
        assert_eq!(snowflake::<ChannelId>(555), Some(ChannelId::new(555)));
    }

    #[tokio::test]
    async fn test_capture_sink_rejects_zero_channel() {
        let sink = DiscordCaptureSink::new(Arc::new(Http::new("")));
        let notice = CaptureNotice {
            facility_name: "The Crown".to_string(),
            facility_type: None,
            zone: None,
            world: None,
            outfit: None,
            new_faction: None,
            old_faction: None,
            timestamp: chrono::Utc::now(),
        };
        let err = sink.post_capture(0, &notice).await.unwrap_err();
        assert!(err.to_string().contains("invalid channel id 0"));
    }
}
