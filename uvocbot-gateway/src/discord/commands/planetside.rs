//! Game lookups and the `/planetside` settings command.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;
use uvocbot_core::{Outfit, WorldId};
use uvocbot_db::{PlanetsideSettings, PlanetsideSettingsRepository};

use super::{
    CommandContext, CommandError, CommandResult, Reply, server_option, settings_command,
    subcommand,
};
use crate::discord::embeds;
use crate::discord::options::Invocation;

const MAX_TAG_LEN: usize = 4;

pub(super) fn definitions() -> Vec<CreateCommand> {
    let tag_option = || {
        CreateCommandOption::new(CommandOptionType::String, "tag", "Outfit tag").required(true)
    };

    vec![
        CreateCommand::new("population")
            .description("Show the population of a server")
            .add_option(server_option(false)),
        CreateCommand::new("status")
            .description("Show continent control on a server")
            .add_option(server_option(false)),
        CreateCommand::new("outfit")
            .description("Look up an outfit by tag")
            .add_option(tag_option()),
        CreateCommand::new("online")
            .description("List the online members of an outfit")
            .add_option(tag_option()),
        settings_command("planetside", "PlanetSide 2 settings for this server")
            .add_option(
                subcommand("default-server", "Server used when a command omits one")
                    .add_sub_option(server_option(true)),
            )
            .add_option(
                subcommand("base-capture-channel", "Channel for tracked outfit base captures")
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::Channel,
                            "channel",
                            "Capture notification channel",
                        )
                        .required(true),
                    ),
            )
            .add_option(
                subcommand("track-outfit", "Post base captures made by an outfit")
                    .add_sub_option(tag_option()),
            )
            .add_option(
                subcommand("untrack-outfit", "Stop posting captures for an outfit")
                    .add_sub_option(tag_option()),
            )
            .add_option(subcommand("settings", "Show the current settings")),
    ]
}

pub(super) async fn execute(
    ctx: &CommandContext<'_>,
    name: &str,
    invocation: &Invocation,
) -> CommandResult {
    match name {
        "population" => {
            let world = resolve_world(ctx, invocation).await?;
            let population = ctx.state.population.world_population(world).await?;
            Ok(Reply::Embed(embeds::population_embed(&population)))
        }
        "status" => {
            let world = resolve_world(ctx, invocation).await?;
            let territory = ctx.state.census.world_territory(world).await?;
            Ok(Reply::Embed(embeds::status_embed(world, &territory)))
        }
        "outfit" => {
            let outfit = find_outfit(ctx, invocation).await?;
            Ok(Reply::Embed(embeds::outfit_embed(&outfit)))
        }
        "online" => {
            let outfit = find_outfit(ctx, invocation).await?;
            let online = ctx.state.census.online_members(outfit.id).await?;
            Ok(Reply::Embed(embeds::online_embed(&outfit, &online)))
        }
        _ => settings(ctx, invocation).await,
    }
}

async fn settings(ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult {
    let guild_id = ctx.guild()?;
    let pool = ctx.pool();

    match invocation.subcommand() {
        "default-server" => {
            let world = parse_world(invocation.string("server"))?
                .ok_or_else(|| CommandError::usage("Pick a server."))?;
            let mut settings = PlanetsideSettingsRepository::get(pool, guild_id).await?;
            settings.default_world_id = Some(world.id());
            PlanetsideSettingsRepository::upsert(pool, &settings).await?;
            Ok(Reply::Text(format!("Default server set to **{}**.", world)))
        }
        "base-capture-channel" => {
            let channel_id = invocation
                .channel("channel")
                .ok_or_else(|| CommandError::usage("Pick a channel."))?;
            let mut settings = PlanetsideSettingsRepository::get(pool, guild_id).await?;
            settings.base_capture_channel_id = Some(channel_id);
            PlanetsideSettingsRepository::upsert(pool, &settings).await?;
            Ok(Reply::Text(format!(
                "Base captures will be posted in <#{}>.",
                channel_id
            )))
        }
        "track-outfit" => {
            let outfit = find_outfit(ctx, invocation).await?;
            let added =
                PlanetsideSettingsRepository::add_tracked_outfit(pool, guild_id, outfit.id).await?;
            let settings = PlanetsideSettingsRepository::get(pool, guild_id).await?;
            Ok(Reply::Text(track_reply(&outfit, added, &settings)))
        }
        "untrack-outfit" => {
            let outfit = find_outfit(ctx, invocation).await?;
            let removed =
                PlanetsideSettingsRepository::remove_tracked_outfit(pool, guild_id, outfit.id)
                    .await?;
            Ok(Reply::Text(if removed {
                format!("No longer tracking **{}**.", outfit.display_name())
            } else {
                format!("**{}** was not being tracked.", outfit.display_name())
            }))
        }
        "settings" => {
            let settings = PlanetsideSettingsRepository::get(pool, guild_id).await?;
            Ok(Reply::Text(embeds::planetside_settings_text(&settings)))
        }
        other => Err(CommandError::usage(format!(
            "Unknown subcommand /planetside {}",
            other
        ))),
    }
}

fn track_reply(outfit: &Outfit, added: bool, settings: &PlanetsideSettings) -> String {
    let mut reply = if added {
        format!("Now tracking **{}**.", outfit.display_name())
    } else {
        format!("**{}** is already tracked.", outfit.display_name())
    };
    match settings.base_capture_channel_id {
        Some(channel_id) => reply.push_str(&format!(" Captures are posted in <#{}>.", channel_id)),
        None => reply.push_str(
            " Set a channel with `/planetside base-capture-channel` to receive captures.",
        ),
    }
    reply
}

fn parse_world(raw: Option<&str>) -> Result<Option<WorldId>, CommandError> {
    raw.map(|s| s.parse::<WorldId>().map_err(CommandError::Usage))
        .transpose()
}

/// The requested server, falling back to the guild default.
async fn resolve_world(
    ctx: &CommandContext<'_>,
    invocation: &Invocation,
) -> Result<WorldId, CommandError> {
    if let Some(world) = parse_world(invocation.string("server"))? {
        return Ok(world);
    }
    if let Some(guild_id) = ctx.guild_id {
        let settings = PlanetsideSettingsRepository::get(ctx.pool(), guild_id).await?;
        if let Some(world) = settings.default_world_id.and_then(WorldId::from_id) {
            return Ok(world);
        }
    }
    Err(CommandError::usage(
        "Pick a server, or set a default with `/planetside default-server`.",
    ))
}

fn normalize_tag(raw: Option<&str>) -> Result<String, CommandError> {
    let tag = raw.ok_or_else(|| CommandError::usage("Give an outfit tag."))?;
    if tag.chars().count() > MAX_TAG_LEN || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CommandError::usage(format!(
            "`{}` is not a valid outfit tag.",
            tag
        )));
    }
    Ok(tag.to_ascii_lowercase())
}

async fn find_outfit(
    ctx: &CommandContext<'_>,
    invocation: &Invocation,
) -> Result<Outfit, CommandError> {
    let tag = normalize_tag(invocation.string("tag"))?;
    ctx.state
        .census
        .outfit_by_tag(&tag)
        .await?
        .ok_or_else(|| CommandError::usage(format!("No outfit has the tag `{}`.", tag)))
}
