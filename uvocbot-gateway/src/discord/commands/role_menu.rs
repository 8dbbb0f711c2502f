//! `/role-menu`: self-assignable role buttons.

use serenity::builder::{CreateCommand, CreateCommandOption, CreateMessage, EditMessage};
use serenity::model::application::CommandOptionType;
use serenity::model::id::{ChannelId, MessageId};
use tracing::{info, warn};
use uvocbot_db::{DbError, NewRoleMenu, RoleMenu, RoleMenuRepository, RoleMenuRole};

use super::{CommandContext, CommandError, CommandResult, Reply, settings_command, subcommand};
use crate::discord::{embeds, snowflake};
use crate::discord::options::Invocation;

const MAX_TITLE_LEN: usize = 256;

pub(super) fn definition() -> CreateCommand {
    let menu = || {
        CreateCommandOption::new(CommandOptionType::Integer, "menu", "Role menu number")
            .min_int_value(1)
            .required(true)
    };
    let role = || {
        CreateCommandOption::new(CommandOptionType::Role, "role", "Role").required(true)
    };

    settings_command("role-menu", "Manage self-assignable role menus")
        .add_option(
            subcommand("create", "Create an empty role menu")
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "channel",
                        "Channel the menu is posted in",
                    )
                    .required(true),
                )
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "title", "Menu title")
                        .required(true),
                )
                .add_sub_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "description",
                    "Text shown under the title",
                )),
        )
        .add_option(
            subcommand("add-role", "Add a role button to a menu")
                .add_sub_option(menu())
                .add_sub_option(role())
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "label", "Button label")
                        .required(true),
                )
                .add_sub_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "emoji",
                    "Button emoji",
                )),
        )
        .add_option(
            subcommand("remove-role", "Remove a role button from a menu")
                .add_sub_option(menu())
                .add_sub_option(role()),
        )
        .add_option(
            subcommand("post", "Post or refresh a menu message").add_sub_option(menu()),
        )
        .add_option(subcommand("delete", "Delete a menu").add_sub_option(menu()))
}

pub(super) async fn execute(ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult {
    let guild_id = ctx.guild()?;
    let pool = ctx.pool();

    if invocation.subcommand() == "create" {
        let channel_id = invocation
            .channel("channel")
            .ok_or_else(|| CommandError::usage("Pick a channel."))?;
        let title = invocation
            .string("title")
            .ok_or_else(|| CommandError::usage("Give the menu a title."))?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(CommandError::usage(format!(
                "Titles must be at most {} characters.",
                MAX_TITLE_LEN
            )));
        }

        let menu = RoleMenuRepository::create(
            pool,
            &NewRoleMenu {
                guild_id,
                channel_id,
                author_id: ctx.user_id,
                title: title.to_string(),
                description: invocation.string("description").map(str::to_string),
            },
        )
        .await?;
        return Ok(Reply::Text(format!(
            "Created role menu #{}. Add roles with `/role-menu add-role`, then `/role-menu post` it.",
            menu.id
        )));
    }

    let menu = load_menu(ctx, guild_id, invocation).await?;
    match invocation.subcommand() {
        "add-role" => {
            let role = RoleMenuRole {
                role_id: required_role(invocation)?,
                label: invocation
                    .string("label")
                    .ok_or_else(|| CommandError::usage("Give the button a label."))?
                    .to_string(),
                emoji: invocation.string("emoji").map(str::to_string),
            };
            let menu = RoleMenuRepository::add_role(pool, menu.id, &role).await?;
            Ok(Reply::Text(format!(
                "Added <@&{}> to role menu #{} ({} role(s)).{}",
                role.role_id,
                menu.id,
                menu.roles.len(),
                repost_hint(&menu)
            )))
        }
        "remove-role" => {
            let role_id = required_role(invocation)?;
            if !RoleMenuRepository::remove_role(pool, menu.id, role_id).await? {
                return Err(CommandError::usage(format!(
                    "<@&{}> is not on role menu #{}.",
                    role_id, menu.id
                )));
            }
            Ok(Reply::Text(format!(
                "Removed <@&{}> from role menu #{}.{}",
                role_id,
                menu.id,
                repost_hint(&menu)
            )))
        }
        "post" => {
            let message_id = post(ctx, &menu).await?;
            RoleMenuRepository::set_message_id(pool, menu.id, message_id).await?;
            Ok(Reply::Text(format!(
                "Role menu #{} is live in <#{}>.",
                menu.id, menu.channel_id
            )))
        }
        "delete" => {
            RoleMenuRepository::delete(pool, menu.id).await?;
            let posted = snowflake::<ChannelId>(menu.channel_id)
                .zip(menu.message_id.and_then(snowflake::<MessageId>));
            if let Some((channel, message_id)) = posted {
                if let Err(e) = channel.delete_message(ctx.http, message_id).await {
                    warn!("Failed to delete role menu message {}: {}", message_id, e);
                }
            }
            Ok(Reply::Text(format!("Deleted role menu #{}.", menu.id)))
        }
        other => Err(CommandError::usage(format!(
            "Unknown subcommand /role-menu {}",
            other
        ))),
    }
}

fn required_role(invocation: &Invocation) -> Result<u64, CommandError> {
    invocation
        .role("role")
        .ok_or_else(|| CommandError::usage("Pick a role."))
}

fn repost_hint(menu: &RoleMenu) -> &'static str {
    if menu.message_id.is_some() {
        " Run `/role-menu post` to update the posted message."
    } else {
        ""
    }
}

/// Menus from other guilds are reported as missing.
async fn load_menu(
    ctx: &CommandContext<'_>,
    guild_id: u64,
    invocation: &Invocation,
) -> Result<RoleMenu, CommandError> {
    let id = invocation
        .integer("menu")
        .ok_or_else(|| CommandError::usage("Give a role menu number."))?;
    RoleMenuRepository::get_in_guild(ctx.pool(), guild_id, id)
        .await?
        .ok_or(CommandError::Db(DbError::RoleMenuNotFound(id)))
}

/// Edit the existing menu message, or send a new one if it is gone.
async fn post(ctx: &CommandContext<'_>, menu: &RoleMenu) -> Result<u64, CommandError> {
    let channel = snowflake::<ChannelId>(menu.channel_id)
        .ok_or_else(|| CommandError::usage("This role menu has no valid channel."))?;
    let embed = embeds::role_menu_embed(menu);
    let components = embeds::role_menu_components(menu);

    if let Some(message_id) = menu.message_id.and_then(snowflake::<MessageId>) {
        let edited = channel
            .edit_message(
                ctx.http,
                message_id,
                EditMessage::new()
                    .embed(embed.clone())
                    .components(components.clone()),
            )
            .await;
        match edited {
            Ok(message) => return Ok(message.id.get()),
            Err(e) => info!(
                "Role menu {} message {} could not be edited, reposting: {}",
                menu.id, message_id, e
            ),
        }
    }

    let message = channel
        .send_message(
            ctx.http,
            CreateMessage::new().embed(embed).components(components),
        )
        .await?;
    Ok(message.id.get())
}
