use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::{ComponentInteraction, Interaction};
use serenity::model::id::RoleId;
use serenity::prelude::*;
use tracing::{error, warn};
use uvocbot_db::{DbError, RoleMenuRepository, WelcomeMessageRepository};

use super::bot::Bot;
use super::commands::{self, CommandError};
use super::custom_id::ComponentAction;
use super::{members, snowflake};

impl Bot {
    pub(super) async fn handle_interaction(&self, ctx: Context, interaction: Interaction) {
        if let Some(command) = interaction.as_command() {
            commands::handle(&ctx, command, &self.state).await;
            return;
        }

        if let Some(component) = interaction.as_message_component() {
            let Some(action) = ComponentAction::parse(&component.data.custom_id) else {
                return;
            };
            let message = match self.handle_component(&ctx, component, action).await {
                Ok(message) => message,
                Err(e) => {
                    if !matches!(e, CommandError::Usage(_) | CommandError::NotInGuild) {
                        warn!("Button {} failed: {}", component.data.custom_id, e);
                    }
                    e.user_message()
                }
            };

            let response = CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            );
            if let Err(e) = component.create_response(&ctx.http, response).await {
                error!("Failed to answer button {}: {}", component.data.custom_id, e);
            }
        }
    }

    async fn handle_component(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        action: ComponentAction,
    ) -> Result<String, CommandError> {
        let guild_id = component.guild_id.ok_or(CommandError::NotInGuild)?;
        let pool = self.state.pool();

        match action {
            ComponentAction::WelcomeRole { role_id, user_id } => {
                if component.user.id.get() != user_id {
                    return Err(CommandError::usage(
                        "These buttons are for the member being welcomed.",
                    ));
                }
                let welcome = WelcomeMessageRepository::get(pool, guild_id.get()).await?;
                let (add, remove) = members::alternate_role_swap(&welcome, role_id)
                    .ok_or_else(|| CommandError::usage("That role is no longer offered."))?;
                members::apply_alternate_role(&ctx.http, guild_id, component.user.id, add, &remove)
                    .await?;
                Ok(format!("You now have the <@&{}> role.", add))
            }
            ComponentAction::RoleMenuToggle { menu_id, role_id } => {
                let menu = RoleMenuRepository::get_in_guild(pool, guild_id.get(), menu_id)
                    .await?
                    .ok_or(CommandError::Db(DbError::RoleMenuNotFound(menu_id)))?;
                if menu.find_role(role_id).is_none() {
                    return Err(CommandError::usage("That role is no longer on this menu."));
                }

                let role = snowflake::<RoleId>(role_id)
                    .ok_or_else(|| CommandError::usage("That role no longer exists."))?;
                let has_role = component
                    .member
                    .as_ref()
                    .is_some_and(|member| member.roles.contains(&role));
                if has_role {
                    ctx.http
                        .remove_member_role(guild_id, component.user.id, role, Some("Role menu"))
                        .await?;
                    Ok(format!("Removed the <@&{}> role.", role_id))
                } else {
                    ctx.http
                        .add_member_role(guild_id, component.user.id, role, Some("Role menu"))
                        .await?;
                    Ok(format!("Gave you the <@&{}> role.", role_id))
                }
            }
        }
    }
}
