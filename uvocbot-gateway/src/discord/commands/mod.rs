//! Slash command registration and dispatch.
//!
//! Every command is deferred first, then answered by editing the deferred
//! response. Settings commands answer ephemerally; game lookups answer in
//! the channel and fall back to an ephemeral followup on error.

mod guild_settings;
mod planetside;
mod role_menu;

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateEmbed, CreateInteractionResponseFollowup,
    EditInteractionResponse,
};
use serenity::http::Http;
use serenity::model::application::{CommandInteraction, CommandOptionType};
use serenity::model::permissions::Permissions;
use serenity::prelude::*;
use sqlx::SqlitePool;
use tracing::{error, warn};
use uvocbot_core::WorldId;
use uvocbot_db::DbError;

use super::options::Invocation;
use crate::census::CensusError;
use crate::population::PopulationError;
use crate::state::AppState;

/// What a handler wants shown to the user.
#[derive(Debug)]
pub enum Reply {
    Text(String),
    Embed(CreateEmbed),
}

impl Reply {
    fn into_edit(self) -> EditInteractionResponse {
        match self {
            Reply::Text(text) => EditInteractionResponse::new().content(text),
            Reply::Embed(embed) => EditInteractionResponse::new().embed(embed),
        }
    }

    #[cfg(test)]
    pub(crate) fn text(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Embed(_) => "",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Census(#[from] CensusError),

    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Boxed; serenity::Error is large.
    #[error("Discord request failed: {0}")]
    Discord(Box<serenity::Error>),

    #[error("{0}")]
    Usage(String),

    #[error("This command can only be used in a server.")]
    NotInGuild,
}

impl From<serenity::Error> for CommandError {
    fn from(err: serenity::Error) -> Self {
        CommandError::Discord(Box::new(err))
    }
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage(message.into())
    }

    /// Message safe to show in Discord.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Usage(_) | CommandError::NotInGuild => self.to_string(),
            CommandError::Db(DbError::RoleMenuNotFound(id)) => {
                format!("Role menu #{} does not exist in this server.", id)
            }
            CommandError::Db(DbError::DuplicateMenuRole { menu_id, .. }) => {
                format!("That role is already on role menu #{}.", menu_id)
            }
            CommandError::Db(DbError::RoleMenuFull(id)) => format!(
                "Role menu #{} already has the maximum of {} roles.",
                id,
                uvocbot_db::MAX_MENU_ROLES
            ),
            CommandError::Db(_) => "Something went wrong while saving settings.".to_string(),
            CommandError::Census(CensusError::CircuitOpen | CensusError::RateLimited)
            | CommandError::Population(PopulationError::AllProvidersUnavailable) => {
                "PlanetSide data is unavailable right now. Try again in a minute.".to_string()
            }
            CommandError::Population(PopulationError::Unsupported(world)) => {
                format!("Population data is not available for {}.", world)
            }
            CommandError::Census(_) | CommandError::Population(_) => {
                "Failed to fetch PlanetSide data.".to_string()
            }
            CommandError::Discord(_) => "Discord rejected the request. Check my permissions.".to_string(),
        }
    }
}

pub type CommandResult = Result<Reply, CommandError>;

/// Everything a handler needs about the invocation.
pub struct CommandContext<'a> {
    pub state: &'a AppState,
    pub http: &'a Http,
    pub guild_id: Option<u64>,
    pub user_id: u64,
}

impl CommandContext<'_> {
    pub fn guild(&self) -> Result<u64, CommandError> {
        self.guild_id.ok_or(CommandError::NotInGuild)
    }

    pub fn pool(&self) -> &SqlitePool {
        self.state.pool()
    }
}

/// Commands that change guild settings; answered ephemerally.
const SETTINGS_COMMANDS: [&str; 5] = [
    "planetside",
    "twitter",
    "welcome-message",
    "admin-log",
    "role-menu",
];

pub fn definitions() -> Vec<CreateCommand> {
    let mut commands = planetside::definitions();
    commands.extend(guild_settings::definitions());
    commands.push(role_menu::definition());
    commands
}

pub(crate) fn settings_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name)
        .description(description)
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

pub(crate) fn subcommand(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
}

/// A server option offering every world as a choice.
pub(crate) fn server_option(required: bool) -> CreateCommandOption {
    let mut option =
        CreateCommandOption::new(CommandOptionType::String, "server", "PlanetSide 2 server")
            .required(required);
    for world in WorldId::ALL {
        option = option.add_string_choice(world.name(), world.id().to_string());
    }
    option
}

pub async fn execute(ctx: &CommandContext<'_>, name: &str, invocation: &Invocation) -> CommandResult {
    match name {
        "population" | "status" | "outfit" | "online" | "planetside" => {
            planetside::execute(ctx, name, invocation).await
        }
        "twitter" | "welcome-message" | "admin-log" => {
            guild_settings::execute(ctx, name, invocation).await
        }
        "role-menu" => role_menu::execute(ctx, invocation).await,
        other => Err(CommandError::usage(format!("Unknown command /{}", other))),
    }
}

/// Defer, run, and answer a slash command.
pub async fn handle(ctx: &Context, command: &CommandInteraction, state: &AppState) {
    let name = command.data.name.as_str();
    let ephemeral = SETTINGS_COMMANDS.contains(&name);

    let deferred = if ephemeral {
        command.defer_ephemeral(&ctx.http).await
    } else {
        command.defer(&ctx.http).await
    };
    if let Err(e) = deferred {
        error!("Failed to defer /{}: {}", name, e);
        return;
    }

    let invocation = Invocation::from_options(&command.data.options);
    let command_ctx = CommandContext {
        state,
        http: &ctx.http,
        guild_id: command.guild_id.map(|g| g.get()),
        user_id: command.user.id.get(),
    };

    match execute(&command_ctx, name, &invocation).await {
        Ok(reply) => {
            if let Err(e) = command.edit_response(&ctx.http, reply.into_edit()).await {
                error!("Failed to answer /{}: {}", name, e);
            }
        }
        Err(e) => {
            match &e {
                CommandError::Usage(_) | CommandError::NotInGuild => {}
                _ => warn!("/{} {} failed: {}", name, invocation.subcommand(), e),
            }
            let message = e.user_message();
            let answered = if ephemeral {
                command
                    .edit_response(&ctx.http, EditInteractionResponse::new().content(message))
                    .await
                    .map(|_| ())
            } else {
                let _ = command.delete_response(&ctx.http).await;
                command
                    .create_followup(
                        &ctx.http,
                        CreateInteractionResponseFollowup::new()
                            .content(message)
                            .ephemeral(true),
                    )
                    .await
                    .map(|_| ())
            };
            if let Err(e) = answered {
                error!("Failed to report /{} error: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CommandError::usage("Pick a server").user_message(),
            "Pick a server"
        );
        assert!(
            CommandError::Census(CensusError::CircuitOpen)
                .user_message()
                .contains("unavailable")
        );
        assert!(
            CommandError::Db(DbError::RoleMenuFull(3))
                .user_message()
                .contains("#3")
        );
        assert_eq!(
            CommandError::Db(DbError::Serialization("bad".into())).user_message(),
            "Something went wrong while saving settings."
        );
    }

    #[test]
    fn test_definitions_are_unique() {
        let commands = definitions();
        let json: Vec<serde_json::Value> = commands
            .iter()
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();
        let mut names: Vec<&str> = json.iter().filter_map(|c| c["name"].as_str()).collect();
        assert_eq!(names.len(), 9);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 9);

        for command in &json {
            let name = command["name"].as_str().unwrap();
            let restricted = !command["default_member_permissions"].is_null();
            assert_eq!(restricted, SETTINGS_COMMANDS.contains(&name), "{}", name);
        }
    }
}
