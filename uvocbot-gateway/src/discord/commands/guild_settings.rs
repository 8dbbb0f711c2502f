//! `/twitter`, `/welcome-message` and `/admin-log`.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;
use uvocbot_db::{
    AdminSettingsRepository, LogType, NAME_PLACEHOLDER, TwitterSettingsRepository,
    WelcomeMessageRepository,
};

use super::{CommandContext, CommandError, CommandResult, Reply, settings_command, subcommand};
use crate::discord::embeds;
use crate::discord::options::Invocation;

const MAX_WELCOME_LEN: usize = 2000;

pub(super) fn definitions() -> Vec<CreateCommand> {
    let channel = |description: &str| {
        CreateCommandOption::new(CommandOptionType::Channel, "channel", description).required(true)
    };
    let role = |description: &str| {
        CreateCommandOption::new(CommandOptionType::Role, "role", description).required(true)
    };
    let twitter_user = || {
        CreateCommandOption::new(CommandOptionType::String, "user-id", "Numeric Twitter user id")
            .required(true)
    };
    let log_type = || {
        let mut option =
            CreateCommandOption::new(CommandOptionType::String, "type", "Event type")
                .required(true);
        for (_, name) in LogType::NAMED {
            option = option.add_string_choice(name, name);
        }
        option
    };

    vec![
        settings_command("twitter", "Relay tweets into this server")
            .add_option(
                subcommand("relay-channel", "Channel tweets are relayed to")
                    .add_sub_option(channel("Relay channel")),
            )
            .add_option(subcommand("enable", "Start relaying tweets"))
            .add_option(subcommand("disable", "Stop relaying tweets"))
            .add_option(
                subcommand("add-user", "Relay tweets from a user").add_sub_option(twitter_user()),
            )
            .add_option(
                subcommand("remove-user", "Stop relaying a user")
                    .add_sub_option(twitter_user()),
            )
            .add_option(subcommand("settings", "Show the current settings")),
        settings_command("welcome-message", "Greet new members")
            .add_option(
                subcommand("channel", "Channel the welcome message is posted in")
                    .add_sub_option(channel("Welcome channel")),
            )
            .add_option(
                subcommand("message", "Set the message. <name> is replaced by the new member")
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "text",
                            "Welcome message text",
                        )
                        .required(true),
                    ),
            )
            .add_option(
                subcommand("default-role", "Toggle a role given to every new member")
                    .add_sub_option(role("Role to toggle")),
            )
            .add_option(
                subcommand("alternate-role", "Toggle a role new members may pick instead")
                    .add_sub_option(role("Role to toggle"))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "label",
                        "Text shown above the alternate role buttons",
                    )),
            )
            .add_option(subcommand("enable", "Start welcoming new members"))
            .add_option(subcommand("disable", "Stop welcoming new members"))
            .add_option(subcommand("settings", "Show the current settings")),
        settings_command("admin-log", "Log member events to a channel")
            .add_option(
                subcommand("channel", "Channel events are logged to")
                    .add_sub_option(channel("Log channel")),
            )
            .add_option(subcommand("enable", "Log an event type").add_sub_option(log_type()))
            .add_option(
                subcommand("disable", "Stop logging an event type").add_sub_option(log_type()),
            ),
    ]
}

pub(super) async fn execute(
    ctx: &CommandContext<'_>,
    name: &str,
    invocation: &Invocation,
) -> CommandResult {
    match name {
        "twitter" => twitter(ctx, invocation).await,
        "welcome-message" => welcome_message(ctx, invocation).await,
        _ => admin_log(ctx, invocation).await,
    }
}

fn unknown_subcommand(command: &str, invocation: &Invocation) -> CommandError {
    CommandError::usage(format!(
        "Unknown subcommand /{} {}",
        command,
        invocation.subcommand()
    ))
}

fn required_channel(invocation: &Invocation) -> Result<u64, CommandError> {
    invocation
        .channel("channel")
        .ok_or_else(|| CommandError::usage("Pick a channel."))
}

fn required_role(invocation: &Invocation) -> Result<u64, CommandError> {
    invocation
        .role("role")
        .ok_or_else(|| CommandError::usage("Pick a role."))
}

fn parse_twitter_user(invocation: &Invocation) -> Result<u64, CommandError> {
    let raw = invocation
        .string("user-id")
        .ok_or_else(|| CommandError::usage("Give a Twitter user id."))?;
    raw.parse()
        .map_err(|_| CommandError::usage(format!("`{}` is not a numeric Twitter user id.", raw)))
}

/// Add `id` if absent, remove it if present. Returns whether it is now set.
fn toggle(ids: &mut Vec<u64>, id: u64) -> bool {
    if let Some(pos) = ids.iter().position(|existing| *existing == id) {
        ids.remove(pos);
        false
    } else {
        ids.push(id);
        true
    }
}

async fn twitter(ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult {
    let guild_id = ctx.guild()?;
    let pool = ctx.pool();
    let mut settings = TwitterSettingsRepository::get(pool, guild_id).await?;

    let reply = match invocation.subcommand() {
        "relay-channel" => {
            let channel_id = required_channel(invocation)?;
            settings.relay_channel_id = Some(channel_id);
            format!("Tweets will be relayed to <#{}>.", channel_id)
        }
        "enable" => {
            settings.is_enabled = true;
            if settings.relay_channel_id.is_none() {
                "Tweet relay enabled. Set a channel with `/twitter relay-channel` to receive tweets."
                    .to_string()
            } else {
                "Tweet relay enabled.".to_string()
            }
        }
        "disable" => {
            settings.is_enabled = false;
            "Tweet relay disabled.".to_string()
        }
        "add-user" => {
            let user_id = parse_twitter_user(invocation)?;
            if settings.twitter_user_ids.insert(user_id) {
                format!("Now relaying tweets from user {}.", user_id)
            } else {
                return Ok(Reply::Text(format!("User {} is already relayed.", user_id)));
            }
        }
        "remove-user" => {
            let user_id = parse_twitter_user(invocation)?;
            if settings.twitter_user_ids.remove(&user_id) {
                format!("No longer relaying tweets from user {}.", user_id)
            } else {
                return Ok(Reply::Text(format!("User {} was not relayed.", user_id)));
            }
        }
        "settings" => return Ok(Reply::Text(embeds::twitter_settings_text(&settings))),
        _ => return Err(unknown_subcommand("twitter", invocation)),
    };

    TwitterSettingsRepository::upsert(pool, &settings).await?;
    Ok(Reply::Text(reply))
}

async fn welcome_message(ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult {
    let guild_id = ctx.guild()?;
    let pool = ctx.pool();
    let mut welcome = WelcomeMessageRepository::get(pool, guild_id).await?;

    let reply = match invocation.subcommand() {
        "channel" => {
            let channel_id = required_channel(invocation)?;
            welcome.channel_id = Some(channel_id);
            format!("New members will be welcomed in <#{}>.", channel_id)
        }
        "message" => {
            let text = invocation
                .string("text")
                .ok_or_else(|| CommandError::usage("The welcome message cannot be empty."))?;
            if text.chars().count() > MAX_WELCOME_LEN {
                return Err(CommandError::usage(format!(
                    "The welcome message must be at most {} characters.",
                    MAX_WELCOME_LEN
                )));
            }
            // Discord collapses newlines in string options; allow an escaped form.
            welcome.message = text.replace("\\n", "\n");
            if welcome.message.contains(NAME_PLACEHOLDER) {
                "Welcome message updated.".to_string()
            } else {
                format!(
                    "Welcome message updated. Tip: include `{}` to mention the new member.",
                    NAME_PLACEHOLDER
                )
            }
        }
        "default-role" => {
            let role_id = required_role(invocation)?;
            if toggle(&mut welcome.default_role_ids, role_id) {
                format!("<@&{}> will be given to new members.", role_id)
            } else {
                format!("<@&{}> will no longer be given to new members.", role_id)
            }
        }
        "alternate-role" => {
            let role_id = required_role(invocation)?;
            if let Some(label) = invocation.string("label") {
                welcome.alternate_roles_label = label.to_string();
            }
            if toggle(&mut welcome.alternate_role_ids, role_id) {
                format!("New members may pick <@&{}> instead of the default roles.", role_id)
            } else {
                format!("<@&{}> is no longer offered to new members.", role_id)
            }
        }
        "enable" => {
            welcome.is_enabled = true;
            if welcome.is_sendable() {
                "Welcome messages enabled.".to_string()
            } else {
                "Welcome messages enabled. Set a channel and a message before they are sent."
                    .to_string()
            }
        }
        "disable" => {
            welcome.is_enabled = false;
            "Welcome messages disabled.".to_string()
        }
        "settings" => return Ok(Reply::Text(embeds::welcome_settings_text(&welcome))),
        _ => return Err(unknown_subcommand("welcome-message", invocation)),
    };

    WelcomeMessageRepository::upsert(pool, &welcome).await?;
    Ok(Reply::Text(reply))
}

async fn admin_log(ctx: &CommandContext<'_>, invocation: &Invocation) -> CommandResult {
    let guild_id = ctx.guild()?;
    let pool = ctx.pool();
    let mut settings = AdminSettingsRepository::get(pool, guild_id).await?;

    let log_type = || {
        invocation
            .string("type")
            .and_then(LogType::from_name)
            .ok_or_else(|| CommandError::usage("Pick an event type."))
    };

    match invocation.subcommand() {
        "channel" => {
            settings.logging_channel_id = Some(required_channel(invocation)?);
        }
        "enable" => settings.log_types.insert(log_type()?),
        "disable" => settings.log_types.remove(log_type()?),
        _ => return Err(unknown_subcommand("admin-log", invocation)),
    }

    let settings = AdminSettingsRepository::upsert(pool, &settings).await?;
    Ok(Reply::Text(format!(
        "Admin log updated.\n{}",
        embeds::admin_settings_text(&settings)
    )))
}

#[cfg(test)]
mod tests {
    use serenity::http::Http;

    use super::*;
    use crate::discord::options::OptionValue;
    use crate::state::test_support::test_state;

    const GUILD: u64 = 1_000_000_000_000_001;

    #[test]
    fn test_toggle() {
        let mut ids = vec![1, 2];
        assert!(toggle(&mut ids, 3));
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!toggle(&mut ids, 1));
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_welcome_message_flow() {
        let state = test_state().await;
        let http = Http::new("");
        let ctx = CommandContext {
            state: &state,
            http: &http,
            guild_id: Some(GUILD),
            user_id: 1,
        };

        let reply = execute(
            &ctx,
            "welcome-message",
            &Invocation::new(Some("enable"), vec![]),
        )
        .await
        .unwrap();
        assert!(reply.text().contains("Set a channel"));

        for invocation in [
            Invocation::new(Some("channel"), vec![("channel", OptionValue::Channel(44))]),
            Invocation::new(
                Some("message"),
                vec![("text", OptionValue::String("Welcome <name>!\\nRead the rules.".into()))],
            ),
            Invocation::new(Some("default-role"), vec![("role", OptionValue::Role(5))]),
            Invocation::new(
                Some("alternate-role"),
                vec![
                    ("role", OptionValue::Role(6)),
                    ("label", OptionValue::String("Just visiting?".into())),
                ],
            ),
        ] {
            execute(&ctx, "welcome-message", &invocation).await.unwrap();
        }

        let welcome = WelcomeMessageRepository::get(state.pool(), GUILD).await.unwrap();
        assert!(welcome.is_sendable());
        assert_eq!(welcome.render("<@9>"), "Welcome <@9>!\nRead the rules.");
        assert_eq!(welcome.default_role_ids, vec![5]);
        assert_eq!(welcome.alternate_role_ids, vec![6]);
        assert_eq!(welcome.alternate_roles_label, "Just visiting?");

        // Toggling again removes the role
        let reply = execute(
            &ctx,
            "welcome-message",
            &Invocation::new(Some("default-role"), vec![("role", OptionValue::Role(5))]),
        )
        .await
        .unwrap();
        assert!(reply.text().contains("no longer"));
        let welcome = WelcomeMessageRepository::get(state.pool(), GUILD).await.unwrap();
        assert!(welcome.default_role_ids.is_empty());
    }

    #[tokio::test]
    async fn test_twitter_users() {
        let state = test_state().await;
        let http = Http::new("");
        let ctx = CommandContext {
            state: &state,
            http: &http,
            guild_id: Some(GUILD),
            user_id: 1,
        };

        let add = Invocation::new(
            Some("add-user"),
            vec![("user-id", OptionValue::String("783214".into()))],
        );
        execute(&ctx, "twitter", &add).await.unwrap();
        let again = execute(&ctx, "twitter", &add).await.unwrap();
        assert!(again.text().contains("already"));

        let bad = Invocation::new(
            Some("add-user"),
            vec![("user-id", OptionValue::String("@planetside2".into()))],
        );
        assert!(matches!(
            execute(&ctx, "twitter", &bad).await,
            Err(CommandError::Usage(_))
        ));

        let settings = TwitterSettingsRepository::get(state.pool(), GUILD).await.unwrap();
        assert!(settings.twitter_user_ids.contains(&783214));
        assert!(!settings.is_enabled);
    }

    #[tokio::test]
    async fn test_admin_log_types() {
        let state = test_state().await;
        let http = Http::new("");
        let ctx = CommandContext {
            state: &state,
            http: &http,
            guild_id: Some(GUILD),
            user_id: 1,
        };

        for invocation in [
            Invocation::new(Some("channel"), vec![("channel", OptionValue::Channel(8))]),
            Invocation::new(
                Some("enable"),
                vec![("type", OptionValue::String("member-join".into()))],
            ),
            Invocation::new(
                Some("enable"),
                vec![("type", OptionValue::String("member-leave".into()))],
            ),
            Invocation::new(
                Some("disable"),
                vec![("type", OptionValue::String("member-join".into()))],
            ),
        ] {
            execute(&ctx, "admin-log", &invocation).await.unwrap();
        }

        let settings = AdminSettingsRepository::get(state.pool(), GUILD).await.unwrap();
        assert_eq!(settings.channel_for(LogType::MEMBER_LEAVE), Some(8));
        assert_eq!(settings.channel_for(LogType::MEMBER_JOIN), None);

        let unknown = Invocation::new(
            Some("enable"),
            vec![("type", OptionValue::String("message-delete".into()))],
        );
        assert!(execute(&ctx, "admin-log", &unknown).await.is_err());
    }
}
