//! Embeds and component rows sent by the bot.

use std::collections::HashMap;

use serenity::builder::{CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter};
use serenity::all::ButtonStyle;
use serenity::model::channel::ReactionType;
use uvocbot_core::{Faction, Outfit, WorldId, WorldPopulation};
use uvocbot_db::{AdminSettings, PlanetsideSettings, RoleMenu, TwitterSettings, WelcomeMessage};

use super::custom_id::ComponentAction;
use crate::census::ZoneTerritory;
use crate::facility_capture::CaptureNotice;

pub const INFO_EMBED_COLOR: u32 = 0x12_83_D8;
const EMBED_DESC_LIMIT: usize = 4096;
const BUTTON_LABEL_LIMIT: usize = 80;
const BUTTONS_PER_ROW: usize = 5;

const FACTIONS: [Faction; 3] = [Faction::Vs, Faction::Nc, Faction::Tr];

pub fn population_embed(population: &WorldPopulation) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("{} population", population.world))
        .description(population_lines(population))
        .color(INFO_EMBED_COLOR)
        .footer(CreateEmbedFooter::new(format!(
            "Source: {}",
            population.source
        )))
}

pub(crate) fn population_lines(population: &WorldPopulation) -> String {
    let mut lines = vec![format!("**Total:** {}", population.total)];
    for faction in FACTIONS {
        let count = match faction {
            Faction::Vs => population.vs,
            Faction::Nc => population.nc,
            _ => population.tr,
        };
        lines.push(format!(
            "**{}:** {} ({}%)",
            faction,
            count,
            population.percent(faction)
        ));
    }
    if population.ns > 0 {
        lines.push(format!(
            "**NSO:** {} ({}%)",
            population.ns,
            population.percent(Faction::Nso)
        ));
    }
    lines.join("\n")
}

pub fn status_embed(world: WorldId, territory: &[ZoneTerritory]) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("{} continent status", world))
        .color(INFO_EMBED_COLOR);
    if territory.is_empty() {
        return embed.description("No continent data was returned.");
    }
    for zone in territory {
        embed = embed.field(zone.zone.name(), territory_line(zone), false);
    }
    embed
}

pub(crate) fn territory_line(zone: &ZoneTerritory) -> String {
    if let Some(faction) = zone.locked_by() {
        return format!("Locked by the {}", faction);
    }
    FACTIONS
        .iter()
        .map(|f| format!("{} {}%", f, zone.percent(*f)))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn outfit_embed(outfit: &Outfit) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(outfit.display_name())
        .color(INFO_EMBED_COLOR)
        .field("Members", outfit.member_count.to_string(), true);
    if let Some(world) = outfit.world_id.and_then(WorldId::from_id) {
        embed = embed.field("Server", world.name(), true);
    }
    embed.footer(CreateEmbedFooter::new(format!("Outfit id {}", outfit.id)))
}

pub fn online_embed(outfit: &Outfit, online: &[String]) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("{}: {} online", outfit.display_name(), online.len()))
        .description(name_list(online, EMBED_DESC_LIMIT))
        .color(INFO_EMBED_COLOR)
}

/// Newline-separated names, cut off with a count of the remainder once
/// `limit` characters would be exceeded.
pub(crate) fn name_list(names: &[String], limit: usize) -> String {
    if names.is_empty() {
        return "Nobody is online.".to_string();
    }
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        let suffix = format!("\n...and {} more", names.len() - i);
        if out.len() + name.len() + 1 + suffix.len() > limit {
            out.push_str(&suffix);
            return out;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(name);
    }
    out
}

pub fn capture_embed(notice: &CaptureNotice) -> CreateEmbed {
    CreateEmbed::new()
        .title(notice.headline())
        .description(format!(
            "{}\n<t:{}:R>",
            notice.details(),
            notice.timestamp.timestamp()
        ))
        .color(notice.colour())
}

pub fn role_menu_embed(menu: &RoleMenu) -> CreateEmbed {
    let mut description = menu.description.clone().unwrap_or_default();
    if menu.roles.is_empty() {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str("No roles have been added to this menu yet.");
    }
    CreateEmbed::new()
        .title(&menu.title)
        .description(description)
        .color(INFO_EMBED_COLOR)
        .footer(CreateEmbedFooter::new(format!("Role menu #{}", menu.id)))
}

pub fn role_menu_components(menu: &RoleMenu) -> Vec<CreateActionRow> {
    let buttons = menu
        .roles
        .iter()
        .map(|role| {
            let action = ComponentAction::RoleMenuToggle {
                menu_id: menu.id,
                role_id: role.role_id,
            };
            let mut button = CreateButton::new(action.custom_id())
                .label(button_label(&role.label))
                .style(ButtonStyle::Secondary);
            if let Some(emoji) = role
                .emoji
                .as_deref()
                .and_then(|e| ReactionType::try_from(e).ok())
            {
                button = button.emoji(emoji);
            }
            button
        })
        .collect();
    button_rows(buttons)
}

/// Alternate-role buttons for a welcomed member. Roles that no longer
/// exist in the guild are skipped.
pub fn welcome_components(
    welcome: &WelcomeMessage,
    user_id: u64,
    role_names: &HashMap<u64, String>,
) -> Vec<CreateActionRow> {
    let buttons = welcome
        .alternate_role_ids
        .iter()
        .filter_map(|role_id| {
            let name = role_names.get(role_id)?;
            let action = ComponentAction::WelcomeRole {
                role_id: *role_id,
                user_id,
            };
            Some(
                CreateButton::new(action.custom_id())
                    .label(button_label(name))
                    .style(ButtonStyle::Primary),
            )
        })
        .collect();
    button_rows(buttons)
}

fn button_rows(buttons: Vec<CreateButton>) -> Vec<CreateActionRow> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| CreateActionRow::Buttons(chunk.to_vec()))
        .collect()
}

pub(crate) fn button_label(label: &str) -> String {
    label.chars().take(BUTTON_LABEL_LIMIT).collect()
}

fn channel_text(channel_id: Option<u64>) -> String {
    channel_id
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "not set".to_string())
}

fn role_list(role_ids: &[u64]) -> String {
    if role_ids.is_empty() {
        return "none".to_string();
    }
    role_ids
        .iter()
        .map(|id| format!("<@&{}>", id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn enabled_text(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

pub(crate) fn planetside_settings_text(settings: &PlanetsideSettings) -> String {
    let world = settings
        .default_world_id
        .and_then(WorldId::from_id)
        .map(|w| w.name().to_string())
        .unwrap_or_else(|| "not set".to_string());
    let outfits = if settings.tracked_outfit_ids.is_empty() {
        "none".to_string()
    } else {
        settings
            .tracked_outfit_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "**Default server:** {}\n**Base capture channel:** {}\n**Tracked outfits:** {}",
        world,
        channel_text(settings.base_capture_channel_id),
        outfits
    )
}

pub(crate) fn twitter_settings_text(settings: &TwitterSettings) -> String {
    let users = if settings.twitter_user_ids.is_empty() {
        "none".to_string()
    } else {
        settings
            .twitter_user_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "**Relay:** {}\n**Relay channel:** {}\n**Twitter users:** {}",
        enabled_text(settings.is_enabled),
        channel_text(settings.relay_channel_id),
        users
    )
}

pub(crate) fn welcome_settings_text(welcome: &WelcomeMessage) -> String {
    let message = if welcome.message.trim().is_empty() {
        "not set".to_string()
    } else {
        format!("\n>>> {}", welcome.message)
    };
    format!(
        "**Welcome message:** {}\n**Channel:** {}\n**Default roles:** {}\n**Alternate roles ({}):** {}\n**Message:** {}",
        enabled_text(welcome.is_enabled),
        channel_text(welcome.channel_id),
        role_list(&welcome.default_role_ids),
        welcome.alternate_roles_label,
        role_list(&welcome.alternate_role_ids),
        message
    )
}

pub(crate) fn admin_settings_text(settings: &AdminSettings) -> String {
    let types = settings.log_types.names();
    format!(
        "**Log channel:** {}\n**Logged events:** {}",
        channel_text(settings.logging_channel_id),
        if types.is_empty() {
            "none".to_string()
        } else {
            types.join(", ")
        }
    )
}

#[cfg(test)]
mod tests {
    use uvocbot_core::{PopulationSource, ZoneId};

    use super::*;

    #[test]
    fn test_population_lines() {
        let population = WorldPopulation {
            world: WorldId::Emerald,
            vs: 250,
            nc: 500,
            tr: 250,
            ns: 0,
            total: 1000,
            source: PopulationSource::Fisu,
        };
        let text = population_lines(&population);
        assert!(text.starts_with("**Total:** 1000"));
        assert!(text.contains("**NC:** 500 (50%)"));
        assert!(!text.contains("NSO"));

        let with_nso = WorldPopulation { ns: 40, ..population };
        assert!(population_lines(&with_nso).contains("**NSO:** 40 (4%)"));
    }

    #[test]
    fn test_territory_line() {
        let contested = ZoneTerritory {
            zone: ZoneId::Indar,
            vs: 30,
            nc: 30,
            tr: 40,
            unowned: 0,
        };
        assert_eq!(territory_line(&contested), "VS 30% | NC 30% | TR 40%");

        let locked = ZoneTerritory {
            zone: ZoneId::Esamir,
            vs: 0,
            nc: 90,
            tr: 0,
            unowned: 0,
        };
        assert_eq!(territory_line(&locked), "Locked by the NC");
    }

    #[test]
    fn test_name_list_truncates() {
        assert_eq!(name_list(&[], 100), "Nobody is online.");

        let names: Vec<String> = (0..50).map(|i| format!("Player{:02}", i)).collect();
        let text = name_list(&names, 60);
        assert!(text.len() <= 60);
        assert!(text.starts_with("Player00\nPlayer01"));
        assert!(text.ends_with("more"));

        let short = vec!["A".to_string(), "B".to_string()];
        assert_eq!(name_list(&short, 100), "A\nB");
    }

    #[test]
    fn test_button_label_is_capped() {
        let long = "x".repeat(200);
        assert_eq!(button_label(&long).chars().count(), BUTTON_LABEL_LIMIT);
        assert_eq!(button_label("Medic"), "Medic");
    }

    #[test]
    fn test_settings_text() {
        let mut planetside = PlanetsideSettings::new(1);
        assert!(planetside_settings_text(&planetside).contains("**Default server:** not set"));
        planetside.default_world_id = Some(17);
        planetside.base_capture_channel_id = Some(55);
        planetside.tracked_outfit_ids.insert(37_570_391_403_474_619);
        let text = planetside_settings_text(&planetside);
        assert!(text.contains("Emerald"));
        assert!(text.contains("<#55>"));
        assert!(text.contains("37570391403474619"));

        let mut admin = AdminSettings::new(1);
        assert!(admin_settings_text(&admin).contains("**Logged events:** none"));
        admin.log_types = uvocbot_db::LogType::MEMBER_JOIN | uvocbot_db::LogType::MEMBER_LEAVE;
        assert!(admin_settings_text(&admin).contains("member-join, member-leave"));

        let mut welcome = WelcomeMessage::new(1);
        welcome.default_role_ids = vec![3, 4];
        let text = welcome_settings_text(&welcome);
        assert!(text.contains("<@&3>, <@&4>"));
        assert!(text.contains("**Message:** not set"));

        let twitter = TwitterSettings::new(1);
        assert!(twitter_settings_text(&twitter).contains("**Relay:** disabled"));
    }
}
