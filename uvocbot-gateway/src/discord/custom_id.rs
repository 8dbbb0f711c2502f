//! Button custom ids.
//!
//! Discord hands the id back verbatim on click, so everything a handler
//! needs is packed into it: `uvoc:wm:{role_id}:{user_id}` for welcome
//! alternate roles and `uvoc:rm:{menu_id}:{role_id}` for role menu toggles.

use std::num::NonZeroU64;

const PREFIX: &str = "uvoc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    /// Swap the default welcome roles for `role_id`. Only `user_id` may click.
    WelcomeRole { role_id: u64, user_id: u64 },
    /// Add or remove `role_id` for whoever clicked.
    RoleMenuToggle { menu_id: i64, role_id: u64 },
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != PREFIX {
            return None;
        }
        let kind = parts.next()?;
        let first = parts.next()?;
        let second = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        match kind {
            "wm" => Some(ComponentAction::WelcomeRole {
                role_id: parse_snowflake(first)?,
                user_id: parse_snowflake(second)?,
            }),
            "rm" => Some(ComponentAction::RoleMenuToggle {
                menu_id: first.parse().ok()?,
                role_id: parse_snowflake(second)?,
            }),
            _ => None,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::WelcomeRole { role_id, user_id } => {
                format!("{}:wm:{}:{}", PREFIX, role_id, user_id)
            }
            ComponentAction::RoleMenuToggle { menu_id, role_id } => {
                format!("{}:rm:{}:{}", PREFIX, menu_id, role_id)
            }
        }
    }
}

fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.parse::<NonZeroU64>().ok().map(NonZeroU64::get)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_welcome_role() {
        assert_eq!(
            ComponentAction::parse("uvoc:wm:859000000000000001:42"),
            Some(ComponentAction::WelcomeRole {
                role_id: 859_000_000_000_000_001,
                user_id: 42,
            })
        );
    }

    #[test]
    fn test_parse_role_menu_toggle() {
        let action = ComponentAction::RoleMenuToggle {
            menu_id: 7,
            role_id: 123_456,
        };
        assert_eq!(action.custom_id(), "uvoc:rm:7:123456");
        assert_eq!(ComponentAction::parse("uvoc:rm:7:123456"), Some(action));
    }

    #[test]
    fn test_rejects_foreign_and_malformed_ids() {
        assert!(ComponentAction::parse("r:j:m:1").is_none());
        assert!(ComponentAction::parse("uvoc:xx:1:2").is_none());
        assert!(ComponentAction::parse("uvoc:rm:1").is_none());
        assert!(ComponentAction::parse("uvoc:rm:1:2:3").is_none());
        assert!(ComponentAction::parse("uvoc:wm:-1:2").is_none());
        assert!(ComponentAction::parse("").is_none());
    }

    #[test]
    fn test_rejects_zero_snowflakes() {
        assert!(ComponentAction::parse("uvoc:wm:0:42").is_none());
        assert!(ComponentAction::parse("uvoc:wm:5:0").is_none());
        assert!(ComponentAction::parse("uvoc:rm:7:0").is_none());
    }
}
