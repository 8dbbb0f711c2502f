//! Slash command options flattened into something handlers can query.
//!
//! Serenity nests subcommand options inside the top-level option list; this
//! pulls the subcommand name out and keeps the leaf values by name.

use serenity::model::application::{CommandDataOption, CommandDataOptionValue};

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Channel(u64),
    Role(u64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Invocation {
    /// Subcommand name, for commands that have subcommands
    pub subcommand: Option<String>,
    args: Vec<(String, OptionValue)>,
}

impl Invocation {
    #[cfg(test)]
    pub(crate) fn new(subcommand: Option<&str>, args: Vec<(&str, OptionValue)>) -> Self {
        Self {
            subcommand: subcommand.map(str::to_string),
            args: args
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn from_options(options: &[CommandDataOption]) -> Self {
        let mut invocation = Invocation::default();
        for option in options {
            match &option.value {
                CommandDataOptionValue::SubCommand(inner) => {
                    invocation.subcommand = Some(option.name.clone());
                    invocation.args.extend(leaf_values(inner));
                }
                _ => invocation.args.extend(leaf_values(std::slice::from_ref(option))),
            }
        }
        invocation
    }

    pub fn subcommand(&self) -> &str {
        self.subcommand.as_deref().unwrap_or_default()
    }

    fn get(&self, name: &str) -> Option<&OptionValue> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            OptionValue::String(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn channel(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            OptionValue::Channel(id) => Some(*id),
            _ => None,
        }
    }

    pub fn role(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            OptionValue::Role(id) => Some(*id),
            _ => None,
        }
    }
}

fn leaf_values(options: &[CommandDataOption]) -> Vec<(String, OptionValue)> {
    options
        .iter()
        .filter_map(|option| {
            let value = match &option.value {
                CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
                CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
                CommandDataOptionValue::Channel(id) => OptionValue::Channel(id.get()),
                CommandDataOptionValue::Role(id) => OptionValue::Role(id.get()),
                _ => return None,
            };
            Some((option.name.clone(), value))
        })
        .collect()
}
