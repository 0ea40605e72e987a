//! Channel configuration structures.
//!
//! Channels are defined in TOML, either as a standalone file or as a section
//! of the server configuration. A config document is validated as a whole
//! before any of it takes effect; a bad document never partially applies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing or validating channel configuration.
#[derive(Debug, Error)]
pub enum ChannelConfigError {
    /// The TOML document could not be parsed at all.
    #[error("invalid channel config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A channel was declared with an empty name.
    #[error("channel at index {0} has an empty name")]
    EmptyName(usize),

    /// Two channels share the same name.
    #[error("duplicate channel name: {0}")]
    DuplicateName(String),

    /// `default_channel` does not match any declared channel.
    #[error("default channel {0} is not declared")]
    UnknownDefault(String),

    /// The document declares no channels at all.
    #[error("no channels declared")]
    Empty,
}

/// Settings for a single chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Unique channel name, used as the key everywhere
    pub name: String,
    /// Format template handed to the host's renderer
    pub format: String,
    /// Whether players are placed in this channel automatically
    pub join_by_default: bool,
    /// Permission node required to see messages in this channel.
    /// `None` means the channel is visible to everyone.
    pub see_permission: Option<String>,
}

/// Complete channel configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Name of the channel messages fall back to when the requested
    /// channel is unknown or unspecified
    pub default_channel: String,
    /// All declared channels, in listing order
    pub channels: Vec<ChannelSettings>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            default_channel: "global".to_string(),
            channels: vec![
                ChannelSettings {
                    name: "global".to_string(),
                    format: "<sender>: <message>".to_string(),
                    join_by_default: true,
                    see_permission: None,
                },
                ChannelSettings {
                    name: "staff".to_string(),
                    format: "[Staff] <sender>: <message>".to_string(),
                    join_by_default: false,
                    see_permission: Some("herald.channel.staff".to_string()),
                },
            ],
        }
    }
}

impl ChannelsConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ChannelConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the document as a whole.
    ///
    /// Checks that at least one channel is declared, names are non-empty and
    /// unique, and the default channel refers to a declared channel.
    pub fn validate(&self) -> Result<(), ChannelConfigError> {
        if self.channels.is_empty() {
            return Err(ChannelConfigError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.name.is_empty() {
                return Err(ChannelConfigError::EmptyName(index));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(ChannelConfigError::DuplicateName(channel.name.clone()));
            }
        }

        if !seen.contains(self.default_channel.as_str()) {
            return Err(ChannelConfigError::UnknownDefault(
                self.default_channel.clone(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChannelsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_channel, "global");
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = ChannelsConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed = ChannelsConfig::from_toml_str(&raw).unwrap();

        assert_eq!(parsed.default_channel, config.default_channel);
        assert_eq!(parsed.channels.len(), config.channels.len());
        assert_eq!(parsed.channels[1].see_permission, config.channels[1].see_permission);
    }

    #[test]
    fn test_unknown_default_rejected() {
        let raw = r#"
            default_channel = "nope"

            [[channels]]
            name = "global"
            format = "<sender>: <message>"
            join_by_default = true
        "#;

        let result = ChannelsConfig::from_toml_str(raw);
        assert!(matches!(result, Err(ChannelConfigError::UnknownDefault(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = ChannelsConfig::default();
        config.channels.push(config.channels[0].clone());

        assert!(matches!(
            config.validate(),
            Err(ChannelConfigError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_empty_document_rejected() {
        let config = ChannelsConfig {
            default_channel: "global".to_string(),
            channels: Vec::new(),
        };

        assert!(matches!(config.validate(), Err(ChannelConfigError::Empty)));
    }
}
