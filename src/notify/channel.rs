//! Recipients and their configured notification channels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One configured transport and its target list.
///
/// New transports are added as variants; the dispatcher matches on the
/// variant to pick the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Multi-target notifier; each url is an apprise-style service URL.
    Apprise {
        #[serde(default)]
        urls: Vec<String>,
    },
    /// Plain JSON POST to a single HTTP endpoint.
    Webhook {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Apprise,
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Apprise => "apprise",
            ChannelKind::Webhook => "webhook",
        }
    }

    pub fn breaker_name(&self) -> String {
        format!("notifier:{}", self.as_str())
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelConfig::Apprise { .. } => ChannelKind::Apprise,
            ChannelConfig::Webhook { .. } => ChannelKind::Webhook,
        }
    }

    /// Whether targets of this channel are templated before sending.
    pub fn is_multi_target(&self) -> bool {
        matches!(self, ChannelConfig::Apprise { .. })
    }

    pub fn targets(&self) -> Vec<String> {
        match self {
            ChannelConfig::Apprise { urls } => urls.clone(),
            ChannelConfig::Webhook { url, .. } => vec![url.clone()],
        }
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            ChannelConfig::Apprise { .. } => Vec::new(),
            ChannelConfig::Webhook { headers, .. } => headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

/// A plate and the channels its alerts go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub plate: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub notifications: Vec<ChannelConfig>,
}

impl Recipient {
    pub fn new(plate: impl Into<String>, notifications: Vec<ChannelConfig>) -> Self {
        Self {
            plate: plate.into(),
            display_name: None,
            icon: None,
            notifications,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Display name, falling back to the plate.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.plate)
    }

    pub fn normalized_plate(&self) -> String {
        normalize_plate(&self.plate)
    }
}

pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}
