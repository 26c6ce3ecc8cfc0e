//! Push priority levels and their platform-specific tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushPriority {
    #[default]
    Normal,
    High,
}

/// Platforms with their own priority vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Apprise,
    Bark,
}

impl PushPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushPriority::Normal => "normal",
            PushPriority::High => "high",
        }
    }

    /// Parse a configured priority string. Unknown values fall back to `Normal`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => PushPriority::Normal,
            "high" => PushPriority::High,
            other => {
                warn!(priority = other, "Unsupported push priority, using normal");
                PushPriority::Normal
            }
        }
    }

    pub fn platform_token(&self, platform: Platform) -> &'static str {
        match (self, platform) {
            (PushPriority::Normal, Platform::Apprise) => "normal",
            (PushPriority::Normal, Platform::Bark) => "active",
            (PushPriority::High, Platform::Apprise) => "high",
            (PushPriority::High, Platform::Bark) => "critical",
        }
    }

    pub fn apprise_priority(&self) -> &'static str {
        self.platform_token(Platform::Apprise)
    }

    pub fn bark_level(&self) -> &'static str {
        self.platform_token(Platform::Bark)
    }

    pub fn default_sound(&self) -> &'static str {
        match self {
            PushPriority::Normal => "default",
            PushPriority::High => "alarm",
        }
    }
}

impl fmt::Display for PushPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_tokens() {
        assert_eq!(PushPriority::Normal.apprise_priority(), "normal");
        assert_eq!(PushPriority::Normal.bark_level(), "active");
        assert_eq!(PushPriority::High.apprise_priority(), "high");
        assert_eq!(PushPriority::High.bark_level(), "critical");
        assert_eq!(PushPriority::High.default_sound(), "alarm");
    }

    #[test]
    fn test_unknown_priority_normalizes_to_normal() {
        assert_eq!(PushPriority::parse_lossy("HIGH"), PushPriority::High);
        assert_eq!(PushPriority::parse_lossy("urgent"), PushPriority::Normal);
        assert_eq!(PushPriority::parse_lossy(""), PushPriority::Normal);
    }
}
