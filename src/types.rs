//! Core alert types shared by the resolver, formatter and dispatchers

use crate::error::AlertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alert severity. Ordered `Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warn,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(AlertError::Config(format!("unknown alert level: {other}"))),
        }
    }
}

/// How a message reaches the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMethod {
    /// Authenticated Web API call
    WebClient,
    /// POST to an incoming-webhook URL held in the token field
    Webhook,
}

impl SendMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebClient => "webclient",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for SendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMethod {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webclient" => Ok(Self::WebClient),
            "webhook" => Ok(Self::Webhook),
            _ => Err(AlertError::UnknownSendMethod(s.to_string())),
        }
    }
}

/// Supported chat providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Slack,
    Lark,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Lark => "lark",
        }
    }

    /// Lenient lookup for string-named call sites: unknown names fall back
    /// to Slack with a warning.
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                provider = %name,
                fallback = %Self::default(),
                "Unknown provider, falling back to default"
            );
            Self::default()
        })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "lark" => Ok(Self::Lark),
            _ => Err(AlertError::UnknownProvider(s.to_string())),
        }
    }
}

/// File attachment. URL and inline content may both be present and render
/// as separate sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Public URL for external files
    pub url: Option<String>,
    /// Optional file name, used as the label of the inline block
    pub file_name: Option<String>,
    /// Inline text content
    pub content: Option<String>,
}

impl Attachment {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn inline(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub(crate) fn inline_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    pub(crate) fn link(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(AlertLevel::Info < AlertLevel::Warn);
        assert!(AlertLevel::Warn < AlertLevel::Error);
    }

    #[test]
    fn test_send_method_rejects_unknown_value() {
        let err = "ftp".parse::<SendMethod>().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("ftp"));
        assert_eq!("WebHook".parse::<SendMethod>().unwrap(), SendMethod::Webhook);
    }

    #[test]
    fn test_provider_lenient_lookup_defaults_to_slack() {
        assert_eq!(Provider::from_name_or_default("lark"), Provider::Lark);
        assert_eq!(Provider::from_name_or_default("unknown"), Provider::Slack);
        assert!("unknown".parse::<Provider>().is_err());
    }
}
