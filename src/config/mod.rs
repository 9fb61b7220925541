mod settings;

pub use settings::{load_settings, settings_from};

use crate::cache::RedisSettings;
use crate::channel::ChannelResolver;
use crate::types::{Provider, SendMethod};
use std::sync::Arc;

/// Lark app credentials exchanged for a tenant access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LarkAppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

/// Slack Web API endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    /// Base of the Web API, without trailing slash
    pub api_url: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            api_url: "https://slack.com/api".to_string(),
        }
    }
}

/// Lark Open API endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LarkSettings {
    /// Base of the Open API, without trailing slash
    pub api_base: String,
    /// Page size for chat listing
    pub page_size: u32,
}

impl Default for LarkSettings {
    fn default() -> Self {
        Self {
            api_base: "https://open.larksuite.com/open-apis".to_string(),
            page_size: 10,
        }
    }
}

/// Dispatch configuration.
///
/// Cheap to clone; a per-send channel override is applied to a copy.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub send_method: SendMethod,
    /// Generic API token, or the full webhook URL for `SendMethod::Webhook`
    pub token: Option<String>,
    /// Slack bot token; wins over `token` for the Slack Web API
    pub slack_token: Option<String>,
    pub lark_app: Option<LarkAppCredentials>,
    /// Default channel (name or id) when no resolver is set
    pub channel: String,
    pub channel_resolver: Option<Arc<dyn ChannelResolver>>,
    pub service_name: Option<String>,
    pub environment: Option<String>,
    /// External token/chat-id store; `None` uses the in-process cache
    pub redis: Option<RedisSettings>,
    pub slack: SlackSettings,
    pub lark: LarkSettings,
    /// Log full message payloads
    pub debug: bool,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    pub fn new(provider: Provider, send_method: SendMethod) -> Self {
        Self {
            provider,
            send_method,
            token: None,
            slack_token: None,
            lark_app: None,
            channel: String::new(),
            channel_resolver: None,
            service_name: None,
            environment: None,
            redis: None,
            slack: SlackSettings::default(),
            lark: LarkSettings::default(),
            debug: false,
            log_json: false,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ChannelResolver>) -> Self {
        self.channel_resolver = Some(resolver);
        self
    }

    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_slack_token(mut self, slack_token: impl Into<String>) -> Self {
        self.slack_token = Some(slack_token.into());
        self
    }

    pub fn with_lark_app(mut self, app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        self.lark_app = Some(LarkAppCredentials {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        });
        self
    }

    pub(crate) fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub(crate) fn slack_token(&self) -> Option<&str> {
        self.slack_token.as_deref().filter(|t| !t.is_empty())
    }

    /// App credentials, only when both halves are present
    pub(crate) fn lark_app(&self) -> Option<&LarkAppCredentials> {
        self.lark_app
            .as_ref()
            .filter(|app| !app.app_id.is_empty() && !app.app_secret.is_empty())
    }
}
