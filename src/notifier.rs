//! Top-level dispatch: level gating, channel resolution, trace merging and
//! provider selection

use crate::cache::{self, Cache, IdentityStats};
use crate::config::Config;
use crate::error::Result;
use crate::logging::log_error;
use crate::providers::{LarkDispatcher, SlackDispatcher};
use crate::types::{AlertLevel, Attachment, Provider};
use std::sync::Arc;

const TRACE_FILE_NAME: &str = "trace.log";
const TRACE_SEPARATOR: &str = "\n\n--- Trace Log ---\n";

/// Fold a trace into the attachment.
///
/// Trace text becomes inline content. Existing inline content is kept and
/// the trace is appended after a separator.
pub fn merge_trace(attachment: Option<Attachment>, trace: Option<&str>) -> Option<Attachment> {
    let Some(trace) = trace.filter(|t| !t.is_empty()) else {
        return attachment;
    };

    let mut attachment = attachment.unwrap_or_default();
    match attachment.content.as_mut().filter(|c| !c.is_empty()) {
        Some(content) => {
            content.push_str(TRACE_SEPARATOR);
            content.push_str(trace);
        }
        None => {
            attachment.content = Some(trace.to_string());
            attachment.file_name = Some(TRACE_FILE_NAME.to_string());
        }
    }
    Some(attachment)
}

/// Alert entry point.
///
/// Holds one dispatcher per provider; both share the cache given at
/// construction.
pub struct Notifier {
    config: Config,
    slack: SlackDispatcher,
    lark: LarkDispatcher,
}

impl Notifier {
    /// Notifier backed by the process-wide cache
    pub fn new(config: Config) -> Self {
        Self::with_cache(config, cache::global())
    }

    /// Notifier backed by an explicit cache
    pub fn with_cache(config: Config, cache: Arc<dyn Cache>) -> Self {
        tracing::debug!(
            provider = %config.provider,
            send_method = %config.send_method,
            debug = config.debug,
            "Created notifier"
        );

        let http = reqwest::Client::new();
        Self {
            config,
            slack: SlackDispatcher::new(http.clone()),
            lark: LarkDispatcher::new(http, cache),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Channel for `level` when no override is given: resolver first, then
    /// the configured default channel
    pub fn resolve_channel(&self, level: AlertLevel) -> String {
        match &self.config.channel_resolver {
            Some(resolver) => resolver.resolve(level),
            None => self.config.channel.clone(),
        }
    }

    /// Send with the configured provider to the resolved channel
    pub async fn send(
        &self,
        level: AlertLevel,
        message: &str,
        attachment: Option<Attachment>,
        trace: Option<&str>,
    ) -> Result<()> {
        self.send_to_channel(level, message, attachment, trace, None)
            .await
    }

    /// Send with the configured provider; `channel` overrides resolution
    pub async fn send_to_channel(
        &self,
        level: AlertLevel,
        message: &str,
        attachment: Option<Attachment>,
        trace: Option<&str>,
        channel: Option<&str>,
    ) -> Result<()> {
        self.dispatch(self.config.provider, level, message, attachment, trace, channel)
            .await
    }

    /// Send through a provider named at call time.
    ///
    /// Unknown names fall back to Slack (see `Provider::from_name_or_default`).
    pub async fn send_with_provider(
        &self,
        provider: &str,
        level: AlertLevel,
        message: &str,
        attachment: Option<Attachment>,
        trace: Option<&str>,
        channel: Option<&str>,
    ) -> Result<()> {
        let provider = Provider::from_name_or_default(provider);
        self.dispatch(provider, level, message, attachment, trace, channel)
            .await
    }

    async fn dispatch(
        &self,
        provider: Provider,
        level: AlertLevel,
        message: &str,
        attachment: Option<Attachment>,
        trace: Option<&str>,
        channel: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(
            provider = %provider,
            level = %level,
            message_len = message.len(),
            has_attachment = attachment.is_some(),
            has_trace = trace.is_some_and(|t| !t.is_empty()),
            "Dispatching alert"
        );

        if level == AlertLevel::Info {
            tracing::info!(message = %message, "[INFO] alert logged locally");
            return Ok(());
        }

        let channel = match channel.filter(|c| !c.is_empty()) {
            Some(channel) => channel.to_string(),
            None => self.resolve_channel(level),
        };

        let mut config = self.config.clone();
        config.channel = channel.clone();

        let attachment = merge_trace(attachment, trace);
        let result = match provider {
            Provider::Slack => {
                self.slack
                    .send_to_channel(level, message, attachment.as_ref(), &config, &channel)
                    .await
            }
            Provider::Lark => {
                self.lark
                    .send_to_channel(level, message, attachment.as_ref(), &config, &channel)
                    .await
            }
        };

        match &result {
            Ok(()) => tracing::info!(
                provider = %provider,
                level = %level,
                channel = %channel,
                "Alert sent"
            ),
            Err(e) => log_error(&format!("{provider} send"), e),
        }
        result
    }

    /// Token and chat-id cache counters
    pub async fn identity_stats(&self) -> IdentityStats {
        self.lark.identity().stats().await
    }

    pub async fn log_stats(&self) {
        self.lark.identity().log_stats().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::channel::MapChannelResolver;
    use crate::types::SendMethod;

    fn notifier(config: Config) -> Notifier {
        Notifier::with_cache(config, Arc::new(MemoryCache::new()))
    }

    #[test]
    fn test_merge_trace_appends_to_existing_content() {
        let attachment = Attachment::inline("app.log", "A");
        let merged = merge_trace(Some(attachment), Some("B")).unwrap();
        assert_eq!(merged.content.as_deref(), Some("A\n\n--- Trace Log ---\nB"));
        assert_eq!(merged.file_name.as_deref(), Some("app.log"));
    }

    #[test]
    fn test_merge_trace_alone_creates_trace_attachment() {
        let merged = merge_trace(None, Some("B")).unwrap();
        assert_eq!(merged.content.as_deref(), Some("B"));
        assert_eq!(merged.file_name.as_deref(), Some("trace.log"));
        assert_eq!(merged.url, None);
    }

    #[test]
    fn test_merge_trace_fills_url_only_attachment() {
        let merged = merge_trace(Some(Attachment::from_url("https://x.example/f")), Some("B")).unwrap();
        assert_eq!(merged.content.as_deref(), Some("B"));
        assert_eq!(merged.file_name.as_deref(), Some("trace.log"));
        assert_eq!(merged.url.as_deref(), Some("https://x.example/f"));
    }

    #[test]
    fn test_merge_without_trace_is_identity() {
        assert_eq!(merge_trace(None, None), None);
        let attachment = Attachment::inline("a", "b");
        assert_eq!(merge_trace(Some(attachment.clone()), Some("")), Some(attachment));
    }

    #[test]
    fn test_resolve_channel_with_resolver() {
        let resolver = MapChannelResolver::new("#general")
            .with_channel(AlertLevel::Error, "#errors")
            .with_channel(AlertLevel::Warn, "#warnings");
        let config = Config::new(Provider::Slack, SendMethod::WebClient)
            .with_token("dummy-token")
            .with_channel("#default")
            .with_resolver(Arc::new(resolver));
        let notifier = notifier(config);

        assert_eq!(notifier.resolve_channel(AlertLevel::Error), "#errors");
        assert_eq!(notifier.resolve_channel(AlertLevel::Warn), "#warnings");
        assert_eq!(notifier.resolve_channel(AlertLevel::Info), "#general");
    }

    #[test]
    fn test_resolve_channel_without_resolver() {
        let config = Config::new(Provider::Slack, SendMethod::WebClient)
            .with_token("dummy-token")
            .with_channel("#default");
        assert_eq!(notifier(config).resolve_channel(AlertLevel::Error), "#default");
    }

    #[tokio::test]
    async fn test_info_never_fails() {
        // No credentials at all: any real send would be a config error
        let config = Config::new(Provider::Lark, SendMethod::WebClient);
        let notifier = notifier(config);
        notifier
            .send(AlertLevel::Info, "Test info message", None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_webhook_with_invalid_url_is_transport_error() {
        let config = Config::new(Provider::Slack, SendMethod::Webhook)
            .with_token("dummy-token")
            .with_channel("#test");
        let err = notifier(config)
            .send(AlertLevel::Warn, "Test warn message", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AlertError::Http(_)));
    }
}
