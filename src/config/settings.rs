use super::{Config, LarkAppCredentials, LarkSettings};
use crate::cache::RedisSettings;
use crate::channel::MapChannelResolver;
use crate::error::{AlertError, Result};
use crate::types::{AlertLevel, Provider, SendMethod};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Load configuration from the process environment (and `.env` if present)
pub fn load_settings() -> Result<Config> {
    dotenvy::dotenv().ok();
    settings_from(|key| std::env::var(key).ok())
}

/// Build configuration from any key lookup. Empty values count as unset.
pub fn settings_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let provider = match get("COMMONLOG_PROVIDER") {
        Some(name) => Provider::from_str(&name)?,
        None => Provider::default(),
    };
    let send_method = match get("COMMONLOG_SEND_METHOD") {
        Some(method) => SendMethod::from_str(&method)?,
        None => SendMethod::Webhook,
    };

    let mut config = Config::new(provider, send_method);
    config.token = get("COMMONLOG_TOKEN");
    config.slack_token = get("SLACK_TOKEN");
    config.channel = get("COMMONLOG_CHANNEL").unwrap_or_default();
    config.service_name = get("COMMONLOG_SERVICE_NAME");
    config.environment = get("COMMONLOG_ENVIRONMENT");
    config.debug = parse_flag("COMMONLOG_DEBUG", get("COMMONLOG_DEBUG"))?;
    config.log_json = match get("COMMONLOG_LOG_FORMAT").as_deref() {
        None | Some("text") => false,
        Some("json") => true,
        Some(other) => {
            return Err(AlertError::Config(format!(
                "Invalid COMMONLOG_LOG_FORMAT: {other}"
            )));
        }
    };

    config.lark_app = match (get("LARK_APP_ID"), get("LARK_APP_SECRET")) {
        (Some(app_id), Some(app_secret)) => Some(LarkAppCredentials { app_id, app_secret }),
        (None, None) => None,
        _ => {
            return Err(AlertError::Config(
                "LARK_APP_ID and LARK_APP_SECRET must be set together".to_string(),
            ));
        }
    };

    if let Some(url) = get("SLACK_API_URL") {
        config.slack.api_url = url.trim_end_matches('/').to_string();
    }

    let mut lark = LarkSettings::default();
    if let Some(base) = get("LARK_API_BASE") {
        lark.api_base = base.trim_end_matches('/').to_string();
    }
    if let Some(size) = get("LARK_PAGE_SIZE") {
        lark.page_size = size
            .parse()
            .map_err(|_| AlertError::Config("Invalid LARK_PAGE_SIZE".to_string()))?;
    }
    config.lark = lark;

    config.redis = redis_settings(&get)?;

    let warn_channel = get("COMMONLOG_CHANNEL_WARN");
    let error_channel = get("COMMONLOG_CHANNEL_ERROR");
    if warn_channel.is_some() || error_channel.is_some() {
        let mut resolver = MapChannelResolver::new(config.channel.clone());
        if let Some(channel) = warn_channel {
            resolver = resolver.with_channel(AlertLevel::Warn, channel);
        }
        if let Some(channel) = error_channel {
            resolver = resolver.with_channel(AlertLevel::Error, channel);
        }
        config.channel_resolver = Some(Arc::new(resolver));
    }

    Ok(config)
}

/// Redis settings exist only when both host and port are set; a partial
/// configuration means "use the in-process cache".
fn redis_settings<G>(get: &G) -> Result<Option<RedisSettings>>
where
    G: Fn(&str) -> Option<String>,
{
    let (Some(host), Some(port)) = (get("REDIS_HOST"), get("REDIS_PORT")) else {
        if get("REDIS_HOST").is_some() || get("REDIS_PORT").is_some() {
            tracing::debug!("Incomplete redis settings, token caching stays in memory");
        }
        return Ok(None);
    };

    let mut settings = RedisSettings::new(
        host,
        port.parse()
            .map_err(|_| AlertError::Config("Invalid REDIS_PORT".to_string()))?,
    );
    settings.password = get("REDIS_PASSWORD");
    settings.ssl = parse_flag("REDIS_SSL", get("REDIS_SSL"))?;
    settings.cluster_mode = parse_flag("REDIS_CLUSTER_MODE", get("REDIS_CLUSTER_MODE"))?;
    if let Some(db) = get("REDIS_DB") {
        settings.db = db
            .parse()
            .map_err(|_| AlertError::Config("Invalid REDIS_DB".to_string()))?;
    }
    if let Some(ms) = get("REDIS_CONNECT_TIMEOUT_MS") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| AlertError::Config("Invalid REDIS_CONNECT_TIMEOUT_MS".to_string()))?;
        settings.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = get("REDIS_COMMAND_TIMEOUT_MS") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| AlertError::Config("Invalid REDIS_COMMAND_TIMEOUT_MS".to_string()))?;
        settings.command_timeout = Duration::from_millis(ms);
    }

    Ok(Some(settings))
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(AlertError::Config(format!("Invalid {key}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelResolver;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = settings_from(lookup(&[])).unwrap();
        assert_eq!(config.provider, Provider::Slack);
        assert_eq!(config.send_method, SendMethod::Webhook);
        assert!(config.redis.is_none());
        assert!(!config.debug);
        assert!(!config.log_json);
        assert_eq!(config.lark, LarkSettings::default());
    }

    #[test]
    fn test_full_lark_settings() {
        let config = settings_from(lookup(&[
            ("COMMONLOG_PROVIDER", "lark"),
            ("COMMONLOG_SEND_METHOD", "webclient"),
            ("LARK_APP_ID", "cli_a"),
            ("LARK_APP_SECRET", "secret"),
            ("COMMONLOG_CHANNEL", "ops-alerts"),
            ("COMMONLOG_ENVIRONMENT", "staging"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_SSL", "true"),
            ("REDIS_DB", "3"),
            ("LARK_API_BASE", "http://localhost:9000/open-apis/"),
            ("SLACK_API_URL", "http://localhost:9001/api/"),
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::Lark);
        assert_eq!(config.send_method, SendMethod::WebClient);
        assert_eq!(config.lark_app().unwrap().app_id, "cli_a");
        assert_eq!(config.lark.api_base, "http://localhost:9000/open-apis");
        assert_eq!(config.slack.api_url, "http://localhost:9001/api");

        let redis = config.redis.unwrap();
        assert_eq!(redis.port, 6380);
        assert!(redis.ssl);
        assert_eq!(redis.db, 3);
    }

    #[test]
    fn test_unknown_send_method_rejected_at_load() {
        let err = settings_from(lookup(&[("COMMONLOG_SEND_METHOD", "ftp")])).unwrap_err();
        assert!(matches!(err, AlertError::UnknownSendMethod(ref m) if m == "ftp"));
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        let err = settings_from(lookup(&[
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "six"),
        ]))
        .unwrap_err();
        assert!(err.is_config());

        let err = settings_from(lookup(&[("COMMONLOG_DEBUG", "maybe")])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_partial_redis_settings_fall_back_to_memory() {
        let config = settings_from(lookup(&[("REDIS_HOST", "localhost")])).unwrap();
        assert!(config.redis.is_none());
    }

    #[test]
    fn test_level_channels_build_resolver() {
        let config = settings_from(lookup(&[
            ("COMMONLOG_CHANNEL", "#general"),
            ("COMMONLOG_CHANNEL_ERROR", "#errors"),
        ]))
        .unwrap();

        let resolver = config.channel_resolver.unwrap();
        assert_eq!(resolver.resolve(AlertLevel::Error), "#errors");
        assert_eq!(resolver.resolve(AlertLevel::Warn), "#general");
    }
}
