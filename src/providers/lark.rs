use super::{get_json, post_json};
use crate::cache::{Cache, IdentityCache, IdentityKind, chat_id_key, token_key};
use crate::config::{Config, LarkAppCredentials};
use crate::error::{AlertError, Result};
use crate::formatter;
use crate::types::{AlertLevel, Attachment, Provider, SendMethod};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Subtracted from the server-declared token lifetime
const TOKEN_SAFETY_MARGIN_SECS: i64 = 600;
/// Floor when the declared lifetime is shorter than the margin
const MIN_TOKEN_TTL_SECS: i64 = 60;
/// Open API codes for a missing, invalid or expired tenant access token
const TOKEN_REJECTED_CODES: [i64; 3] = [99991661, 99991663, 99991677];

/// Effective cache TTL for a tenant token the server declared valid for
/// `expire_secs`.
pub fn token_ttl(expire_secs: i64) -> Duration {
    let secs = expire_secs.saturating_sub(TOKEN_SAFETY_MARGIN_SECS);
    let secs = if secs <= 0 { MIN_TOKEN_TTL_SECS } else { secs };
    Duration::from_secs(secs.unsigned_abs())
}

/// Common `{code, msg}` envelope of Lark Open API responses
#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: i64,
}

#[derive(Debug, Deserialize)]
struct ChatListResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: ChatPage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPage {
    #[serde(default)]
    items: Vec<ChatItem>,
    #[serde(default)]
    page_token: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ChatItem {
    #[serde(default)]
    chat_id: String,
    #[serde(default)]
    name: String,
}

/// True when the upstream refused the access token itself
fn token_rejected(err: &AlertError) -> bool {
    match err {
        AlertError::Upstream { code, .. } => TOKEN_REJECTED_CODES.contains(code),
        AlertError::ChannelResolution { source, .. } => token_rejected(source),
        _ => false,
    }
}

/// Rich-text `post` content shared by the webhook and message APIs
fn post_content(title: &str, text: &str) -> Value {
    json!({
        "post": {
            "zh_cn": {
                "title": title,
                "content": [[{ "tag": "text", "text": text }]],
            }
        }
    })
}

pub struct LarkDispatcher {
    http: reqwest::Client,
    identity: IdentityCache,
}

impl LarkDispatcher {
    pub fn new(http: reqwest::Client, cache: Arc<dyn Cache>) -> Self {
        Self {
            http,
            identity: IdentityCache::new(cache),
        }
    }

    pub fn identity(&self) -> &IdentityCache {
        &self.identity
    }

    /// Send to `config.channel`
    pub async fn send(
        &self,
        level: AlertLevel,
        message: &str,
        attachment: Option<&Attachment>,
        config: &Config,
    ) -> Result<()> {
        self.send_to_channel(level, message, attachment, config, &config.channel)
            .await
    }

    pub async fn send_to_channel(
        &self,
        level: AlertLevel,
        message: &str,
        attachment: Option<&Attachment>,
        config: &Config,
        channel: &str,
    ) -> Result<()> {
        tracing::debug!(
            level = %level,
            send_method = %config.send_method,
            channel = %channel,
            "Lark send"
        );

        let body = formatter::format(Provider::Lark, message, attachment, config);
        let title = body.title().unwrap_or_default();
        match config.send_method {
            SendMethod::WebClient => {
                self.send_web_client(title, body.text(), config, channel)
                    .await
            }
            SendMethod::Webhook => self.send_webhook(title, body.text(), config).await,
        }
    }

    async fn send_webhook(&self, title: &str, text: &str, config: &Config) -> Result<()> {
        let url = config.token().ok_or_else(|| {
            AlertError::Config("webhook URL is required for Lark webhook method".to_string())
        })?;

        let payload = json!({
            "msg_type": "post",
            "content": post_content(title, text),
        });

        let body = post_json(&self.http, "lark webhook", url, None, &payload, config.debug).await?;

        // Bot webhooks report failures in-band with HTTP 200
        if let Ok(status) = serde_json::from_str::<ApiStatus>(&body) {
            if status.code != 0 {
                return Err(AlertError::Upstream {
                    endpoint: "lark webhook",
                    code: status.code,
                    message: status.msg,
                });
            }
        }

        tracing::debug!("Lark webhook sent");
        Ok(())
    }

    async fn send_web_client(
        &self,
        title: &str,
        text: &str,
        config: &Config,
        channel: &str,
    ) -> Result<()> {
        let app = config.lark_app();
        let token = match app {
            Some(app) => self.tenant_access_token(config, app).await?,
            None => config
                .token()
                .ok_or_else(|| {
                    AlertError::Config(
                        "Lark app credentials or token are required for webclient method"
                            .to_string(),
                    )
                })?
                .to_string(),
        };

        let result = self.post_message(title, text, config, channel, &token).await;

        // A rejected token must not be served again from the cache
        if let (Some(app), Err(e)) = (app, &result) {
            if token_rejected(e) {
                tracing::warn!(error = %e, "Lark rejected the tenant access token, evicting it");
                self.identity
                    .delete(config.redis.as_ref(), &token_key(&app.app_id, &app.app_secret))
                    .await;
            }
        }
        result
    }

    async fn post_message(
        &self,
        title: &str,
        text: &str,
        config: &Config,
        channel: &str,
        token: &str,
    ) -> Result<()> {
        let chat_id = self
            .chat_id(config, token, channel)
            .await
            .map_err(|e| AlertError::ChannelResolution {
                channel: channel.to_string(),
                source: Box::new(e),
            })?;

        let url = format!("{}/im/v1/messages?receive_id_type=chat_id", config.lark.api_base);
        let payload = json!({
            "receive_id": chat_id,
            "msg_type": "post",
            "content": post_content(title, text),
        });

        let body = post_json(
            &self.http,
            "lark message",
            &url,
            Some(token),
            &payload,
            config.debug,
        )
        .await?;

        let status: ApiStatus = serde_json::from_str(&body)?;
        if status.code != 0 {
            return Err(AlertError::Upstream {
                endpoint: "lark message",
                code: status.code,
                message: status.msg,
            });
        }

        tracing::debug!(channel = %channel, "Lark message sent");
        Ok(())
    }

    /// Tenant access token for `app`, cached for its lifetime minus a margin
    pub async fn tenant_access_token(
        &self,
        config: &Config,
        app: &LarkAppCredentials,
    ) -> Result<String> {
        let key = token_key(&app.app_id, &app.app_secret);
        self.identity
            .get_or_fetch(IdentityKind::TenantToken, config.redis.as_ref(), &key, || {
                self.fetch_tenant_token(config, app)
            })
            .await
    }

    async fn fetch_tenant_token(
        &self,
        config: &Config,
        app: &LarkAppCredentials,
    ) -> Result<(String, Option<Duration>)> {
        let url = format!("{}/auth/v3/tenant_access_token/internal", config.lark.api_base);
        let payload = json!({
            "app_id": app.app_id,
            "app_secret": app.app_secret,
        });

        // Credentials must not reach the logs even in debug mode
        let body = post_json(&self.http, "lark token", &url, None, &payload, false).await?;
        let response: TenantTokenResponse = serde_json::from_str(&body)?;
        if response.code != 0 {
            return Err(AlertError::Upstream {
                endpoint: "lark token",
                code: response.code,
                message: response.msg,
            });
        }
        if response.tenant_access_token.is_empty() {
            return Err(AlertError::Upstream {
                endpoint: "lark token",
                code: response.code,
                message: "empty tenant_access_token".to_string(),
            });
        }

        let ttl = token_ttl(response.expire);
        tracing::debug!(
            expire_secs = response.expire,
            ttl_secs = ttl.as_secs(),
            "Fetched Lark tenant access token"
        );
        Ok((response.tenant_access_token, Some(ttl)))
    }

    /// Chat id for a channel name, cached without expiry once found
    pub async fn chat_id(&self, config: &Config, token: &str, channel_name: &str) -> Result<String> {
        if channel_name.is_empty() {
            return Err(AlertError::Config(
                "channel is required for Lark webclient method".to_string(),
            ));
        }

        let key = chat_id_key(config.environment().unwrap_or_default(), channel_name);
        self.identity
            .get_or_fetch(IdentityKind::ChatId, config.redis.as_ref(), &key, || async {
                let chat_id = self.find_chat_id(config, token, channel_name).await?;
                Ok::<_, AlertError>((chat_id, None::<Duration>))
            })
            .await
    }

    /// Walk the chat listing page by page looking for an exact name match
    async fn find_chat_id(&self, config: &Config, token: &str, channel_name: &str) -> Result<String> {
        let url = format!("{}/im/v1/chats", config.lark.api_base);
        let page_size = config.lark.page_size.to_string();
        let mut page_token = String::new();
        let mut pages = 0u32;

        loop {
            let mut query = vec![("page_size", page_size.as_str())];
            if !page_token.is_empty() {
                query.push(("page_token", page_token.as_str()));
            }

            let body = get_json(&self.http, "lark chats", &url, token, &query, config.debug).await?;
            let response: ChatListResponse = serde_json::from_str(&body)?;
            if response.code != 0 {
                return Err(AlertError::Upstream {
                    endpoint: "lark chats",
                    code: response.code,
                    message: response.msg,
                });
            }
            pages += 1;

            if let Some(item) = response
                .data
                .items
                .into_iter()
                .find(|item| item.name == channel_name)
            {
                tracing::info!(
                    channel = %channel_name,
                    pages = pages,
                    "Resolved Lark chat id"
                );
                return Ok(item.chat_id);
            }

            if !response.data.has_more {
                break;
            }
            if response.data.page_token.is_empty() {
                tracing::warn!(
                    channel = %channel_name,
                    "Lark reported more pages without a page token, stopping"
                );
                break;
            }
            page_token = response.data.page_token;
        }

        Err(AlertError::ChannelNotFound(channel_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ttl_subtracts_margin() {
        assert_eq!(token_ttl(7200), Duration::from_secs(6600));
        assert_eq!(token_ttl(3600), Duration::from_secs(3000));
    }

    #[test]
    fn test_token_ttl_floors_to_one_minute() {
        assert_eq!(token_ttl(600), Duration::from_secs(60));
        assert_eq!(token_ttl(300), Duration::from_secs(60));
        assert_eq!(token_ttl(0), Duration::from_secs(60));
    }

    #[test]
    fn test_token_ttl_extreme_expire_values() {
        assert_eq!(token_ttl(i64::MIN), Duration::from_secs(60));
        assert_eq!(token_ttl(-1), Duration::from_secs(60));
        assert_eq!(
            token_ttl(i64::MAX),
            Duration::from_secs((i64::MAX - 600).unsigned_abs())
        );
    }

    #[test]
    fn test_token_rejection_is_detected_through_resolution() {
        let rejected = AlertError::Upstream {
            endpoint: "lark chats",
            code: 99991663,
            message: "Invalid access token for authorization".to_string(),
        };
        assert!(token_rejected(&rejected));

        let wrapped = AlertError::ChannelResolution {
            channel: "ops".to_string(),
            source: Box::new(rejected),
        };
        assert!(token_rejected(&wrapped));
        assert!(!token_rejected(&AlertError::ChannelNotFound("ops".to_string())));
    }

    #[test]
    fn test_post_content_shape() {
        let content = post_content("billing - prod", "boom");
        assert_eq!(content["post"]["zh_cn"]["title"], "billing - prod");
        assert_eq!(content["post"]["zh_cn"]["content"][0][0]["tag"], "text");
        assert_eq!(content["post"]["zh_cn"]["content"][0][0]["text"], "boom");
    }

    #[test]
    fn test_chat_page_tolerates_missing_data() {
        let response: ChatListResponse =
            serde_json::from_str(r#"{"code":99991663,"msg":"invalid token"}"#).unwrap();
        assert_eq!(response.code, 99991663);
        assert!(response.data.items.is_empty());
    }
}
