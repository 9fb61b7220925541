use super::post_json;
use crate::config::Config;
use crate::error::{AlertError, Result};
use crate::formatter;
use crate::types::{AlertLevel, Attachment, Provider, SendMethod};
use hyper_rustls::HttpsConnectorBuilder;
use serde::Serialize;
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

pub struct SlackDispatcher {
    http: reqwest::Client,
    /// Web API client, built on first webclient send
    api: OnceCell<Arc<SlackHyperClient>>,
}

impl SlackDispatcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            api: OnceCell::new(),
        }
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
            "Slack send"
        );

        let body = formatter::format(Provider::Slack, message, attachment, config);
        match config.send_method {
            SendMethod::WebClient => self.send_web_client(body.text(), config, channel).await,
            SendMethod::Webhook => self.send_webhook(body.text(), config, channel).await,
        }
    }

    async fn send_webhook(&self, text: &str, config: &Config, channel: &str) -> Result<()> {
        let url = config.token().ok_or_else(|| {
            AlertError::Config("webhook URL is required for Slack webhook method".to_string())
        })?;

        let payload = WebhookPayload {
            text,
            channel: Some(channel).filter(|c| !c.is_empty()),
        };

        post_json(&self.http, "slack webhook", url, None, &payload, config.debug).await?;
        tracing::debug!(channel = %channel, "Slack webhook sent");
        Ok(())
    }

    async fn send_web_client(&self, text: &str, config: &Config, channel: &str) -> Result<()> {
        let token = config
            .slack_token()
            .or_else(|| config.token())
            .ok_or_else(|| {
                AlertError::Config("Slack token is required for webclient method".to_string())
            })?;
        if channel.is_empty() {
            return Err(AlertError::Config(
                "channel is required for Slack webclient method".to_string(),
            ));
        }

        let client = self.api_client(&config.slack.api_url).await?;
        let token = SlackApiToken::new(token.to_string().into());
        let session = client.open_session(&token);

        let request = SlackApiChatPostMessageRequest::new(
            channel.into(),
            SlackMessageContent::new().with_text(text.into()),
        );
        if config.debug {
            tracing::debug!(channel = %channel, text = %text, "Posting Slack message");
        }

        let response = session
            .chat_post_message(&request)
            .await
            .map_err(|e| AlertError::SlackApi(e.to_string()))?;

        tracing::debug!(channel = %channel, ts = %response.ts, "Slack message posted");
        Ok(())
    }

    /// Web API client for `api_url`, built once per dispatcher
    async fn api_client(&self, api_url: &str) -> Result<Arc<SlackHyperClient>> {
        self.api
            .get_or_try_init(|| async {
                // Required by rustls 0.23+ before any TLS connector is built
                let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

                let builder = HttpsConnectorBuilder::new();
                let builder = if api_url.starts_with("http://") {
                    // Plain-HTTP endpoint (local relay or test server); TLS is never used
                    let tls = rustls::ClientConfig::builder()
                        .with_root_certificates(rustls::RootCertStore::empty())
                        .with_no_client_auth();
                    builder.with_tls_config(tls).https_or_http()
                } else {
                    builder
                        .with_native_roots()
                        .map_err(|e| AlertError::SlackApi(e.to_string()))?
                        .https_only()
                };
                let connector = SlackClientHyperConnector::from(builder.enable_all_versions().build())
                    .with_slack_api_url(api_url);

                tracing::debug!(api_url = %api_url, "Created Slack Web API client");
                Ok::<_, AlertError>(Arc::new(slack_morphism::SlackClient::new(connector)))
            })
            .await
            .cloned()
    }
}
