//! Provider-shaped message bodies

use crate::config::Config;
use crate::types::{Attachment, Provider};

const DEFAULT_INLINE_LABEL: &str = "Trace Logs";
const DEFAULT_LARK_TITLE: &str = "Alert";

/// Formatted message, shaped for the target provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedBody {
    /// Slack mrkdwn text with the service header inline
    Text(String),
    /// Lark rich-text post: header becomes the title
    Post { title: String, text: String },
}

impl FormattedBody {
    /// Post title; plain text bodies have none
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Post { title, .. } => Some(title),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Post { text, .. } => text,
        }
    }
}

/// Bold markers: Slack mrkdwn vs Lark markdown
const SLACK_BOLD: &str = "*";
const LARK_BOLD: &str = "**";

pub fn format(
    provider: Provider,
    message: &str,
    attachment: Option<&Attachment>,
    config: &Config,
) -> FormattedBody {
    match provider {
        Provider::Slack => FormattedBody::Text(slack_text(message, attachment, config)),
        Provider::Lark => {
            let (title, text) = lark_post(message, attachment, config);
            FormattedBody::Post { title, text }
        }
    }
}

/// `"service - environment"`, whichever halves are set
fn header(config: &Config) -> Option<String> {
    match (config.service_name(), config.environment()) {
        (Some(service), Some(env)) => Some(format!("{service} - {env}")),
        (Some(service), None) => Some(service.to_string()),
        (None, Some(env)) => Some(env.to_string()),
        (None, None) => None,
    }
}

fn body(message: &str, attachment: Option<&Attachment>, bold: &str) -> String {
    let mut formatted = message.to_string();
    let Some(attachment) = attachment else {
        return formatted;
    };

    if let Some(content) = attachment.inline_content() {
        let label = attachment
            .file_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_INLINE_LABEL);
        formatted.push_str(&format!("\n\n{bold}{label}:{bold}\n```\n{content}\n```"));
    }

    if let Some(url) = attachment.link() {
        formatted.push_str(&format!("\n\n{bold}Attachment:{bold} {url}"));
    }

    formatted
}

fn slack_text(message: &str, attachment: Option<&Attachment>, config: &Config) -> String {
    let body = body(message, attachment, SLACK_BOLD);
    match header(config) {
        Some(header) => format!("*[{header}]*\n{body}"),
        None => body,
    }
}

/// Returns `(title, text)`
fn lark_post(message: &str, attachment: Option<&Attachment>, config: &Config) -> (String, String) {
    let title = header(config).unwrap_or_else(|| DEFAULT_LARK_TITLE.to_string());
    (title, body(message, attachment, LARK_BOLD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SendMethod;

    fn config() -> Config {
        Config::new(Provider::Slack, SendMethod::Webhook)
    }

    #[test]
    fn test_slack_header_variants() {
        let both = config().with_service("billing").with_environment("prod");
        assert_eq!(slack_text("down", None, &both), "*[billing - prod]*\ndown");

        let service = config().with_service("billing");
        assert_eq!(slack_text("down", None, &service), "*[billing]*\ndown");

        let env = config().with_environment("prod");
        assert_eq!(slack_text("down", None, &env), "*[prod]*\ndown");

        assert_eq!(slack_text("down", None, &config()), "down");
    }

    #[test]
    fn test_inline_content_and_url_both_render() {
        let attachment = Attachment {
            url: Some("https://files.example.com/dump.txt".to_string()),
            file_name: Some("dump.txt".to_string()),
            content: Some("line 1".to_string()),
        };

        let text = slack_text("boom", Some(&attachment), &config());
        assert_eq!(
            text,
            "boom\n\n*dump.txt:*\n```\nline 1\n```\n\n*Attachment:* https://files.example.com/dump.txt"
        );
    }

    #[test]
    fn test_inline_label_defaults() {
        let attachment = Attachment {
            content: Some("stack".to_string()),
            ..Default::default()
        };
        let text = slack_text("boom", Some(&attachment), &config());
        assert!(text.contains("*Trace Logs:*"));
    }

    #[test]
    fn test_lark_post_title_and_markup() {
        let (title, text) = lark_post(
            "boom",
            Some(&Attachment::from_url("https://x.example/a")),
            &config(),
        );
        assert_eq!(title, "Alert");
        assert_eq!(text, "boom\n\n**Attachment:** https://x.example/a");

        let cfg = config().with_service("billing").with_environment("prod");
        let body = format(Provider::Lark, "boom", None, &cfg);
        assert_eq!(body.title(), Some("billing - prod"));
        assert_eq!(
            body,
            FormattedBody::Post {
                title: "billing - prod".to_string(),
                text: "boom".to_string()
            }
        );
    }
}
