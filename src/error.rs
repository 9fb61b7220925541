use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("unknown send method: {0}")]
    UnknownSendMethod(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} response: {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("{endpoint} error (code {code}): {message}")]
    Upstream {
        endpoint: &'static str,
        code: i64,
        message: String,
    },

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("failed to get chat_id for channel '{channel}': {source}")]
    ChannelResolution {
        channel: String,
        #[source]
        source: Box<AlertError>,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AlertError {
    /// True for errors raised before any request left the process
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownSendMethod(_) | Self::UnknownProvider(_)
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::ChannelResolution { source, .. } => source.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message_carries_code() {
        let err = AlertError::Status {
            endpoint: "slack webhook",
            status: 404,
        };
        assert_eq!(err.to_string(), "slack webhook response: 404");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_config());
    }

    #[test]
    fn test_channel_resolution_wraps_cause() {
        let err = AlertError::ChannelResolution {
            channel: "ops-alerts".to_string(),
            source: Box::new(AlertError::ChannelNotFound("ops-alerts".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "failed to get chat_id for channel 'ops-alerts': channel 'ops-alerts' not found"
        );
    }
}
