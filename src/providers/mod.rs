//! Slack and Lark dispatchers
//!
//! Both support two transports, selected by `Config::send_method`:
//! - webhook: the token field holds the full incoming-webhook URL
//! - webclient: authenticated API call to the provider's fixed endpoint
//!
//! No dispatcher retries; a failed send is reported once.

mod lark;
mod slack;

pub use lark::{LarkDispatcher, token_ttl};
pub use slack::SlackDispatcher;

use crate::error::{AlertError, Result};
use crate::logging::Timer;
use serde::Serialize;

/// POST `payload` as JSON and return the response body on 2xx
pub(crate) async fn post_json<T>(
    http: &reqwest::Client,
    endpoint: &'static str,
    url: &str,
    bearer: Option<&str>,
    payload: &T,
    debug: bool,
) -> Result<String>
where
    T: Serialize + ?Sized,
{
    if debug {
        tracing::debug!(
            endpoint = endpoint,
            payload = %serde_json::to_string(payload)?,
            "Sending request"
        );
    }

    let mut request = http.post(url).json(payload);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let _timer = Timer::new(endpoint);
    let response = request.send().await.inspect_err(|e| {
        tracing::debug!(endpoint = endpoint, error = %e, "HTTP request failed");
    })?;
    read_body(endpoint, response, debug).await
}

/// GET with query parameters and bearer auth
pub(crate) async fn get_json(
    http: &reqwest::Client,
    endpoint: &'static str,
    url: &str,
    bearer: &str,
    query: &[(&str, &str)],
    debug: bool,
) -> Result<String> {
    let _timer = Timer::new(endpoint);
    let response = http
        .get(url)
        .query(query)
        .bearer_auth(bearer)
        .send()
        .await?;
    read_body(endpoint, response, debug).await
}

async fn read_body(endpoint: &'static str, response: reqwest::Response, debug: bool) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    tracing::debug!(
        endpoint = endpoint,
        status = status.as_u16(),
        body_len = body.len(),
        "Received response"
    );
    if debug {
        tracing::debug!(endpoint = endpoint, body = %body, "Response body");
    }

    if !status.is_success() {
        return Err(AlertError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }
    Ok(body)
}
