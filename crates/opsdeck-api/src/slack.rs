// Slack Web API client
//
// Talks to the Slack Web API over reqwest when a bot token is configured.
// Without a token every call answers locally ("mock" mode) so the server
// runs end to end in development.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Outcome of sending a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SendOutcome {
    Ok {
        ts: Option<String>,
        channel: Option<String>,
    },
    Error {
        error: String,
    },
    Mock {
        channel: String,
        text: String,
    },
}

/// Outcome of checking the bot token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectionOutcome {
    Connected { team: Option<String> },
    Error { error: String },
    Mock,
}

/// Envelope shared by Slack Web API responses
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
}

/// Slack client
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl SlackClient {
    pub fn new(token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// True when no bot token is configured
    pub fn is_mock(&self) -> bool {
        self.token.is_none()
    }

    /// Post a message to a channel
    pub async fn send(&self, channel: &str, text: &str) -> SendOutcome {
        let Some(token) = &self.token else {
            tracing::info!(channel = %channel, "Mock Slack send");
            return SendOutcome::Mock {
                channel: channel.to_string(),
                text: text.to_string(),
            };
        };

        let request = self
            .http
            .post(self.url("chat.postMessage"))
            .bearer_auth(token)
            .json(&serde_json::json!({"channel": channel, "text": text}));

        match self.call(request).await {
            Ok(resp) => SendOutcome::Ok {
                ts: resp.ts,
                channel: resp.channel,
            },
            Err(error) => {
                tracing::error!(channel = %channel, error = %error, "Failed to send Slack message");
                SendOutcome::Error { error }
            }
        }
    }

    /// Fetch recent messages from a channel. Failures yield an empty list.
    pub async fn poll(&self, channel: &str, limit: u32) -> Vec<Value> {
        let Some(token) = &self.token else {
            let now = chrono::Utc::now().to_rfc3339();
            return vec![
                serde_json::json!({"text": "Mock message 1", "ts": now}),
                serde_json::json!({"text": "Mock message 2", "ts": now}),
            ];
        };

        let request = self
            .http
            .get(self.url("conversations.history"))
            .bearer_auth(token)
            .query(&[("channel", channel.to_string()), ("limit", limit.to_string())]);

        match self.call(request).await {
            Ok(resp) => resp.messages,
            Err(error) => {
                tracing::error!(channel = %channel, error = %error, "Failed to poll Slack");
                Vec::new()
            }
        }
    }

    /// Verify the bot token
    pub async fn auth_test(&self) -> ConnectionOutcome {
        let Some(token) = &self.token else {
            tracing::info!("No SLACK_BOT_TOKEN provided; Slack client in mock mode");
            return ConnectionOutcome::Mock;
        };

        let request = self.http.post(self.url("auth.test")).bearer_auth(token);
        match self.call(request).await {
            Ok(resp) => ConnectionOutcome::Connected { team: resp.team },
            Err(error) => {
                tracing::error!(error = %error, "Slack auth failed");
                ConnectionOutcome::Error { error }
            }
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Send a request and unwrap the Slack envelope. Transport errors and
    /// `ok: false` both come back as an error string.
    async fn call(&self, request: reqwest::RequestBuilder) -> Result<SlackResponse, String> {
        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("Slack API returned HTTP {status}"));
        }
        let body: SlackResponse = response.json().await.map_err(|e| e.to_string())?;
        if body.ok {
            Ok(body)
        } else {
            Err(body.error.unwrap_or_else(|| "unknown_error".to_string()))
        }
    }
}
