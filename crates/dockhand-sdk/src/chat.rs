use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::greeting::extract_initial_message;
use crate::{ClientConfig, TransportError};

/// One user turn as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub text: String,
    pub email: Option<String>,
    /// Opaque side-channel payload, a `data:` URL when present.
    pub side_channel: Option<String>,
}

/// Interpreted backend reply for a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnResponse {
    /// Present only when the backend re-evaluated the email this turn.
    pub email_verdict: Option<bool>,
    /// Set iff `email_verdict == Some(true)`.
    pub verified_email: Option<String>,
    pub notifications: Vec<String>,
    pub reply_text: String,
    pub session_ended: bool,
}

impl TurnResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply_text: text.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_turn(&self, request: &TurnRequest) -> Result<TurnResponse, TransportError>;

    /// Greeting text shown before the first turn.
    async fn fetch_greeting(&self) -> Result<String, TransportError>;
}

/// reqwest-backed client for the chat, greeting and notification endpoints.
#[derive(Clone)]
pub struct DockhandClient {
    pub(crate) http: Client,
    pub(crate) stream_http: Client,
    pub(crate) config: Arc<ClientConfig>,
}

impl DockhandClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        // A total timeout would cut the event stream, so this one only bounds connect.
        let stream_http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            http,
            stream_http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ChatBackend for DockhandClient {
    async fn send_turn(&self, request: &TurnRequest) -> Result<TurnResponse, TransportError> {
        let endpoint = self.config.chat_url()?;
        let body = ChatRequestWire::from(request);
        let response = self.http.post(endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        let payload = response
            .json::<ChatResponseWire>()
            .await
            .map_err(|err| TransportError::InvalidResponse(format!("chat response: {err}")))?;
        debug!(
            target: "dockhand::transport",
            email_valid = ?payload.email_valid,
            print_outputs = payload.print_outputs.as_ref().map(Vec::len).unwrap_or(0),
            end = ?payload.end,
            "chat turn answered"
        );
        TurnResponse::try_from(payload)
    }

    async fn fetch_greeting(&self) -> Result<String, TransportError> {
        let endpoint = self.config.greeting_url()?;
        let response = self.http.get(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        let page = response.text().await?;
        extract_initial_message(&page).ok_or_else(|| {
            TransportError::InvalidResponse("greeting page has no initial message".into())
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequestWire<'a> {
    message: &'a str,
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screenshot: Option<&'a str>,
}

impl<'a> From<&'a TurnRequest> for ChatRequestWire<'a> {
    fn from(request: &'a TurnRequest) -> Self {
        Self {
            message: &request.text,
            email: request.email.as_deref(),
            screenshot: request.side_channel.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseWire {
    response: String,
    #[serde(default)]
    email_valid: Option<bool>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    print_outputs: Option<Vec<String>>,
    #[serde(default)]
    end: Option<bool>,
}

impl TryFrom<ChatResponseWire> for TurnResponse {
    type Error = TransportError;

    fn try_from(wire: ChatResponseWire) -> Result<Self, Self::Error> {
        let verified_email = match wire.email_valid {
            Some(true) => {
                let email = wire.email.ok_or_else(|| {
                    TransportError::InvalidResponse(
                        "email_valid is true but no email was returned".into(),
                    )
                })?;
                Some(email)
            }
            _ => None,
        };
        Ok(Self {
            email_verdict: wire.email_valid,
            verified_email,
            notifications: wire.print_outputs.unwrap_or_default(),
            reply_text: wire.response,
            session_ended: wire.end.unwrap_or(false),
        })
    }
}
