//! Asynchronous client for the dockhand chat backend.
//!
//! Two independent capabilities live here: the request/response chat turn
//! (plus the greeting page fetched once at startup) and the long-lived
//! server-sent-events subscription that carries out-of-band notifications.
//! The subscription owns its reconnect policy; callers only open and close it.

mod chat;
mod config;
mod greeting;
mod sse;
mod subscription;

pub use chat::{ChatBackend, DockhandClient, TurnRequest, TurnResponse};
pub use config::{
    ClientConfig, DEFAULT_CHAT_PATH, DEFAULT_NOTIFICATIONS_PATH, DEFAULT_RECONNECT_DELAY,
};
pub use greeting::{extract_initial_message, DEFAULT_GREETING};
pub use reqwest::StatusCode;
pub use sse::{parse_notification, SseDecoder, SseEvent};
pub use subscription::{
    ConnectionStatus, EventStream, NotificationEvent, NotificationSource, Subscription,
    SubscriptionEvent,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
    #[error("http request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("event stream failed: {0}")]
    Stream(String),
}
