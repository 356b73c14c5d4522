use std::time::Duration;

use url::Url;

use crate::TransportError;

pub const DEFAULT_CHAT_PATH: &str = "chat";
pub const DEFAULT_NOTIFICATIONS_PATH: &str = "stream-prints";
pub const DEFAULT_GREETING_PATH: &str = "";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);

/// Where the chat backend lives and how long to wait on it.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: Url,
    chat_path: String,
    notifications_path: String,
    greeting_path: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_base_url: impl AsRef<str>) -> Result<Self, TransportError> {
        let mut base = server_base_url.as_ref().trim().to_string();
        if base.is_empty() {
            return Err(TransportError::InvalidConfig(
                "server base url cannot be empty".into(),
            ));
        }
        if !base.contains("://") {
            let inferred_scheme = infer_scheme(&base);
            base = format!("{inferred_scheme}{base}");
        }
        // Url::join drops the last path segment unless the base ends with '/'.
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| TransportError::InvalidConfig(format!("invalid server url: {err}")))?;
        Ok(Self {
            base_url,
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            notifications_path: DEFAULT_NOTIFICATIONS_PATH.to_string(),
            greeting_path: DEFAULT_GREETING_PATH.to_string(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(120),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn chat_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&self.chat_path)
    }

    pub fn notifications_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&self.notifications_path)
    }

    pub fn greeting_url(&self) -> Result<Url, TransportError> {
        self.endpoint(&self.greeting_path)
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| TransportError::InvalidConfig(format!("invalid endpoint '{path}': {err}")))
    }
}

fn infer_scheme(base: &str) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    let host_lower = host_part.to_ascii_lowercase();
    if host_lower.starts_with("localhost")
        || host_lower.starts_with("0.0.0.0")
        || host_lower.starts_with("127.")
        || host_lower == "::1"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
        || host_lower
            .strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .map(|octet| (16..32).contains(&octet))
            .unwrap_or(false)
    {
        "http://"
    } else {
        "https://"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_https_for_public_hosts() {
        assert_eq!(infer_scheme("support.example.com"), "https://");
        assert_eq!(infer_scheme("example.com/desk"), "https://");
    }

    #[test]
    fn defaults_to_http_for_local_hosts() {
        for host in [
            "localhost",
            "localhost:5000",
            "127.0.0.1:5000",
            "0.0.0.0:8080",
            "10.0.0.5",
            "192.168.1.10",
            "172.16.0.1",
            "[::1]",
        ] {
            assert_eq!(infer_scheme(host), "http://", "{host}");
        }
    }

    #[test]
    fn endpoints_resolve_against_base() {
        let config = ClientConfig::new("localhost:5000").unwrap();
        assert_eq!(config.chat_url().unwrap().as_str(), "http://localhost:5000/chat");
        assert_eq!(
            config.notifications_url().unwrap().as_str(),
            "http://localhost:5000/stream-prints"
        );
        assert_eq!(config.greeting_url().unwrap().as_str(), "http://localhost:5000/");
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let config = ClientConfig::new("https://desk.example.com/assistant").unwrap();
        assert_eq!(
            config.chat_url().unwrap().as_str(),
            "https://desk.example.com/assistant/chat"
        );
    }

    #[test]
    fn rejects_empty_base() {
        assert!(matches!(
            ClientConfig::new("   "),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
