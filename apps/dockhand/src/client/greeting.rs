use dockhand_sdk::{ChatBackend, DEFAULT_GREETING};
use tracing::{debug, warn};

/// Opening bot line; any failure falls back to the built-in greeting.
pub async fn load_greeting(backend: &dyn ChatBackend) -> String {
    match backend.fetch_greeting().await {
        Ok(text) => {
            debug!(target: "dockhand::greeting", "using server greeting");
            text
        }
        Err(err) => {
            warn!(target: "dockhand::greeting", error = %err, "greeting unavailable, using default");
            DEFAULT_GREETING.to_string()
        }
    }
}
