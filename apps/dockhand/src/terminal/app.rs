use std::io::IsTerminal;
use std::sync::Arc;

use dockhand_sdk::{ClientConfig, DockhandClient};
use tokio::runtime::Handle;
use tracing::info;

use crate::client::capture::{ClipboardSnapshot, NoSnapshot, SnapshotSource};
use crate::client::controller::Controller;
use crate::client::greeting::load_greeting;
use crate::client::plain;
use crate::client::terminal as tui;
use crate::telemetry::logging::{self, Console};
use crate::terminal::cli::Cli;
use crate::terminal::error::CliError;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let plain_mode =
        cli.plain || !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal();
    let console = if plain_mode {
        Console::Stderr
    } else {
        Console::Discard
    };
    logging::init(&cli.logging.to_config(console))?;

    let config = ClientConfig::new(&cli.server)?.with_request_timeout(cli.request_timeout());
    info!(
        target: "dockhand::app",
        server = %config.base_url(),
        plain = plain_mode,
        "starting client"
    );
    let client = Arc::new(DockhandClient::new(config)?);
    let snapshots: Arc<dyn SnapshotSource> = if cli.attach_clipboard {
        Arc::new(ClipboardSnapshot::default())
    } else {
        Arc::new(NoSnapshot)
    };

    let greeting = load_greeting(client.as_ref()).await;
    let (mut controller, events) = Controller::new(client.clone(), snapshots, Handle::current());
    controller.greet(greeting);
    controller.open_notifications(client, cli.reconnect_delay());

    if plain_mode {
        plain::run(controller, events).await
    } else {
        tokio::task::spawn_blocking(move || tui::run(controller, events))
            .await
            .map_err(|err| CliError::Terminal(err.to_string()))?
    }
}
