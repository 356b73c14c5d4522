//! Line-oriented front-end for pipes and dumb terminals.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::client::controller::{ClientEvent, Controller};
use crate::client::status::connection_label;
use crate::terminal::error::CliError;
use crate::transcript::{Role, TranscriptEntry};

pub async fn run(
    controller: Controller,
    events: UnboundedReceiver<ClientEvent>,
) -> Result<(), CliError> {
    run_with(controller, events, tokio::io::stdin(), std::io::stdout()).await
}

/// Same loop over arbitrary streams. Returns once input is exhausted and no
/// turn is pending, or when the backend ends the session.
pub async fn run_with<R, W>(
    mut controller: Controller,
    mut events: UnboundedReceiver<ClientEvent>,
    input: R,
    mut out: W,
) -> Result<(), CliError>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut lines = BufReader::new(input).lines();
    let mut printed = 0;
    let mut input_open = true;
    let mut last_status = controller.connection_status();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        printed = flush_transcript(&controller, printed, &mut out)?;
        if controller.session().is_ended() {
            break;
        }
        if !input_open && !controller.is_busy() {
            break;
        }
        if controller.input_enabled() && input_open {
            write!(out, "{} > ", controller.placeholder())?;
            out.flush()?;
        }

        tokio::select! {
            line = lines.next_line(), if input_open && controller.input_enabled() => {
                match line? {
                    Some(line) => {
                        if let Err(err) = controller.submit(&line) {
                            debug!(target: "dockhand::plain", error = %err, "submit refused");
                        }
                    }
                    None => {
                        debug!(target: "dockhand::plain", "input closed");
                        input_open = false;
                        writeln!(out)?;
                    }
                }
            }
            event = events.recv() => match event {
                Some(event) => controller.handle_event(event),
                None => break,
            },
            _ = &mut ctrl_c => break,
        }

        let status = controller.connection_status();
        if status != last_status {
            debug!(target: "dockhand::plain", status = connection_label(status), "connection");
            last_status = status;
        }
    }

    controller.shutdown();
    flush_transcript(&controller, printed, &mut out)?;
    out.flush()?;
    Ok(())
}

fn flush_transcript<W: Write>(
    controller: &Controller,
    printed: usize,
    out: &mut W,
) -> Result<usize, CliError> {
    let entries = controller.transcript().entries();
    for entry in entries.iter().skip(printed) {
        // The user's own line is already on screen.
        if entry.message().role() != Role::User {
            write_entry(entry, out)?;
        }
    }
    Ok(entries.len())
}

fn write_entry<W: Write>(entry: &TranscriptEntry, out: &mut W) -> std::io::Result<()> {
    let prefix = match entry.message().role() {
        Role::User => "you",
        Role::Bot => "assistant",
        Role::System => "system",
    };
    let layout = entry.layout();
    let mut lead = layout.lead.iter();
    writeln!(out, "[{prefix}] {}", lead.next().map(String::as_str).unwrap_or(""))?;
    for line in lead {
        writeln!(out, "    {line}")?;
    }
    if let Some(items) = &layout.details {
        writeln!(out, "    Processing Details:")?;
        for item in items {
            writeln!(out, "      - {item}")?;
        }
    }
    Ok(())
}
