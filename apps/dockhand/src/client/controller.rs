//! Turn orchestration. Background tasks report back through [`ClientEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use dockhand_sdk::{
    ChatBackend, ConnectionStatus, NotificationEvent, NotificationSource, Subscription,
    SubscriptionEvent, TransportError, TurnRequest, TurnResponse,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::client::capture::SnapshotSource;
use crate::session::{Phase, Session, SessionError};
use crate::telemetry::PerfGuard;
use crate::transcript::{Role, Transcript};

pub const APOLOGY: &str = "Sorry, I'm having trouble processing your request. Please try again.";
pub const EMAIL_PLACEHOLDER: &str = "Enter your email address...";
pub const ISSUE_PLACEHOLDER: &str = "Describe your inbound receiving issue...";
pub const ENDED_PLACEHOLDER: &str = "Session ended.";

#[derive(Debug)]
pub enum ClientEvent {
    TurnCompleted(Result<TurnResponse, TransportError>),
    Notification(NotificationEvent),
    Connection(ConnectionStatus),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored,
    Sent,
}

pub struct Controller {
    session: Session,
    transcript: Transcript,
    connection: ConnectionStatus,
    backend: Arc<dyn ChatBackend>,
    snapshots: Arc<dyn SnapshotSource>,
    runtime: Handle,
    events: UnboundedSender<ClientEvent>,
    subscription: Option<Subscription>,
}

impl Controller {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        snapshots: Arc<dyn SnapshotSource>,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<ClientEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            session: Session::new(),
            transcript: Transcript::new(),
            connection: ConnectionStatus::Connecting,
            backend,
            snapshots,
            runtime,
            events,
            subscription: None,
        };
        (controller, rx)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection
    }

    /// A turn is waiting on the backend.
    pub fn is_busy(&self) -> bool {
        self.session.is_locked() && !self.session.is_ended()
    }

    pub fn input_enabled(&self) -> bool {
        !self.session.is_locked()
    }

    pub fn placeholder(&self) -> &'static str {
        match self.session.phase() {
            Phase::AwaitingEmail => EMAIL_PLACEHOLDER,
            Phase::Active => ISSUE_PLACEHOLDER,
            Phase::Ended => ENDED_PLACEHOLDER,
        }
    }

    pub fn greet(&mut self, text: impl Into<String>) {
        self.transcript.append(Role::Bot, text);
    }

    /// Start a turn. The reply arrives later as [`ClientEvent::TurnCompleted`].
    pub fn submit(&mut self, raw: &str) -> Result<SubmitOutcome, ControllerError> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        if let Err(err) = self.session.begin_turn() {
            debug!(target: "dockhand::controller", error = %err, "submit refused");
            return Err(err.into());
        }
        self.transcript.append(Role::User, text);

        let request = TurnRequest {
            text: text.to_string(),
            email: self.session.verified_email().map(str::to_owned),
            side_channel: None,
        };
        let capture = self.session.phase() == Phase::Active;
        let backend = Arc::clone(&self.backend);
        let snapshots = Arc::clone(&self.snapshots);
        let events = self.events.clone();
        debug!(target: "dockhand::controller", capture, "turn started");

        self.runtime.spawn(async move {
            let mut request = request;
            if capture {
                request.side_channel = snapshots.capture().await;
            }
            let result = {
                let _guard = PerfGuard::new("chat_turn");
                backend.send_turn(&request).await
            };
            if events.send(ClientEvent::TurnCompleted(result)).is_err() {
                debug!(target: "dockhand::controller", "turn finished after the controller went away");
            }
        });
        Ok(SubmitOutcome::Sent)
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::TurnCompleted(result) => self.finish_turn(result),
            ClientEvent::Notification(notification) => {
                self.transcript.append(Role::System, notification.message);
            }
            ClientEvent::Connection(status) => {
                if self.connection != status {
                    info!(target: "dockhand::controller", ?status, "notification stream status changed");
                }
                self.connection = status;
            }
        }
    }

    /// Apply everything already queued without waiting.
    pub fn drain(&mut self, events: &mut UnboundedReceiver<ClientEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    fn finish_turn(&mut self, result: Result<TurnResponse, TransportError>) {
        if !self.is_busy() {
            warn!(target: "dockhand::controller", "dropping turn result with no turn in flight");
            return;
        }
        match result {
            Ok(response) => {
                for note in response.notifications {
                    self.transcript.append(Role::System, note);
                }
                self.transcript.append(Role::Bot, response.reply_text);
                self.session.complete_turn(
                    response.email_verdict,
                    response.verified_email,
                    response.session_ended,
                );
            }
            Err(err) => {
                warn!(target: "dockhand::controller", error = %err, "chat turn failed");
                self.transcript.append(Role::Bot, APOLOGY);
                self.session.fail_turn();
            }
        }
    }

    /// Open (or reopen) the notification subscription.
    pub fn open_notifications(
        &mut self,
        source: Arc<dyn NotificationSource>,
        reconnect_delay: Duration,
    ) {
        self.shutdown();
        self.connection = ConnectionStatus::Connecting;
        let events = self.events.clone();
        let _runtime = self.runtime.enter();
        let subscription = Subscription::spawn(source, reconnect_delay, move |event| {
            let event = match event {
                SubscriptionEvent::Notification(notification) => {
                    ClientEvent::Notification(notification)
                }
                SubscriptionEvent::Status(status) => ClientEvent::Connection(status),
            };
            let _ = events.send(event);
        });
        self.subscription = Some(subscription);
    }

    /// Close the subscription and cancel any pending reconnect. Safe to repeat.
    pub fn shutdown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            info!(target: "dockhand::controller", "notification subscription closed");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
