use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::sse::{parse_notification, SseDecoder};
use crate::{DockhandClient, TransportError};

/// Out-of-band system message pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Before the first stream has opened.
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Notification(NotificationEvent),
    Status(ConnectionStatus),
}

pub type EventStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Opens one raw event stream. Reconnecting is the subscription's job.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn open(&self) -> Result<EventStream, TransportError>;
}

#[async_trait]
impl NotificationSource for DockhandClient {
    async fn open(&self) -> Result<EventStream, TransportError> {
        let endpoint = self.config.notifications_url()?;
        let response = self
            .stream_http
            .get(endpoint)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed())
    }
}

/// Handle to the background task that keeps the notification stream open.
///
/// The task reopens the stream a fixed delay after every error or close,
/// indefinitely, until [`Subscription::close`] is called or the handle drops.
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn spawn<F>(source: Arc<dyn NotificationSource>, reconnect_delay: Duration, sink: F) -> Self
    where
        F: Fn(SubscriptionEvent) + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_subscription(
            source,
            reconnect_delay,
            cancel.clone(),
            sink,
        ));
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(target: "dockhand::subscription", "notification subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_subscription<F>(
    source: Arc<dyn NotificationSource>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
    sink: F,
) where
    F: Fn(SubscriptionEvent) + Send + Sync + 'static,
{
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = source.open() => opened,
        };
        match opened {
            Ok(stream) => {
                info!(target: "dockhand::subscription", attempt, "notification stream open");
                sink(SubscriptionEvent::Status(ConnectionStatus::Connected));
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return,
                    outcome = pump_events(stream, &sink) => outcome,
                };
                match outcome {
                    Ok(()) => debug!(
                        target: "dockhand::subscription",
                        "notification stream closed by server"
                    ),
                    Err(err) => warn!(
                        target: "dockhand::subscription",
                        error = %err,
                        "notification stream failed"
                    ),
                }
            }
            Err(err) => {
                warn!(
                    target: "dockhand::subscription",
                    attempt,
                    error = %err,
                    "failed to open notification stream"
                );
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        sink(SubscriptionEvent::Status(ConnectionStatus::Reconnecting));
        debug!(
            target: "dockhand::subscription",
            delay_ms = reconnect_delay.as_millis() as u64,
            "scheduling notification reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(reconnect_delay) => {}
        }
    }
}

async fn pump_events<F>(mut stream: EventStream, sink: &F) -> Result<(), TransportError>
where
    F: Fn(SubscriptionEvent),
{
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for event in decoder.push(&chunk) {
            match parse_notification(&event.data) {
                Ok(Some(notification)) => sink(SubscriptionEvent::Notification(notification)),
                Ok(None) => trace!(
                    target: "dockhand::subscription",
                    data = %event.data,
                    "ignoring non-print event"
                ),
                Err(err) => warn!(
                    target: "dockhand::subscription",
                    error = %err,
                    data = %event.data,
                    "dropping malformed notification"
                ),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    type Script = Result<Vec<Result<Bytes, TransportError>>, TransportError>;

    /// Replays scripted streams; once the script runs out, streams stay open silently.
    struct ScriptedSource {
        script: Mutex<VecDeque<Script>>,
        opens: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                opens: AtomicUsize::new(0),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationSource for ScriptedSource {
        async fn open(&self) -> Result<EventStream, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(chunks)) => Ok(stream::iter(chunks).boxed()),
                Some(Err(err)) => Err(err),
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    fn print(message: &str) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(format!(
            "data: {{\"type\":\"print\",\"message\":\"{message}\"}}\n\n"
        )))
    }

    fn spawn(
        source: Arc<ScriptedSource>,
    ) -> (Subscription, mpsc::UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Subscription::spawn(source, Duration::from_secs(5), move |event| {
            let _ = tx.send(event);
        });
        (subscription, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_prints_then_reconnects_after_fixed_delay() {
        let source = ScriptedSource::new(vec![Ok(vec![print("a"), print("b")])]);
        let (mut subscription, mut rx) = spawn(source.clone());

        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Connected))
        );
        let note = |m: &str| {
            Some(SubscriptionEvent::Notification(NotificationEvent {
                message: m.to_string(),
            }))
        };
        assert_eq!(rx.recv().await, note("a"));
        assert_eq!(rx.recv().await, note("b"));
        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Reconnecting))
        );
        let dropped_at = Instant::now();
        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Connected))
        );
        assert!(dropped_at.elapsed() >= Duration::from_secs(5));
        assert_eq!(source.opens(), 2);

        subscription.close();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_retrying_failed_opens() {
        let source = ScriptedSource::new(vec![
            Err(TransportError::Stream("refused".into())),
            Err(TransportError::Stream("refused".into())),
        ]);
        let (mut subscription, mut rx) = spawn(source.clone());

        for _ in 0..2 {
            assert_eq!(
                rx.recv().await,
                Some(SubscriptionEvent::Status(ConnectionStatus::Reconnecting))
            );
        }
        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Connected))
        );
        assert_eq!(source.opens(), 3);
        subscription.close();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payloads_are_skipped() {
        let source = ScriptedSource::new(vec![Ok(vec![
            Ok(Bytes::from_static(b"data: {not json}\n\n")),
            Ok(Bytes::from_static(b"data: {\"type\":\"keepalive\"}\n\n")),
            print("after"),
        ])]);
        let (mut subscription, mut rx) = spawn(source);

        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Connected))
        );
        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Notification(NotificationEvent {
                message: "after".into()
            }))
        );
        subscription.close();
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_mid_flight_triggers_reconnect() {
        let source = ScriptedSource::new(vec![Ok(vec![
            print("one"),
            Err(TransportError::Stream("reset".into())),
            print("never"),
        ])]);
        let (mut subscription, mut rx) = spawn(source);

        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Connected))
        );
        assert!(matches!(
            rx.recv().await,
            Some(SubscriptionEvent::Notification(_))
        ));
        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Reconnecting))
        );
        subscription.close();
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_reconnect_and_is_idempotent() {
        let source = ScriptedSource::new(vec![Err(TransportError::Stream("down".into()))]);
        let (mut subscription, mut rx) = spawn(source.clone());

        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Status(ConnectionStatus::Reconnecting))
        );
        subscription.close();
        subscription.close();
        assert!(subscription.is_closed());

        tokio::time::sleep(Duration::from_secs(60)).await;
        // The aborted task dropped the sink, so the channel drains to None.
        assert_eq!(rx.recv().await, None);
        assert_eq!(source.opens(), 1);
    }
}
