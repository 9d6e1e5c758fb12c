//! Webhook event routing.
//!
//! Text goes through the responder and the answer is sent back. Stickers get
//! a local acknowledgment. Everything else is only logged.

use crate::client::MessagingClient;
use crate::event::{Event, MessageContent, Source, WebhookPayload};
use async_trait::async_trait;
use pocket_ledger_conversation::{OrchestratorError, ToolCallOrchestrator};
use pocket_ledger_core::{DEFAULT_SCOPE_PREFIX, PlatformUserId, UserScope};
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Reply sent when a turn outlives the request timeout.
pub const TIMEOUT_REPLY: &str = "Sorry, that took too long. Please try again.";

/// Produces the reply to a user's text.
#[async_trait]
pub trait PromptResponder: Send + Sync {
    /// Answers `prompt` for `scope`.
    async fn respond(
        &self,
        scope: &UserScope,
        prompt: &str,
    ) -> Result<String, Report<OrchestratorError>>;
}

#[async_trait]
impl PromptResponder for ToolCallOrchestrator {
    async fn respond(
        &self,
        scope: &UserScope,
        prompt: &str,
    ) -> Result<String, Report<OrchestratorError>> {
        self.run(scope, prompt).await
    }
}

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Prefix of every user's storage scope.
    pub scope_prefix: String,
    /// Upper bound on one text event's orchestration.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Answered through the reply token.
    Replied,
    /// Reply failed; answered by push instead.
    Pushed,
    /// An answer was produced but could not be delivered.
    DeliveryFailed,
    /// The event could not be attributed to a user.
    Skipped,
    /// Logged without a reply.
    Logged,
}

/// Classifies webhook events and drives their handling.
#[derive(Clone)]
pub struct EventRouter {
    responder: Arc<dyn PromptResponder>,
    messenger: Arc<dyn MessagingClient>,
    config: Arc<RouterConfig>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Formats the acknowledgment for a sticker.
#[must_use]
pub fn sticker_ack(sticker_id: &str, package_id: &str, keywords: &[String], text: &str) -> String {
    format!(
        "Received sticker: {sticker_id}, pkg: {package_id} kw: {} text: {text}",
        keywords.join(",")
    )
}

impl EventRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        responder: Arc<dyn PromptResponder>,
        messenger: Arc<dyn MessagingClient>,
        config: RouterConfig,
    ) -> Self {
        Self {
            responder,
            messenger,
            config: Arc::new(config),
        }
    }

    /// Spawns one task per decodable event.
    ///
    /// Events are independent: a malformed, slow or failing one does not
    /// hold up the others. The handles resolve to each event's outcome.
    pub fn dispatch(&self, payload: WebhookPayload) -> Vec<JoinHandle<EventOutcome>> {
        payload
            .into_events()
            .into_iter()
            .map(|event| {
                let router = self.clone();
                tokio::spawn(async move { router.route(event).await })
            })
            .collect()
    }

    /// Handles a single event to completion.
    #[instrument(
        skip_all,
        fields(event = event.kind(), user_id = event.source().and_then(Source::user_id))
    )]
    pub async fn route(&self, event: Event) -> EventOutcome {
        match event {
            Event::Message {
                reply_token,
                source,
                message,
            } => {
                let user_id = source.as_ref().and_then(Source::user_id);
                match message {
                    MessageContent::Text { text, .. } => {
                        self.handle_text(reply_token.as_deref(), user_id, &text)
                            .await
                    }
                    MessageContent::Sticker {
                        package_id,
                        sticker_id,
                        keywords,
                        text,
                        ..
                    } => {
                        let ack = sticker_ack(
                            &sticker_id,
                            &package_id,
                            &keywords,
                            text.as_deref().unwrap_or_default(),
                        );
                        self.deliver(reply_token.as_deref(), user_id, &ack).await
                    }
                    MessageContent::Image { id } => {
                        info!(message_id = %id, "image message received");
                        EventOutcome::Logged
                    }
                    MessageContent::Video { id } => {
                        info!(message_id = %id, "video message received");
                        EventOutcome::Logged
                    }
                    MessageContent::Other => {
                        info!("unsupported message type received");
                        EventOutcome::Logged
                    }
                }
            }
            Event::Postback { postback, .. } => {
                match serde_urlencoded::from_str::<Vec<(String, String)>>(&postback.data) {
                    Ok(pairs) => {
                        let values = |key: &str| {
                            pairs
                                .iter()
                                .filter(|(k, _)| k == key)
                                .map(|(_, v)| v.as_str())
                                .collect::<Vec<_>>()
                                .join(",")
                        };
                        info!(action = %values("action"), m_id = %values("m_id"), "postback received");
                    }
                    Err(e) => {
                        warn!(data = %postback.data, error = %e, "unparseable postback data");
                    }
                }
                EventOutcome::Logged
            }
            Event::Follow { .. } => {
                info!("followed");
                EventOutcome::Logged
            }
            Event::Beacon { beacon, .. } => {
                info!(hwid = %beacon.hwid, kind = beacon.kind.as_deref(), "beacon event");
                EventOutcome::Logged
            }
            Event::Unknown => {
                info!("unhandled event type");
                EventOutcome::Logged
            }
        }
    }

    async fn handle_text(
        &self,
        reply_token: Option<&str>,
        user_id: Option<&str>,
        text: &str,
    ) -> EventOutcome {
        let Some(user) = user_id.and_then(PlatformUserId::new) else {
            warn!("text message without a user id, skipping");
            return EventOutcome::Skipped;
        };
        let scope = UserScope::for_user(&self.config.scope_prefix, &user);

        let answer = tokio::time::timeout(
            self.config.request_timeout,
            self.responder.respond(&scope, text),
        )
        .await;
        let reply = match answer {
            Ok(Ok(reply)) => reply,
            Ok(Err(report)) => {
                warn!(scope = %scope, error = %report, "turn failed");
                report.current_context().user_message().to_string()
            }
            Err(_) => {
                warn!(
                    scope = %scope,
                    timeout_secs = self.config.request_timeout.as_secs(),
                    "turn timed out"
                );
                TIMEOUT_REPLY.to_string()
            }
        };

        self.deliver(reply_token, Some(user.as_str()), &reply).await
    }

    async fn deliver(
        &self,
        reply_token: Option<&str>,
        user_id: Option<&str>,
        text: &str,
    ) -> EventOutcome {
        if let Some(token) = reply_token {
            match self.messenger.reply(token, text).await {
                Ok(()) => return EventOutcome::Replied,
                Err(e) => warn!(error = %e, "reply failed"),
            }
        }

        let Some(to) = user_id else {
            error!("no way to deliver reply");
            return EventOutcome::DeliveryFailed;
        };
        match self.messenger.push(to, text).await {
            Ok(()) => EventOutcome::Pushed,
            Err(e) => {
                error!(error = %e, "push failed, reply dropped");
                EventOutcome::DeliveryFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagingError;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeResponder {
        calls: AtomicU32,
        scopes: Mutex<Vec<String>>,
        fail_with: Option<OrchestratorError>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl PromptResponder for FakeResponder {
        async fn respond(
            &self,
            scope: &UserScope,
            prompt: &str,
        ) -> Result<String, Report<OrchestratorError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scopes.lock().unwrap().push(scope.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail_with {
                Some(err) => Err(err.clone().into()),
                None => Ok(format!("echo: {prompt}")),
            }
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        fail_reply: bool,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingMessenger {
        fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingClient for RecordingMessenger {
        async fn reply(&self, reply_token: &str, text: &str) -> Result<(), MessagingError> {
            if self.fail_reply {
                return Err(MessagingError::Rejected {
                    status: 400,
                    detail: "Invalid reply token".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push(("reply".into(), reply_token.into(), text.into()));
            Ok(())
        }

        async fn push(&self, to: &str, text: &str) -> Result<(), MessagingError> {
            self.sent
                .lock()
                .unwrap()
                .push(("push".into(), to.into(), text.into()));
            Ok(())
        }
    }

    fn sent(kind: &str, target: &str, text: &str) -> (String, String, String) {
        (kind.to_string(), target.to_string(), text.to_string())
    }

    fn router(responder: Arc<FakeResponder>, messenger: Arc<RecordingMessenger>) -> EventRouter {
        EventRouter::new(
            responder,
            messenger,
            RouterConfig {
                scope_prefix: "accounting".into(),
                request_timeout: Duration::from_millis(200),
            },
        )
    }

    fn event(value: serde_json::Value) -> Event {
        serde_json::from_value(value).unwrap()
    }

    fn text_event(user: Option<&str>, text: &str) -> Event {
        let source = match user {
            Some(user) => json!({"type": "user", "userId": user}),
            None => json!({"type": "group", "groupId": "G1"}),
        };
        event(json!({
            "type": "message",
            "replyToken": "r-1",
            "source": source,
            "message": {"type": "text", "id": "m-1", "text": text}
        }))
    }

    #[tokio::test]
    async fn text_is_answered_by_responder() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());

        let outcome = router.route(text_event(Some("U1"), "lunch 50")).await;

        assert_eq!(outcome, EventOutcome::Replied);
        assert_eq!(*responder.scopes.lock().unwrap(), vec!["accounting/U1"]);
        assert_eq!(
            messenger.sent(),
            vec![sent("reply", "r-1", "echo: lunch 50")]
        );
    }

    #[tokio::test]
    async fn sticker_is_acknowledged_without_model() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());

        let outcome = router
            .route(event(json!({
                "type": "message",
                "replyToken": "r-2",
                "source": {"type": "user", "userId": "U1"},
                "message": {"type": "sticker", "id": "m", "packageId": "446", "stickerId": "1988",
                            "keywords": ["happy", "cony"], "text": "yay"}
            })))
            .await;

        assert_eq!(outcome, EventOutcome::Replied);
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            messenger.sent()[0].2,
            "Received sticker: 1988, pkg: 446 kw: happy,cony text: yay"
        );
    }

    #[tokio::test]
    async fn failed_reply_falls_back_to_push() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger {
            fail_reply: true,
            ..RecordingMessenger::default()
        });
        let router = router(responder, messenger.clone());

        let outcome = router.route(text_event(Some("U1"), "hi")).await;

        assert_eq!(outcome, EventOutcome::Pushed);
        assert_eq!(
            messenger.sent(),
            vec![sent("push", "U1", "echo: hi")]
        );
    }

    #[tokio::test]
    async fn missing_user_id_is_skipped() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());

        let outcome = router.route(text_event(None, "hi")).await;

        assert_eq!(outcome, EventOutcome::Skipped);
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn turn_errors_become_user_messages() {
        let failure = OrchestratorError::ModelUnavailable {
            reason: "HTTP 503".into(),
        };
        let responder = Arc::new(FakeResponder {
            fail_with: Some(failure.clone()),
            ..FakeResponder::default()
        });
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder, messenger.clone());

        router.route(text_event(Some("U1"), "hi")).await;

        assert_eq!(messenger.sent()[0].2, failure.user_message());
        assert!(!messenger.sent()[0].2.contains("503"));
    }

    #[tokio::test]
    async fn slow_turn_times_out() {
        let responder = Arc::new(FakeResponder {
            delay: Some(Duration::from_secs(5)),
            ..FakeResponder::default()
        });
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder, messenger.clone());

        router.route(text_event(Some("U1"), "hi")).await;

        assert_eq!(messenger.sent()[0].2, TIMEOUT_REPLY);
    }

    #[tokio::test]
    async fn other_events_are_only_logged() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());

        let events = [
            json!({"type": "message", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                   "message": {"type": "image", "id": "m-1"}}),
            json!({"type": "message", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                   "message": {"type": "video", "id": "m-2"}}),
            json!({"type": "postback", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                   "postback": {"data": "action=calc&m_id=7"}}),
            json!({"type": "follow", "replyToken": "r", "source": {"type": "user", "userId": "U1"}}),
            json!({"type": "beacon", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                   "beacon": {"hwid": "abc", "type": "enter"}}),
            json!({"type": "unfollow", "source": {"type": "user", "userId": "U1"}}),
        ];
        for value in events {
            assert_eq!(router.route(event(value)).await, EventOutcome::Logged);
        }

        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn dispatch_runs_every_event() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());
        let payload: WebhookPayload = serde_json::from_value(json!({
            "events": [
                {"type": "message", "replyToken": "r-a", "source": {"type": "user", "userId": "Ua"},
                 "message": {"type": "text", "id": "1", "text": "a"}},
                {"type": "message", "replyToken": "r-b", "source": {"type": "user", "userId": "Ub"},
                 "message": {"type": "text", "id": "2", "text": "b"}}
            ]
        }))
        .unwrap();

        let handles = router.dispatch(payload);
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(outcomes, vec![EventOutcome::Replied, EventOutcome::Replied]);
        assert_eq!(responder.calls.load(Ordering::SeqCst), 2);
        let mut scopes = responder.scopes.lock().unwrap().clone();
        scopes.sort();
        assert_eq!(scopes, vec!["accounting/Ua", "accounting/Ub"]);
    }

    #[tokio::test]
    async fn dispatch_skips_only_the_malformed_event() {
        let responder = Arc::new(FakeResponder::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let router = router(responder.clone(), messenger.clone());
        let payload: WebhookPayload = serde_json::from_value(json!({
            "events": [
                {"type": "message", "replyToken": "r-a", "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "text", "id": "1", "text": "lunch 50"}},
                {"type": "message", "replyToken": "r-b", "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "sticker", "id": "2", "packageId": "446"}}
            ]
        }))
        .unwrap();

        let handles = router.dispatch(payload);
        assert_eq!(handles.len(), 1);
        for handle in handles {
            assert_eq!(handle.await.unwrap(), EventOutcome::Replied);
        }

        assert_eq!(
            messenger.sent(),
            vec![sent("reply", "r-a", "echo: lunch 50")]
        );
    }
}
