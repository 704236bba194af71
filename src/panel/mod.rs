//! Chat panel controller.
//!
//! Owns the message history of one chat panel and at most one active
//! stream. Sending while a stream is active cancels that stream and does
//! not start a new one. History is append-only; the assistant message of
//! the active stream is the only one whose content changes.

use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::prompt;
use crate::services::{ChatService, StreamHandler, StreamOutcome};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The advisor.
    User,
    /// The assistant.
    Assistant,
}

/// Lifecycle of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Content is still arriving.
    Streaming,
    /// Content is final.
    Complete,
    /// The stream was cancelled; content is whatever arrived before.
    Cancelled,
    /// The stream failed.
    Failed,
}

/// One entry in the panel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Time-ordered unique identifier.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Lifecycle status.
    pub status: MessageStatus,
}

impl ChatMessage {
    fn new(role: Role, content: String, status: MessageStatus) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            content,
            status,
        }
    }
}

/// Result of [`ChatPanel::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The input was blank; nothing happened.
    Ignored,
    /// A stream was active; it was cancelled and no new one started.
    CancelledActive,
    /// The answer streamed to completion.
    Completed,
    /// This send's stream was cancelled before it finished.
    Cancelled,
    /// The stream failed; the message is meant for a notification.
    Failed(String),
}

#[derive(Debug, Default)]
struct PanelState {
    messages: Vec<ChatMessage>,
    active: Option<ActiveStream>,
}

/// The stream currently owned by a pending `send`.
#[derive(Debug)]
struct ActiveStream {
    token: CancellationToken,
    message_id: String,
}

/// Controller behind one chat panel.
#[derive(Debug)]
pub struct ChatPanel {
    chat: ChatService,
    state: Mutex<PanelState>,
}

impl ChatPanel {
    /// Creates a panel with its own backend session.
    pub fn new(chat: &ChatService) -> Self {
        Self {
            chat: chat.with_session(Uuid::new_v4().to_string()),
            state: Mutex::new(PanelState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        lock_state(&self.state)
    }

    /// Sends `text` from the screen at `path` and waits for the answer.
    ///
    /// Deltas are applied to the new assistant message as they arrive, so
    /// [`messages`](Self::messages) shows partial content while this call
    /// is pending.
    pub async fn send(&self, text: &str, path: &str) -> SendOutcome {
        let text = text.trim();

        let (token, message_id) = {
            let mut state = self.lock();
            if let Some(active) = &state.active {
                tracing::debug!("Send while streaming, cancelling the active stream");
                active.token.cancel();
                return SendOutcome::CancelledActive;
            }
            if text.is_empty() {
                return SendOutcome::Ignored;
            }

            state
                .messages
                .push(ChatMessage::new(Role::User, text.to_string(), MessageStatus::Complete));
            let reply = ChatMessage::new(Role::Assistant, String::new(), MessageStatus::Streaming);
            let message_id = reply.id.clone();
            state.messages.push(reply);

            let token = CancellationToken::new();
            state.active = Some(ActiveStream {
                token: token.clone(),
                message_id: message_id.clone(),
            });
            (token, message_id)
        };

        // Released on every exit, including when this future is dropped.
        let guard = ActiveGuard {
            state: &self.state,
            token: token.clone(),
            message_id: message_id.clone(),
        };
        let mut sink = PanelSink {
            state: &self.state,
            message_id,
        };
        let outcome = self.chat.stream_chat(text, path, &token, &mut sink).await;
        drop(guard);

        match outcome {
            StreamOutcome::Completed { .. } => SendOutcome::Completed,
            StreamOutcome::Cancelled { .. } => SendOutcome::Cancelled,
            StreamOutcome::Failed { message } => SendOutcome::Failed(message),
        }
    }

    /// Cancels the active stream. Returns false if none was active.
    pub fn cancel(&self) -> bool {
        match &self.lock().active {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns true while a stream is active.
    pub fn is_streaming(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Returns a snapshot of the history in insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    /// Suggested prompts for the screen at `path`.
    pub fn suggestions(&self, path: &str) -> &'static [&'static str] {
        prompt::suggestions(path)
    }
}

fn lock_state(state: &Mutex<PanelState>) -> MutexGuard<'_, PanelState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Frees the active slot of one `send`.
///
/// Dropping an unfinished `send` cancels its stream and marks the assistant
/// message cancelled, so the panel accepts the next message.
struct ActiveGuard<'a> {
    state: &'a Mutex<PanelState>,
    token: CancellationToken,
    message_id: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.token.cancel();

        let mut state = lock_state(self.state);
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.message_id == self.message_id)
        {
            state.active = None;
        }
        if let Some(message) = state
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == self.message_id && m.status == MessageStatus::Streaming)
        {
            tracing::debug!("Send abandoned mid-stream, marking the answer cancelled");
            message.status = MessageStatus::Cancelled;
        }
    }
}

/// Applies stream events to one assistant message.
struct PanelSink<'a> {
    state: &'a Mutex<PanelState>,
    message_id: String,
}

impl PanelSink<'_> {
    fn update(&self, apply: impl FnOnce(&mut ChatMessage)) {
        let mut state = lock_state(self.state);
        if let Some(message) = state
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == self.message_id)
        {
            apply(message);
        }
    }
}

impl StreamHandler for PanelSink<'_> {
    fn on_delta(&mut self, text: &str) {
        self.update(|message| message.content.push_str(text));
    }

    fn on_done(&mut self) {
        let cancelled = lock_state(self.state)
            .active
            .as_ref()
            .is_some_and(|active| active.token.is_cancelled());
        self.update(|message| {
            message.status = if cancelled {
                MessageStatus::Cancelled
            } else {
                MessageStatus::Complete
            };
        });
    }

    fn on_error(&mut self, _message: &str) {
        self.update(|message| message.status = MessageStatus::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use crate::config::ChatConfig;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use crate::observability::Observability;
    use crate::transport::HttpTransport;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn panel(transport: &Arc<MockTransport>, api_key: &str) -> ChatPanel {
        let config = ChatConfig::builder().api_key(api_key).build().unwrap();
        let chat = ChatService::new(
            Arc::clone(transport) as Arc<dyn HttpTransport>,
            Arc::new(ApiKeyAuth::from_string(api_key)),
            Arc::new(config),
            Observability::silent(),
        );
        ChatPanel::new(&chat)
    }

    async fn wait_for(panel: &ChatPanel, condition: impl Fn(&[ChatMessage]) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(panel.messages().as_slice()) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_send_appends_user_and_assistant() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream_split(&fixtures::stream_body(&["Hallo", " Welt"]), 4));
        let panel = panel(&transport, "k");

        let outcome = panel.send("  Wie geht's? ", "/customers").await;

        assert_eq!(outcome, SendOutcome::Completed);
        let messages = panel.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Wie geht's?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hallo Welt");
        assert_eq!(messages[1].status, MessageStatus::Complete);
        assert_ne!(messages[0].id, messages[1].id);
        assert!(!panel.is_streaming());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        let panel = panel(&transport, "k");

        assert_eq!(panel.send("   ", "/").await, SendOutcome::Ignored);
        assert!(panel.messages().is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_send_while_streaming_cancels_and_returns() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("first", false)]).then_pending());
        let panel = Arc::new(panel(&transport, "k"));

        let first = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.send("erste Frage", "/").await }
        });
        wait_for(&panel, |m| m.len() == 2 && m[1].content == "first").await;
        assert!(panel.is_streaming());

        let second = panel.send("zweite Frage", "/").await;

        assert_eq!(second, SendOutcome::CancelledActive);
        assert_eq!(first.await.unwrap(), SendOutcome::Cancelled);
        let messages = panel.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].status, MessageStatus::Cancelled);
        assert_eq!(transport.request_count(), 1);
        assert!(!panel.is_streaming());
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_answer() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("Teil", false)]).then_pending());
        let panel = Arc::new(panel(&transport, "k"));
        assert!(!panel.cancel());

        let pending = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.send("Frage", "/claims").await }
        });
        wait_for(&panel, |m| m.len() == 2 && m[1].content == "Teil").await;

        assert!(panel.cancel());
        assert_eq!(pending.await.unwrap(), SendOutcome::Cancelled);
        assert_eq!(panel.messages()[1].content, "Teil");
    }

    #[tokio::test]
    async fn test_failure_resets_streaming_state() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(401, "No valid api key found.");
        transport.queue(MockResponse::stream([fixtures::stream_body(&["ok"])]));
        let panel = panel(&transport, "k");

        let message = match panel.send("Frage", "/").await {
            SendOutcome::Failed(message) => message,
            other => panic!("expected failure, got {other:?}"),
        };
        assert!(message.contains("Invalid API key"));
        assert!(!panel.is_streaming());
        assert_eq!(panel.messages()[1].status, MessageStatus::Failed);

        assert_eq!(panel.send("Nochmal", "/").await, SendOutcome::Completed);
        assert_eq!(panel.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_unconfigured_panel_never_calls_backend() {
        let transport = Arc::new(MockTransport::new());
        let panel = panel(&transport, "");

        let outcome = panel.send("Hallo", "/").await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_requests_share_one_session() {
        let transport = Arc::new(MockTransport::new());
        transport.set_default(MockResponse::stream([fixtures::stream_body(&["ok"])]));
        let panel = panel(&transport, "k");

        panel.send("eins", "/").await;
        panel.send("zwei", "/").await;

        let sessions: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.json().unwrap()["sessionId"].clone())
            .collect();
        assert!(sessions[0].is_string());
        assert_eq!(sessions[0], sessions[1]);
    }

    #[tokio::test]
    async fn test_send_abandoned_by_timeout_frees_panel() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("first", false)]).then_pending());
        let panel = panel(&transport, "k");

        let timed_out = tokio::time::timeout(Duration::from_millis(50), panel.send("a", "/")).await;

        assert!(timed_out.is_err());
        assert!(!panel.is_streaming());
        let messages = panel.messages();
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[1].status, MessageStatus::Cancelled);

        transport.queue(MockResponse::stream([fixtures::stream_body(&["second"])]));
        assert_eq!(panel.send("b", "/").await, SendOutcome::Completed);
        let messages = panel.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].content, "second");
        assert_eq!(messages[3].status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn test_aborted_send_frees_panel() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("Teil", false)]).then_pending());
        let panel = Arc::new(panel(&transport, "k"));

        let pending = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.send("Frage", "/").await }
        });
        wait_for(&panel, |m| m.len() == 2 && m[1].content == "Teil").await;
        assert!(panel.is_streaming());

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        assert!(!panel.is_streaming());
        assert!(!panel.cancel());
        assert_eq!(panel.messages()[1].status, MessageStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_broken_stream_resets_streaming_state() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("x", false)]).then_error("reset"));
        let panel = panel(&transport, "k");

        let outcome = panel.send("Frage", "/").await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(!panel.is_streaming());
        assert_eq!(panel.messages()[1].status, MessageStatus::Failed);
    }

    #[test]
    fn test_suggestions_follow_context() {
        let transport = Arc::new(MockTransport::new());
        let panel = panel(&transport, "k");

        assert!(panel.suggestions("/commissions")[0].contains("commission"));
    }
}
