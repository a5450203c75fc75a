//! Dialogue session
//!
//! One visitor conversation: the visible message list, the rolling turn
//! window sent to the completion service, the booking record and the UI
//! flags. Each visitor message runs one exchange:
//!
//! ```text
//! user text ─► completion client ─► reply
//!                                     │
//!        SlotExtractor(user, reply) ◄─┘
//!                 │
//!                 ▼
//!      BookingStateTracker ─► DialoguePolicy ─► follow-up prompt
//! ```
//!
//! `DialogueSession` has a single owner and takes `&mut self`. Share it
//! through [`SessionHandle`], which rejects overlapping sends.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};

use booking_assistant_config::{BusinessCatalog, SessionConfig, Settings};
use booking_assistant_core::{BookingField, BookingRecord, ConversationTurn, Message, Sender};
use booking_assistant_llm::{CompletionClient, PromptContext};

use crate::dst::{BookingStateTracker, FieldChange, SlotExtractor};
use crate::export::BookingSummary;
use crate::policy::{DialoguePolicy, PolicyDecision};
use crate::{AgentError, SessionError};

/// Phrases in an assistant reply that mean the booking went through
const CONFIRMATION_PHRASES: [&str; 5] = [
    "booking confirmed",
    "confirmation pdf",
    "booking complete",
    "reservation confirmed",
    "pdf has been generated",
];

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Session events for UI rendering
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAdded(Message),
    BookingUpdated {
        booking: BookingRecord,
        fields: Vec<BookingField>,
    },
    LoadingChanged(bool),
    Error(String),
    BookingConfirmed(BookingRecord),
    Cleared,
}

/// Result of one visitor message
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: Message,
    /// Canned prompt or completion message appended after the reply
    pub follow_up: Option<Message>,
    pub updated_fields: Vec<BookingField>,
    /// The reply confirmed the booking during this turn
    pub booking_confirmed: bool,
}

/// Serializable view of the session state
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub booking: BookingRecord,
    pub user_name: Option<String>,
    pub is_initialized: bool,
    pub auto_voice_mode: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub booking_confirmed: bool,
}

/// A single visitor's booking conversation
pub struct DialogueSession {
    config: SessionConfig,
    client: Arc<CompletionClient>,
    extractor: SlotExtractor,
    policy: DialoguePolicy,
    messages: Vec<Message>,
    /// Rolling window sent to the completion service
    turns: VecDeque<ConversationTurn>,
    tracker: BookingStateTracker,
    user_name: Option<String>,
    initialized: bool,
    auto_voice_mode: bool,
    auto_voice_initialized: bool,
    error: Option<String>,
    loading: bool,
    next_id: u64,
    user_turns: usize,
    /// Field the last follow-up asked for
    awaiting: Option<BookingField>,
    completion_announced: bool,
    booking_confirmed: bool,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl DialogueSession {
    pub fn new(client: Arc<CompletionClient>, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let tracker = BookingStateTracker::new(config.protect_manual_edits);
        Self {
            config,
            client,
            extractor: SlotExtractor::new(),
            policy: DialoguePolicy::new(),
            messages: Vec::new(),
            turns: VecDeque::new(),
            tracker,
            user_name: None,
            initialized: false,
            auto_voice_mode: false,
            auto_voice_initialized: false,
            error: None,
            loading: false,
            next_id: 0,
            user_turns: 0,
            awaiting: None,
            completion_announced: false,
            booking_confirmed: false,
            event_tx,
        }
    }

    /// Session wired from settings
    ///
    /// The catalog comes from `catalog_path` or the embedded copy. It feeds the
    /// system instruction and the extractor's city list. Without a credential
    /// the client is unavailable and sends fail fast.
    pub fn from_settings(settings: &Settings) -> Result<Self, AgentError> {
        let catalog = BusinessCatalog::load_or_builtin(settings.catalog_path.as_deref())?;
        let client = CompletionClient::from_settings(settings, &catalog)?;
        Ok(Self::new(Arc::new(client), settings.session.clone())
            .with_extractor(SlotExtractor::with_locations(catalog.cities())))
    }

    /// Use a custom extractor, e.g. one built from the catalog's cities
    pub fn with_extractor(mut self, extractor: SlotExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Append a message to the visible list and the rolling window
    pub fn add_message(&mut self, text: impl Into<String>, sender: Sender) -> Message {
        self.next_id += 1;
        let message = Message::new(format!("msg-{}", self.next_id), text, sender);

        self.messages.push(message.clone());
        self.turns.push_back(ConversationTurn::from(&message));
        while self.turns.len() > self.config.history_window.max(1) {
            self.turns.pop_front();
        }

        self.emit(SessionEvent::MessageAdded(message.clone()));
        message
    }

    /// Run one exchange for the visitor's text
    ///
    /// Blank input is ignored (`Ok(None)`). On failure the error is stored
    /// on the session and returned; messages and booking stay intact.
    pub async fn send_message(&mut self, text: &str) -> Result<Option<TurnOutcome>, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let context = PromptContext {
            is_first_message: self.messages.len() <= 1,
            needs_name: self.user_name.is_none(),
        };

        self.add_message(text, Sender::User);
        self.user_turns += 1;
        self.error = None;

        let history: Vec<ConversationTurn> = self.turns.iter().cloned().collect();
        let client = Arc::clone(&self.client);
        let user_name = self.user_name.clone();
        let result = {
            // Cleared on drop, including when this future is cancelled
            let _loading = Loading::start(&mut self.loading, &self.event_tx);
            client
                .generate_reply(&history, user_name.as_deref(), context)
                .await
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(error = %err, code = ?err.code, status = ?err.status, "Reply generation failed");
                self.error = Some(err.message.clone());
                self.emit(SessionEvent::Error(err.message.clone()));
                return Err(SessionError::Generation(err));
            },
        };

        let partial = self
            .extractor
            .extract_with_context(text, &reply, self.awaiting);
        let updated_fields = self.tracker.apply_extraction(&partial, self.user_turns);
        if updated_fields.contains(&BookingField::Name) {
            self.user_name = self.tracker.get(BookingField::Name).map(str::to_string);
        }
        if !updated_fields.is_empty() {
            self.emit_booking(updated_fields.clone());
        }

        let reply_message = self.add_message(reply.as_str(), Sender::Assistant);
        let follow_up = self.apply_policy(&reply);
        let booking_confirmed = self.detect_confirmation(&reply);

        Ok(Some(TurnOutcome {
            reply: reply_message,
            follow_up,
            updated_fields,
            booking_confirmed,
        }))
    }

    fn apply_policy(&mut self, reply: &str) -> Option<Message> {
        let record = self.tracker.record();
        self.awaiting = self.policy.pending_field(record);

        match self.policy.next_prompt(record, reply)? {
            PolicyDecision::Ask { field, prompt } => {
                tracing::debug!(slot = %field, "Appending follow-up prompt");
                Some(self.add_message(prompt, Sender::Assistant))
            },
            PolicyDecision::Complete { message } => {
                if self.completion_announced {
                    return None;
                }
                self.completion_announced = true;
                tracing::info!("All booking details collected");
                Some(self.add_message(message, Sender::Assistant))
            },
        }
    }

    fn detect_confirmation(&mut self, reply: &str) -> bool {
        if self.booking_confirmed {
            return false;
        }
        let lowered = reply.to_lowercase();
        if !CONFIRMATION_PHRASES.iter().any(|p| lowered.contains(p)) {
            return false;
        }

        self.booking_confirmed = true;
        tracing::info!(fields = self.tracker.record().len(), "Booking confirmed");
        self.emit(SessionEvent::BookingConfirmed(self.tracker.record().clone()));
        true
    }

    fn emit_booking(&self, fields: Vec<BookingField>) {
        self.emit(SessionEvent::BookingUpdated {
            booking: self.tracker.record().clone(),
            fields,
        });
    }

    /// Manual edit from the booking form; the last write wins
    pub fn update_booking_field(&mut self, field: BookingField, value: &str) -> bool {
        let changed = self.tracker.set_manual(field, value, self.user_turns);
        if field == BookingField::Name {
            let name = value.trim();
            self.user_name = (!name.is_empty()).then(|| name.to_string());
        }
        if changed {
            self.emit_booking(vec![field]);
        }
        changed
    }

    /// Reset to the state of a freshly created session
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.turns.clear();
        self.tracker.clear();
        self.user_name = None;
        self.initialized = false;
        self.auto_voice_initialized = false;
        self.error = None;
        self.loading = false;
        self.next_id = 0;
        self.user_turns = 0;
        self.awaiting = None;
        self.completion_announced = false;
        self.booking_confirmed = false;

        tracing::info!("Session cleared");
        self.emit(SessionEvent::Cleared);
    }

    /// Append the welcome message once
    pub fn initialize(&mut self) -> Option<Message> {
        if self.initialized || !self.messages.is_empty() {
            return None;
        }
        self.initialized = true;
        let welcome = self.config.welcome_message.clone();
        Some(self.add_message(welcome, Sender::Assistant))
    }

    /// Initialize only when auto-voice mode is on
    pub fn initialize_auto_voice(&mut self) -> Option<Message> {
        if !self.auto_voice_mode || self.auto_voice_initialized {
            return None;
        }
        self.auto_voice_initialized = true;
        self.initialize()
    }

    pub fn toggle_auto_voice_mode(&mut self) -> bool {
        self.auto_voice_mode = !self.auto_voice_mode;
        tracing::debug!(enabled = self.auto_voice_mode, "Auto voice mode toggled");
        self.auto_voice_mode
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn export_booking(&self) -> BookingSummary {
        BookingSummary::from_record(self.tracker.record())
    }

    pub fn extractor(&self) -> &SlotExtractor {
        &self.extractor
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn booking(&self) -> &BookingRecord {
        self.tracker.record()
    }

    pub fn booking_history(&self) -> &[FieldChange] {
        self.tracker.history()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn auto_voice_mode(&self) -> bool {
        self.auto_voice_mode
    }

    pub fn awaiting_field(&self) -> Option<BookingField> {
        self.awaiting
    }

    pub fn is_booking_confirmed(&self) -> bool {
        self.booking_confirmed
    }

    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            booking: self.tracker.record().clone(),
            user_name: self.user_name.clone(),
            is_initialized: self.initialized,
            auto_voice_mode: self.auto_voice_mode,
            is_loading: self.loading,
            error: self.error.clone(),
            booking_confirmed: self.booking_confirmed,
        }
    }
}

/// Holds the loading flag for the duration of a completion call
struct Loading<'a> {
    flag: &'a mut bool,
    events: &'a broadcast::Sender<SessionEvent>,
}

impl<'a> Loading<'a> {
    fn start(flag: &'a mut bool, events: &'a broadcast::Sender<SessionEvent>) -> Self {
        *flag = true;
        let _ = events.send(SessionEvent::LoadingChanged(true));
        Self { flag, events }
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        *self.flag = false;
        let _ = self.events.send(SessionEvent::LoadingChanged(false));
    }
}

/// Clears the in-flight flag when a send finishes or is cancelled
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared owner of a [`DialogueSession`]
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<DialogueSession>>,
    sending: Arc<AtomicBool>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn new(session: DialogueSession) -> Self {
        let event_tx = session.event_tx.clone();
        Self {
            inner: Arc::new(Mutex::new(session)),
            sending: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    /// Send a visitor message; fails with [`SessionError::Busy`] while another is outstanding
    pub async fn send_message(&self, text: &str) -> Result<Option<TurnOutcome>, SessionError> {
        if self.sending.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy);
        }
        let _in_flight = InFlight(&self.sending);

        let mut session = self.inner.lock().await;
        session.send_message(text).await
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Exclusive access for the other session operations
    pub async fn lock(&self) -> MutexGuard<'_, DialogueSession> {
        self.inner.lock().await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_assistant_llm::SystemPromptBuilder;

    fn offline_session() -> DialogueSession {
        let prompt = SystemPromptBuilder::new(&BusinessCatalog::builtin().unwrap());
        DialogueSession::new(
            Arc::new(CompletionClient::unavailable(prompt)),
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_initialize_once() {
        let mut session = offline_session();
        let welcome = session.initialize().unwrap();
        assert_eq!(welcome.id, "msg-1");
        assert!(welcome.text.contains("Welcome to SkyJumper"));
        assert!(session.initialize().is_none());
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_from_settings_reads_catalog_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            r#"business_name: SkyJumper Test
locations:
  - id: mys-1
    name: SkyJumper Mysuru
    city: Mysuru
    address: Ring Road
    phone: "0821-000000"
    capacity: 80
"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.catalog_path = Some(path.display().to_string());
        settings.session.welcome_message = "Hi from Mysuru!".to_string();

        let mut session = DialogueSession::from_settings(&settings).unwrap();
        assert_eq!(session.extractor().locations(), &["mysuru".to_string()]);
        assert_eq!(session.initialize().unwrap().text, "Hi from Mysuru!");
    }

    #[test]
    fn test_from_settings_without_catalog_path_uses_builtin() {
        let session = DialogueSession::from_settings(&Settings::default()).unwrap();
        let builtin = BusinessCatalog::builtin().unwrap();
        assert_eq!(session.extractor().locations(), builtin.cities().as_slice());
    }

    #[test]
    fn test_from_settings_missing_catalog_fails() {
        let mut settings = Settings::default();
        settings.catalog_path = Some("/nonexistent/catalog.yaml".to_string());
        assert!(matches!(
            DialogueSession::from_settings(&settings),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_auto_voice_initialize_requires_mode() {
        let mut session = offline_session();
        assert!(session.initialize_auto_voice().is_none());
        assert!(!session.is_initialized());

        assert!(session.toggle_auto_voice_mode());
        assert!(session.initialize_auto_voice().is_some());
        assert!(session.initialize_auto_voice().is_none());
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_clear_then_initialize_matches_fresh_session() {
        let mut fresh = offline_session();
        fresh.initialize();

        let mut used = offline_session();
        used.initialize();
        used.add_message("Rajat Shukla", Sender::User);
        used.update_booking_field(BookingField::Name, "Rajat Shukla");
        used.update_booking_field(BookingField::Location, "Pune");
        used.clear_messages();
        used.initialize();

        let (a, b) = (fresh.snapshot(), used.snapshot());
        let texts = |s: &SessionSnapshot| {
            s.messages
                .iter()
                .map(|m| (m.id.clone(), m.text.clone(), m.sender))
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(&a), texts(&b));
        assert_eq!(a.booking, b.booking);
        assert_eq!(a.user_name, b.user_name);
        assert_eq!(a.is_initialized, b.is_initialized);
        assert_eq!(a.error, b.error);
        assert!(used.booking_history().is_empty());
        assert_eq!(used.turns().count(), 1);
    }

    #[test]
    fn test_manual_name_edit_sets_user_name() {
        let mut session = offline_session();
        assert!(session.update_booking_field(BookingField::Name, "Priya"));
        assert_eq!(session.user_name(), Some("Priya"));
        assert_eq!(session.booking().get(BookingField::Name), Some("Priya"));
        assert!(!session.update_booking_field(BookingField::Name, "Priya"));
    }

    #[test]
    fn test_turn_window_is_bounded() {
        let prompt = SystemPromptBuilder::new(&BusinessCatalog::builtin().unwrap());
        let config = SessionConfig {
            history_window: 3,
            ..SessionConfig::default()
        };
        let mut session = DialogueSession::new(Arc::new(CompletionClient::unavailable(prompt)), config);
        for i in 0..5 {
            session.add_message(format!("message {}", i), Sender::User);
        }
        let turns: Vec<_> = session.turns().map(|t| t.content.clone()).collect();
        assert_eq!(turns, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(session.messages().len(), 5);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut session = offline_session();
        assert!(session.send_message("   ").await.unwrap().is_none());
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_client_stores_error() {
        let mut session = offline_session();
        session.initialize();
        session.update_booking_field(BookingField::Location, "Pune");

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert!(!session.error().unwrap().is_empty());
        assert!(!session.is_loading());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.booking().get(BookingField::Location), Some("Pune"));

        session.clear_error();
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let mut session = offline_session();
        let mut events = session.subscribe();
        session.initialize();
        session.clear_messages();

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::MessageAdded(_)));
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Cleared));
    }
}
