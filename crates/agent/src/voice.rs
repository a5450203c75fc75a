//! Voice controller
//!
//! Turn-taking over a platform [`SpeechCapability`]:
//! - synthesis and recognition are mutually exclusive, starting one stops the other
//! - stopping either is a no-op when idle
//! - continuous recognition commits the accumulated final transcript after a
//!   quiet period
//!
//! Assistant replies are cleaned with [`speakable_text`] before synthesis.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use booking_assistant_config::VoiceConfig;
use booking_assistant_core::{
    ListenMode, RecognitionEvent, SpeechCapability, SpeechError, SpeechErrorKind, SpeechSettings,
};

use crate::AgentError;

const TRANSCRIPT_CHANNEL_CAPACITY: usize = 32;

/// Transcript updates delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Interim(String),
    Final(String),
    /// Accumulated final transcript committed after the quiet period
    Silence(String),
    Error(String),
    Ended,
}

#[derive(Debug)]
struct VoiceState {
    listening: bool,
    continuous: bool,
    speaker_on: bool,
    error: Option<String>,
}

pub struct VoiceController {
    speech: Arc<dyn SpeechCapability>,
    settings: SpeechSettings,
    enabled: bool,
    silence_timeout: Duration,
    state: Arc<Mutex<VoiceState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl VoiceController {
    pub fn new(speech: Arc<dyn SpeechCapability>, config: &VoiceConfig) -> Self {
        Self {
            speech,
            settings: SpeechSettings {
                rate: config.rate,
                pitch: config.pitch,
                volume: config.volume,
                language: config.language.clone(),
                voice: config.voice.clone(),
            },
            enabled: config.enabled,
            silence_timeout: Duration::from_millis(config.silence_timeout_ms),
            state: Arc::new(Mutex::new(VoiceState {
                listening: false,
                continuous: false,
                speaker_on: config.auto_play,
                error: None,
            })),
            listener: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_speaking()
    }

    pub fn is_listening(&self) -> bool {
        self.state.lock().listening
    }

    pub fn is_continuous_listening(&self) -> bool {
        let state = self.state.lock();
        state.listening && state.continuous
    }

    pub fn is_speaker_on(&self) -> bool {
        self.state.lock().speaker_on
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    /// Speak an assistant reply; resolves when the utterance finishes
    ///
    /// Skipped when the speaker is off or another utterance is playing.
    pub async fn speak(&self, text: &str) -> Result<(), AgentError> {
        if !self.is_speaker_on() {
            return Ok(());
        }
        if !self.speech.is_synthesis_supported() {
            return Err(SpeechError::Unsupported("Speech synthesis").into());
        }

        let spoken = speakable_text(text);
        if spoken.is_empty() {
            return Ok(());
        }

        if self.is_listening() {
            self.stop_listening().await;
        }
        if self.speech.is_speaking() {
            tracing::debug!("Already speaking, skipping utterance");
            return Ok(());
        }

        if let Err(e) = self.speech.speak(&spoken, &self.settings).await {
            tracing::warn!(error = %e, "Speech synthesis failed");
            self.state.lock().error = Some(e.to_string());
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn stop_speaking(&self) {
        if self.speech.is_speaking() {
            self.speech.stop_speaking().await;
        }
    }

    /// Flip the speaker; turning it off stops the current utterance
    pub async fn toggle_speaker(&self) -> bool {
        let on = {
            let mut state = self.state.lock();
            state.speaker_on = !state.speaker_on;
            state.speaker_on
        };
        if !on {
            self.stop_speaking().await;
        }
        on
    }

    /// Listen for a single utterance
    pub async fn start_listening(&self) -> Result<mpsc::Receiver<TranscriptEvent>, AgentError> {
        let events = self.begin_listening(ListenMode::OneShot).await?;
        Ok(self.spawn_listener(events, None))
    }

    /// Listen until stopped, committing the transcript after each quiet period
    pub async fn start_continuous_listening(
        &self,
    ) -> Result<mpsc::Receiver<TranscriptEvent>, AgentError> {
        let events = self.begin_listening(ListenMode::Continuous).await?;
        Ok(self.spawn_listener(events, Some(self.silence_timeout)))
    }

    pub async fn stop_listening(&self) {
        let was_listening = {
            let mut state = self.state.lock();
            let was = state.listening;
            state.listening = false;
            state.continuous = false;
            was
        };

        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            handle.abort();
        }
        if was_listening {
            self.speech.stop_listening().await;
        }
    }

    /// Stop continuous recognition, discarding any uncommitted transcript
    pub async fn stop_continuous_listening(&self) {
        if self.is_continuous_listening() {
            self.stop_listening().await;
        }
    }

    async fn begin_listening(
        &self,
        mode: ListenMode,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, AgentError> {
        if !self.enabled {
            return Err(AgentError::VoiceDisabled);
        }
        if !self.speech.is_recognition_supported() {
            return Err(SpeechError::Unsupported("Speech recognition").into());
        }

        {
            let mut state = self.state.lock();
            if state.listening {
                return Err(AgentError::AlreadyListening);
            }
            state.listening = true;
            state.continuous = mode == ListenMode::Continuous;
            state.error = None;
        }

        match self.open_recognition(mode).await {
            Ok(events) => {
                tracing::debug!(mode = ?mode, "Listening started");
                Ok(events)
            },
            Err(e) => {
                let mut state = self.state.lock();
                state.listening = false;
                state.continuous = false;
                state.error = Some(e.to_string());
                Err(e.into())
            },
        }
    }

    async fn open_recognition(
        &self,
        mode: ListenMode,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, SpeechError> {
        let allowed = self.speech.check_microphone_permission().await
            || self.speech.request_microphone_permission().await;
        if !allowed {
            return Err(SpeechError::Recognition(SpeechErrorKind::NotAllowed));
        }

        if self.speech.is_speaking() {
            self.speech.stop_speaking().await;
        }
        self.speech.start_listening(mode, &self.settings.language).await
    }

    fn spawn_listener(
        &self,
        events: mpsc::Receiver<RecognitionEvent>,
        silence: Option<Duration>,
    ) -> mpsc::Receiver<TranscriptEvent> {
        let (tx, rx) = mpsc::channel(TRANSCRIPT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(run_listener(events, tx, self.state.clone(), silence));
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
        rx
    }
}

async fn run_listener(
    mut events: mpsc::Receiver<RecognitionEvent>,
    tx: mpsc::Sender<TranscriptEvent>,
    state: Arc<Mutex<VoiceState>>,
    silence: Option<Duration>,
) {
    let mut transcript = String::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let quiet = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outgoing = tokio::select! {
            event = events.recv() => match event {
                Some(RecognitionEvent::Result { transcript: text, is_final }) => {
                    if let Some(timeout) = silence {
                        deadline = Some(Instant::now() + timeout);
                    }
                    if is_final {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            if !transcript.is_empty() {
                                transcript.push(' ');
                            }
                            transcript.push_str(&text);
                        }
                        TranscriptEvent::Final(text)
                    } else {
                        TranscriptEvent::Interim(text)
                    }
                },
                Some(RecognitionEvent::Error(kind)) => {
                    tracing::warn!(error = ?kind, "Speech recognition error");
                    let message = kind.user_message();
                    let mut s = state.lock();
                    s.listening = false;
                    s.continuous = false;
                    s.error = Some(message.clone());
                    TranscriptEvent::Error(message)
                },
                Some(RecognitionEvent::Ended) | None => {
                    if silence.is_some() && !transcript.is_empty() {
                        let _ = tx.send(TranscriptEvent::Silence(std::mem::take(&mut transcript))).await;
                    }
                    let mut s = state.lock();
                    s.listening = false;
                    s.continuous = false;
                    TranscriptEvent::Ended
                },
            },
            _ = quiet => {
                deadline = None;
                if transcript.is_empty() {
                    continue;
                }
                tracing::debug!(chars = transcript.len(), "Silence detected, committing transcript");
                TranscriptEvent::Silence(std::mem::take(&mut transcript))
            },
        };

        let done = matches!(outgoing, TranscriptEvent::Error(_) | TranscriptEvent::Ended);
        if tx.send(outgoing).await.is_err() || done {
            break;
        }
    }
}

// =============================================================================
// SPEAKABLE TEXT
// =============================================================================

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]*`").unwrap());
static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").unwrap());
static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9-]+\.(?:com|org|net|in|io|co|edu|gov|ai|app|dev)\b\S*").unwrap()
});
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(?:[a-zA-Z]+|#\d+);").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#+[ \t]*").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*•]|\d+\.)[ \t]+").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~]+)~~").unwrap());
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{1F300}-\x{1FAFF}\x{2600}-\x{27BF}\x{FE0F}]").unwrap()
});
static UNSPEAKABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.,!?'\-:/+%]").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^.!?:,\s])[ \t]*\n+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Plain sentence text suitable for speech synthesis
///
/// Drops code, links, addresses, markup and emoji; unwraps emphasis; turns
/// list lines into sentences.
pub fn speakable_text(text: &str) -> String {
    let mut out = CODE_BLOCK.replace_all(text, " ").into_owned();
    for (pattern, replacement) in [
        (&*INLINE_CODE, " "),
        (&*MARKDOWN_LINK, "$1"),
        (&*URL, ""),
        (&*EMAIL, ""),
        (&*DOMAIN, ""),
        (&*HTML_TAG, ""),
        (&*HTML_ENTITY, " "),
        (&*HEADING, ""),
        (&*BULLET, ""),
        (&*BOLD, "$1"),
        (&*ITALIC, "$1"),
        (&*STRIKE, "$1"),
        (&*EMOJI, ""),
    ] {
        out = pattern.replace_all(&out, replacement).into_owned();
    }

    let out = out
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace('\u{2026}', "...")
        .replace('₹', "Rs ");

    let out = UNSPEAKABLE.replace_all(&out, " ");
    let out = LINE_BREAK.replace_all(&out, "$1. ");
    WHITESPACE.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockSpeech {
        speaking: AtomicBool,
        deny_microphone: bool,
        spoken: Mutex<Vec<String>>,
        calls: Mutex<Vec<&'static str>>,
        recognition: Mutex<Option<mpsc::Sender<RecognitionEvent>>>,
    }

    impl MockSpeech {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }

        async fn push(&self, event: RecognitionEvent) {
            let sender = self.recognition.lock().clone();
            sender.unwrap().send(event).await.unwrap();
        }
    }

    #[async_trait]
    impl SpeechCapability for MockSpeech {
        async fn speak(&self, text: &str, _settings: &SpeechSettings) -> Result<(), SpeechError> {
            self.calls.lock().push("speak");
            self.spoken.lock().push(text.to_string());
            Ok(())
        }

        async fn stop_speaking(&self) {
            self.calls.lock().push("stop_speaking");
            self.speaking.store(false, Ordering::SeqCst);
        }

        fn is_speaking(&self) -> bool {
            self.speaking.load(Ordering::SeqCst)
        }

        async fn start_listening(
            &self,
            _mode: ListenMode,
            _language: &str,
        ) -> Result<mpsc::Receiver<RecognitionEvent>, SpeechError> {
            self.calls.lock().push("start_listening");
            let (tx, rx) = mpsc::channel(16);
            *self.recognition.lock() = Some(tx);
            Ok(rx)
        }

        async fn stop_listening(&self) {
            self.calls.lock().push("stop_listening");
            self.recognition.lock().take();
        }

        fn is_synthesis_supported(&self) -> bool {
            true
        }

        fn is_recognition_supported(&self) -> bool {
            true
        }

        async fn check_microphone_permission(&self) -> bool {
            !self.deny_microphone
        }

        async fn request_microphone_permission(&self) -> bool {
            !self.deny_microphone
        }
    }

    fn controller(speech: Arc<MockSpeech>) -> VoiceController {
        VoiceController::new(speech, &VoiceConfig::default())
    }

    #[tokio::test]
    async fn test_speaking_stops_listening() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());

        let _rx = voice.start_listening().await.unwrap();
        assert!(voice.is_listening());

        voice.speak("Hello there").await.unwrap();
        assert!(!voice.is_listening());
        assert_eq!(speech.calls(), vec!["start_listening", "stop_listening", "speak"]);
        assert_eq!(speech.spoken.lock().clone(), vec!["Hello there".to_string()]);
    }

    #[tokio::test]
    async fn test_listening_stops_speech() {
        let speech = Arc::new(MockSpeech::default());
        speech.speaking.store(true, Ordering::SeqCst);
        let voice = controller(speech.clone());

        let _rx = voice.start_listening().await.unwrap();
        assert_eq!(speech.calls(), vec!["stop_speaking", "start_listening"]);
        assert!(!voice.is_speaking());
    }

    #[tokio::test]
    async fn test_stop_is_noop_when_idle() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());

        voice.stop_listening().await;
        voice.stop_speaking().await;
        voice.stop_continuous_listening().await;
        assert!(speech.calls().is_empty());
    }

    #[tokio::test]
    async fn test_speaker_off_skips_speech() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());

        assert!(!voice.toggle_speaker().await);
        voice.speak("Hello").await.unwrap();
        assert!(speech.spoken.lock().is_empty());
    }

    #[tokio::test]
    async fn test_denied_microphone_sets_error() {
        let speech = Arc::new(MockSpeech {
            deny_microphone: true,
            ..Default::default()
        });
        let voice = controller(speech);

        let err = voice.start_listening().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Speech(SpeechError::Recognition(SpeechErrorKind::NotAllowed))
        ));
        assert!(voice.error().unwrap().contains("Microphone access denied"));
        assert!(!voice.is_listening());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech);

        let _rx = voice.start_listening().await.unwrap();
        assert!(matches!(
            voice.start_continuous_listening().await,
            Err(AgentError::AlreadyListening)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_commits_accumulated_transcript() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());
        let mut rx = voice.start_continuous_listening().await.unwrap();

        speech
            .push(RecognitionEvent::Result {
                transcript: "book a party".to_string(),
                is_final: true,
            })
            .await;
        speech
            .push(RecognitionEvent::Result {
                transcript: "for ten kids".to_string(),
                is_final: true,
            })
            .await;

        assert_eq!(rx.recv().await, Some(TranscriptEvent::Final("book a party".to_string())));
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Final("for ten kids".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(TranscriptEvent::Silence("book a party for ten kids".to_string()))
        );
        assert!(voice.is_continuous_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interim_result_resets_silence_timer() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());
        let mut rx = voice.start_continuous_listening().await.unwrap();

        speech
            .push(RecognitionEvent::Result {
                transcript: "hello".to_string(),
                is_final: true,
            })
            .await;
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Final("hello".to_string())));

        tokio::time::sleep(Duration::from_secs(4)).await;
        speech
            .push(RecognitionEvent::Result {
                transcript: "wor".to_string(),
                is_final: false,
            })
            .await;
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Interim("wor".to_string())));

        let start = Instant::now();
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Silence("hello".to_string())));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_recognition_error_is_reported() {
        let speech = Arc::new(MockSpeech::default());
        let voice = controller(speech.clone());
        let mut rx = voice.start_listening().await.unwrap();

        speech.push(RecognitionEvent::Error(SpeechErrorKind::NoSpeech)).await;
        let expected = SpeechErrorKind::NoSpeech.user_message();
        assert_eq!(rx.recv().await, Some(TranscriptEvent::Error(expected.clone())));
        assert_eq!(voice.error(), Some(expected));
        assert!(!voice.is_listening());
    }

    #[test]
    fn test_speakable_text_strips_markup_and_links() {
        let text = "**Great!** Visit https://skyjumper.in or [our site](https://x.io) for more 🎉";
        assert_eq!(speakable_text(text), "Great! Visit or our site for more");
    }

    #[test]
    fn test_speakable_text_turns_lists_into_sentences() {
        let text = "Here are options:\n- Pune – ₹2,999\n- Noida";
        assert_eq!(speakable_text(text), "Here are options: Pune - Rs 2,999. Noida");
    }

    #[test]
    fn test_speakable_text_drops_code_and_emails() {
        let text = "Write to `bookings` at help@skyjumper.com ```let x = 1;``` thanks";
        assert_eq!(speakable_text(text), "Write to at thanks");
    }
}
