use chrono::{DateTime, TimeZone};

use crate::api::gemini::translation_prompt;
use crate::api::{ConversationHistory, GeminiClient};
use crate::config::Config;
use crate::handlers::{self, format_short_date, format_time, WeatherProvider};
use crate::language::{canonical_language, display_name};
use crate::presenter::{InfoPanel, Presenter};
use crate::response::{placeholder_image, AssistantResponse, ConversationLog, Feedback, Sender};
use crate::router::{self, RoutedCommand};
use crate::speech::{
    select_voice, RecognitionError, RecognitionEvent, SpeechInput, SpeechOutput, SpeechRequest,
    SynthesisEvent, Voice,
};
use crate::state_machine::{SessionEvent, SessionState, StateMachine};
use crate::system::LinkOpener;
use crate::visualizer::{Canvas, Visualizer};

pub const STATUS_READY: &str = "Press Activate and speak";
pub const STATUS_LISTENING: &str = "I'm listening...";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_SPEAKING: &str = "Speaking...";
pub const STATUS_NO_SPEECH: &str = "I didn't hear anything. Try again.";
pub const STATUS_NOT_SUPPORTED: &str = "Speech Recognition not supported.";
pub const STATUS_AWAITING_PERMISSION: &str = "Waiting for microphone access...";

pub const APOLOGY: &str =
    "I'm sorry, I seem to be having trouble connecting. Please check the API key and try again later.";

pub const BLOCKED_TITLE: &str = "Microphone Access Denied";
pub const BLOCKED_MESSAGE: &str = "J.A.R.V.I.S. cannot function without microphone access. \
     Please enable it in your system settings and restart.";

pub const INITIAL_SUGGESTIONS: [&str; 8] = [
    "What time is it?",
    "What is the weather?",
    "Open Wikipedia",
    "Play lofi beats",
    "Tell me a joke about computers",
    "Set a timer for 2 minutes",
    "Translate \"good morning\" to Telugu",
    "What is the capital of Japan?",
];

const CONVERSATION_SUGGESTIONS: [&str; 3] = [
    "Tell me a fun fact",
    "Summarize this page",
    "Translate \"Hello\" to Telugu",
];

/// Whether the microphone can be used for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicAccess {
    Pending,
    Granted,
    Denied,
    Unsupported,
}

/// External collaborators a session talks to.
pub struct Adapters {
    pub recognizer: Box<dyn SpeechInput>,
    pub synthesizer: Box<dyn SpeechOutput>,
    pub presenter: Box<dyn Presenter>,
    pub opener: Box<dyn LinkOpener>,
    pub weather: Box<dyn WeatherProvider>,
    pub canvas: Box<dyn Canvas>,
}

/// One assistant session: conversation state, adapters and the FSM.
///
/// All methods run on the caller's task; adapter events are fed back in via
/// [`Session::on_recognition_event`] and [`Session::on_synthesis_event`].
pub struct Session {
    config: Config,
    language: String,
    client: GeminiClient,
    history: ConversationHistory,
    log: ConversationLog,
    adapters: Adapters,
    visualizer: Visualizer,
    machine: StateMachine,
    mic: MicAccess,
    status: String,
    suggestions: Vec<String>,
    voices: Vec<Voice>,
    next_utterance_id: u64,
    speaking_id: Option<u64>,
}

impl Session {
    pub fn new(config: Config, client: GeminiClient, adapters: Adapters, visualizer: Visualizer) -> Self {
        let mut voices = adapters.synthesizer.voices();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        let language = config.language.clone();

        Self {
            config,
            language,
            client,
            history: ConversationHistory::new(),
            log: ConversationLog::new(),
            adapters,
            visualizer,
            machine: StateMachine::new(),
            mic: MicAccess::Pending,
            status: STATUS_AWAITING_PERMISSION.to_string(),
            suggestions: Vec::new(),
            voices,
            next_utterance_id: 0,
            speaking_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn mic_access(&self) -> MicAccess {
        self.mic
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    pub fn is_animating(&self) -> bool {
        self.visualizer.is_animating()
    }

    /// Show the info panel and the starter suggestions.
    pub fn start<Tz: TimeZone>(&mut self, now: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        self.refresh_info(now);
        let initial: Vec<String> = INITIAL_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
        self.set_suggestions(initial);
    }

    /// Ask the recognizer for microphone access. Denial is terminal for voice
    /// input; typed commands keep working.
    pub fn activate_microphone(&mut self) -> MicAccess {
        match self.adapters.recognizer.request_permission() {
            Ok(()) => {
                self.mic = MicAccess::Granted;
                self.adapters.recognizer.set_language(&self.language);
                self.set_status(STATUS_READY);
            }
            Err(RecognitionError::NotSupported) => {
                self.mic = MicAccess::Unsupported;
                self.set_status(STATUS_NOT_SUPPORTED);
            }
            Err(e) => {
                log::error!("[Session] Microphone access denied: {}", e);
                self.block_microphone();
            }
        }
        self.mic
    }

    fn block_microphone(&mut self) {
        self.mic = MicAccess::Denied;
        self.adapters.recognizer.stop();
        self.adapters.presenter.show_blocked(BLOCKED_TITLE, BLOCKED_MESSAGE);
        self.set_status(BLOCKED_TITLE);
    }

    /// Start or stop a recognition session. Returns false when voice input is
    /// unavailable.
    pub fn toggle_listening(&mut self) -> bool {
        if self.mic != MicAccess::Granted {
            log::warn!("[Session] Listening unavailable ({:?})", self.mic);
            return false;
        }

        if self.adapters.recognizer.is_active() {
            self.adapters.recognizer.stop();
            return true;
        }

        self.cancel_speech();
        match self.adapters.recognizer.start() {
            Ok(()) => true,
            Err(e) => {
                self.handle_recognition_error(&e);
                false
            }
        }
    }

    pub async fn on_recognition_event(&mut self, event: RecognitionEvent) -> Option<AssistantResponse> {
        match event {
            RecognitionEvent::Start => {
                self.transition(SessionEvent::RecognitionStarted);
                self.set_status(STATUS_LISTENING);
                self.visualizer.start_live();
                None
            }
            RecognitionEvent::Result(transcript) => {
                let transcript = transcript.trim().to_string();
                if transcript.is_empty() {
                    self.set_status(STATUS_NO_SPEECH);
                    return None;
                }
                self.transition(SessionEvent::TranscriptReceived);
                self.set_status(&format!("You said: \"{}\"", transcript));
                self.submit_text(&transcript).await
            }
            RecognitionEvent::Error(e) => {
                self.handle_recognition_error(&e);
                None
            }
            RecognitionEvent::End => {
                self.transition(SessionEvent::RecognitionEnded);
                if self.status == STATUS_LISTENING {
                    self.set_status(STATUS_READY);
                }
                self.visualizer.stop_live();
                None
            }
        }
    }

    fn handle_recognition_error(&mut self, error: &RecognitionError) {
        log::error!("[Speech] Recognition error: {}", error.code());
        match error {
            RecognitionError::NoSpeech => self.set_status(STATUS_NO_SPEECH),
            RecognitionError::PermissionDenied => self.block_microphone(),
            RecognitionError::NotSupported => {
                self.mic = MicAccess::Unsupported;
                self.set_status(STATUS_NOT_SUPPORTED);
            }
            other => self.set_status(&format!("Error: {}", other.code())),
        }
    }

    pub fn on_synthesis_event(&mut self, event: SynthesisEvent) {
        let id = match &event {
            SynthesisEvent::Start(id) | SynthesisEvent::End(id) | SynthesisEvent::Error(id, _) => *id,
        };
        if self.speaking_id != Some(id) {
            log::debug!("[Speech] Ignoring stale event for utterance {}", id);
            return;
        }

        match event {
            SynthesisEvent::Start(_) => {
                self.transition(SessionEvent::SpeechStarted);
                self.visualizer.start_simulated();
            }
            SynthesisEvent::End(_) => {
                self.speaking_id = None;
                self.transition(SessionEvent::SpeechEnded);
                self.set_status(STATUS_READY);
                self.visualizer.stop();
            }
            SynthesisEvent::Error(_, e) => {
                log::error!("[Speech] Synthesis error: {}", e);
                self.speaking_id = None;
                self.transition(SessionEvent::SpeechFailed);
                self.visualizer.stop();
            }
        }
    }

    /// Handle one typed or transcribed utterance. Every non-empty utterance
    /// yields exactly one response.
    pub async fn submit_text(&mut self, text: &str) -> Option<AssistantResponse> {
        let command = text.trim();
        if command.is_empty() {
            return None;
        }

        let id = self.log.push(Sender::User, command);
        if let Some(entry) = self.log.get(id) {
            self.adapters.presenter.log_entry(entry);
        }
        Some(self.process_command(command).await)
    }

    /// Submit the suggestion at `index` as if it were typed.
    pub async fn select_suggestion(&mut self, index: usize) -> Option<AssistantResponse> {
        let suggestion = self.suggestions.get(index)?.clone();
        self.submit_text(&suggestion).await
    }

    async fn process_command(&mut self, command: &str) -> AssistantResponse {
        self.transition(SessionEvent::CommandSubmitted);
        self.adapters.presenter.clear_result();

        let routed = router::route(command);
        log::info!("[Router] {:?}", routed);

        let response = match routed {
            RoutedCommand::Search { engine, query } => {
                handlers::dispatch_search(engine, &query, self.adapters.opener.as_mut())
            }
            RoutedCommand::Informational(kind) => {
                handlers::informational(kind, &chrono::Local::now(), self.adapters.weather.as_ref())
            }
            RoutedCommand::OpenSite(host) => {
                handlers::dispatch_open_site(&host, self.adapters.opener.as_mut())
            }
            RoutedCommand::Conversational(prompt) => self.converse(&prompt).await,
        };

        self.finalize(response.clone());
        response
    }

    async fn converse(&mut self, prompt: &str) -> AssistantResponse {
        self.set_status(STATUS_THINKING);
        match self.client.converse(prompt, &mut self.history, false).await {
            Ok(text) => AssistantResponse::text(text)
                .with_image(placeholder_image("02001a", "ff00c8", "J.A.R.V.I.S."))
                .with_suggestions(CONVERSATION_SUGGESTIONS),
            Err(e) => {
                log::error!("[Gemini] Conversation failed: {}", e);
                AssistantResponse::text(APOLOGY)
            }
        }
    }

    /// Log, speak and render a response.
    fn finalize(&mut self, response: AssistantResponse) {
        self.push_assistant_entry(&response.text);
        self.speak(&response.text);
        self.adapters.presenter.show_response(&response);
        if let Some(suggestions) = response.suggestions {
            self.set_suggestions(suggestions);
        }
    }

    fn push_assistant_entry(&mut self, text: &str) -> u64 {
        let id = self.log.push(Sender::Assistant, text);
        if let Some(entry) = self.log.get(id) {
            self.adapters.presenter.log_entry(entry);
        }
        id
    }

    /// Re-ask the model to translate a logged assistant message into the
    /// current language. The translation is spoken and logged as a new entry;
    /// the conversation history is never touched. Returns false if the entry
    /// does not exist or is not an assistant message.
    pub async fn request_translation(&mut self, entry_id: u64) -> bool {
        let original = match self.log.get(entry_id) {
            Some(entry) if entry.sender == Sender::Assistant => entry.text.clone(),
            _ => return false,
        };

        let prompt = translation_prompt(&original, &display_name(&self.language));
        self.transition(SessionEvent::CommandSubmitted);
        self.set_status(STATUS_THINKING);

        // Stateless: the client neither sends nor records history here.
        match self.client.converse(&prompt, &mut self.history, true).await {
            Ok(text) => {
                self.speak(&text);
                self.push_assistant_entry(&format!("Translation: {}", text));
            }
            Err(e) => {
                log::error!("[Gemini] Translation failed: {}", e);
                self.finalize(AssistantResponse::text(APOLOGY));
            }
        }
        true
    }

    pub fn set_feedback(&mut self, entry_id: u64, feedback: Feedback) -> bool {
        self.log.set_feedback(entry_id, feedback)
    }

    pub fn set_language(&mut self, code: &str) -> bool {
        let Some(code) = canonical_language(code) else {
            log::warn!("[Session] Unsupported language {}", code);
            return false;
        };
        self.language = code.to_string();
        self.adapters.recognizer.set_language(code);
        log::info!("[Session] Language set to {}", code);
        true
    }

    fn speak(&mut self, text: &str) {
        self.cancel_speech();
        self.set_status(STATUS_SPEAKING);

        let id = self.next_utterance_id;
        self.next_utterance_id += 1;
        let request = SpeechRequest {
            id,
            text: text.to_string(),
            voice: select_voice(&self.voices, &self.language),
            pitch: self.config.voice_pitch,
            rate: self.config.voice_rate,
        };

        self.speaking_id = Some(id);
        if let Err(e) = self.adapters.synthesizer.speak(request) {
            log::error!("[Speech] {}", e);
            self.speaking_id = None;
            self.transition(SessionEvent::SpeechFailed);
            self.visualizer.stop();
        }
    }

    fn cancel_speech(&mut self) {
        if self.speaking_id.take().is_some() || self.adapters.synthesizer.is_speaking() {
            self.adapters.synthesizer.cancel();
            self.visualizer.stop();
        }
    }

    pub fn info_panel<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> InfoPanel
    where
        Tz::Offset: std::fmt::Display,
    {
        InfoPanel {
            time: format_time(now),
            date: format_short_date(now),
            location: self.config.location.clone(),
        }
    }

    pub fn refresh_info<Tz: TimeZone>(&mut self, now: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        let panel = self.info_panel(now);
        self.adapters.presenter.show_info(&panel);
    }

    /// Draw one visualizer frame. Does nothing when no loop is running.
    pub fn render_frame(&mut self, now_ms: f64) {
        let (width, height) = self.adapters.canvas.size();
        if let Some(frame) = self.visualizer.tick(width, height, now_ms) {
            self.adapters.canvas.draw(&frame);
        }
    }

    fn transition(&mut self, event: SessionEvent) {
        if self.machine.apply(event) {
            self.visualizer.set_color(self.machine.state().glow_color());
        }
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
        self.adapters.presenter.status(text);
    }

    fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.adapters.presenter.show_suggestions(&suggestions);
        self.suggestions = suggestions;
    }
}
