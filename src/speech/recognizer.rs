use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Exit status a recognizer command uses to report that microphone access
/// was refused (`EX_NOPERM`).
pub const EXIT_PERMISSION_DENIED: i32 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("speech recognition not supported")]
    NotSupported,
    #[error("recognition failed: {0}")]
    Other(String),
}

impl RecognitionError {
    /// Short status code shown to the user.
    pub fn code(&self) -> &str {
        match self {
            RecognitionError::NoSpeech => "no-speech",
            RecognitionError::PermissionDenied => "not-allowed",
            RecognitionError::NotSupported => "not-supported",
            RecognitionError::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Start,
    Result(String),
    Error(RecognitionError),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerConfig {
    pub continuous: bool,
    pub language: String,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognizerConfig {
    /// Single-shot, final results only, one alternative.
    pub fn single_shot(language: impl Into<String>) -> Self {
        Self {
            continuous: false,
            language: language.into(),
            interim_results: false,
            max_alternatives: 1,
        }
    }

    /// Environment handed to a recognizer command.
    pub fn env(&self) -> [(&'static str, String); 4] {
        [
            ("JARVIS_LANGUAGE", self.language.clone()),
            ("JARVIS_CONTINUOUS", self.continuous.to_string()),
            ("JARVIS_INTERIM_RESULTS", self.interim_results.to_string()),
            ("JARVIS_MAX_ALTERNATIVES", self.max_alternatives.to_string()),
        ]
    }
}

/// Microphone-to-text capability. Events arrive on the channel handed to the
/// implementation at construction: `Start`, then at most one `Result` or
/// `Error`, then exactly one `End`.
pub trait SpeechInput: Send {
    fn request_permission(&mut self) -> Result<(), RecognitionError>;
    fn set_language(&mut self, language: &str);
    fn start(&mut self) -> Result<(), RecognitionError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// Runs an external speech-to-text command per session. The command records
/// one utterance and prints the transcript on stdout. The recognizer config
/// reaches it through `JARVIS_*` environment variables (see
/// [`RecognizerConfig::env`]).
pub struct CommandRecognizer {
    command: Option<String>,
    config: RecognizerConfig,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(
        command: Option<&str>,
        config: RecognizerConfig,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Self {
        Self {
            command: command.map(str::to_string),
            config,
            events,
            active: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn classify(status: Option<i32>, stdout: &[u8], stderr: &[u8]) -> RecognitionEvent {
        match status {
            Some(0) => {
                let transcript = String::from_utf8_lossy(stdout)
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string);
                match transcript {
                    Some(text) => RecognitionEvent::Result(text),
                    None => RecognitionEvent::Error(RecognitionError::NoSpeech),
                }
            }
            Some(EXIT_PERMISSION_DENIED) => RecognitionEvent::Error(RecognitionError::PermissionDenied),
            other => {
                let detail = String::from_utf8_lossy(stderr);
                log::warn!(
                    "[Speech] Recognizer exited with {:?}: {}",
                    other,
                    detail.chars().take(200).collect::<String>()
                );
                RecognitionEvent::Error(RecognitionError::Other("audio-capture".into()))
            }
        }
    }
}

impl SpeechInput for CommandRecognizer {
    fn request_permission(&mut self) -> Result<(), RecognitionError> {
        if self.command.is_none() {
            log::error!("[Speech] No recognizer command configured");
            return Err(RecognitionError::NotSupported);
        }
        Ok(())
    }

    fn set_language(&mut self, language: &str) {
        self.config.language = language.to_string();
    }

    fn start(&mut self) -> Result<(), RecognitionError> {
        let command = self.command.clone().ok_or(RecognitionError::NotSupported)?;
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(RecognitionError::Other("already-started".into()));
        }

        log::info!("[Speech] Recognition started ({})", self.config.language);
        let _ = self.events.send(RecognitionEvent::Start);

        let events = self.events.clone();
        let active = self.active.clone();
        let env = self.config.env();
        self.task = Some(tokio::spawn(async move {
            let output = Command::new("sh")
                .args(["-c", &command])
                .envs(env)
                .kill_on_drop(true)
                .output()
                .await;

            let event = match output {
                Ok(output) => Self::classify(output.status.code(), &output.stdout, &output.stderr),
                Err(e) => {
                    log::error!("[Speech] Failed to run recognizer: {}", e);
                    RecognitionEvent::Error(RecognitionError::NotSupported)
                }
            };

            if active.swap(false, Ordering::SeqCst) {
                let _ = events.send(event);
                let _ = events.send(RecognitionEvent::End);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.active.swap(false, Ordering::SeqCst) {
            log::info!("[Speech] Recognition stopped");
            let _ = self.events.send(RecognitionEvent::End);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Plays back queued outcomes, one per `start()`.
#[derive(Clone)]
pub struct ScriptedRecognizer {
    permission: Result<(), RecognitionError>,
    outcomes: Arc<Mutex<VecDeque<Result<String, RecognitionError>>>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    active: Arc<AtomicBool>,
}

impl ScriptedRecognizer {
    pub fn new(events: mpsc::UnboundedSender<RecognitionEvent>) -> Self {
        Self {
            permission: Ok(()),
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            events,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_permission(mut self, permission: Result<(), RecognitionError>) -> Self {
        self.permission = permission;
        self
    }

    pub fn push_outcome(&self, outcome: Result<String, RecognitionError>) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push_back(outcome);
        }
    }

    /// Deliver the next queued outcome followed by `End`.
    pub fn finish(&self) {
        let outcome = self.outcomes.lock().ok().and_then(|mut o| o.pop_front());
        if self.active.swap(false, Ordering::SeqCst) {
            match outcome {
                Some(Ok(text)) => {
                    let _ = self.events.send(RecognitionEvent::Result(text));
                }
                Some(Err(e)) => {
                    let _ = self.events.send(RecognitionEvent::Error(e));
                }
                None => {}
            }
            let _ = self.events.send(RecognitionEvent::End);
        }
    }
}

impl SpeechInput for ScriptedRecognizer {
    fn request_permission(&mut self) -> Result<(), RecognitionError> {
        self.permission.clone()
    }

    fn set_language(&mut self, _language: &str) {}

    fn start(&mut self) -> Result<(), RecognitionError> {
        self.active.store(true, Ordering::SeqCst);
        let _ = self.events.send(RecognitionEvent::Start);
        Ok(())
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(RecognitionEvent::End);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
