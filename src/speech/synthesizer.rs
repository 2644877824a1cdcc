use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::language::primary_subtag;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub id: u64,
    pub text: String,
    pub voice: Option<Voice>,
    pub pitch: f32,
    pub rate: f32,
}

/// Lifecycle of one utterance, tagged with its request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Start(u64),
    End(u64),
    Error(u64, SynthesisError),
}

/// Text-to-speech capability. At most one utterance is in flight: `speak`
/// cancels whatever is playing. A cancelled utterance emits no further events.
pub trait SpeechOutput: Send {
    fn voices(&self) -> Vec<Voice>;
    fn speak(&mut self, request: SpeechRequest) -> Result<(), SynthesisError>;
    fn cancel(&mut self);
    fn is_speaking(&self) -> bool;
}

/// First voice (by name) whose language shares the primary subtag of
/// `language`, falling back to the first voice.
pub fn select_voice(voices: &[Voice], language: &str) -> Option<Voice> {
    let mut sorted: Vec<&Voice> = voices.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let wanted = primary_subtag(language).to_ascii_lowercase();
    sorted
        .iter()
        .find(|v| v.lang.to_ascii_lowercase().starts_with(&wanted))
        .or_else(|| sorted.first())
        .map(|v| (*v).clone())
}

/// Clear the in-flight marker if it still belongs to `id`. Returns whether it did.
fn finish_utterance(current: &Mutex<Option<u64>>, id: u64) -> bool {
    match current.lock() {
        Ok(mut current) if *current == Some(id) => {
            current.take();
            true
        }
        _ => false,
    }
}

/// Speaks through an espeak-ng compatible command line.
pub struct EspeakSynthesizer {
    program: String,
    voices: Vec<Voice>,
    events: mpsc::UnboundedSender<SynthesisEvent>,
    current: Arc<Mutex<Option<u64>>>,
    task: Option<JoinHandle<()>>,
}

impl EspeakSynthesizer {
    pub fn new(program: &str, events: mpsc::UnboundedSender<SynthesisEvent>) -> Self {
        let voices = match std::process::Command::new(program).arg("--voices").output() {
            Ok(output) if output.status.success() => {
                Self::parse_voices(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                log::warn!("[Speech] {} --voices exited with {}", program, output.status);
                Vec::new()
            }
            Err(e) => {
                log::warn!("[Speech] {} unavailable: {}", program, e);
                Vec::new()
            }
        };
        log::info!("[Speech] {} voices available", voices.len());

        Self {
            program: program.to_string(),
            voices,
            events,
            current: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// Parse the `--voices` table: `Pty Language Age/Gender VoiceName File Other`.
    fn parse_voices(table: &str) -> Vec<Voice> {
        table
            .lines()
            .skip(1)
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                match cols.as_slice() {
                    [_pty, lang, _age_gender, name, ..] => Some(Voice {
                        name: (*name).to_string(),
                        lang: (*lang).to_string(),
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    /// Map browser-style pitch/rate multipliers onto espeak's scales
    /// (pitch 0..=99, default 50; rate in words per minute, default 175).
    fn engine_args(request: &SpeechRequest) -> Vec<String> {
        let pitch = (request.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
        let rate = (request.rate * 175.0).round().clamp(80.0, 450.0) as u32;

        let mut args = Vec::new();
        if let Some(voice) = &request.voice {
            args.push("-v".to_string());
            args.push(voice.name.clone());
        }
        args.extend([
            "-p".to_string(),
            pitch.to_string(),
            "-s".to_string(),
            rate.to_string(),
            "--".to_string(),
            request.text.clone(),
        ]);
        args
    }
}

impl SpeechOutput for EspeakSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, request: SpeechRequest) -> Result<(), SynthesisError> {
        self.cancel();

        let mut child = Command::new(&self.program)
            .args(Self::engine_args(&request))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynthesisError::Unavailable(format!("{}: {}", self.program, e)))?;

        let id = request.id;
        if let Ok(mut current) = self.current.lock() {
            *current = Some(id);
        }
        let _ = self.events.send(SynthesisEvent::Start(id));

        let events = self.events.clone();
        let current = self.current.clone();
        self.task = Some(tokio::spawn(async move {
            let event = match child.wait().await {
                Ok(status) if status.success() => SynthesisEvent::End(id),
                Ok(status) => SynthesisEvent::Error(id, SynthesisError::Failed(status.to_string())),
                Err(e) => SynthesisEvent::Error(id, SynthesisError::Failed(e.to_string())),
            };
            finish_utterance(&current, id);
            let _ = events.send(event);
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            log::debug!("[Speech] Cancelled in-flight utterance");
        }
        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
    }

    fn is_speaking(&self) -> bool {
        self.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

impl Drop for EspeakSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Records requests instead of speaking. With `auto_finish`, every utterance
/// ends immediately; otherwise call [`ScriptedSynthesizer::finish`].
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    voices: Vec<Voice>,
    spoken: Arc<Mutex<Vec<SpeechRequest>>>,
    current: Arc<Mutex<Option<u64>>>,
    events: mpsc::UnboundedSender<SynthesisEvent>,
    auto_finish: bool,
    fail_with: Option<SynthesisError>,
}

impl ScriptedSynthesizer {
    pub fn new(events: mpsc::UnboundedSender<SynthesisEvent>) -> Self {
        Self {
            voices: Vec::new(),
            spoken: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(Mutex::new(None)),
            events,
            auto_finish: false,
            fail_with: None,
        }
    }

    pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
        self.voices = voices;
        self
    }

    pub fn auto_finish(mut self) -> Self {
        self.auto_finish = true;
        self
    }

    pub fn failing(mut self, error: SynthesisError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn spoken(&self) -> Vec<SpeechRequest> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// End the in-flight utterance, if any.
    pub fn finish(&self) {
        if let Some(id) = self.current.lock().ok().and_then(|mut c| c.take()) {
            let _ = self.events.send(SynthesisEvent::End(id));
        }
    }
}

impl SpeechOutput for ScriptedSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, request: SpeechRequest) -> Result<(), SynthesisError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.cancel();
        let id = request.id;
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(request);
        }
        let _ = self.events.send(SynthesisEvent::Start(id));
        if self.auto_finish {
            let _ = self.events.send(SynthesisEvent::End(id));
        } else if let Ok(mut current) = self.current.lock() {
            *current = Some(id);
        }
        Ok(())
    }

    fn cancel(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
    }

    fn is_speaking(&self) -> bool {
        self.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> Voice {
        Voice {
            name: name.into(),
            lang: lang.into(),
        }
    }

    #[test]
    fn voice_matches_primary_subtag_in_name_order() {
        let voices = vec![
            voice("Zira", "en-US"),
            voice("Hema", "te-IN"),
            voice("Alex", "en-GB"),
        ];
        assert_eq!(select_voice(&voices, "en-US"), Some(voice("Alex", "en-GB")));
        assert_eq!(select_voice(&voices, "te-IN"), Some(voice("Hema", "te-IN")));
    }

    #[test]
    fn voice_falls_back_to_first_by_name() {
        let voices = vec![voice("Zira", "en-US"), voice("Hema", "te-IN")];
        assert_eq!(select_voice(&voices, "fr-FR"), Some(voice("Hema", "te-IN")));
        assert_eq!(select_voice(&[], "fr-FR"), None);
    }

    #[test]
    fn parses_voice_table() {
        let table = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                      5  af              --/M      Afrikaans          gmw/af\n \
                      5  en-us           --/M      English_(America)  gmw/en-US            (en 10)\n\
                      garbage\n";
        let voices = EspeakSynthesizer::parse_voices(table);
        assert_eq!(
            voices,
            vec![voice("Afrikaans", "af"), voice("English_(America)", "en-us")]
        );
    }

    #[test]
    fn engine_args_scale_pitch_and_rate() {
        let request = SpeechRequest {
            id: 1,
            text: "-hello".into(),
            voice: Some(voice("English_(America)", "en-us")),
            pitch: 1.0,
            rate: 1.0,
        };
        assert_eq!(
            EspeakSynthesizer::engine_args(&request),
            vec!["-v", "English_(America)", "-p", "50", "-s", "175", "--", "-hello"]
        );
    }

    #[test]
    fn finished_utterance_leaves_newer_one_speaking() {
        let current = Mutex::new(Some(2));
        assert!(!finish_utterance(&current, 1));
        assert_eq!(*current.lock().unwrap(), Some(2));
        assert!(finish_utterance(&current, 2));
        assert_eq!(*current.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn engine_exit_ends_utterance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut synth = EspeakSynthesizer::new("true", tx);
        synth
            .speak(SpeechRequest {
                id: 7,
                text: "hello".into(),
                voice: None,
                pitch: 1.0,
                rate: 1.0,
            })
            .unwrap();
        assert!(synth.is_speaking());

        assert_eq!(rx.recv().await, Some(SynthesisEvent::Start(7)));
        assert_eq!(rx.recv().await, Some(SynthesisEvent::End(7)));
        assert!(!synth.is_speaking());
    }

    #[test]
    fn scripted_speak_replaces_in_flight_utterance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut synth = ScriptedSynthesizer::new(tx);
        let request = |id| SpeechRequest {
            id,
            text: format!("utterance {}", id),
            voice: None,
            pitch: 1.0,
            rate: 1.0,
        };

        synth.speak(request(1)).unwrap();
        synth.speak(request(2)).unwrap();
        synth.finish();

        assert_eq!(rx.try_recv().unwrap(), SynthesisEvent::Start(1));
        assert_eq!(rx.try_recv().unwrap(), SynthesisEvent::Start(2));
        assert_eq!(rx.try_recv().unwrap(), SynthesisEvent::End(2));
        assert!(rx.try_recv().is_err());
        assert!(!synth.is_speaking());
    }
}
