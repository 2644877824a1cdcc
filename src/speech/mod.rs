pub mod recognizer;
pub mod synthesizer;

pub use recognizer::{
    CommandRecognizer, RecognitionError, RecognitionEvent, RecognizerConfig, ScriptedRecognizer,
    SpeechInput,
};
pub use synthesizer::{
    select_voice, EspeakSynthesizer, ScriptedSynthesizer, SpeechOutput, SpeechRequest,
    SynthesisError, SynthesisEvent, Voice,
};
