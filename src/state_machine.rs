/// Assistant session state. Drives the status text and the orb colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,  // recognition session open
    Processing, // routing / waiting for Gemini
    Speaking,   // synthesis utterance in flight
}

/// Adapter and user events that move the session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    RecognitionStarted,
    TranscriptReceived,
    RecognitionEnded,
    CommandSubmitted,
    SpeechStarted,
    SpeechEnded,
    SpeechFailed,
}

/// Color palette
const COLOR_IDLE: [f32; 3] = [0.0, 0.898, 1.0]; // primary glow #00e5ff
const COLOR_LISTENING: [f32; 3] = [0.024, 0.714, 0.831]; // cyan #06B6D4
const COLOR_PROCESSING: [f32; 3] = [0.9, 0.76, 0.31]; // golden
const COLOR_SPEAKING: [f32; 3] = [1.0, 0.0, 0.784]; // magenta #ff00c8

impl SessionState {
    pub fn glow_color(&self) -> [f32; 3] {
        match self {
            SessionState::Idle => COLOR_IDLE,
            SessionState::Listening => COLOR_LISTENING,
            SessionState::Processing => COLOR_PROCESSING,
            SessionState::Speaking => COLOR_SPEAKING,
        }
    }

    /// Transition table. `None` means the event does not apply in this state.
    pub fn next(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Idle | Speaking, RecognitionStarted) => Some(Listening),
            (Listening, TranscriptReceived) => Some(Processing),
            (Listening, RecognitionEnded) => Some(Idle),
            (_, CommandSubmitted) => Some(Processing),
            (Idle | Processing | Speaking, SpeechStarted) => Some(Speaking),
            (Speaking, SpeechEnded) => Some(Idle),
            (Processing | Speaking, SpeechFailed) => Some(Idle),
            _ => None,
        }
    }
}

pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply an event. Returns true if the state changed.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match self.state.next(event) {
            Some(next) if next != self.state => {
                log::debug!("State: {:?} -> {:?} ({:?})", self.state, next, event);
                self.state = next;
                true
            }
            Some(_) => false,
            None => {
                log::trace!("State: {:?} ignores {:?}", self.state, event);
                false
            }
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame smoothing of the overall level and glow colour.
pub struct LevelSmoother {
    pub level: f32,
    pub color: [f32; 3],
}

impl LevelSmoother {
    pub fn new() -> Self {
        Self {
            level: 0.0,
            color: COLOR_IDLE,
        }
    }

    /// Fast attack while active, moderate decay otherwise.
    pub fn update(&mut self, target_level: f32, active: bool, target_color: [f32; 3]) -> f32 {
        let speed = if active { 0.35 } else { 0.2 };
        let target = if active { target_level } else { 0.0 };
        self.level += (target - self.level) * speed;
        if self.level < 0.003 {
            self.level = 0.0;
        }

        for i in 0..3 {
            self.color[i] += (target_color[i] - self.color[i]) * 0.08;
        }
        self.level
    }
}

impl Default for LevelSmoother {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_round_trip() {
        let mut machine = StateMachine::new();
        assert!(machine.apply(SessionEvent::RecognitionStarted));
        assert!(machine.apply(SessionEvent::TranscriptReceived));
        assert_eq!(machine.state(), SessionState::Processing);
        assert!(!machine.apply(SessionEvent::RecognitionEnded));
        assert!(machine.apply(SessionEvent::SpeechStarted));
        assert!(machine.apply(SessionEvent::SpeechEnded));
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn listening_without_transcript_returns_to_idle() {
        let mut machine = StateMachine::new();
        machine.apply(SessionEvent::RecognitionStarted);
        machine.apply(SessionEvent::RecognitionEnded);
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut machine = StateMachine::new();
        assert!(!machine.apply(SessionEvent::SpeechEnded));
        assert!(!machine.apply(SessionEvent::TranscriptReceived));
        assert!(!machine.apply(SessionEvent::RecognitionEnded));
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn speech_from_idle_enters_speaking() {
        let mut machine = StateMachine::new();
        assert!(machine.apply(SessionEvent::SpeechStarted));
        assert_eq!(machine.state(), SessionState::Speaking);
        assert!(machine.apply(SessionEvent::SpeechEnded));
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn failed_speech_settles_idle() {
        let mut machine = StateMachine::new();
        machine.apply(SessionEvent::CommandSubmitted);
        assert!(machine.apply(SessionEvent::SpeechFailed));
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn smoother_decays_to_zero() {
        let mut smoother = LevelSmoother::new();
        smoother.update(1.0, true, COLOR_SPEAKING);
        assert!(smoother.level > 0.3);
        for _ in 0..60 {
            smoother.update(1.0, false, COLOR_IDLE);
        }
        assert_eq!(smoother.level, 0.0);
    }
}
