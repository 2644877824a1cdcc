//! Responses and the visible conversation log.

/// Who produced a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Jarvis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Like,
    Dislike,
}

/// One answer to one user utterance. Consumed once by the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantResponse {
    pub text: String,
    pub image: Option<String>,
    pub suggestions: Option<Vec<String>>,
}

impl AssistantResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            suggestions: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = Some(suggestions.into_iter().map(Into::into).collect());
        self
    }
}

/// Placeholder image reference: `https://placehold.co/300x200/<bg>/<fg>?text=<label>`.
pub fn placeholder_image(background: &str, foreground: &str, label: &str) -> String {
    format!(
        "https://placehold.co/300x200/{}/{}?text={}",
        background,
        foreground,
        urlencoding::encode(label)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    pub feedback: Option<Feedback>,
}

/// Append-only log of utterances and responses, in arrival order.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(LogEntry {
            id,
            sender,
            text: text.into(),
            feedback: None,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rate an assistant entry. Likes and dislikes are exclusive; the latest
    /// rating replaces the previous one. User entries cannot be rated.
    pub fn set_feedback(&mut self, id: u64, feedback: Feedback) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.sender == Sender::Assistant => {
                entry.feedback = Some(feedback);
                true
            }
            _ => false,
        }
    }
}
