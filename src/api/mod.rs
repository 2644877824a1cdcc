pub mod gemini;

pub use gemini::{ApiError, ConversationHistory, ConversationTurn, GeminiClient, Role};
