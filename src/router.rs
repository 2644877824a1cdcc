//! Keyword command routing.
//!
//! Classification is total: every utterance becomes exactly one
//! [`RoutedCommand`], with [`RoutedCommand::Conversational`] as the fallthrough.
//! Search intents match as prefixes of the lowercased text; informational
//! intents match anywhere in it. Rule order is significant: a lookup prefix
//! such as "what is" wins over the "what is the weather" substring.

/// Video-search trigger phrases, in match order.
pub const VIDEO_TRIGGERS: [&str; 7] = [
    "play",
    "song",
    "video",
    "watch",
    "trailer",
    "music video",
    "search youtube for",
];

/// Web-lookup trigger phrases, in match order.
pub const LOOKUP_TRIGGERS: [&str; 8] = [
    "search for",
    "google",
    "details of",
    "what is",
    "who is",
    "tell me about",
    "information on",
    "how to",
];

const OPEN_PREFIX: &str = "open ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    YouTube,
    Google,
}

impl SearchEngine {
    pub fn name(&self) -> &'static str {
        match self {
            SearchEngine::YouTube => "YouTube",
            SearchEngine::Google => "Google",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Time,
    Date,
    Weather,
}

/// Informational phrases, matched by containment in this order.
const INFO_TRIGGERS: [(&str, InfoKind); 3] = [
    ("what time is it", InfoKind::Time),
    ("what is the date", InfoKind::Date),
    ("what is the weather", InfoKind::Weather),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedCommand {
    Search { engine: SearchEngine, query: String },
    Informational(InfoKind),
    OpenSite(String),
    Conversational(String),
}

/// Classify an utterance. Pure; no I/O.
pub fn route(text: &str) -> RoutedCommand {
    let original = text.trim();
    let lower = original.to_lowercase();

    if let Some(query) = strip_trigger(&lower, &VIDEO_TRIGGERS) {
        return RoutedCommand::Search {
            engine: SearchEngine::YouTube,
            query,
        };
    }

    if let Some(query) = strip_trigger(&lower, &LOOKUP_TRIGGERS) {
        return RoutedCommand::Search {
            engine: SearchEngine::Google,
            query,
        };
    }

    if let Some((_, kind)) = INFO_TRIGGERS
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
    {
        return RoutedCommand::Informational(*kind);
    }

    if let Some(rest) = lower.strip_prefix(OPEN_PREFIX) {
        return RoutedCommand::OpenSite(site_host(rest));
    }

    RoutedCommand::Conversational(original.to_string())
}

/// If `text` starts with any trigger, return the residual query.
///
/// The first trigger that is followed by whitespace (or ends the text) is
/// stripped together with that whitespace. When a trigger only matches as a
/// bare prefix of a longer word ("playlist"), the whole text is the query.
fn strip_trigger(text: &str, triggers: &[&str]) -> Option<String> {
    if !triggers.iter().any(|t| text.starts_with(t)) {
        return None;
    }

    let stripped = triggers.iter().find_map(|trigger| {
        let rest = text.strip_prefix(trigger)?;
        if rest.is_empty() {
            Some(rest)
        } else if rest.starts_with(char::is_whitespace) {
            Some(rest.trim_start())
        } else {
            None
        }
    });

    Some(stripped.unwrap_or(text).to_string())
}

/// Collapse the remainder of an "open ..." command into a host name.
fn site_host(rest: &str) -> String {
    let mut host: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    if !host.contains('.') {
        host.push_str(".com");
    }
    host
}
