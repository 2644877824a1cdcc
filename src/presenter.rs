use std::io::Write;

use crate::response::{AssistantResponse, LogEntry, Sender};

/// Clock and location summary shown beside the orb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPanel {
    pub time: String,
    pub date: String,
    pub location: String,
}

/// Renders session output. Implementations must not fail the session; write
/// errors are logged and swallowed.
pub trait Presenter: Send {
    fn status(&mut self, text: &str);
    fn log_entry(&mut self, entry: &LogEntry);
    fn clear_result(&mut self);
    fn show_response(&mut self, response: &AssistantResponse);
    fn show_suggestions(&mut self, suggestions: &[String]);
    fn show_info(&mut self, panel: &InfoPanel);
    fn show_blocked(&mut self, title: &str, message: &str);
}

/// Plain-text presenter for a terminal.
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::warn!("[Presenter] Write failed: {}", e);
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn status(&mut self, text: &str) {
        self.line(format_args!("[status] {}", text));
    }

    fn log_entry(&mut self, entry: &LogEntry) {
        match entry.sender {
            Sender::User => self.line(format_args!("#{} {}: {}", entry.id, entry.sender.label(), entry.text)),
            Sender::Assistant => self.line(format_args!(
                "#{} {}: {}    (:like {id} | :dislike {id} | :translate {id})",
                entry.id,
                entry.sender.label(),
                entry.text,
                id = entry.id
            )),
        }
    }

    fn clear_result(&mut self) {}

    fn show_response(&mut self, response: &AssistantResponse) {
        if let Some(image) = &response.image {
            self.line(format_args!("[image] {}", image));
        }
    }

    fn show_suggestions(&mut self, suggestions: &[String]) {
        let chips: Vec<String> = suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {}", i + 1, s))
            .collect();
        self.line(format_args!("Try: {}", chips.join("  ")));
    }

    fn show_info(&mut self, panel: &InfoPanel) {
        self.line(format_args!(
            "Time: {} | Date: {} | Location: {}",
            panel.time, panel.date, panel.location
        ));
    }

    fn show_blocked(&mut self, title: &str, message: &str) {
        self.line(format_args!("== {} ==", title));
        self.line(format_args!("{}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut TerminalPresenter<Vec<u8>>)) -> String {
        let mut presenter = TerminalPresenter::new(Vec::new());
        f(&mut presenter);
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    #[test]
    fn assistant_entries_offer_actions() {
        let out = rendered(|p| {
            p.log_entry(&LogEntry {
                id: 3,
                sender: Sender::Assistant,
                text: "Opening wikipedia.com.".into(),
                feedback: None,
            })
        });
        assert!(out.starts_with("#3 Jarvis: Opening wikipedia.com."));
        assert!(out.contains(":translate 3"));
    }

    #[test]
    fn suggestions_are_numbered_from_one() {
        let out = rendered(|p| p.show_suggestions(&["a".to_string(), "b".to_string()]));
        assert_eq!(out, "Try: [1] a  [2] b\n");
    }

    #[test]
    fn response_without_image_prints_nothing() {
        let out = rendered(|p| p.show_response(&AssistantResponse::text("hi")));
        assert!(out.is_empty());
    }
}
