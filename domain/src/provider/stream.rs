//! Streaming events for adapter output.

/// An event in a streaming adapter response.
///
/// A stream is finite: it ends with exactly one `Completed` or `Error`,
/// and is not restartable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text chunk from the model.
    Delta(String),
    /// The complete response text (signals stream end).
    Completed(String),
    /// An error that occurred during streaming (signals stream end).
    Error(String),
}

impl StreamEvent {
    /// Returns the text content if this is a Delta or Completed event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) | StreamEvent::Completed(s) => Some(s),
            StreamEvent::Error(_) => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::Delta("a".into()).is_terminal());
        assert!(StreamEvent::Completed("a".into()).is_terminal());
        assert!(StreamEvent::Error("boom".into()).is_terminal());
        assert_eq!(StreamEvent::Error("boom".into()).text(), None);
    }
}
