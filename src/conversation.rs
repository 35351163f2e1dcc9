//! Conversation log and the reducer that folds stream frames into it

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::stream::ContextSource;
use crate::stream::Phase;
use crate::stream::StreamFrame;

/// Reasoning shown on the turn appended after a failed request
pub const ERROR_REASONING: &str = "Error occurred.";
/// Answer shown on the turn appended after a failed request
pub const ERROR_ANSWER: &str = "Sorry, something went wrong.";

/// One half of an assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum Field {
    /// Nothing received yet. Distinct from an empty but final string.
    Streaming,
    Text(String),
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Streaming => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Replace the sentinel with an empty string
    fn seal(&mut self) {
        if self.is_streaming() {
            *self = Self::Text(String::new());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationEntry {
    User {
        content: String,
    },
    Assistant {
        reasoning: Field,
        answer: Field,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        sources: Vec<ContextSource>,
    },
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Assistant turn waiting for its first frame
    pub fn placeholder() -> Self {
        Self::Assistant {
            reasoning: Field::Streaming,
            answer: Field::Streaming,
            sources: Vec::new(),
        }
    }

    pub fn error_turn() -> Self {
        Self::Assistant {
            reasoning: Field::text(ERROR_REASONING),
            answer: Field::text(ERROR_ANSWER),
            sources: Vec::new(),
        }
    }

    /// An assistant turn that still has a field to fill
    pub fn is_streaming(&self) -> bool {
        match self {
            Self::User { .. } => false,
            Self::Assistant {
                reasoning, answer, ..
            } => reasoning.is_streaming() || answer.is_streaming(),
        }
    }

    /// An assistant turn that has not received any frame
    pub fn is_unstarted(&self) -> bool {
        match self {
            Self::User { .. } => false,
            Self::Assistant {
                reasoning, answer, ..
            } => reasoning.is_streaming() && answer.is_streaming(),
        }
    }
}

/// Ordered log of turns, oldest first.
///
/// While an exchange is open its assistant turn is the last entry and every
/// frame replaces that turn's fields. Closing the exchange freezes the turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
    #[serde(skip)]
    open: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.open = false;
    }

    /// True between `begin_exchange` and the end or failure of its stream
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The turn of the open exchange, if any
    pub fn active(&self) -> Option<&ConversationEntry> {
        if self.open {
            self.entries.last()
        } else {
            None
        }
    }

    fn active_mut(&mut self) -> Option<&mut ConversationEntry> {
        if self.open {
            self.entries.last_mut()
        } else {
            None
        }
    }

    /// Open a new exchange: the user's turn followed by a placeholder.
    ///
    /// An exchange still open from an earlier prompt is closed first.
    pub fn begin_exchange(&mut self, content: impl Into<String>) {
        self.seal_active();
        self.entries.push(ConversationEntry::user(content));
        self.entries.push(ConversationEntry::placeholder());
        self.open = true;
    }

    /// Fold one frame into the active turn.
    ///
    /// Frames carry cumulative text, so each one replaces the turn's fields.
    /// Returns `false` when no exchange is open.
    pub fn apply_frame(&mut self, frame: &StreamFrame) -> bool {
        let Some(ConversationEntry::Assistant {
            reasoning,
            answer,
            sources,
        }) = self.active_mut()
        else {
            warn!("Received a frame with no open exchange to update");
            return false;
        };

        match &frame.phase {
            Phase::Thinking => {
                *reasoning = Field::text(frame.think_or_empty());
                *answer = Field::Streaming;
            }
            Phase::Response => {
                *reasoning = Field::text(frame.think_or_empty());
                *answer = Field::text(frame.response_or_empty());
            }
            Phase::Other(phase) => {
                // The backend's no-context reply has no phase at all
                match phase {
                    Some(phase) => warn!("Frame with unrecognized phase {:?}, treating as response", phase),
                    None => debug!("Frame without a phase, treating as response"),
                }
                *reasoning = Field::text(frame.think_or_empty());
                *answer = Field::text(frame.response_or_empty());
            }
        }

        if !frame.context_sources.is_empty() {
            sources.clone_from(&frame.context_sources);
        }
        true
    }

    /// Close the active turn after the stream ended normally
    pub fn finish_stream(&mut self) {
        self.seal_active();
    }

    /// Record a failed request.
    ///
    /// An unstarted placeholder is removed, a partially streamed turn is
    /// sealed as is, and the fixed error turn is appended.
    pub fn fail_stream(&mut self) {
        if self.active().is_some_and(ConversationEntry::is_unstarted) {
            self.entries.pop();
            self.open = false;
        }
        self.seal_active();
        self.entries.push(ConversationEntry::error_turn());
    }

    fn seal_active(&mut self) {
        if let Some(ConversationEntry::Assistant {
            reasoning, answer, ..
        }) = self.active_mut()
        {
            reasoning.seal();
            answer.seal();
        }
        self.open = false;
    }

    /// Number of turns still streaming; 0 or 1 between updates
    pub fn streaming_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.is_streaming())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn frame(phase: Phase, think: Option<&str>, response: Option<&str>) -> StreamFrame {
        StreamFrame {
            phase,
            think: think.map(str::to_string),
            response: response.map(str::to_string),
            context_sources: Vec::new(),
        }
    }

    fn assistant(reasoning: Field, answer: Field) -> ConversationEntry {
        ConversationEntry::Assistant {
            reasoning,
            answer,
            sources: Vec::new(),
        }
    }

    fn started() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.begin_exchange("What is a contract?");
        conversation
    }

    #[test]
    fn test_begin_exchange_appends_user_and_placeholder() {
        let conversation = started();
        assert_eq!(
            conversation.entries(),
            &[
                ConversationEntry::user("What is a contract?"),
                ConversationEntry::placeholder(),
            ]
        );
        assert!(conversation.active().is_some());
        assert_eq!(conversation.streaming_count(), 1);
    }

    #[test]
    fn test_thinking_frame_keeps_answer_streaming() {
        let mut conversation = started();
        assert!(conversation.apply_frame(&frame(Phase::Thinking, Some("Analyzing..."), Some(""))));

        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text("Analyzing..."), Field::Streaming))
        );
    }

    #[test]
    fn test_thinking_frame_without_think_is_empty_reasoning() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, None, None));

        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text(""), Field::Streaming))
        );
        // Empty but received, so the turn is started
        assert!(!conversation.last().unwrap().is_unstarted());
    }

    #[test]
    fn test_response_frame_sets_both_fields() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("Analyzing..."), None));
        conversation.apply_frame(&frame(
            Phase::Response,
            Some("Analyzing..."),
            Some("A contract is a binding agreement."),
        ));

        assert_eq!(
            conversation.last(),
            Some(&assistant(
                Field::text("Analyzing..."),
                Field::text("A contract is a binding agreement.")
            ))
        );
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_response_frame_defaults_to_empty() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Response, None, None));
        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text(""), Field::text("")))
        );
        // Both fields are filled but the exchange stays open for more frames
        assert!(conversation.active().is_some());
        assert_eq!(conversation.streaming_count(), 0);
    }

    #[test]
    fn test_cumulative_response_frames_replace_answer() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("t"), None));
        for partial in ["A", "A contract", "A contract is a binding agreement."] {
            assert!(conversation.apply_frame(&frame(Phase::Response, Some("t"), Some(partial))));
        }
        conversation.finish_stream();

        assert_eq!(
            conversation.entries(),
            &[
                ConversationEntry::user("What is a contract?"),
                assistant(
                    Field::text("t"),
                    Field::text("A contract is a binding agreement.")
                ),
            ]
        );
    }

    #[test]
    fn test_unknown_phase_behaves_like_response() {
        let mut conversation = started();
        conversation.apply_frame(&frame(
            Phase::Other(None),
            None,
            Some("Sorry, I cannot answer that based on the available documents."),
        ));
        assert_eq!(
            conversation.last(),
            Some(&assistant(
                Field::text(""),
                Field::text("Sorry, I cannot answer that based on the available documents.")
            ))
        );
    }

    /// Writer collecting formatted log output
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` and return what it logged at WARN or above
    fn warnings_while(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_missing_phase_is_not_a_warning() {
        let mut conversation = started();
        let logged = warnings_while(|| {
            conversation.apply_frame(&frame(Phase::Other(None), None, Some("Sorry.")));
        });
        assert_eq!(logged, "");
        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text(""), Field::text("Sorry.")))
        );
    }

    #[test]
    fn test_unrecognized_phase_warns() {
        let mut conversation = started();
        let logged = warnings_while(|| {
            conversation.apply_frame(&frame(
                Phase::Other(Some("summary".to_string())),
                None,
                Some("r"),
            ));
        });
        assert!(logged.contains("unrecognized phase"));
        assert!(logged.contains("summary"));
    }

    #[test]
    fn test_frame_without_active_turn_is_ignored() {
        let mut conversation = Conversation::new();
        assert!(!conversation.apply_frame(&frame(Phase::Response, Some("a"), Some("b"))));
        assert!(conversation.is_empty());

        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Response, Some("a"), Some("b")));
        conversation.finish_stream();
        let before = conversation.clone();
        assert!(!conversation.apply_frame(&frame(Phase::Response, Some("x"), Some("y"))));
        assert_eq!(conversation, before);

        let mut conversation = started();
        conversation.fail_stream();
        assert!(!conversation.apply_frame(&frame(Phase::Response, Some("x"), Some("y"))));
        assert_eq!(conversation.last(), Some(&ConversationEntry::error_turn()));
    }

    #[test]
    fn test_clear_closes_exchange() {
        let mut conversation = started();
        conversation.clear();
        assert!(!conversation.is_open());
        assert!(!conversation.apply_frame(&frame(Phase::Response, Some("a"), Some("b"))));
        assert!(conversation.is_empty());
    }

    #[test]
    fn test_sources_kept_from_latest_frame() {
        let mut conversation = started();
        let mut with_sources = frame(Phase::Thinking, Some("t"), None);
        with_sources.context_sources = vec![ContextSource {
            source: "ica.pdf".to_string(),
            text: "All agreements are contracts...".to_string(),
            score: Some(0.2),
        }];
        conversation.apply_frame(&with_sources);
        conversation.apply_frame(&frame(Phase::Response, Some("t"), Some("r")));

        match conversation.last() {
            Some(ConversationEntry::Assistant { sources, .. }) => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].source, "ica.pdf");
            }
            other => panic!("unexpected last entry: {other:?}"),
        }
    }

    #[test]
    fn test_fail_before_any_frame_replaces_placeholder() {
        let mut conversation = started();
        conversation.fail_stream();

        assert_eq!(
            conversation.entries(),
            &[
                ConversationEntry::user("What is a contract?"),
                ConversationEntry::error_turn(),
            ]
        );
        assert_eq!(conversation.streaming_count(), 0);
    }

    #[test]
    fn test_fail_after_thinking_keeps_partial_turn() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("Analyzing..."), None));
        conversation.fail_stream();

        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.entries()[1],
            assistant(Field::text("Analyzing..."), Field::text(""))
        );
        assert_eq!(conversation.entries()[2], ConversationEntry::error_turn());
        assert_eq!(conversation.streaming_count(), 0);
    }

    #[test]
    fn test_fail_does_not_remove_finished_turn() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Response, Some("a"), Some("b")));
        conversation.finish_stream();
        conversation.fail_stream();

        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.entries()[1],
            assistant(Field::text("a"), Field::text("b"))
        );
    }

    #[test]
    fn test_finish_seals_pending_answer() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("half way"), None));
        conversation.finish_stream();

        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text("half way"), Field::text("")))
        );
        assert!(conversation.active().is_none());
    }

    #[test]
    fn test_finish_with_no_frames_seals_placeholder() {
        let mut conversation = started();
        conversation.finish_stream();
        assert_eq!(
            conversation.last(),
            Some(&assistant(Field::text(""), Field::text("")))
        );
    }

    #[test]
    fn test_single_streaming_turn_across_exchanges() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("first"), None));
        conversation.begin_exchange("second question");

        assert_eq!(conversation.streaming_count(), 1);
        assert!(conversation.last().unwrap().is_unstarted());
    }

    #[test]
    fn test_serialized_shape() {
        let mut conversation = started();
        conversation.apply_frame(&frame(Phase::Thinking, Some("t"), None));

        let json = serde_json::to_value(&conversation).unwrap();
        assert_eq!(json["entries"][0]["role"], "user");
        assert_eq!(json["entries"][1]["role"], "assistant");
        assert_eq!(json["entries"][1]["reasoning"]["state"], "text");
        assert_eq!(json["entries"][1]["reasoning"]["text"], "t");
        assert_eq!(json["entries"][1]["answer"]["state"], "streaming");
    }
}
