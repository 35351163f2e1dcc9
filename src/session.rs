//! Chat session: the conversation plus the submission state machine
//!
//! ```text
//! Idle -> Sending -> Streaming -> Idle
//!                 \            \
//!                  +-> Failed <-+-> Idle
//! ```
//!
//! A session handles one submission at a time. Every path out of `Sending`
//! ends back in `Idle`.

use std::ops::Deref;
use std::ops::DerefMut;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::conversation::Conversation;
use crate::conversation::ConversationEntry;
use crate::errors::LegalxError;
use crate::errors::Result;
use crate::stream::FrameStream;
use crate::stream::StreamFrame;

/// Input that empties the conversation without contacting the backend
pub const CLEAR_COMMAND: &str = "clear";

/// Something that can answer a prompt with a stream of frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn open(&self, prompt: &str) -> Result<FrameStream>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Failed,
}

/// What the session decided to do with a line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Empty or whitespace-only input; nothing changed
    Ignored,
    /// The conversation was emptied locally
    Cleared,
    /// The exchange was opened; the prompt must be sent to the backend
    Send(String),
}

/// Result of a full submission cycle
#[derive(Debug)]
pub enum SubmitOutcome {
    Ignored,
    Cleared,
    Completed { frames: usize },
    Failed { error: LegalxError },
}

/// Puts the session back to `Idle` if a submission is dropped mid-flight
struct InFlight<'a> {
    session: &'a mut ChatSession,
}

impl Deref for InFlight<'_> {
    type Target = ChatSession;

    fn deref(&self) -> &ChatSession {
        self.session
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut ChatSession {
        self.session
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.abandon();
    }
}

#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    state: SessionState,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// False while a submission is in flight
    pub fn can_submit(&self) -> bool {
        self.state == SessionState::Idle
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Classify a line of input and, for a real prompt, open the exchange.
    pub fn begin(&mut self, input: &str) -> Result<Submission> {
        if !self.can_submit() {
            return Err(LegalxError::Busy);
        }

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Submission::Ignored);
        }
        if trimmed.eq_ignore_ascii_case(CLEAR_COMMAND) {
            info!("Clearing conversation ({} entries)", self.conversation.len());
            self.conversation.clear();
            return Ok(Submission::Cleared);
        }

        self.conversation.begin_exchange(input);
        self.transition(SessionState::Sending);
        Ok(Submission::Send(input.to_string()))
    }

    /// The backend accepted the request and the body is being read
    pub fn mark_streaming(&mut self) {
        if self.state == SessionState::Sending {
            self.transition(SessionState::Streaming);
        }
    }

    /// Fold one frame into the in-progress turn
    pub fn apply(&mut self, frame: &StreamFrame) -> bool {
        self.conversation.apply_frame(frame)
    }

    /// The body ended normally
    pub fn complete(&mut self) {
        self.conversation.finish_stream();
        self.transition(SessionState::Idle);
    }

    /// The request or the body failed
    pub fn fail(&mut self, error: &LegalxError) {
        if error.is_transport() {
            warn!("Request failed: {}", error);
        } else {
            error!("Request could not be sent: {}", error);
        }
        self.transition(SessionState::Failed);
        self.conversation.fail_stream();
        self.transition(SessionState::Idle);
    }

    /// Give up on an in-flight submission whose future was dropped
    pub fn abandon(&mut self) {
        if self.state != SessionState::Idle {
            warn!("Abandoning in-flight submission");
            self.conversation.finish_stream();
            self.transition(SessionState::Idle);
        }
    }

    /// Run a full submission cycle against `source`.
    ///
    /// `on_update` sees the in-progress assistant turn after every frame.
    /// Dropping the returned future before it resolves abandons the
    /// submission and leaves the session ready for the next one.
    pub async fn submit<S, F>(
        &mut self,
        source: &S,
        input: &str,
        mut on_update: F,
    ) -> Result<SubmitOutcome>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&ConversationEntry),
    {
        let prompt = match self.begin(input)? {
            Submission::Ignored => return Ok(SubmitOutcome::Ignored),
            Submission::Cleared => return Ok(SubmitOutcome::Cleared),
            Submission::Send(prompt) => prompt,
        };

        let mut session = InFlight { session: self };

        let mut stream = match source.open(&prompt).await {
            Ok(stream) => stream,
            Err(error) => {
                session.fail(&error);
                return Ok(SubmitOutcome::Failed { error });
            }
        };
        session.mark_streaming();

        let mut frames = 0;
        while let Some(next) = stream.next_frame().await {
            match next {
                Ok(frame) => {
                    frames += 1;
                    if session.apply(&frame) {
                        if let Some(entry) = session.conversation.last() {
                            on_update(entry);
                        }
                    }
                }
                Err(error) => {
                    session.fail(&error);
                    return Ok(SubmitOutcome::Failed { error });
                }
            }
        }

        session.complete();
        debug!("Submission complete after {} frames", frames);
        Ok(SubmitOutcome::Completed { frames })
    }
}
