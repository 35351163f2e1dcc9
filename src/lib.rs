//! LegalX streaming chat client
//!
//! Sends a prompt to the LegalX `/generate` route and folds the streamed,
//! two-phase answer (reasoning, then the final answer) into a conversation.

pub mod cli;
pub mod client;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod logging;
pub mod session;
pub mod stream;


pub use client::GenerateClient;
pub use config::AppConfig;
pub use conversation::Conversation;
pub use conversation::ConversationEntry;
pub use conversation::Field;
pub use errors::*;
pub use session::ChatSession;
pub use session::FrameSource;
pub use session::SubmitOutcome;
pub use stream::FrameStream;
pub use stream::StreamFrame;
