pub mod ask;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod transcript;
pub mod transport;

// Re-export main types for convenience
pub use ask::{ask, AskOutcome};
pub use config::Config;
pub use controller::{ChatController, Completion, InputSource, SubmitMode, FALLBACK_ERROR};
pub use error::ChatError;
pub use transcript::{Entry, Message, PendingId, Role, Transcript, TranscriptSink};
pub use transport::{ChatReply, ChatRequest, ChatTransport, HttpTransport};
