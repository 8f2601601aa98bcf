//! One message in, one reply out, without the terminal front-end.

use std::sync::Arc;

use crate::controller::{ChatController, SubmitMode};
use crate::transcript::{Message, Role, Transcript};
use crate::transport::ChatTransport;

/// What a one-shot exchange left behind.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub transcript: Transcript,
}

impl AskOutcome {
    /// False when the exchange ended with the error message. A blank
    /// message sends nothing and counts as success.
    pub fn succeeded(&self) -> bool {
        self.transcript
            .last_message()
            .map(|m| m.role != Role::Error)
            .unwrap_or(true)
    }

    /// Text to print: the terminal message, or with `json` the whole
    /// transcript. `None` when nothing was sent.
    pub fn render(&self, json: bool) -> serde_json::Result<Option<String>> {
        if self.transcript.is_empty() {
            return Ok(None);
        }
        if json {
            let messages: Vec<&Message> = self.transcript.messages().collect();
            return serde_json::to_string_pretty(&messages).map(Some);
        }
        Ok(self.transcript.last_message().map(|m| m.text.clone()))
    }
}

/// Submit `message` over `transport` and wait for its terminal message.
pub async fn ask(transport: Arc<dyn ChatTransport>, message: &str) -> AskOutcome {
    let mut controller = ChatController::new(transport, SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    if controller.submit_text(message, &mut transcript) {
        controller.settle(&mut transcript).await;
    }

    AskOutcome { transcript }
}
