//! The chat exchange controller.
//!
//! One submission goes through: user message appended, pending indicator
//! shown, request sent, then the indicator removed and exactly one
//! assistant or error message appended. Requests run on spawned tasks;
//! their results come back over a channel and are applied by whoever owns
//! the sink, so the transcript is only ever touched from one task.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::transcript::{Message, PendingId, TranscriptSink};
use crate::transport::ChatTransport;

/// Shown in place of any failure. The failure itself only goes to the log.
pub const FALLBACK_ERROR: &str =
    "Sorry, I'm having trouble connecting right now. Please try again later.";

/// The text field the user composes in.
pub trait InputSource {
    fn text(&self) -> String;
    fn clear(&mut self);
}

impl InputSource for String {
    fn text(&self) -> String {
        self.clone()
    }

    fn clear(&mut self) {
        String::clear(self);
    }
}

/// How overlapping submissions are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Every submission gets its own request immediately; replies land in
    /// completion order.
    #[default]
    Concurrent,
    /// One request in flight at a time. Later submissions show their user
    /// message at once and wait in FIFO order for the slot.
    Serialized,
}

/// A finished request, ready to be applied to the sink.
#[derive(Debug)]
pub struct Completion {
    pub pending: PendingId,
    pub outcome: Result<String, ChatError>,
}

pub struct ChatController {
    transport: Arc<dyn ChatTransport>,
    mode: SubmitMode,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    queued: VecDeque<String>,
}

impl ChatController {
    pub fn new(transport: Arc<dyn ChatTransport>, mode: SubmitMode) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            mode,
            completions_tx,
            completions_rx,
            in_flight: 0,
            queued: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// Requests sent and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Submissions still waiting for a terminal message, sent or queued.
    pub fn outstanding(&self) -> usize {
        self.in_flight + self.queued.len()
    }

    /// Take the text from `input` and submit it. Blank input is ignored
    /// and left in place; anything else clears the input.
    pub fn submit(&mut self, input: &mut impl InputSource, sink: &mut impl TranscriptSink) -> bool {
        let text = input.text();
        if text.trim().is_empty() {
            return false;
        }
        input.clear();
        self.submit_text(&text, sink)
    }

    /// Submit `text` directly. Returns false, with no side effects, when
    /// the trimmed text is empty.
    pub fn submit_text(&mut self, text: &str, sink: &mut impl TranscriptSink) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        sink.append(Message::user(text));

        if self.mode == SubmitMode::Serialized && self.in_flight > 0 {
            self.queued.push_back(text.to_string());
            tracing::debug!(queued = self.queued.len(), "chat submission queued");
        } else {
            self.dispatch(text.to_string(), sink);
        }
        true
    }

    fn dispatch(&mut self, message: String, sink: &mut impl TranscriptSink) {
        let pending = sink.show_pending();
        self.in_flight += 1;
        tracing::debug!(pending = pending.0, in_flight = self.in_flight, "chat request dispatched");

        let transport = Arc::clone(&self.transport);
        let completions_tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(transport.send(&message))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ChatError::Other("chat transport panicked".to_string())));

            // Receiver gone means the controller was torn down; drop the reply.
            let _ = completions_tx.send(Completion { pending, outcome });
        });
    }

    /// Wait for the next request to finish. `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        self.completions_rx.recv().await
    }

    /// Render a finished request: remove its indicator, then append the
    /// terminal message.
    pub fn apply(&mut self, completion: Completion, sink: &mut impl TranscriptSink) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if !sink.remove_pending(completion.pending) {
            tracing::warn!(pending = completion.pending.0, "pending indicator already gone");
        }

        match completion.outcome {
            Ok(text) => sink.append(Message::assistant(text)),
            Err(err) => {
                tracing::error!(error = %err, protocol = err.is_protocol(), "chat exchange failed");
                sink.append(Message::error(FALLBACK_ERROR));
            }
        }

        if self.in_flight == 0 {
            if let Some(next) = self.queued.pop_front() {
                self.dispatch(next, sink);
            }
        }
    }

    /// Apply completions until nothing is outstanding.
    pub async fn settle(&mut self, sink: &mut impl TranscriptSink) {
        while let Some(completion) = self.next_completion().await {
            self.apply(completion, sink);
        }
    }
}
