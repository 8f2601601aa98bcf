use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use vibe_assist::transport::parse_reply;
use vibe_assist::{
    ChatController, ChatError, ChatTransport, Message, Role, SubmitMode, Transcript, FALLBACK_ERROR,
};

/// Answers from a fixed table and counts how often it was called.
struct Scripted {
    replies: HashMap<String, String>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(replies: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for Scripted {
    async fn send(&self, message: &str) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .get(message)
            .cloned()
            .ok_or_else(|| ChatError::Other(format!("no scripted reply for {:?}", message)))
    }
}

/// Always fails with the given error text.
struct Failing(&'static str);

#[async_trait]
impl ChatTransport for Failing {
    async fn send(&self, _message: &str) -> Result<String, ChatError> {
        Err(ChatError::Other(self.0.to_string()))
    }
}

/// Replies with a raw body, decoded the same way the HTTP transport does.
struct RawBody(&'static [u8]);

#[async_trait]
impl ChatTransport for RawBody {
    async fn send(&self, _message: &str) -> Result<String, ChatError> {
        parse_reply(self.0)
    }
}

/// Each message blocks until the test releases its reply.
struct Gated {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<String, ChatError>>>>,
}

impl Gated {
    fn new(messages: &[&str]) -> (Arc<Self>, HashMap<String, oneshot::Sender<Result<String, ChatError>>>) {
        let mut gates = HashMap::new();
        let mut releases = HashMap::new();
        for message in messages {
            let (tx, rx) = oneshot::channel();
            gates.insert(message.to_string(), rx);
            releases.insert(message.to_string(), tx);
        }
        (Arc::new(Self { gates: Mutex::new(gates) }), releases)
    }
}

#[async_trait]
impl ChatTransport for Gated {
    async fn send(&self, message: &str) -> Result<String, ChatError> {
        let gate = self.gates.lock().unwrap().remove(message);
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ChatError::Other("gate dropped".to_string()))),
            None => Err(ChatError::Other(format!("unexpected message {:?}", message))),
        }
    }
}

fn roles(transcript: &Transcript) -> Vec<Role> {
    transcript.messages().map(|m| m.role).collect()
}

fn texts(transcript: &Transcript) -> Vec<String> {
    transcript.messages().map(|m| m.text.clone()).collect()
}

#[tokio::test]
async fn test_hello_gets_assistant_reply() {
    let transport = Scripted::new(&[("Hello", "Hi there")]);
    let mut controller = ChatController::new(transport.clone(), SubmitMode::Concurrent);
    let mut transcript = Transcript::new();
    let mut input = "Hello".to_string();

    assert!(controller.submit(&mut input, &mut transcript));
    controller.settle(&mut transcript).await;

    assert_eq!(transcript.last_message(), Some(&Message::assistant("Hi there")));
    assert_eq!(roles(&transcript), vec![Role::User, Role::Assistant]);
    assert_eq!(transcript.pending_count(), 0);
    assert_eq!(transport.calls(), 1);
    assert!(input.is_empty());
}

#[tokio::test]
async fn test_blank_input_sends_nothing() {
    let transport = Scripted::new(&[]);
    let mut controller = ChatController::new(transport.clone(), SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    for blank in ["", " ", "\t\n  ", "\u{3000}"] {
        assert!(!controller.submit_text(blank, &mut transcript));
    }
    controller.settle(&mut transcript).await;

    assert_eq!(transcript.message_count(), 0);
    assert_eq!(transcript.pending_count(), 0);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_transport_failure_shows_fallback_only() {
    let mut controller = ChatController::new(
        Arc::new(Failing("dns error: no such host vylnex.internal")),
        SubmitMode::Concurrent,
    );
    let mut transcript = Transcript::new();

    controller.submit_text("Where is my order?", &mut transcript);
    controller.settle(&mut transcript).await;

    assert_eq!(roles(&transcript), vec![Role::User, Role::Error]);
    assert_eq!(transcript.last_message().unwrap().text, FALLBACK_ERROR);
    assert!(texts(&transcript).iter().all(|t| !t.contains("dns error")));
}

#[tokio::test]
async fn test_protocol_failure_indistinguishable_from_transport_failure() {
    let mut not_json = Transcript::new();
    let mut controller = ChatController::new(Arc::new(RawBody(b"<html>oops</html>")), SubmitMode::Concurrent);
    controller.submit_text("Hello", &mut not_json);
    controller.settle(&mut not_json).await;

    let mut wrong_shape = Transcript::new();
    let mut controller = ChatController::new(Arc::new(RawBody(br#"{"reply": "hi"}"#)), SubmitMode::Concurrent);
    controller.submit_text("Hello", &mut wrong_shape);
    controller.settle(&mut wrong_shape).await;

    let mut unreachable = Transcript::new();
    let mut controller = ChatController::new(Arc::new(Failing("connection refused")), SubmitMode::Concurrent);
    controller.submit_text("Hello", &mut unreachable);
    controller.settle(&mut unreachable).await;

    assert_eq!(texts(&not_json), texts(&unreachable));
    assert_eq!(texts(&wrong_shape), texts(&unreachable));
    assert_eq!(not_json.last_message(), Some(&Message::error(FALLBACK_ERROR)));
}

#[tokio::test]
async fn test_every_submission_ends_with_one_terminal_message() {
    let inputs = ["Hello", "  padded  ", "unknown question", "multi\nline"];
    let transport = Scripted::new(&[("Hello", "Hi"), ("padded", "ok"), ("multi\nline", "two lines")]);

    for input in inputs {
        let mut controller = ChatController::new(transport.clone(), SubmitMode::Concurrent);
        let mut transcript = Transcript::new();

        controller.submit_text(input, &mut transcript);
        controller.settle(&mut transcript).await;

        let roles = roles(&transcript);
        assert_eq!(roles.len(), 2, "input {:?}", input);
        assert_eq!(roles[0], Role::User);
        assert!(roles[1].is_terminal());
        assert_eq!(transcript.pending_count(), 0);
        assert_eq!(controller.outstanding(), 0);
    }
}

#[tokio::test]
async fn test_sequential_submissions_alternate() {
    let transport = Scripted::new(&[("hello", "hi")]);
    let mut controller = ChatController::new(transport.clone(), SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    controller.submit_text("hello", &mut transcript);
    controller.settle(&mut transcript).await;
    controller.submit_text("hello", &mut transcript);
    controller.settle(&mut transcript).await;

    assert_eq!(
        roles(&transcript),
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_replies_land_in_completion_order() {
    let (transport, mut releases) = Gated::new(&["A", "B"]);
    let mut controller = ChatController::new(transport, SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    controller.submit_text("A", &mut transcript);
    controller.submit_text("B", &mut transcript);
    assert_eq!(transcript.pending_count(), 2);
    assert_eq!(controller.in_flight(), 2);

    // B finishes first
    releases.remove("B").unwrap().send(Ok("reply B".to_string())).unwrap();
    let first = controller.next_completion().await.unwrap();
    controller.apply(first, &mut transcript);
    assert_eq!(transcript.pending_count(), 1);

    releases.remove("A").unwrap().send(Ok("reply A".to_string())).unwrap();
    let second = controller.next_completion().await.unwrap();
    controller.apply(second, &mut transcript);

    assert_eq!(texts(&transcript), vec!["A", "B", "reply B", "reply A"]);
    assert_eq!(transcript.message_count(), 4);
    assert_eq!(transcript.pending_count(), 0);
    assert!(controller.next_completion().await.is_none());
}

#[tokio::test]
async fn test_concurrent_failure_does_not_affect_sibling() {
    let (transport, mut releases) = Gated::new(&["A", "B"]);
    let mut controller = ChatController::new(transport, SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    controller.submit_text("A", &mut transcript);
    controller.submit_text("B", &mut transcript);

    releases
        .remove("A")
        .unwrap()
        .send(Err(ChatError::Other("timed out".to_string())))
        .unwrap();
    releases.remove("B").unwrap().send(Ok("reply B".to_string())).unwrap();
    controller.settle(&mut transcript).await;

    let messages: Vec<&Message> = transcript.messages().collect();
    assert_eq!(messages.len(), 4);
    assert!(messages.contains(&&Message::error(FALLBACK_ERROR)));
    assert!(messages.contains(&&Message::assistant("reply B")));
}

#[tokio::test]
async fn test_serialized_mode_holds_second_request() {
    let (transport, mut releases) = Gated::new(&["A", "B"]);
    let mut controller = ChatController::new(transport, SubmitMode::Serialized);
    let mut transcript = Transcript::new();

    controller.submit_text("A", &mut transcript);
    controller.submit_text("B", &mut transcript);
    assert_eq!(transcript.pending_count(), 1);
    assert_eq!(controller.in_flight(), 1);
    assert_eq!(controller.outstanding(), 2);

    // Releasing B early changes nothing: it has not been sent yet
    releases.remove("B").unwrap().send(Ok("reply B".to_string())).unwrap();
    releases.remove("A").unwrap().send(Ok("reply A".to_string())).unwrap();
    controller.settle(&mut transcript).await;

    assert_eq!(texts(&transcript), vec!["A", "B", "reply A", "reply B"]);
    assert_eq!(transcript.pending_count(), 0);
}

#[tokio::test]
async fn test_reply_is_escaped_for_display() {
    let transport = Scripted::new(&[("Hello", "\x1b[2J\x1b[31m<b>Hi</b>\x1b[0m\x07")]);
    let mut controller = ChatController::new(transport, SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    controller.submit_text("Hello", &mut transcript);
    controller.settle(&mut transcript).await;

    assert_eq!(transcript.last_message(), Some(&Message::assistant("<b>Hi</b>")));
}

static PANICS: AtomicUsize = AtomicUsize::new(0);

/// Count panics on any thread, spawned tasks included.
fn count_panics() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            PANICS.fetch_add(1, Ordering::SeqCst);
            original(info);
        }));
    });
}

#[tokio::test]
async fn test_teardown_discards_outstanding_reply() {
    count_panics();
    let panics_before = PANICS.load(Ordering::SeqCst);

    let (transport, mut releases) = Gated::new(&["A"]);
    let mut controller = ChatController::new(transport.clone(), SubmitMode::Concurrent);
    let mut transcript = Transcript::new();

    controller.submit_text("A", &mut transcript);
    drop(controller);

    // The request task holds the only other reference to the transport
    assert_eq!(Arc::strong_count(&transport), 2);
    releases.remove("A").unwrap().send(Ok("too late".to_string())).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while Arc::strong_count(&transport) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("request task never finished");

    assert_eq!(PANICS.load(Ordering::SeqCst), panics_before);
    assert_eq!(roles(&transcript), vec![Role::User]);
    assert_eq!(transcript.pending_count(), 1);
}
