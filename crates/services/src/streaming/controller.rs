//! Lifecycle of the per-session push channel.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::SessionStore;
use crate::streaming::frame::{StreamFrame, decode_questions};
use crate::streaming::transport::{FrameStream, StreamTransport};

/// User-facing message for transport and decode failures.
const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

/// Owns at most one live channel subscription at a time.
///
/// `connect` supersedes any previous channel before opening a new one;
/// `disconnect` is idempotent and safe to call when nothing is open.
/// Channel failures are never returned to callers: every one of them is
/// converted into session store state.
pub struct StreamController {
    store: SessionStore,
    transport: Arc<dyn StreamTransport>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamController {
    #[must_use]
    pub fn new(store: SessionStore, transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            store,
            transport,
            task: Mutex::new(None),
        }
    }

    /// Open the push channel for `session_id`.
    ///
    /// Any previously open channel is closed first, so at most one is ever
    /// live. The generating flag is raised before the first frame can
    /// arrive, and every terminal condition (completion, backend error,
    /// decode failure, transport failure, end of stream) closes the
    /// channel and settles the store.
    pub async fn connect(&self, session_id: &str) {
        self.disconnect();

        let epoch = self.store.open_channel();
        debug!(session_id, "opening stream channel");

        let stream = match self.transport.subscribe(session_id).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id, error = %e, "stream subscription failed");
                self.store.apply_if_open(epoch, |s| s.fail(GENERIC_FAILURE));
                self.store.close_channel();
                return;
            }
        };

        let store = self.store.clone();
        let handle = tokio::spawn(run_channel(store, stream, epoch));
        *self.lock_task() = Some(handle);
    }

    /// Close any open channel. Idempotent; no observable state change
    /// beyond stopping frame processing.
    pub fn disconnect(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            debug!("stream channel closed");
        }
        // Invalidate the epoch even if the task already finished, so a
        // frame caught mid-application cannot land after this call.
        self.store.close_channel();
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}

/// Consume the subscription until a terminal condition.
async fn run_channel(store: SessionStore, mut stream: FrameStream, epoch: u64) {
    loop {
        match stream.next().await {
            Some(Ok(payload)) => {
                if apply_frame(&store, &payload, epoch).is_terminal() {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "stream transport error");
                store.apply_if_open(epoch, |s| s.fail(GENERIC_FAILURE));
                break;
            }
            // The server closed the connection without a terminal frame.
            None => {
                warn!("stream ended without terminal frame");
                store.apply_if_open(epoch, |s| s.fail(GENERIC_FAILURE));
                break;
            }
        }
    }
    // Guarded close: if this channel was superseded while a frame was in
    // flight, the successor's epoch must stay valid.
    store.close_channel_if(epoch);
}

enum FrameOutcome {
    Continue,
    Terminal,
}

impl FrameOutcome {
    fn is_terminal(&self) -> bool {
        matches!(self, FrameOutcome::Terminal)
    }
}

/// Apply one inbound frame to the store.
///
/// A question batch is applied before any terminal field is evaluated, so
/// data arriving alongside the terminal signal is not dropped. Decode
/// failures are fatal to the session: the frame is not applied and the
/// channel closes as if the transport had failed.
fn apply_frame(store: &SessionStore, payload: &str, epoch: u64) -> FrameOutcome {
    let frame = match StreamFrame::parse(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "undecodable frame");
            store.apply_if_open(epoch, |s| s.fail(GENERIC_FAILURE));
            return FrameOutcome::Terminal;
        }
    };

    if let Some(raw) = frame.questions.as_deref() {
        let batch = match decode_questions(raw) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "undecodable question batch");
                store.apply_if_open(epoch, |s| s.fail(GENERIC_FAILURE));
                return FrameOutcome::Terminal;
            }
        };
        if !batch.is_empty() {
            debug!(count = batch.len(), "questions received");
            store.apply_if_open(epoch, |s| s.append_questions(batch));
        }
    }

    let complete = frame.is_complete();
    if complete {
        debug!("stream complete");
        store.apply_if_open(epoch, |s| s.set_generating(false));
    }
    if let Some(message) = frame.error {
        warn!(error = %message, "backend reported failure");
        store.apply_if_open(epoch, |s| s.fail(message));
    } else if !complete {
        return FrameOutcome::Continue;
    }
    FrameOutcome::Terminal
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use sitequiz_core::model::Session;

    use crate::error::StreamError;

    use super::*;

    type ScriptedItem = Result<String, StreamError>;

    /// Hands out pre-built streams, one per `connect` call.
    struct ScriptedTransport {
        streams: Mutex<VecDeque<mpsc::Receiver<ScriptedItem>>>,
    }

    impl ScriptedTransport {
        fn new(count: usize) -> (Arc<Self>, Vec<mpsc::Sender<ScriptedItem>>) {
            let mut senders = Vec::new();
            let mut streams = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = mpsc::channel(16);
                senders.push(tx);
                streams.push_back(rx);
            }
            (
                Arc::new(Self {
                    streams: Mutex::new(streams),
                }),
                senders,
            )
        }
    }

    #[async_trait]
    impl StreamTransport for ScriptedTransport {
        async fn subscribe(&self, _session_id: &str) -> Result<FrameStream, StreamError> {
            let rx = self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| StreamError::Transport("no scripted stream left".into()))?;
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    fn question_frame(texts: &[&str]) -> String {
        let questions: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| serde_json::json!({ "question": t, "options": [] }))
            .collect();
        let inner = serde_json::to_string(&questions).unwrap();
        serde_json::json!({ "questions": inner }).to_string()
    }

    async fn wait_for(store: &SessionStore, pred: impl Fn(&Session) -> bool) {
        let mut rx = store.subscribe();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if pred(&rx.borrow_and_update()) {
                    return;
                }
                rx.changed().await.expect("store dropped");
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn question_texts(session: &Session) -> Vec<String> {
        session
            .questions()
            .iter()
            .map(|q| q.question.clone())
            .collect()
    }

    #[tokio::test]
    async fn frames_append_questions_in_arrival_order() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        assert!(store.snapshot().is_generating());

        tx.send(Ok(question_frame(&["q1"]))).await.unwrap();
        tx.send(Ok("{}".into())).await.unwrap();
        tx.send(Ok(question_frame(&["q2", "q3"]))).await.unwrap();

        wait_for(&store, |s| s.questions().len() == 3).await;
        assert_eq!(question_texts(&store.snapshot()), ["q1", "q2", "q3"]);
        assert!(store.snapshot().is_generating());
    }

    #[tokio::test]
    async fn complete_frame_settles_and_closes_the_channel() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        tx.send(Ok(question_frame(&["q1"]))).await.unwrap();
        tx.send(Ok(r#"{"status":"complete"}"#.into())).await.unwrap();

        wait_for(&store, |s| !s.is_generating()).await;
        let settled = store.snapshot();
        assert_eq!(settled.error(), None);
        assert_eq!(question_texts(&settled), ["q1"]);

        // The consuming task is gone; residual buffered sends fail and
        // nothing mutates the store.
        tokio::time::timeout(Duration::from_secs(1), async {
            while tx.send(Ok(question_frame(&["late"]))).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("channel task should stop consuming");
        assert_eq!(store.snapshot(), settled);
    }

    #[tokio::test]
    async fn question_batch_in_terminal_frame_is_not_dropped() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        let inner = r#"[{"question":"q1","options":[]}]"#;
        let frame = serde_json::json!({ "questions": inner, "status": "complete" }).to_string();
        tx.send(Ok(frame)).await.unwrap();

        wait_for(&store, |s| !s.is_generating()).await;
        assert_eq!(question_texts(&store.snapshot()), ["q1"]);
    }

    #[tokio::test]
    async fn backend_error_frame_fails_the_session_verbatim() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        tx.send(Ok(r#"{"error":"could not crawl site"}"#.into()))
            .await
            .unwrap();

        wait_for(&store, |s| s.error().is_some()).await;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.error(), Some("could not crawl site"));
        assert!(!snapshot.is_generating());
    }

    #[tokio::test]
    async fn transport_error_fails_with_generic_message() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        tx.send(Err(StreamError::Transport("connection reset".into())))
            .await
            .unwrap();

        wait_for(&store, |s| s.error().is_some()).await;
        assert_eq!(store.snapshot().error(), Some(GENERIC_FAILURE));
        assert!(!store.snapshot().is_generating());
    }

    #[tokio::test]
    async fn stream_end_without_terminal_frame_is_a_failure() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        drop(tx);

        wait_for(&store, |s| s.error().is_some()).await;
        assert_eq!(store.snapshot().error(), Some(GENERIC_FAILURE));
    }

    #[tokio::test]
    async fn undecodable_question_batch_is_fatal() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        tx.send(Ok(r#"{"questions":"not a question array"}"#.into()))
            .await
            .unwrap();

        wait_for(&store, |s| s.error().is_some()).await;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.error(), Some(GENERIC_FAILURE));
        assert!(snapshot.questions().is_empty());
        assert!(!snapshot.is_generating());
    }

    #[tokio::test]
    async fn subscription_failure_fails_the_session() {
        let store = SessionStore::new();
        // Zero scripted streams: subscribe returns an error.
        let (transport, _senders) = ScriptedTransport::new(0);
        let controller = StreamController::new(store.clone(), transport);

        controller.connect("s1").await;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.error(), Some(GENERIC_FAILURE));
        assert!(!snapshot.is_generating());
    }

    #[tokio::test]
    async fn connect_supersedes_the_previous_channel() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(2);
        let controller = StreamController::new(store.clone(), transport);
        let tx_b = senders.remove(1);
        let tx_a = senders.remove(0);

        controller.connect("a").await;
        tx_a.send(Ok(question_frame(&["q1"]))).await.unwrap();
        wait_for(&store, |s| s.questions().len() == 1).await;

        controller.connect("b").await;
        // Late frames on the superseded channel must mutate nothing.
        let _ = tx_a.send(Ok(question_frame(&["stale"]))).await;
        let _ = tx_a.send(Ok(r#"{"error":"stale failure"}"#.into())).await;

        tx_b.send(Ok(question_frame(&["q2"]))).await.unwrap();
        tx_b.send(Ok(r#"{"status":"complete"}"#.into())).await.unwrap();

        wait_for(&store, |s| !s.is_generating()).await;
        let snapshot = store.snapshot();
        assert_eq!(question_texts(&snapshot), ["q1", "q2"]);
        assert_eq!(snapshot.error(), None);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let store = SessionStore::new();
        let (transport, mut senders) = ScriptedTransport::new(1);
        let controller = StreamController::new(store.clone(), transport);
        let tx = senders.remove(0);

        controller.connect("s1").await;
        tx.send(Ok(question_frame(&["q1"]))).await.unwrap();
        wait_for(&store, |s| s.questions().len() == 1).await;

        controller.disconnect();
        let after_first = store.snapshot();
        controller.disconnect();
        controller.disconnect();
        assert_eq!(store.snapshot(), after_first);
    }

    #[tokio::test]
    async fn disconnect_without_a_channel_is_a_no_op() {
        let store = SessionStore::new();
        let (transport, _senders) = ScriptedTransport::new(0);
        let controller = StreamController::new(store.clone(), transport);

        let before = store.snapshot();
        controller.disconnect();
        assert_eq!(store.snapshot(), before);
    }
}
