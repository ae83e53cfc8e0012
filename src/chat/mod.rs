use futures::StreamExt;
use log::{ error, info, warn };
use std::sync::Arc;

use crate::gateway::QueryBackend;
use crate::models::chat::{ ChatMessage, Feedback, MessageRole };
use crate::models::query::{ QueryFeedbackRequest, QueryResponseChunk };
use crate::player::VideoPositionSynchronizer;

/// Fixed user-facing text shown in place of an answer when the stream dies.
pub const ANSWER_FAILED_TEXT: &str =
    "Sorry, I couldn't finish answering that. Please try asking again.";

/// Owns one pod's transcript and orchestrates a single in-flight query:
/// placeholder creation, streamed appends, the one-shot video-seek trigger,
/// and optimistic feedback with rollback. Submissions are serialized by
/// `&mut self`, so a second question queues behind the running stream and
/// transcript order stays deterministic.
pub struct ChatController {
    pod_id: i64,
    backend: Arc<dyn QueryBackend>,
    synchronizer: Arc<VideoPositionSynchronizer>,
    messages: Vec<ChatMessage>,
    awaiting_response: bool,
    next_seq: u64,
    fragment_observer: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl ChatController {
    pub fn new(
        pod_id: i64,
        backend: Arc<dyn QueryBackend>,
        synchronizer: Arc<VideoPositionSynchronizer>
    ) -> Self {
        Self {
            pod_id,
            backend,
            synchronizer,
            messages: Vec::new(),
            awaiting_response: false,
            next_seq: 0,
            fragment_observer: None,
        }
    }

    /// Registers a callback invoked with every streamed answer fragment, in
    /// arrival order. The console uses this for progressive rendering.
    pub fn with_fragment_observer(
        mut self,
        observer: impl Fn(&str) + Send + Sync + 'static
    ) -> Self {
        self.fragment_observer = Some(Box::new(observer));
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn last_answer_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Ai)
            .map(|m| m.id.as_str())
    }

    /// Submits one question and drives its answer stream to completion. A
    /// blank question is a local no-op. Stream failure replaces any partial
    /// answer with the fixed error text; it never tears down the session.
    pub async fn submit_question(&mut self, text: &str) {
        let question = text.trim().to_string();
        if question.is_empty() {
            return;
        }

        let user = ChatMessage::user(&question, self.next_seq);
        self.next_seq += 1;
        self.messages.push(user);

        let placeholder = ChatMessage::placeholder(self.next_seq);
        self.next_seq += 1;
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);

        self.awaiting_response = true;

        let mut stream = match self.backend.query_stream(self.pod_id, &question).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Query against pod {} failed to start: {}", self.pod_id, e);
                self.fail_placeholder(&placeholder_id);
                self.awaiting_response = false;
                return;
            }
        };

        let mut seeked_path: Option<String> = None;
        let mut failed = false;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    self.apply_chunk(&placeholder_id, &chunk, &mut seeked_path).await;
                }
                Err(e) => {
                    error!("Answer stream for pod {} failed: {}", self.pod_id, e);
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            self.fail_placeholder(&placeholder_id);
        }
        self.awaiting_response = false;
    }

    /// Appends one streamed chunk to the placeholder. The first chunk naming
    /// a video and a usable offset fires exactly one seek for this
    /// submission; later chunks re-trigger only when they name a different
    /// video.
    async fn apply_chunk(
        &mut self,
        placeholder_id: &str,
        chunk: &QueryResponseChunk,
        seeked_path: &mut Option<String>
    ) {
        let hint = chunk.video_hint().map(|(path, start)| (path.to_string(), start));

        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == placeholder_id) {
            msg.answer_text.push_str(&chunk.response_fragment);
            if let Some((path, start)) = &hint {
                if msg.video_path.is_none() {
                    msg.video_path = Some(path.clone());
                    msg.video_timestamp = Some(*start);
                }
            }
        } else {
            warn!("Dropping stream chunk for unknown message '{}'", placeholder_id);
            return;
        }

        if let Some(observer) = &self.fragment_observer {
            observer(&chunk.response_fragment);
        }

        if let Some((path, start)) = hint {
            if seeked_path.as_deref() != Some(path.as_str()) {
                self.synchronizer.request_seek(start, Some(&path)).await;
                *seeked_path = Some(path);
            }
        }
    }

    fn fail_placeholder(&mut self, placeholder_id: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == placeholder_id) {
            // Partial content would read as a complete answer; drop it.
            msg.answer_text = ANSWER_FAILED_TEXT.to_string();
        }
    }

    /// Optimistically records feedback on a finished answer, then confirms it
    /// with the backend; a failed submission restores the exact pre-call
    /// state. An unknown message id is a logged no-op, not an error: a stale
    /// reference must not crash the session.
    pub async fn submit_feedback(
        &mut self,
        message_id: &str,
        sentiment: Feedback,
        comment: Option<String>,
        category: Option<String>
    ) {
        let pos = match self.messages.iter().position(|m| m.id == message_id) {
            Some(pos) => pos,
            None => {
                warn!("Feedback for unknown message '{}', ignoring", message_id);
                return;
            }
        };

        let question = self.messages[..pos]
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.question_text.clone())
            .unwrap_or_default();

        let snapshot = {
            let msg = &self.messages[pos];
            (msg.feedback, msg.feedback_comment.clone(), msg.feedback_category.clone())
        };

        {
            let msg = &mut self.messages[pos];
            msg.feedback = Some(sentiment);
            msg.feedback_comment = comment.clone();
            msg.feedback_category = category.clone();
        }

        let request = QueryFeedbackRequest {
            knowledge_base_id: self.pod_id,
            query: question,
            response: self.messages[pos].answer_text.clone(),
            thumbs_up: sentiment.thumbs_up(),
            comments: comment,
            category,
        };

        let outcome = self.backend.submit_feedback(request).await;
        match outcome {
            Ok(resp) if resp.success => {
                info!("Feedback recorded for message {}", message_id);
            }
            Ok(_) => {
                warn!("Backend rejected feedback for message {}, reverting", message_id);
                self.restore_feedback(pos, snapshot);
            }
            Err(e) => {
                warn!("Feedback submission failed, reverting: {}", e);
                self.restore_feedback(pos, snapshot);
            }
        }
    }

    fn restore_feedback(
        &mut self,
        pos: usize,
        snapshot: (Option<Feedback>, Option<String>, Option<String>)
    ) {
        let msg = &mut self.messages[pos];
        msg.feedback = snapshot.0;
        msg.feedback_comment = snapshot.1;
        msg.feedback_category = snapshot.2;
    }

    /// Drops the transcript; used when navigating away from a pod.
    pub fn clear_transcript(&mut self) {
        self.messages.clear();
        self.awaiting_response = false;
    }
}
