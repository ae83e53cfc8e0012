use chrono::Utc;
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

impl Feedback {
    pub fn thumbs_up(self) -> bool {
        matches!(self, Feedback::Like)
    }
}

/// One turn in a pod transcript. User turns carry `question_text`; AI turns
/// start as empty placeholders whose `answer_text` grows as stream chunks
/// arrive. `video_path`/`video_timestamp` are set once from the first chunk
/// that carries them and stay fixed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub answer_text: String,
    #[serde(default)]
    pub video_path: Option<String>,
    #[serde(default)]
    pub video_timestamp: Option<f64>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub feedback_comment: Option<String>,
    #[serde(default)]
    pub feedback_category: Option<String>,
    pub created_at: i64,
}

impl ChatMessage {
    pub fn user(question: &str, seq: u64) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: format!("user-{}-{}", now, seq),
            role: MessageRole::User,
            question_text: question.to_string(),
            answer_text: String::new(),
            video_path: None,
            video_timestamp: None,
            feedback: None,
            feedback_comment: None,
            feedback_category: None,
            created_at: now,
        }
    }

    pub fn placeholder(seq: u64) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: format!("assistant-{}-{}", now, seq),
            role: MessageRole::Ai,
            question_text: String::new(),
            answer_text: String::new(),
            video_path: None,
            video_timestamp: None,
            feedback: None,
            feedback_comment: None,
            feedback_category: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_keeps_same_millisecond_ids_distinct() {
        let a = ChatMessage::placeholder(1);
        let b = ChatMessage::placeholder(2);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("assistant-"));
    }

    #[test]
    fn user_message_starts_without_feedback_or_video_hints() {
        let msg = ChatMessage::user("what is shown at 2 minutes?", 0);
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.id.starts_with("user-"));
        assert!(msg.feedback.is_none());
        assert!(msg.video_path.is_none());
        assert!(msg.answer_text.is_empty());
    }

    #[test]
    fn feedback_maps_to_thumbs() {
        assert!(Feedback::Like.thumbs_up());
        assert!(!Feedback::Dislike.thumbs_up());
    }
}
