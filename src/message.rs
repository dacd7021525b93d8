// src/message.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/chat/send`. `session_id` is serialized as `null`
/// when the conversation has not been created yet.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message: ChatRecord,
    pub session_id: String,
}

/// One stored message/response pair.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatRecord {
    pub message: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

/// Session list entry. Older servers send `topic`/`created_at` instead of
/// `title`/`updated_at`, so both spellings are accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SessionSummary {
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or(self.topic.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn last_activity(&self) -> Option<&str> {
        self.updated_at.as_deref().or(self.created_at.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct TopicRequest<'a> {
    pub topic: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TopicResponse {
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackRequest<'a> {
    pub feedback: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContextRequest<'a> {
    pub context: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ContextResponse {
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}
