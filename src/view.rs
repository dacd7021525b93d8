// src/view.rs
//! The render surface the controller drives. A browser page, a terminal or a
//! test recorder can all sit behind [`View`].

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::services::banner::{Banner, BannerId};
use crate::services::format::{escape_html, format_message};

pub const PENDING_TEXT: &str = "Thinking...";
pub const GREETING_TEXT: &str =
    "Starting a new conversation! I can help answer questions and chat. Please type your question.";
pub const UNTITLED_SESSION: &str = "New chat";

/// Optional controls a page may or may not carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    LoginForm,
    RegisterForm,
    FormToggle,
    MessageInput,
    SendButton,
    NewChatButton,
    LogoutButton,
    SessionList,
    UserName,
    MessagePane,
}

impl Control {
    pub const ALL: [Control; 10] = [
        Control::LoginForm,
        Control::RegisterForm,
        Control::FormToggle,
        Control::MessageInput,
        Control::SendButton,
        Control::NewChatButton,
        Control::LogoutButton,
        Control::SessionList,
        Control::UserName,
        Control::MessagePane,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Chat,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Chat => "/chat",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    Login,
    Register,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Error,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        MessageId(format!("msg_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub role: MessageRole,
    pub text: String,
    pub html: String,
    /// Local wall-clock label; empty for the pending placeholder.
    pub timestamp: String,
    pub pending: bool,
}

impl RenderedMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: MessageId::generate(),
            role,
            html: format_message(&text),
            text,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            pending: false,
        }
    }

    pub fn pending() -> Self {
        Self {
            id: MessageId::generate(),
            role: MessageRole::Assistant,
            text: PENDING_TEXT.to_string(),
            html: escape_html(PENDING_TEXT),
            timestamp: String::new(),
            pending: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRow {
    pub session_id: String,
    pub title: String,
    pub date: String,
}

impl SessionRow {
    pub fn new(session_id: impl Into<String>, title: Option<&str>, updated_at: Option<&str>) -> Self {
        Self {
            session_id: session_id.into(),
            title: title.unwrap_or(UNTITLED_SESSION).to_string(),
            date: updated_at.map(local_date).unwrap_or_default(),
        }
    }
}

/// Render a server timestamp as a local calendar date. The server emits
/// naive UTC ISO-8601; RFC 3339 with an offset is also accepted. Anything
/// unparseable is shown as-is.
pub fn local_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format("%Y-%m-%d").to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        let utc = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
        return utc.with_timezone(&Local).format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Everything the controller can do to the screen. Implementations use
/// interior mutability; the controller only ever holds `&self`.
pub trait View: Send + Sync + 'static {
    fn has_control(&self, control: Control) -> bool;

    fn append_message(&self, message: &RenderedMessage);
    fn remove_message(&self, id: &MessageId);
    fn clear_messages(&self);
    fn show_greeting(&self, text: &str);

    /// Empty the input box and shrink it back to its minimum height.
    fn reset_input(&self);
    /// Disable or re-enable sending while a request is in flight.
    fn set_sending(&self, sending: bool);

    fn set_user_name(&self, name: &str);
    fn render_sessions(&self, rows: &[SessionRow]);

    fn show_banner(&self, banner: &Banner);
    fn dismiss_banner(&self, id: BannerId);

    fn show_panel(&self, panel: Panel);
    fn navigate(&self, route: Route);
}
