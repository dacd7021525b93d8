// src/controller.rs
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult},
    message::{LoginRequest, RegisterRequest, SendMessageRequest, User},
    services::{
        api::ChatApi,
        banner::Banner,
        push::PushHandle,
    },
    state::ClientState,
    view::{
        Control, GREETING_TEXT, MessageId, MessageRole, Panel, RenderedMessage, Route, SessionRow,
        View,
    },
};

const LOGIN_OK: &str = "Login successful!";
const LOGIN_FAILED: &str = "Login failed, please try again";
const REGISTER_OK: &str = "Registration successful! Redirecting...";
const REGISTER_FAILED: &str = "Registration failed, please try again";
const SEND_FAILED: &str = "Sorry, failed to send message";
const NETWORK_ERROR: &str = "Network error, please try again";
const LOGOUT_FAILED: &str = "Logout failed, please try again";
const PROFILE_FAILED: &str = "Could not load your profile";
const SESSIONS_FAILED: &str = "Could not load your conversations";
const HISTORY_FAILED: &str = "Could not load this conversation";
const NO_SESSION: &str = "No active conversation";

/// A user action, as raised by whatever control the page offers for it.
#[derive(Clone)]
pub enum Action {
    Login { username: String, password: String },
    Register { username: String, email: String, password: String },
    ShowPanel(Panel),
    Send(String),
    NewChat,
    Logout,
    RefreshSessions,
    OpenSession(String),
    ShowTopic,
    SetTopic(String),
    ClearTopic,
    ShowFeedback,
    SetFeedback(String),
    ClearFeedback,
    ShowContext,
    MergeContext(Map<String, Value>),
    ClearContext,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login { .. } => "login",
            Action::Register { .. } => "register",
            Action::ShowPanel(_) => "show-panel",
            Action::Send(_) => "send",
            Action::NewChat => "new-chat",
            Action::Logout => "logout",
            Action::RefreshSessions => "refresh-sessions",
            Action::OpenSession(_) => "open-session",
            Action::ShowTopic | Action::SetTopic(_) | Action::ClearTopic => "topic",
            Action::ShowFeedback | Action::SetFeedback(_) | Action::ClearFeedback => "feedback",
            Action::ShowContext | Action::MergeContext(_) | Action::ClearContext => "context",
        }
    }

    /// The action is available when any one of these controls is bound.
    fn controls(&self) -> &'static [Control] {
        match self {
            Action::Login { .. } => &[Control::LoginForm],
            Action::Register { .. } => &[Control::RegisterForm],
            Action::ShowPanel(_) => &[Control::FormToggle],
            Action::Send(_) => &[Control::SendButton, Control::MessageInput],
            Action::NewChat => &[Control::NewChatButton],
            Action::Logout => &[Control::LogoutButton],
            Action::RefreshSessions | Action::OpenSession(_) => &[Control::SessionList],
            _ => &[Control::MessagePane],
        }
    }
}

// Passwords must not reach the logs.
impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Action").field(&self.name()).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was blank; nothing rendered, nothing sent.
    Empty,
    /// Another send is still waiting for its reply.
    Busy,
    Replied,
    Failed,
}

/// Drives one page: owns the client state, talks to the backend through
/// `A`, and renders through `V`. Built when a page loads and shut down when
/// it navigates away.
pub struct ChatClientController<A, V> {
    api: A,
    view: Arc<V>,
    state: ClientState,
    bindings: OnceLock<HashSet<Control>>,
    push: Mutex<Option<PushHandle>>,
    redirect_delay: Duration,
    banner_ttl: Duration,
}

impl<A: ChatApi, V: View> ChatClientController<A, V> {
    pub fn new(api: A, view: Arc<V>, config: &ClientConfig) -> Self {
        Self {
            api,
            view,
            state: ClientState::new(),
            bindings: OnceLock::new(),
            push: Mutex::new(None),
            redirect_delay: config.redirect_delay,
            banner_ttl: config.banner_ttl,
        }
    }

    /// Bind whichever controls the page has, then load the signed-in user.
    pub async fn init(&self) {
        let bound: HashSet<Control> = Control::ALL
            .into_iter()
            .filter(|c| self.view.has_control(*c))
            .collect();
        debug!(controls = bound.len(), "controls bound");
        if self.bindings.set(bound).is_err() {
            debug!("init called twice, keeping first bindings");
        }
        self.load_user_profile().await;
    }

    pub fn attach_push(&self, handle: PushHandle) {
        if let Some(previous) = self.push_slot().replace(handle) {
            previous.close();
        }
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.push_slot().take() {
            handle.close();
            debug!("push channel closed on shutdown");
        }
    }

    pub fn is_bound(&self, control: Control) -> bool {
        self.bindings.get().is_some_and(|b| b.contains(&control))
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.state.current_session_id().await
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.current_user().await
    }

    /// Route an action to its handler. Returns `false` without doing
    /// anything when the page has no control for it.
    pub async fn dispatch(&self, action: Action) -> bool {
        let available = self
            .bindings
            .get()
            .is_some_and(|bound| action.controls().iter().any(|c| bound.contains(c)));
        if !available {
            debug!(action = action.name(), "no control bound, ignoring");
            return false;
        }

        match action {
            Action::Login { username, password } => self.login(&username, &password).await,
            Action::Register { username, email, password } => {
                self.register(&username, &email, &password).await
            }
            Action::ShowPanel(panel) => self.toggle_form(panel),
            Action::Send(text) => {
                self.send_message(&text).await;
            }
            Action::NewChat => self.new_chat().await,
            Action::Logout => self.logout().await,
            Action::RefreshSessions => self.load_sessions().await,
            Action::OpenSession(session_id) => self.load_history(&session_id).await,
            Action::ShowTopic => self.show_topic().await,
            Action::SetTopic(topic) => self.set_topic(&topic).await,
            Action::ClearTopic => self.clear_topic().await,
            Action::ShowFeedback => self.show_feedback().await,
            Action::SetFeedback(feedback) => self.set_feedback(&feedback).await,
            Action::ClearFeedback => self.clear_feedback().await,
            Action::ShowContext => self.show_context().await,
            Action::MergeContext(context) => self.merge_context(context).await,
            Action::ClearContext => self.clear_context().await,
        }
        true
    }

    pub async fn login(&self, username: &str, password: &str) {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&request).await {
            Ok(()) => {
                info!(%username, "signed in");
                self.notify(Banner::success(LOGIN_OK));
                self.redirect(Route::Chat).await;
            }
            Err(e) => self.report_auth_failure("login", e, LOGIN_FAILED),
        }
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.register(&request).await {
            Ok(()) => {
                info!(%username, "registered");
                self.notify(Banner::success(REGISTER_OK));
                self.redirect(Route::Chat).await;
            }
            Err(e) => self.report_auth_failure("register", e, REGISTER_FAILED),
        }
    }

    pub fn toggle_form(&self, panel: Panel) {
        self.view.show_panel(panel);
    }

    pub async fn send_message(&self, input: &str) -> SendOutcome {
        let message = input.trim();
        if message.is_empty() {
            return SendOutcome::Empty;
        }
        let Some(_in_flight) = self.state.begin_send() else {
            debug!("send ignored, previous message still pending");
            return SendOutcome::Busy;
        };

        self.view.set_sending(true);
        self.view
            .append_message(&RenderedMessage::new(MessageRole::User, message));
        self.view.reset_input();

        let placeholder = RenderedMessage::pending();
        self.view.append_message(&placeholder);
        let pending = PendingReply { view: &*self.view, id: placeholder.id };

        let session_id = self.state.current_session_id().await;
        let request = SendMessageRequest {
            message: message.to_string(),
            session_id: session_id.clone(),
        };
        let result = self.api.send_message(&request).await;
        drop(pending);

        match result {
            Ok(reply) => {
                let text = reply.message.response.unwrap_or_default();
                self.view
                    .append_message(&RenderedMessage::new(MessageRole::Assistant, text));

                if session_id.is_none() && self.state.adopt_session_id(&reply.session_id).await {
                    info!(session_id = %reply.session_id, "conversation started");
                    self.load_sessions().await;
                }
                SendOutcome::Replied
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                let text = match e.server_message() {
                    Some(msg) => format!("{SEND_FAILED}: {msg}"),
                    None => NETWORK_ERROR.to_string(),
                };
                self.view
                    .append_message(&RenderedMessage::new(MessageRole::Error, text));
                SendOutcome::Failed
            }
        }
    }

    pub async fn new_chat(&self) {
        self.state.set_current_session_id(None).await;
        self.view.clear_messages();
        self.view.show_greeting(GREETING_TEXT);
    }

    pub async fn logout(&self) {
        match self.api.logout().await {
            Ok(()) => {
                info!("signed out");
                self.view.navigate(Route::Login);
            }
            Err(e) if e.is_unauthorized() => {
                debug!("session already gone");
                self.view.navigate(Route::Login);
            }
            Err(e) => self.report_failure("logout", e, LOGOUT_FAILED),
        }
    }

    pub async fn load_user_profile(&self) {
        match self.api.profile().await {
            Ok(user) => {
                if self.view.has_control(Control::UserName) {
                    self.view.set_user_name(&user.username);
                }
                debug!(username = %user.username, "profile loaded");
                self.state.set_current_user(user).await;
                self.load_sessions().await;
            }
            Err(e) if e.is_unauthorized() => debug!("not signed in"),
            Err(e) => self.report_failure("profile", e, PROFILE_FAILED),
        }
    }

    pub async fn load_sessions(&self) {
        match self.api.sessions().await {
            Ok(sessions) => {
                if !self.view.has_control(Control::SessionList) {
                    return;
                }
                let rows: Vec<SessionRow> = sessions
                    .iter()
                    .map(|s| SessionRow::new(&s.session_id, s.display_title(), s.last_activity()))
                    .collect();
                self.view.render_sessions(&rows);
            }
            Err(e) => self.report_failure("sessions", e, SESSIONS_FAILED),
        }
    }

    pub async fn load_history(&self, session_id: &str) {
        match self.api.history(session_id).await {
            Ok(records) => {
                self.state
                    .set_current_session_id(Some(session_id.to_string()))
                    .await;
                self.view.clear_messages();
                for record in records {
                    self.view
                        .append_message(&RenderedMessage::new(MessageRole::User, record.message));
                    if let Some(response) = record.response.filter(|r| !r.is_empty()) {
                        self.view
                            .append_message(&RenderedMessage::new(MessageRole::Assistant, response));
                    }
                }
            }
            Err(e) => self.report_failure("history", e, HISTORY_FAILED),
        }
    }

    pub async fn show_topic(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.topic(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(topic) => self.notify(Banner::success(describe("Topic", topic.as_deref()))),
            Err(e) => self.report_failure("topic", e, "Could not load the topic"),
        }
    }

    pub async fn set_topic(&self, topic: &str) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.set_topic(&session_id, topic).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(topic) => self.notify(Banner::success(describe("Topic updated", topic.as_deref()))),
            Err(e) => self.report_failure("topic", e, "Could not update the topic"),
        }
    }

    pub async fn clear_topic(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.delete_topic(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.notify(Banner::success("Topic removed")),
            Err(e) => self.report_failure("topic", e, "Could not remove the topic"),
        }
    }

    pub async fn show_feedback(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.feedback(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(feedback) => self.notify(Banner::success(describe("Feedback", feedback.as_deref()))),
            Err(e) => self.report_failure("feedback", e, "Could not load feedback"),
        }
    }

    pub async fn set_feedback(&self, feedback: &str) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.set_feedback(&session_id, feedback).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(feedback) => {
                self.notify(Banner::success(describe("Feedback updated", feedback.as_deref())))
            }
            Err(e) => self.report_failure("feedback", e, "Could not update feedback"),
        }
    }

    pub async fn clear_feedback(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.delete_feedback(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.notify(Banner::success("Feedback removed")),
            Err(e) => self.report_failure("feedback", e, "Could not remove feedback"),
        }
    }

    pub async fn show_context(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.context(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(context) => self.notify(Banner::success(describe_context("Context", context))),
            Err(e) => self.report_failure("context", e, "Could not load context"),
        }
    }

    pub async fn merge_context(&self, context: Map<String, Value>) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.merge_context(&session_id, &context).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(merged) => self.notify(Banner::success(describe_context("Context updated", merged))),
            Err(e) => self.report_failure("context", e, "Could not update context"),
        }
    }

    pub async fn clear_context(&self) {
        let result = match self.active_session().await {
            Ok(session_id) => self.api.delete_context(&session_id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.notify(Banner::success("Context removed")),
            Err(e) => self.report_failure("context", e, "Could not remove context"),
        }
    }

    async fn active_session(&self) -> ClientResult<String> {
        self.state
            .current_session_id()
            .await
            .ok_or(ClientError::NoActiveSession)
    }

    async fn redirect(&self, route: Route) {
        tokio::time::sleep(self.redirect_delay).await;
        self.view.navigate(route);
    }

    /// Show a banner and schedule its removal.
    fn notify(&self, banner: Banner) {
        self.view.show_banner(&banner);

        let view = Arc::clone(&self.view);
        let id = banner.id;
        let ttl = self.banner_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            view.dismiss_banner(id);
        });
    }

    fn report_auth_failure(&self, what: &str, err: ClientError, fallback: &str) {
        warn!(error = %err, "{what} failed");
        let text = err.server_message().unwrap_or(fallback).to_string();
        self.notify(Banner::error(text));
    }

    fn report_failure(&self, what: &str, err: ClientError, summary: &str) {
        if matches!(err, ClientError::NoActiveSession) {
            debug!("{what} needs an open conversation");
            self.notify(Banner::error(NO_SESSION));
            return;
        }
        warn!(error = %err, "{what} request failed");
        let text = match err.server_message() {
            Some(msg) => format!("{summary}: {msg}"),
            None => summary.to_string(),
        };
        self.notify(Banner::error(text));
    }

    fn push_slot(&self) -> std::sync::MutexGuard<'_, Option<PushHandle>> {
        self.push.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<A, V> Drop for ChatClientController<A, V> {
    fn drop(&mut self) {
        let slot = self.push.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.close();
        }
    }
}

/// The "Thinking..." entry of a send in progress. Dropping it takes the
/// entry down and re-enables input, including when the send future itself
/// is dropped before the reply arrives.
struct PendingReply<'a, V: View> {
    view: &'a V,
    id: MessageId,
}

impl<V: View> Drop for PendingReply<'_, V> {
    fn drop(&mut self) {
        self.view.remove_message(&self.id);
        self.view.set_sending(false);
    }
}

fn describe(label: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("{label}: {v}"),
        _ => format!("{label}: (none)"),
    }
}

fn describe_context(label: &str, context: Option<Map<String, Value>>) -> String {
    match context {
        Some(map) if !map.is_empty() => {
            let rendered = serde_json::to_string(&Value::Object(map)).unwrap_or_default();
            format!("{label}: {rendered}")
        }
        _ => format!("{label}: (none)"),
    }
}
