#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chat_client::{
    ClientConfig,
    services::banner::{Banner, BannerId, BannerKind},
    view::{Control, MessageId, MessageRole, Panel, RenderedMessage, Route, SessionRow, View},
};
use serde_json::{Map, Value, json};

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StoredSession {
    pub session_id: String,
    pub title: Option<String>,
    pub updated_at: String,
    pub messages: Vec<(String, Option<String>)>,
    pub topic: Option<String>,
    pub feedback: Option<String>,
    pub context: Option<Map<String, Value>>,
}

#[derive(Default)]
pub struct BackendState {
    pub users: HashMap<String, (String, String)>,
    pub sessions: Vec<StoredSession>,
    pub calls: HashMap<&'static str, usize>,
    pub sent: Vec<Value>,
    pub reply: String,
    pub send_failure: Option<(StatusCode, Option<String>)>,
    pub send_delay: Duration,
    pub logout_fails: bool,
    pub sessions_fail: bool,
    /// Answer anonymous calls with a 302 to the HTML login page instead of a 401.
    pub redirect_anonymous: bool,
    pub push_frames: Vec<String>,
}

#[derive(Clone, Default)]
pub struct Backend {
    inner: Arc<Mutex<BackendState>>,
}

impl Backend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state().reply = "hi there".to_string();
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.inner.lock().unwrap()
    }

    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.state().users.insert(
            username.to_string(),
            (format!("{username}@example.com"), password.to_string()),
        );
        self
    }

    pub fn with_session(self, session_id: &str, title: Option<&str>, messages: &[(&str, Option<&str>)]) -> Self {
        self.state().sessions.push(StoredSession {
            session_id: session_id.to_string(),
            title: title.map(str::to_string),
            updated_at: "2024-03-05T12:00:00".to_string(),
            messages: messages
                .iter()
                .map(|(m, r)| (m.to_string(), r.map(str::to_string)))
                .collect(),
            ..Default::default()
        });
        self
    }

    pub fn redirecting_to_login(self) -> Self {
        self.state().redirect_anonymous = true;
        self
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.state().calls.get(endpoint).copied().unwrap_or(0)
    }

    fn hit(&self, endpoint: &'static str) {
        *self.state().calls.entry(endpoint).or_insert(0) += 1;
    }

    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn test_config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base_url);
    config.push_enabled = false;
    config.redirect_delay = Duration::from_millis(20);
    config.banner_ttl = Duration::from_millis(60);
    config.request_timeout = Some(Duration::from_secs(5));
    config
}

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/profile", get(profile))
        .route("/api/auth/logout", post(logout))
        .route("/api/chat/send", post(send))
        .route("/api/chat/sessions", get(sessions))
        .route("/api/chat/history/{session_id}", get(history))
        .route(
            "/api/chat/session/{session_id}/{field}",
            get(get_field).post(set_field).delete(delete_field),
        )
        .route("/login", get(login_page))
        .route("/socket.io/", get(socket))
        .with_state(backend)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn anonymous(backend: &Backend, next: &str) -> Response {
    if backend.state().redirect_anonymous {
        let location = format!("/login?next={}", next.replace('/', "%2F"));
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

async fn login_page() -> Html<&'static str> {
    Html("<html><body><form id=\"loginForm\"></form></body></html>")
}

fn signed_in(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|c| c.trim().strip_prefix("auth="))
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn user_json(username: &str, email: &str) -> Value {
    json!({ "id": 1, "username": username, "email": email, "created_at": "2024-01-01T00:00:00" })
}

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("login");
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Username and password are required");
    }
    let email = match backend.state().users.get(&username) {
        Some((email, stored)) if stored == password => email.clone(),
        _ => return error(StatusCode::UNAUTHORIZED, "Invalid username or password"),
    };
    (
        [(header::SET_COOKIE, format!("auth={username}; Path=/"))],
        Json(json!({ "message": "Login successful", "user": user_json(&username, &email) })),
    )
        .into_response()
}

async fn register(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("register");
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "All fields are required");
    }
    if password.len() < 6 {
        return error(StatusCode::BAD_REQUEST, "Password must be at least 6 characters");
    }
    {
        let mut state = backend.state();
        if state.users.contains_key(&username) {
            return error(StatusCode::BAD_REQUEST, "Username already exists");
        }
        state.users.insert(username.clone(), (email.clone(), password));
    }
    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, format!("auth={username}; Path=/"))],
        Json(json!({ "message": "Registered", "user": user_json(&username, &email) })),
    )
        .into_response()
}

async fn profile(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.hit("profile");
    let Some(username) = signed_in(&headers) else {
        return anonymous(&backend, "/api/auth/profile");
    };
    let email = backend
        .state()
        .users
        .get(&username)
        .map(|(email, _)| email.clone())
        .unwrap_or_default();
    Json(json!({ "user": user_json(&username, &email) })).into_response()
}

async fn logout(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.hit("logout");
    if signed_in(&headers).is_none() && backend.state().redirect_anonymous {
        return anonymous(&backend, "/api/auth/logout");
    }
    if backend.state().logout_fails {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    (
        [(header::SET_COOKIE, "auth=; Path=/; Max-Age=0".to_string())],
        Json(json!({ "message": "Signed out" })),
    )
        .into_response()
}

async fn send(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.hit("send");
    let delay = {
        let mut state = backend.state();
        state.sent.push(body.clone());
        state.send_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut state = backend.state();
    if let Some((status, message)) = state.send_failure.clone() {
        return match message {
            Some(message) => error(status, &message),
            None => (status, "<html>Internal Server Error</html>").into_response(),
        };
    }

    let message = body["message"].as_str().unwrap_or_default().trim().to_string();
    if message.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Message cannot be empty");
    }

    let session_id = match body["session_id"].as_str() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = format!("s{}", state.sessions.len() + 1);
            state.sessions.push(StoredSession {
                session_id: id.clone(),
                updated_at: "2024-03-05T12:00:00".to_string(),
                ..Default::default()
            });
            id
        }
    };
    let reply = state.reply.clone();
    if let Some(session) = state.sessions.iter_mut().find(|s| s.session_id == session_id) {
        session.messages.push((message.clone(), Some(reply.clone())));
    }

    Json(json!({
        "message": { "message": message, "response": reply, "sender": "user" },
        "session_id": session_id,
    }))
    .into_response()
}

async fn sessions(State(backend): State<Backend>) -> Response {
    backend.hit("sessions");
    let state = backend.state();
    if state.sessions_fail {
        return error(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
    }
    let rows: Vec<Value> = state
        .sessions
        .iter()
        .map(|s| json!({ "session_id": s.session_id, "title": s.title, "updated_at": s.updated_at }))
        .collect();
    Json(json!({ "sessions": rows })).into_response()
}

async fn history(State(backend): State<Backend>, Path(session_id): Path<String>) -> Response {
    backend.hit("history");
    let state = backend.state();
    let Some(session) = state.sessions.iter().find(|s| s.session_id == session_id) else {
        return error(StatusCode::NOT_FOUND, "Conversation not found");
    };
    let messages: Vec<Value> = session
        .messages
        .iter()
        .map(|(m, r)| json!({ "message": m, "response": r }))
        .collect();
    Json(json!({ "messages": messages })).into_response()
}

fn field_value(session: &StoredSession, field: &str) -> Value {
    match field {
        "topic" => json!(session.topic),
        "feedback" => json!(session.feedback),
        _ => json!(session.context),
    }
}

async fn get_field(
    State(backend): State<Backend>,
    Path((session_id, field)): Path<(String, String)>,
) -> Response {
    backend.hit("metadata");
    let state = backend.state();
    match state.sessions.iter().find(|s| s.session_id == session_id) {
        Some(session) => {
            let mut body = Map::new();
            body.insert(field.clone(), field_value(session, &field));
            Json(Value::Object(body)).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn set_field(
    State(backend): State<Backend>,
    Path((session_id, field)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    backend.hit("metadata");
    let mut state = backend.state();
    let Some(session) = state.sessions.iter_mut().find(|s| s.session_id == session_id) else {
        return error(StatusCode::NOT_FOUND, "Not Found");
    };
    match field.as_str() {
        "topic" => session.topic = body["topic"].as_str().map(str::to_string),
        "feedback" => session.feedback = body["feedback"].as_str().map(str::to_string),
        "context" => {
            let mut merged = session.context.take().unwrap_or_default();
            if let Some(update) = body["context"].as_object() {
                merged.extend(update.clone());
            }
            session.context = Some(merged);
        }
        _ => return error(StatusCode::NOT_FOUND, "Not Found"),
    }
    let mut reply = Map::new();
    reply.insert("message".to_string(), json!("updated"));
    reply.insert(field.clone(), field_value(session, &field));
    Json(Value::Object(reply)).into_response()
}

async fn delete_field(
    State(backend): State<Backend>,
    Path((session_id, field)): Path<(String, String)>,
) -> Response {
    backend.hit("metadata");
    let mut state = backend.state();
    let Some(session) = state.sessions.iter_mut().find(|s| s.session_id == session_id) else {
        return error(StatusCode::NOT_FOUND, "Not Found");
    };
    match field.as_str() {
        "topic" => session.topic = None,
        "feedback" => session.feedback = None,
        _ => session.context = None,
    }
    Json(json!({ "message": "deleted" })).into_response()
}

async fn socket(State(backend): State<Backend>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let user = signed_in(&headers);
    ws.on_upgrade(move |socket| socket_session(backend, user, socket))
}

// Plays the server side of an Engine.IO v4 / Socket.IO handshake. A signed-in
// socket gets one status event and one ping, then the namespace disconnects.
// An anonymous one has its namespace connect refused.
async fn socket_session(backend: Backend, user: Option<String>, mut socket: WebSocket) {
    let record = |frame: &str| backend.state().push_frames.push(frame.to_string());

    let open = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if socket.send(Message::Text(open.into())).await.is_err() {
        return;
    }

    while let Some(Ok(frame)) = socket.recv().await {
        let Message::Text(text) = frame else { continue };
        let text = text.as_str().to_string();
        record(&text);

        if text == "40" {
            let Some(username) = user.as_deref() else {
                let _ = socket
                    .send(Message::Text(r#"44{"message":"Unauthorized"}"#.into()))
                    .await;
                return;
            };
            let status = json!(["status", { "msg": format!("{username} connected") }]);
            let frames = [r#"40{"sid":"sio-1"}"#.to_string(), format!("42{status}"), "2".to_string()];
            for out in frames {
                if socket.send(Message::Text(out.into())).await.is_err() {
                    return;
                }
            }
        } else if text.starts_with('3') {
            let _ = socket.send(Message::Text("41".into())).await;
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Recording view
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    Append { role: MessageRole, text: String, pending: bool },
    Remove,
    Clear,
    Greeting(String),
    ResetInput,
    Sending(bool),
    UserName(String),
    Sessions(Vec<SessionRow>),
    Banner(BannerKind, String),
    Dismiss,
    Panel(Panel),
    Navigate(Route),
}

#[derive(Clone, Debug)]
pub struct PaneEntry {
    pub id: MessageId,
    pub role: MessageRole,
    pub text: String,
    pub html: String,
    pub pending: bool,
}

#[derive(Default)]
pub struct RecordingView {
    controls: HashSet<Control>,
    events: Mutex<Vec<ViewEvent>>,
    pane: Mutex<Vec<PaneEntry>>,
    banners: Mutex<Vec<(BannerId, BannerKind, String)>>,
}

impl RecordingView {
    pub fn with_controls(controls: &[Control]) -> Arc<Self> {
        Arc::new(Self {
            controls: controls.iter().copied().collect(),
            ..Default::default()
        })
    }

    pub fn chat_page() -> Arc<Self> {
        Self::with_controls(&[
            Control::MessageInput,
            Control::SendButton,
            Control::NewChatButton,
            Control::LogoutButton,
            Control::SessionList,
            Control::UserName,
            Control::MessagePane,
        ])
    }

    pub fn login_page() -> Arc<Self> {
        Self::with_controls(&[Control::LoginForm, Control::RegisterForm, Control::FormToggle])
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn pane(&self) -> Vec<PaneEntry> {
        self.pane.lock().unwrap().clone()
    }

    /// (role, text) of every non-pending entry currently in the pane.
    pub fn transcript(&self) -> Vec<(MessageRole, String)> {
        self.pane()
            .into_iter()
            .filter(|e| !e.pending)
            .map(|e| (e.role, e.text))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pane().iter().filter(|e| e.pending).count()
    }

    /// Every banner ever shown, including dismissed ones.
    pub fn banners_shown(&self) -> Vec<(BannerKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Banner(kind, text) => Some((kind, text)),
                _ => None,
            })
            .collect()
    }

    pub fn visible_banners(&self) -> usize {
        self.banners.lock().unwrap().len()
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Navigate(route) => Some(route),
                _ => None,
            })
            .collect()
    }

    pub fn last_sessions(&self) -> Option<Vec<SessionRow>> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::Sessions(rows) => Some(rows),
            _ => None,
        })
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl View for RecordingView {
    fn has_control(&self, control: Control) -> bool {
        self.controls.contains(&control)
    }

    fn append_message(&self, message: &RenderedMessage) {
        self.pane.lock().unwrap().push(PaneEntry {
            id: message.id.clone(),
            role: message.role,
            text: message.text.clone(),
            html: message.html.clone(),
            pending: message.pending,
        });
        self.push(ViewEvent::Append {
            role: message.role,
            text: message.text.clone(),
            pending: message.pending,
        });
    }

    fn remove_message(&self, id: &MessageId) {
        self.pane.lock().unwrap().retain(|e| &e.id != id);
        self.push(ViewEvent::Remove);
    }

    fn clear_messages(&self) {
        self.pane.lock().unwrap().clear();
        self.push(ViewEvent::Clear);
    }

    fn show_greeting(&self, text: &str) {
        self.push(ViewEvent::Greeting(text.to_string()));
    }

    fn reset_input(&self) {
        self.push(ViewEvent::ResetInput);
    }

    fn set_sending(&self, sending: bool) {
        self.push(ViewEvent::Sending(sending));
    }

    fn set_user_name(&self, name: &str) {
        self.push(ViewEvent::UserName(name.to_string()));
    }

    fn render_sessions(&self, rows: &[SessionRow]) {
        self.push(ViewEvent::Sessions(rows.to_vec()));
    }

    fn show_banner(&self, banner: &Banner) {
        self.banners
            .lock()
            .unwrap()
            .push((banner.id, banner.kind, banner.text.clone()));
        self.push(ViewEvent::Banner(banner.kind, banner.text.clone()));
    }

    fn dismiss_banner(&self, id: BannerId) {
        self.banners.lock().unwrap().retain(|(b, _, _)| *b != id);
        self.push(ViewEvent::Dismiss);
    }

    fn show_panel(&self, panel: Panel) {
        self.push(ViewEvent::Panel(panel));
    }

    fn navigate(&self, route: Route) {
        self.push(ViewEvent::Navigate(route));
    }
}
