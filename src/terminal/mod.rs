// src/terminal/mod.rs
pub mod commands;

use std::{
    io::Write,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crate::{
    services::banner::{Banner, BannerBoard, BannerId, BannerKind},
    view::{Control, MessageId, MessageRole, Panel, RenderedMessage, Route, SessionRow, View},
};

/// Line-oriented rendering of the two pages. Printed lines cannot be taken
/// back, so removals and dismissals only update the bookkeeping.
pub struct TerminalView {
    route: Route,
    panel: Mutex<Panel>,
    sessions: Mutex<Vec<SessionRow>>,
    navigation: Mutex<Option<Route>>,
    banners: BannerBoard,
    sending: AtomicBool,
}

impl TerminalView {
    pub fn new(route: Route, banner_ttl: Duration) -> Self {
        Self {
            route,
            panel: Mutex::new(Panel::Login),
            sessions: Mutex::new(Vec::new()),
            navigation: Mutex::new(None),
            banners: BannerBoard::new(banner_ttl),
            sending: AtomicBool::new(false),
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn take_navigation(&self) -> Option<Route> {
        lock(&self.navigation).take()
    }

    /// Session id of the 1-based row `n` from the last rendered list.
    pub fn session_at(&self, n: usize) -> Option<String> {
        let rows = lock(&self.sessions);
        n.checked_sub(1)
            .and_then(|i| rows.get(i))
            .map(|row| row.session_id.clone())
    }

    pub fn print_intro(&self) {
        match self.route {
            Route::Login => self.line("== sign in ==  (/login, /register, /show register, /help)"),
            Route::Chat => self.line("== chat ==  (type to send, /help for commands)"),
        }
    }

    pub fn prompt(&self) {
        self.banners.purge_expired();
        let marker = if self.sending.load(Ordering::Acquire) {
            "…"
        } else if !self.banners.is_empty() {
            "!"
        } else {
            ">"
        };
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{marker} ");
        let _ = out.flush();
    }

    pub fn note(&self, text: &str) {
        self.line(&format!("  {text}"));
    }

    fn line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
    }
}

impl View for TerminalView {
    fn has_control(&self, control: Control) -> bool {
        match self.route {
            Route::Login => matches!(
                control,
                Control::LoginForm | Control::RegisterForm | Control::FormToggle
            ),
            Route::Chat => !matches!(
                control,
                Control::LoginForm | Control::RegisterForm | Control::FormToggle
            ),
        }
    }

    fn append_message(&self, message: &RenderedMessage) {
        if message.pending {
            self.line(&format!("  {} {}", MessageRole::Assistant.as_str(), message.text));
            return;
        }
        let mut lines = message.text.lines();
        let first = lines.next().unwrap_or_default();
        self.line(&format!(
            "[{}] {}: {}",
            message.timestamp,
            message.role.as_str(),
            first
        ));
        for rest in lines {
            self.line(&format!("    {rest}"));
        }
    }

    fn remove_message(&self, _id: &MessageId) {}

    fn clear_messages(&self) {
        self.line("----------------------------------------");
    }

    fn show_greeting(&self, text: &str) {
        self.line(text);
    }

    fn reset_input(&self) {}

    fn set_sending(&self, sending: bool) {
        self.sending.store(sending, Ordering::Release);
    }

    fn set_user_name(&self, name: &str) {
        self.line(&format!("signed in as {name}"));
    }

    fn render_sessions(&self, rows: &[SessionRow]) {
        *lock(&self.sessions) = rows.to_vec();
        if rows.is_empty() {
            self.line("no conversations yet");
            return;
        }
        self.line("conversations:");
        for (i, row) in rows.iter().enumerate() {
            self.line(&format!("  {:>2}. {}  {}", i + 1, row.title, row.date));
        }
    }

    fn show_banner(&self, banner: &Banner) {
        self.banners.push(banner.clone());
        let tag = match banner.kind {
            BannerKind::Success => "ok",
            BannerKind::Error => "error",
        };
        self.line(&format!("[{tag}] {}", banner.text));
    }

    fn dismiss_banner(&self, id: BannerId) {
        self.banners.dismiss(id);
    }

    fn show_panel(&self, panel: Panel) {
        *lock(&self.panel) = panel;
        match panel {
            Panel::Login => self.line("sign in with /login <user> <password>"),
            Panel::Register => self.line("create an account with /register <user> <email> <password>"),
        }
    }

    fn navigate(&self, route: Route) {
        self.line(&format!("-> {}", route.path()));
        *lock(&self.navigation) = Some(route);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
