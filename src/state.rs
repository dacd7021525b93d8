// src/state.rs
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::message::User;

/// Per-page client state. Only the controller that owns it mutates it.
#[derive(Debug, Default)]
pub struct ClientState {
    current_user: RwLock<Option<User>>,
    current_session_id: RwLock<Option<String>>,
    sending: AtomicBool,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current_user.read().await.clone()
    }

    pub async fn set_current_user(&self, user: User) {
        *self.current_user.write().await = Some(user);
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.current_session_id.read().await.clone()
    }

    pub async fn set_current_session_id(&self, session_id: Option<String>) {
        *self.current_session_id.write().await = session_id;
    }

    /// Adopt `session_id` only if no session is held yet. Returns whether it
    /// was adopted.
    pub async fn adopt_session_id(&self, session_id: &str) -> bool {
        let mut guard = self.current_session_id.write().await;
        if guard.is_some() {
            return false;
        }
        *guard = Some(session_id.to_string());
        true
    }

    /// Claim the single send slot. `None` means a send is already in flight.
    pub fn begin_send(&self) -> Option<SendGuard<'_>> {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SendGuard { flag: &self.sending })
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }
}

/// Releases the send slot when dropped, on every exit path.
#[derive(Debug)]
pub struct SendGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
