// src/services/banner.rs
use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

static NEXT_BANNER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BannerId(u64);

impl BannerId {
    fn next() -> Self {
        BannerId(NEXT_BANNER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

/// A transient notification. Banners never block input and are not
/// deduplicated: two identical failures in a row produce two banners.
#[derive(Clone, Debug)]
pub struct Banner {
    pub id: BannerId,
    pub kind: BannerKind,
    pub text: String,
    pub shown_at: Instant,
}

impl Banner {
    pub fn new(kind: BannerKind, text: impl Into<String>) -> Self {
        Self {
            id: BannerId::next(),
            kind,
            text: text.into(),
            shown_at: Instant::now(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(BannerKind::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(BannerKind::Error, text)
    }
}

/// Stack of currently visible banners, newest last.
#[derive(Clone)]
pub struct BannerBoard {
    inner: Arc<Mutex<Vec<Banner>>>,
    ttl: Duration,
}

impl Debug for BannerBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BannerBoard")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl BannerBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            ttl,
        }
    }

    pub fn push(&self, banner: Banner) -> usize {
        let mut guard = self.lock();
        guard.push(banner);
        guard.len()
    }

    /// Remove a banner by id
    pub fn dismiss(&self, id: BannerId) -> bool {
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|b| b.id != id);
        before != guard.len()
    }

    /// Remove banners older than ttl. Returns number removed.
    pub fn purge_expired(&self) -> usize {
        let mut guard = self.lock();
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|b| now.duration_since(b.shown_at) < self.ttl);
        before - guard.len()
    }

    pub fn visible(&self) -> Vec<Banner> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Banner>> {
        // A panicked holder cannot leave the Vec half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
