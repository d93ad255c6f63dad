use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const MAX_TOASTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error<S: Into<String>>(text: S) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Fire-and-forget delivery of user-facing notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

struct Toast {
    notice: Notice,
    expires_at: Instant,
}

/// Transient toasts shown in the status bar until they expire.
#[derive(Clone)]
pub struct Toasts {
    ttl: Duration,
    queue: Arc<Mutex<VecDeque<Toast>>>,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Drops expired toasts; returns whether anything changed.
    pub fn expire(&self, now: Instant) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|toast| toast.expires_at > now);
        queue.len() != before
    }

    pub fn latest(&self) -> Option<Notice> {
        self.queue.lock().back().map(|toast| toast.notice.clone())
    }

    pub fn active(&self) -> Vec<Notice> {
        self.queue
            .lock()
            .iter()
            .map(|toast| toast.notice.clone())
            .collect()
    }
}

impl NotificationSink for Toasts {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => tracing::info!(text = %notice.text, "notice"),
            NoticeKind::Error => tracing::warn!(text = %notice.text, "notice"),
        }
        let mut queue = self.queue.lock();
        if queue.len() == MAX_TOASTS {
            queue.pop_front();
        }
        queue.push_back(Toast {
            notice,
            expires_at: Instant::now() + self.ttl,
        });
    }
}
