//! Transient user-facing notifications.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

pub const DEFAULT_TOAST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ToastId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub level: ToastLevel,
    pub message: String,
}

/// Bounded FIFO of toasts; pushing past the limit evicts the oldest.
#[derive(Debug)]
pub struct ToastStore {
    toasts: Mutex<VecDeque<Toast>>,
    next_id: AtomicU64,
    limit: usize,
}

impl Default for ToastStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_TOAST_LIMIT)
    }
}

impl ToastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            toasts: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            limit: limit.max(1),
        }
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Success, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Error, message.into())
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Info, message.into())
    }

    /// Remove one toast. Returns whether it was still queued.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let Ok(mut toasts) = self.toasts.lock() else {
            return false;
        };
        let before = toasts.len();
        toasts.retain(|toast| toast.id != id);
        toasts.len() != before
    }

    /// Current toasts, oldest first.
    pub fn snapshot(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .map(|toasts| toasts.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Take every queued toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .map(|mut toasts| toasts.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.toasts.lock().map_or(0, |toasts| toasts.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, level: ToastLevel, message: String) -> ToastId {
        let id = ToastId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut toasts) = self.toasts.lock() {
            while toasts.len() >= self.limit {
                toasts.pop_front();
            }
            toasts.push_back(Toast { id, level, message });
        }
        id
    }
}
