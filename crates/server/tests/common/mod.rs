#![allow(dead_code)]

pub mod fixtures;
pub mod server;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use stow_core::SessionId;
use stow_server::Notifier;

/// Notifier that counts deliveries, for asserting exactly-once behavior.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    completed: AtomicUsize,
    failed: AtomicUsize,
    expired: AtomicUsize,
}

impl CountingNotifier {
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn expired_count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn session_completed(&self, _session_id: SessionId, _tenant_id: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    async fn session_failed(&self, _session_id: SessionId, _tenant_id: &str, _reason: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    async fn session_expired(&self, _session_id: SessionId, _tenant_id: &str) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}
