use crate::traits::{Delivery, LeaseToken, QueueConfig, QueueError, QueueResult, WorkQueue};
use async_trait::async_trait;
use mediaduct_core::WorkMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

struct StoredMessage {
    id: i64,
    message: WorkMessage,
    receive_count: i32,
}

struct InflightMessage {
    stored: StoredMessage,
    token: Uuid,
    lease_expires_at: Instant,
}

#[derive(Default)]
struct QueueState {
    next_id: i64,
    ready: VecDeque<StoredMessage>,
    inflight: HashMap<i64, InflightMessage>,
    dead: Vec<StoredMessage>,
}

impl QueueState {
    /// Return messages whose lease lapsed to the ready queue. Runs at the
    /// start of every receive; there is no background reaper.
    fn reap_expired(&mut self, now: Instant) {
        let expired: Vec<i64> = self
            .inflight
            .iter()
            .filter(|(_, m)| m.lease_expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(inflight) = self.inflight.remove(&id) {
                tracing::debug!(
                    message_id = id,
                    receive_count = inflight.stored.receive_count,
                    "Lease expired, message returned to queue"
                );
                self.ready.push_back(inflight.stored);
            }
        }
    }

    fn next_lease_expiry(&self) -> Option<Instant> {
        self.inflight.values().map(|m| m.lease_expires_at).min()
    }
}

/// In-memory work queue for tests and infrastructure-free runs.
///
/// Lease accounting matches the PostgreSQL implementation: receive counts
/// survive lease expiry, and redelivered messages that pass the receive
/// limit land in the dead-letter pool instead of being handed out.
#[derive(Clone)]
pub struct MemoryWorkQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    config: QueueConfig,
}

impl MemoryWorkQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            config,
        }
    }

    /// Number of messages currently claimable, for test assertions.
    pub fn ready_len(&self) -> usize {
        self.state.lock().map(|s| s.ready.len()).unwrap_or(0)
    }

    /// Number of claimed messages whose lease has not lapsed.
    pub fn inflight_len(&self) -> usize {
        self.state.lock().map(|s| s.inflight.len()).unwrap_or(0)
    }

    fn lock_state(&self) -> QueueResult<std::sync::MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| QueueError::BackendError("queue state lock poisoned".to_string()))
    }

    fn try_claim(&self) -> QueueResult<Option<Delivery>> {
        let mut state = self.lock_state()?;
        state.reap_expired(Instant::now());

        while let Some(mut stored) = state.ready.pop_front() {
            stored.receive_count += 1;
            if stored.receive_count > self.config.max_receive_count {
                tracing::warn!(
                    message_id = stored.id,
                    media_id = %stored.message.media_id,
                    receive_count = stored.receive_count,
                    max_receive_count = self.config.max_receive_count,
                    "Message exceeded receive limit, moving to dead letters"
                );
                state.dead.push(stored);
                continue;
            }

            let token = Uuid::new_v4();
            let delivery = Delivery {
                message: stored.message.clone(),
                lease: LeaseToken {
                    message_id: stored.id,
                    token,
                },
                receive_count: stored.receive_count,
            };
            let expires_at = Instant::now() + self.config.visibility_timeout;
            state.inflight.insert(
                stored.id,
                InflightMessage {
                    stored,
                    token,
                    lease_expires_at: expires_at,
                },
            );
            return Ok(Some(delivery));
        }

        Ok(None)
    }

    fn remove_claim(&self, lease: &LeaseToken) -> QueueResult<StoredMessage> {
        let mut state = self.lock_state()?;
        match state.inflight.get(&lease.message_id) {
            Some(inflight) if inflight.token == lease.token => {
                let inflight = state
                    .inflight
                    .remove(&lease.message_id)
                    .ok_or(QueueError::LeaseExpired)?;
                Ok(inflight.stored)
            }
            _ => Err(QueueError::LeaseExpired),
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn send(&self, message: &WorkMessage) -> QueueResult<()> {
        {
            let mut state = self.lock_state()?;
            state.next_id += 1;
            let id = state.next_id;
            state.ready.push_back(StoredMessage {
                id,
                message: message.clone(),
                receive_count: 0,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(delivery) = self.try_claim()? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // Sleep until new work arrives or the earliest lease can lapse,
            // whichever comes first.
            let mut sleep_for = deadline - now;
            if let Some(expiry) = self.lock_state()?.next_lease_expiry() {
                let until_expiry = expiry.saturating_duration_since(now);
                if until_expiry < sleep_for {
                    sleep_for = until_expiry;
                }
            }
            if sleep_for.is_zero() {
                continue;
            }

            let _ = tokio::time::timeout(sleep_for, self.notify.notified()).await;
        }
    }

    async fn ack(&self, lease: &LeaseToken) -> QueueResult<()> {
        let stored = self.remove_claim(lease)?;
        tracing::debug!(message_id = stored.id, "Message acked");
        Ok(())
    }

    async fn release(&self, lease: &LeaseToken) -> QueueResult<()> {
        let stored = self.remove_claim(lease)?;
        tracing::debug!(
            message_id = stored.id,
            receive_count = stored.receive_count,
            "Message released for retry"
        );
        {
            let mut state = self.lock_state()?;
            state.ready.push_back(stored);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn reject(&self, lease: &LeaseToken) -> QueueResult<()> {
        let stored = self.remove_claim(lease)?;
        tracing::warn!(
            message_id = stored.id,
            media_id = %stored.message.media_id,
            "Message rejected to dead letters"
        );
        let mut state = self.lock_state()?;
        state.dead.push(stored);
        Ok(())
    }

    async fn dead_letter_count(&self) -> QueueResult<u64> {
        Ok(self.lock_state()?.dead.len() as u64)
    }
}
