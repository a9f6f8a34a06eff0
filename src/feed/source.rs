use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// One blockchain event as delivered to feed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    pub event: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub data: Value,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    #[error("registration timed out after {0:?}")]
    Timeout(Duration),

    #[error("subscriber lagged behind, {0} event(s) skipped")]
    Lagged(u64),

    #[error("unknown registration {0}")]
    UnknownRegistration(RegistrationId),

    #[error("event stream failed: {0}")]
    Stream(String),
}

impl UpstreamError {
    /// Fatal errors end the subscription; the rest are reported and skipped
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UpstreamError::Lagged(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub Uuid);

impl RegistrationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle for one connection's registration with the upstream source.
/// Each registration owns its own stream; two connections never share one.
pub struct Registration {
    pub id: RegistrationId,
    pub events: BoxStream<'static, Result<ChainEvent, UpstreamError>>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish_non_exhaustive()
    }
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn register(&self) -> Result<Registration, UpstreamError>;
    async fn unregister(&self, id: RegistrationId) -> Result<(), UpstreamError>;
}

#[derive(Debug, Clone)]
enum Signal {
    Event(ChainEvent),
    Down(String),
}

/// In-process event hub standing in for the chain listener.
///
/// Services publish through it, feed connections register against it, and
/// `GET /management/events` reads its bounded history.
pub struct BroadcastEventSource {
    sender: broadcast::Sender<Signal>,
    registrations: RwLock<HashSet<RegistrationId>>,
    history: RwLock<VecDeque<ChainEvent>>,
    history_limit: usize,
    block: AtomicU64,
    available: AtomicBool,
}

impl BroadcastEventSource {
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            registrations: RwLock::new(HashSet::new()),
            history: RwLock::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            block: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Record a new event and fan it out to every live registration
    pub async fn publish(&self, event: &str, data: Value) -> ChainEvent {
        let block_number = self.block.fetch_add(1, Ordering::SeqCst) + 1;
        let emitted_at = Utc::now();

        let transaction_hash = format!(
            "0x{}",
            sha256_hex(&format!(
                "{}:{}:{}:{}",
                block_number,
                event,
                data,
                emitted_at.timestamp_nanos_opt().unwrap_or_default()
            ))
        );

        let chain_event = ChainEvent {
            event: event.to_string(),
            block_number,
            transaction_hash,
            data,
            emitted_at,
        };

        {
            let mut history = self.history.write().await;
            if history.len() == self.history_limit {
                history.pop_front();
            }
            if self.history_limit > 0 {
                history.push_back(chain_event.clone());
            }
        }

        match self.sender.send(Signal::Event(chain_event.clone())) {
            Ok(receivers) => tracing::debug!("{} #{} delivered to {} receiver(s)", event, block_number, receivers),
            Err(_) => tracing::debug!("{} #{} published with no listeners", event, block_number),
        }
        chain_event
    }

    /// Most recent events, newest first
    pub async fn recent(&self, limit: usize) -> Vec<ChainEvent> {
        self.history.read().await.iter().rev().take(limit).cloned().collect()
    }

    pub async fn active_registrations(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Mark the source usable or not. Going down terminates every open stream.
    pub fn set_available(&self, available: bool) {
        let was = self.available.swap(available, Ordering::SeqCst);
        if was && !available {
            tracing::warn!("Event source marked unavailable");
            let _ = self.sender.send(Signal::Down("event source went offline".to_string()));
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

impl Default for BroadcastEventSource {
    fn default() -> Self {
        Self::new(1024, 100)
    }
}

#[async_trait]
impl EventSource for BroadcastEventSource {
    async fn register(&self) -> Result<Registration, UpstreamError> {
        if !self.is_available() {
            return Err(UpstreamError::Unavailable("event source is offline".to_string()));
        }

        let id = RegistrationId::new();
        let receiver = self.sender.subscribe();
        self.registrations.write().await.insert(id);
        tracing::debug!("Registered feed {}", id);

        // `done` ends the stream after a Down signal has been reported
        let events = stream::unfold((receiver, false), |(mut receiver, done)| async move {
            if done {
                return None;
            }
            match receiver.recv().await {
                Ok(Signal::Event(event)) => Some((Ok(event), (receiver, false))),
                Ok(Signal::Down(reason)) => Some((Err(UpstreamError::Stream(reason)), (receiver, true))),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    Some((Err(UpstreamError::Lagged(skipped)), (receiver, false)))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed();

        Ok(Registration { id, events })
    }

    async fn unregister(&self, id: RegistrationId) -> Result<(), UpstreamError> {
        if self.registrations.write().await.remove(&id) {
            tracing::debug!("Unregistered feed {}", id);
            Ok(())
        } else {
            Err(UpstreamError::UnknownRegistration(id))
        }
    }
}

/// Lowercase hex SHA-256 of `input`
pub(crate) fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
