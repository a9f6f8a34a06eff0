use axum::extract::ws::{CloseFrame, Message};
use futures::stream::BoxStream;
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::borrow::Cow;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::router::dispatch::panic_message;

use super::source::{ChainEvent, EventSource, RegistrationId, UpstreamError};

/// Close code sent when the upstream side fails (RFC 6455 "internal error")
pub const CLOSE_UPSTREAM_FAILURE: u16 = 1011;

pub const SUBSCRIBE_ERROR_PREFIX: &str = "Error subscribing to blockchain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Closed,
}

/// Per-connection bookkeeping, returned once the connection has finished
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    pub connection_id: Uuid,
    pub status: SubscriptionStatus,
    pub last_error: Option<String>,
    pub delivered: u64,
}

impl FeedSubscription {
    fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            status: SubscriptionStatus::Active,
            last_error: None,
            delivered: 0,
        }
    }
}

enum Ended {
    ClientClosed,
    SendFailed,
    Upstream(String),
    Panicked(String),
}

/// Bridges one client connection to the upstream event source.
pub struct FeedSubscriber {
    source: Arc<dyn EventSource>,
    registration_timeout: Duration,
}

impl FeedSubscriber {
    pub fn new(source: Arc<dyn EventSource>, registration_timeout: Duration) -> Self {
        Self {
            source,
            registration_timeout,
        }
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    /// Drive one connection until the client leaves or upstream fails.
    ///
    /// Registration is bounded by the configured timeout. Once registered, the
    /// registration is released exactly once on the way out, whatever ended the
    /// connection, a panic while forwarding included.
    pub async fn run<S, R>(&self, connection_id: Uuid, mut outbound: S, mut inbound: R) -> FeedSubscription
    where
        S: Sink<Message> + Unpin + Send,
        S::Error: Display,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        let mut subscription = FeedSubscription::new(connection_id);

        let registration = match tokio::time::timeout(self.registration_timeout, self.source.register()).await {
            Ok(Ok(registration)) => registration,
            Ok(Err(e)) => return self.reject(subscription, &mut outbound, e).await,
            Err(_) => {
                let e = UpstreamError::Timeout(self.registration_timeout);
                return self.reject(subscription, &mut outbound, e).await;
            }
        };

        let registration_id = registration.id;
        let mut events = registration.events;
        tracing::info!("Feed {} registered upstream as {}", connection_id, registration_id);

        let pumped = AssertUnwindSafe(pump(
            connection_id,
            &mut subscription,
            &mut outbound,
            &mut inbound,
            &mut events,
        ))
        .catch_unwind()
        .await;
        drop(events);

        let ended = pumped.unwrap_or_else(|panic| Ended::Panicked(panic_message(&*panic).to_string()));
        match ended {
            Ended::ClientClosed => tracing::info!("Feed {} closed by client", connection_id),
            Ended::SendFailed => tracing::info!("Feed {} dropped: client unreachable", connection_id),
            Ended::Upstream(reason) => {
                tracing::error!("Feed {} terminated: {}", connection_id, reason);
                subscription.last_error = Some(reason.clone());
                close_with(&mut outbound, reason).await;
            }
            Ended::Panicked(message) => {
                tracing::error!("Feed {} panicked: {}", connection_id, message);
                subscription.last_error = Some(message);
                close_with(&mut outbound, "Internal feed error".to_string()).await;
            }
        }

        self.release(connection_id, registration_id).await;
        subscription.status = SubscriptionStatus::Closed;
        subscription
    }

    async fn reject<S>(&self, mut subscription: FeedSubscription, outbound: &mut S, error: UpstreamError) -> FeedSubscription
    where
        S: Sink<Message> + Unpin + Send,
        S::Error: Display,
    {
        tracing::error!(
            "Feed {} could not subscribe to blockchain events: {}",
            subscription.connection_id,
            error
        );
        close_with(outbound, format!("{}: {}", SUBSCRIBE_ERROR_PREFIX, error)).await;

        subscription.status = SubscriptionStatus::Closed;
        subscription.last_error = Some(error.to_string());
        subscription
    }

    async fn release(&self, connection_id: Uuid, registration_id: RegistrationId) {
        match tokio::time::timeout(self.registration_timeout, self.source.unregister(registration_id)).await {
            Ok(Ok(())) => tracing::debug!("Feed {} released {}", connection_id, registration_id),
            Ok(Err(e)) => tracing::warn!("Feed {} failed to unregister {}: {}", connection_id, registration_id, e),
            Err(_) => tracing::warn!(
                "Feed {} timed out unregistering {} after {:?}",
                connection_id,
                registration_id,
                self.registration_timeout
            ),
        }
    }
}

async fn pump<S, R>(
    connection_id: Uuid,
    subscription: &mut FeedSubscription,
    outbound: &mut S,
    inbound: &mut R,
    events: &mut BoxStream<'static, Result<ChainEvent, UpstreamError>>,
) -> Ended
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;

            incoming = inbound.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => return Ended::ClientClosed,
                Some(Err(e)) => {
                    tracing::debug!("Feed {} read error: {}", connection_id, e);
                    return Ended::ClientClosed;
                }
                Some(Ok(_)) => {
                    // Client messages carry no meaning on the feed
                }
            },

            upstream = events.next() => match upstream {
                Some(Ok(event)) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to serialize chain event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = outbound.send(Message::Text(payload)).await {
                        tracing::debug!("Feed {} send failed: {}", connection_id, e);
                        return Ended::SendFailed;
                    }
                    subscription.delivered += 1;
                }
                Some(Err(e)) if !e.is_fatal() => {
                    tracing::warn!("Feed {} upstream error: {}", connection_id, e);
                    subscription.last_error = Some(e.to_string());
                    let notice = json!({ "error": "UPSTREAM_ERROR", "message": e.to_string() });
                    if outbound.send(Message::Text(notice.to_string())).await.is_err() {
                        return Ended::SendFailed;
                    }
                }
                Some(Err(e)) => return Ended::Upstream(format!("Blockchain event stream failed: {}", e)),
                None => return Ended::Upstream("Blockchain event stream ended".to_string()),
            },
        }
    }
}

/// Send an explanatory text message followed by a 1011 close frame
async fn close_with<S>(outbound: &mut S, message: String)
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    if let Err(e) = outbound.send(Message::Text(message)).await {
        tracing::debug!("Could not deliver feed error message: {}", e);
        return;
    }
    let frame = CloseFrame {
        code: CLOSE_UPSTREAM_FAILURE,
        reason: Cow::Borrowed("upstream failure"),
    };
    if let Err(e) = outbound.send(Message::Close(Some(frame))).await {
        tracing::debug!("Could not close feed connection: {}", e);
    }
}
