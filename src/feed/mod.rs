// Live blockchain event feed.
//
// One WebSocket connection maps to one upstream registration. The feed route
// is mounted outside the management route table, ahead of the credential gate.

pub mod handler;
pub mod source;
pub mod subscriber;

pub use source::{BroadcastEventSource, ChainEvent, EventSource, Registration, RegistrationId, UpstreamError};
pub use subscriber::{FeedSubscriber, FeedSubscription, SubscriptionStatus};
