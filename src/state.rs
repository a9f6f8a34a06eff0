use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthError, CredentialVerifier};
use crate::config::AppConfig;
use crate::feed::{EventSource, FeedSubscriber};
use crate::router::routes::management_routes;
use crate::router::{RouteError, RouteTable};
use crate::services::Controllers;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("credential verifier: {0}")]
    Auth(#[from] AuthError),

    #[error("route table: {0}")]
    Routes(#[from] RouteError),
}

/// Everything a request needs, built once at startup and shared read-only
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<CredentialVerifier>,
    pub routes: Arc<RouteTable>,
    pub controllers: Arc<Controllers>,
    pub feed: Arc<FeedSubscriber>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        controllers: Controllers,
        source: Arc<dyn EventSource>,
    ) -> Result<Self, StartupError> {
        let verifier = Arc::new(CredentialVerifier::new(&config.security)?);
        let routes = management_routes(verifier.clone())?;

        tracing::info!(
            "Route table built with {} management route(s)",
            routes.descriptors().len()
        );

        let feed = FeedSubscriber::new(
            source,
            Duration::from_millis(config.feed.registration_timeout_ms),
        );

        Ok(Self {
            config: Arc::new(config),
            verifier,
            routes: Arc::new(routes),
            controllers: Arc::new(controllers),
            feed: Arc::new(feed),
        })
    }

    /// Swap in a different route table (tests)
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = Arc::new(routes);
        self
    }
}
