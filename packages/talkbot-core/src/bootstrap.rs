//! Session bootstrap and dependency wiring.
//!
//! This module is the composition root: the one place where the dispatcher,
//! its collaborators and the optional prefetch machinery are instantiated and
//! wired together from a [`SessionConfig`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::catalog::HttpRecommendationSource;
use crate::config::SessionConfig;
use crate::dispatcher::{DispatcherHandle, EventDispatcher};
use crate::error::{TalkbotError, TalkbotResult};
use crate::events::{ConsumerQueues, QueueEventSink};
use crate::handlers::HandlerRegistry;
use crate::occupancy::ChannelOccupancyMonitor;
use crate::prefetch::RecommendationFetcher;
use crate::queue::TrackQueue;
use crate::runtime::TokioSpawner;
use crate::transport::{Playback, Transport};

/// Container for all bootstrapped session services.
pub struct SessionServices {
    /// The event loop. Run it on a dedicated thread.
    pub dispatcher: EventDispatcher,
    /// Control surface for the running dispatcher.
    pub handle: DispatcherHandle,
    /// Consumer queues fed by the dispatcher.
    pub queues: ConsumerQueues,
    /// Shared playback queue.
    pub queue: TrackQueue,
    /// Background prefetch, when recommendations are enabled.
    pub fetcher: Option<Arc<RecommendationFetcher>>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
}

impl SessionServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }
}

/// Creates the shared HTTP client used for recommendation requests.
fn create_http_client(timeout: Duration) -> TalkbotResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TalkbotError::Fetch(e.into()))
}

/// Bootstraps one bot session.
///
/// Wiring order:
///
/// 1. Shared infrastructure (HTTP client, spawner, consumer queues)
/// 2. Occupancy monitor (depends on transport and playback)
/// 3. Handler registry, loaded eagerly when event handling is enabled
/// 4. Dispatcher (depends on all of the above)
/// 5. Track queue and recommendation fetcher
pub fn bootstrap_session(
    config: &SessionConfig,
    transport: Arc<dyn Transport>,
    playback: Arc<dyn Playback>,
    runtime: tokio::runtime::Handle,
) -> TalkbotResult<SessionServices> {
    config.validate().map_err(TalkbotError::Configuration)?;

    let recommendations = &config.recommendations;
    let http_client = create_http_client(Duration::from_secs(recommendations.timeout_secs))?;
    let spawner = TokioSpawner::new(runtime);
    let (sink, queues) = QueueEventSink::new();

    let occupancy = ChannelOccupancyMonitor::new(
        Arc::clone(&transport),
        playback,
        config.default_channel.clone(),
    );

    let handlers = if config.event_handling.load_event_handlers {
        let registry = Arc::new(HandlerRegistry::new(
            config.event_handling.event_handlers_path.clone(),
        ));
        registry.reload();
        Some(registry)
    } else {
        None
    };

    let dispatcher = EventDispatcher::new(config, transport, Arc::new(sink), occupancy, handlers);
    let handle = dispatcher.handle();

    let queue = TrackQueue::new();
    let fetcher = match (&recommendations.endpoint, recommendations.enabled) {
        (Some(endpoint), true) => {
            let source = HttpRecommendationSource::new(http_client.clone(), endpoint)?;
            log::info!("[Bootstrap] Recommendations enabled via {}", endpoint);
            Some(Arc::new(RecommendationFetcher::new(
                Arc::new(source),
                queue.clone(),
                spawner.clone(),
                recommendations.service.clone(),
                recommendations.limit,
                recommendations.max_in_flight,
            )))
        }
        _ => None,
    };

    log::info!(
        "[Bootstrap] Session ready for {} (handlers: {}, recommendations: {})",
        config.username,
        handle.handlers().is_some(),
        fetcher.is_some()
    );

    Ok(SessionServices {
        dispatcher,
        handle,
        queues,
        queue,
        fetcher,
        spawner,
        http_client,
    })
}
