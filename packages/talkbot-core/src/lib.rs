//! Talkbot Core - session controller for a voice chat bot.
//!
//! This crate keeps a bot connected to a voice chat server and routes what
//! happens there. It is used by the headless `talkbot` binary and by any
//! frontend that supplies its own transport and playback.
//!
//! # Architecture
//!
//! - [`dispatcher`]: Blocking event loop driving the session
//! - [`session`]: Connection lifecycle state machine and reconnect policy
//! - [`events`]: Event classification and consumer queues
//! - [`handlers`]: Hot-reloadable event handlers
//! - [`occupancy`]: Auto-return when the bot is left alone
//! - [`queue`] / [`prefetch`]: Playback queue and background recommendations
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! Collaborators outside the session are reached through traits:
//!
//! - [`Transport`](transport::Transport): The voice chat client connection
//! - [`Playback`](transport::Playback): Audio playback
//! - [`TrackCatalog`](catalog::TrackCatalog): Search and track resolution
//! - [`RecommendationSource`](catalog::RecommendationSource): Continuation tracks
//! - [`EventSink`](events::EventSink): Consumer queues
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks

#![warn(clippy::all)]

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod occupancy;
pub mod prefetch;
pub mod protocol_constants;
pub mod queue;
pub mod runtime;
pub mod session;
pub mod track;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at the crate root
pub use bootstrap::{bootstrap_session, SessionServices};
pub use catalog::{
    CatalogEntry, HttpRecommendationSource, RecommendationSource, ResolveError, TrackCatalog,
};
pub use config::{ChannelTarget, EventHandlingConfig, RecommendationConfig, SessionConfig};
pub use dispatcher::{DispatcherHandle, EventDispatcher};
pub use error::{ErrorCode, TalkbotError, TalkbotResult};
pub use events::{
    classify, ConsumerQueues, Event, EventKind, EventSink, RawEvent, RawPayload, QueueEventSink,
};
pub use handlers::{
    CallbackSet, DispatchOutcome, HandlerArgs, HandlerRegistry, HandlerSet, ManifestHandlerSet,
};
pub use occupancy::{ChannelOccupancyMonitor, OccupancyOutcome};
pub use prefetch::RecommendationFetcher;
pub use queue::TrackQueue;
pub use runtime::{TaskSpawner, TokioSpawner};
pub use session::{FatalError, LifecycleStage, ReconnectPolicy, SessionState};
pub use track::{Track, TrackKind};
pub use transport::{Playback, Transport, TransportError};
