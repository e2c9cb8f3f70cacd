//! Pluggable, hot-reloadable event handlers.
//!
//! Every classified event is offered to the current [`HandlerSet`] under a
//! callback name derived from its kind (`UserLeft` → `on_user_left`). Handler
//! sets come from a YAML manifest on disk ([`ManifestHandlerSet`]) or are
//! registered at runtime ([`CallbackSet`]).
//!
//! Nothing in here can fail the caller: load errors produce an empty set,
//! callback errors and panics are logged.

mod callbacks;
mod manifest;

pub use callbacks::CallbackSet;
pub use manifest::{ManifestHandlerSet, DEFAULT_CHECK_INTERVAL, MANIFEST_FILE_NAME};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;

use crate::events::{Channel, ChannelId, Event, RemoteFile, TextMessage, User};

/// Errors raised while loading or running handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The configured source is not a manifest file or package directory.
    #[error("invalid handler source {path}: {message}")]
    Source { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A callback reported a failure.
    #[error("{0}")]
    Callback(String),
}

/// Convenient Result alias for handler operations.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Arguments passed for kinds without a dedicated argument shape.
pub const DEFAULT_ARGS: (i32, i32) = (1, 2);

/// Kind-specific argument tuple handed to a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerArgs {
    /// `UserUpdate`, `UserJoined`, `UserLoggedIn`, `UserLoggedOut`.
    User(User),
    /// `UserLeft`: the channel that was left comes first.
    UserLeft {
        source_channel_id: ChannelId,
        user: User,
    },
    /// `UserTextMessage`.
    Message(TextMessage),
    /// `ChannelNew`, `ChannelUpdate`, `ChannelRemove`.
    Channel(Channel),
    /// `FileNew`, `FileRemove`.
    File(RemoteFile),
    /// Everything else. Carries [`DEFAULT_ARGS`]; the values mean nothing.
    Default(i32, i32),
}

impl HandlerArgs {
    pub fn from_event(event: &Event) -> Self {
        match event {
            Event::UserUpdate(user)
            | Event::UserJoined(user)
            | Event::UserLoggedIn(user)
            | Event::UserLoggedOut(user) => Self::User(user.clone()),
            Event::UserLeft { source, user } => Self::UserLeft {
                source_channel_id: *source,
                user: user.clone(),
            },
            Event::UserTextMessage(message) => Self::Message(message.clone()),
            Event::ChannelNew(channel)
            | Event::ChannelUpdate(channel)
            | Event::ChannelRemove(channel) => Self::Channel(channel.clone()),
            Event::FileNew(file) | Event::FileRemove(file) => Self::File(file.clone()),
            _ => Self::Default(DEFAULT_ARGS.0, DEFAULT_ARGS.1),
        }
    }

    /// Positional rendering of the tuple, one string per element.
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            Self::User(user) => vec![user.username.clone()],
            Self::UserLeft {
                source_channel_id,
                user,
            } => vec![source_channel_id.to_string(), user.username.clone()],
            Self::Message(message) => vec![message.content.clone()],
            Self::Channel(channel) => vec![channel.name.clone()],
            Self::File(file) => vec![file.name.clone()],
            Self::Default(a, b) => vec![a.to_string(), b.to_string()],
        }
    }

    /// Named values available to templates and as `TALKBOT_*` variables.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::User(user) => vec![
                ("user", user.username.clone()),
                ("user_id", user.id.to_string()),
                ("channel_id", user.channel_id.to_string()),
            ],
            Self::UserLeft {
                source_channel_id,
                user,
            } => vec![
                ("source", source_channel_id.to_string()),
                ("user", user.username.clone()),
                ("user_id", user.id.to_string()),
            ],
            Self::Message(message) => vec![
                ("message", message.content.clone()),
                ("user", message.from_username.clone()),
                ("user_id", message.from_id.to_string()),
                ("channel_id", message.channel_id.to_string()),
            ],
            Self::Channel(channel) => vec![
                ("channel", channel.name.clone()),
                ("channel_id", channel.id.to_string()),
            ],
            Self::File(file) => vec![
                ("file", file.name.clone()),
                ("user", file.username.clone()),
                ("channel_id", file.channel_id.to_string()),
            ],
            Self::Default(..) => Vec::new(),
        }
    }
}

/// A callback bound to one event kind.
pub trait Handler: Send + Sync {
    fn call(&self, args: &HandlerArgs) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HandlerArgs) -> HandlerResult + Send + Sync,
{
    fn call(&self, args: &HandlerArgs) -> HandlerResult {
        self(args)
    }
}

/// Result of looking a callback up in a handler set.
pub enum HandlerLookup {
    Found(Arc<dyn Handler>),
    /// The set has no callback with that name.
    Missing,
    /// The set no longer reflects its source and must be reloaded.
    Stale,
}

/// A named collection of callbacks.
pub trait HandlerSet: Send + Sync {
    fn lookup(&self, name: &str) -> HandlerLookup;
}

/// What happened to an event offered to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Invoked,
    /// No callback registered; nothing ran.
    Missing,
    /// The callback ran and failed. The failure was logged.
    Failed,
}

/// Holds the current handler set and reloads it from the configured source.
///
/// The set may be replaced or invalidated from any thread; dispatch happens
/// on the dispatcher thread only.
pub struct HandlerRegistry {
    source: Option<PathBuf>,
    current: RwLock<Option<Arc<dyn HandlerSet>>>,
    reloads: AtomicUsize,
    check_interval: Duration,
}

impl HandlerRegistry {
    /// Creates a registry that has not loaded anything yet.
    ///
    /// The first dispatch loads from `source`; with no source it falls back
    /// to an empty set.
    pub fn new(source: Option<PathBuf>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            reloads: AtomicUsize::new(0),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Sets how often loaded manifests are checked for changes.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Loads (or re-loads) the handler set from the configured source.
    pub fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let set: Arc<dyn HandlerSet> = match &self.source {
            Some(path) => Arc::new(
                ManifestHandlerSet::load_or_empty(path).with_check_interval(self.check_interval),
            ),
            None => {
                log::warn!("[Handlers] No handler source configured, using an empty set");
                Arc::new(CallbackSet::new())
            }
        };
        *self.current.write() = Some(set);
    }

    /// Replaces the handler set with one registered at runtime.
    pub fn replace(&self, set: Arc<dyn HandlerSet>) {
        *self.current.write() = Some(set);
    }

    /// Drops the current set; the next dispatch reloads from the source.
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    /// Number of reloads performed so far.
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    fn lookup(&self, name: &str) -> HandlerLookup {
        match self.current.read().as_ref() {
            Some(set) => set.lookup(name),
            None => HandlerLookup::Stale,
        }
    }

    /// Offers an event to the matching callback.
    ///
    /// Reloads at most once per call when the set is missing or stale.
    pub fn dispatch(&self, event: &Event) -> DispatchOutcome {
        let name = event.kind().callback_name();

        let handler = match self.lookup(name) {
            HandlerLookup::Found(handler) => handler,
            HandlerLookup::Missing => return DispatchOutcome::Missing,
            HandlerLookup::Stale => {
                log::info!("[Handlers] Handler set stale, reloading");
                self.reload();
                match self.lookup(name) {
                    HandlerLookup::Found(handler) => handler,
                    _ => return DispatchOutcome::Missing,
                }
            }
        };

        let args = HandlerArgs::from_event(event);
        match catch_unwind(AssertUnwindSafe(|| handler.call(&args))) {
            Ok(Ok(())) => DispatchOutcome::Invoked,
            Ok(Err(e)) => {
                log::error!("[Handlers] {} failed: {}", name, e);
                DispatchOutcome::Failed
            }
            Err(_) => {
                log::error!("[Handlers] {} panicked", name);
                DispatchOutcome::Failed
            }
        }
    }
}
