//! Centralized error types for the Talkbot core library.
//!
//! Each concern defines its own `thiserror` enum next to the code that raises
//! it. This module gives them stable machine-readable codes and aggregates
//! them into [`TalkbotError`] for the composition root.
//!
//! Only [`FatalError`] ever ends a session. Everything else is recovered and
//! logged where it happens.

use thiserror::Error;

use crate::catalog::{FetchError, ResolveError};
use crate::handlers::HandlerError;
use crate::session::FatalError;
use crate::transport::TransportError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for logs and exit reports.
    fn code(&self) -> &'static str;
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Command { .. } => "transport_command_failed",
            Self::NotConnected => "transport_not_connected",
        }
    }
}

impl ErrorCode for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            Self::NothingFound(_) => "nothing_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Service(_) => "service_error",
        }
    }
}

impl ErrorCode for FetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_) => "http_error_status",
            Self::Parse(_) => "recommendation_parse_error",
        }
    }
}

impl ErrorCode for HandlerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Source { .. } => "handler_source_invalid",
            Self::Io { .. } => "handler_source_unreadable",
            Self::Parse { .. } => "handler_manifest_invalid",
            Self::Spawn { .. } => "handler_spawn_failed",
            Self::Callback(_) => "handler_callback_failed",
        }
    }
}

impl ErrorCode for FatalError {
    fn code(&self) -> &'static str {
        "session_fatal"
    }
}

/// Application-wide error type for the Talkbot core.
#[derive(Debug, Error)]
pub enum TalkbotError {
    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport collaborator reported a failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Track resolution failed.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Recommendation fetch failed.
    #[error("Recommendation error: {0}")]
    Fetch(#[from] FetchError),

    /// Handler set could not be loaded or invoked.
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Session ran out of retries.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl TalkbotError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Transport(e) => e.code(),
            Self::Resolve(e) => e.code(),
            Self::Fetch(e) => e.code(),
            Self::Handler(e) => e.code(),
            Self::Fatal(e) => e.code(),
        }
    }

    /// Returns true if this error must end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::catalog::{FetchResult, ResolveResult};
pub use crate::handlers::HandlerResult;
pub use crate::transport::TransportResult;

/// Convenient Result alias for application-wide operations.
pub type TalkbotResult<T> = Result<T, TalkbotError>;
