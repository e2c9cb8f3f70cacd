//! Trait abstractions for the collaborators the session drives.
//!
//! These traits enable dependency injection for testability and modularity.
//! The dispatcher and occupancy monitor depend on traits rather than on a
//! concrete client SDK binding.

use std::time::Duration;

use thiserror::Error;

use crate::events::{ChannelId, Member, RawEvent, UserId};

/// Errors reported by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A command could not be issued or was refused locally.
    #[error("command '{command}' failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    /// The client has no live connection.
    #[error("not connected")]
    NotConnected,
}

impl TransportError {
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Trait for the connection to the voice chat server.
///
/// All methods are blocking. `poll_event` waits at most `timeout`; every other
/// call is expected to return promptly (commands are queued by the client SDK
/// and their outcome arrives later as an event).
pub trait Transport: Send + Sync {
    /// Waits up to `timeout` for the next client event.
    fn poll_event(&self, timeout: Duration) -> TransportResult<Option<RawEvent>>;

    /// Starts connecting to the configured server.
    fn connect(&self) -> TransportResult<()>;

    /// Drops the connection.
    fn disconnect(&self) -> TransportResult<()>;

    /// Sends the login command with the configured credentials.
    fn login(&self) -> TransportResult<()>;

    /// Joins the configured channel.
    fn join(&self) -> TransportResult<()>;

    /// Updates this client's status text.
    fn change_status(&self, text: &str) -> TransportResult<()>;

    /// Lists the users currently in a channel.
    fn channel_members(&self, channel_id: ChannelId) -> TransportResult<Vec<Member>>;

    /// Resolves a channel path such as `/Music/Lounge/`. Returns `0` if unknown.
    fn resolve_channel_path(&self, path: &str) -> TransportResult<ChannelId>;

    /// Moves a user (usually this client) to another channel.
    fn move_user(&self, user_id: UserId, channel_id: ChannelId) -> TransportResult<()>;

    /// This client's user id (`0` before login).
    fn my_user_id(&self) -> UserId;

    /// Channel this client currently sits in (`0` when not joined).
    fn current_channel_id(&self) -> ChannelId;

    /// Returns true once the server accepted the login.
    fn is_authorized(&self) -> bool;
}

/// Trait for the playback collaborator.
///
/// Used by the occupancy monitor to stop audio before leaving a channel.
pub trait Playback: Send + Sync {
    /// Returns true while a track is playing or paused.
    fn is_active(&self) -> bool;

    /// Stops playback.
    fn stop(&self);
}
