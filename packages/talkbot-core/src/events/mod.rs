//! Session events and their payloads.
//!
//! This module provides:
//! - [`Event`], the typed union every raw transport event is classified into
//! - [`classify`] for turning a [`RawEvent`] into an [`Event`]
//! - [`EventSink`] for forwarding events to the bot's consumer queues

mod classify;
mod sink;

pub use classify::{classify, RawEvent, RawPayload};
pub use sink::{ConsumerQueues, EventSink, LoggingEventSink, QueueEventSink};

use serde::{Deserialize, Serialize};

/// Server-assigned user id.
pub type UserId = i32;

/// Server-assigned channel id. `0` means "no channel".
pub type ChannelId = i32;

/// A user as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    /// Channel the user currently sits in (`0` when not in a channel).
    pub channel_id: ChannelId,
}

/// A channel on the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: ChannelId,
    pub parent_id: ChannelId,
    pub name: String,
}

/// Audience of a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Private message addressed to this client.
    #[default]
    User,
    /// Message to everyone in a channel.
    Channel,
    /// Server-wide broadcast.
    Broadcast,
    /// Application-defined message.
    Custom,
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMessage {
    pub kind: MessageKind,
    pub from_id: UserId,
    pub from_username: String,
    pub channel_id: ChannelId,
    pub content: String,
}

/// A file stored in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteFile {
    pub id: i32,
    pub name: String,
    pub size: u64,
    /// Username of the uploader.
    pub username: String,
    pub channel_id: ChannelId,
}

/// The account this client logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccount {
    pub username: String,
    pub user_type: u32,
}

/// An error reported by the server in response to a command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerError {
    pub code: i32,
    pub message: String,
}

/// One entry of a channel's live membership.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub user_id: UserId,
    pub username: String,
}

impl From<&User> for Member {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// A classified session event.
///
/// Events are created once per poll and consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The server rejected a command.
    Error(ServerError),
    /// The server accepted the command with the given id.
    Success { command_id: i32 },
    /// The server started (`complete == false`) or finished processing a command.
    Processing { command_id: i32, complete: bool },
    UserTextMessage(TextMessage),
    FileNew(RemoteFile),
    FileRemove(RemoteFile),
    ConnectionFailed,
    ConnectionLost,
    /// This client was kicked. `by` is the kicking user when the server reports one.
    Kicked { by: Option<User> },
    ConnectionSucceeded,
    LoginSucceeded(UserAccount),
    LoggedOut,
    /// `source` is the channel the user left.
    UserLeft { source: ChannelId, user: User },
    UserJoined(User),
    UserUpdate(User),
    UserLoggedIn(User),
    UserLoggedOut(User),
    ChannelNew(Channel),
    ChannelUpdate(Channel),
    ChannelRemove(Channel),
    ServerUpdate,
}

/// Payload-free discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Success,
    Processing,
    UserTextMessage,
    FileNew,
    FileRemove,
    ConnectionFailed,
    ConnectionLost,
    Kicked,
    ConnectionSucceeded,
    LoginSucceeded,
    LoggedOut,
    UserLeft,
    UserJoined,
    UserUpdate,
    UserLoggedIn,
    UserLoggedOut,
    ChannelNew,
    ChannelUpdate,
    ChannelRemove,
    ServerUpdate,
}

impl EventKind {
    /// Name of the handler callback for this kind, e.g. `on_user_left`.
    pub fn callback_name(self) -> &'static str {
        match self {
            Self::Error => "on_error",
            Self::Success => "on_success",
            Self::Processing => "on_processing",
            Self::UserTextMessage => "on_user_text_message",
            Self::FileNew => "on_file_new",
            Self::FileRemove => "on_file_remove",
            Self::ConnectionFailed => "on_connection_failed",
            Self::ConnectionLost => "on_connection_lost",
            Self::Kicked => "on_kicked",
            Self::ConnectionSucceeded => "on_connection_succeeded",
            Self::LoginSucceeded => "on_login_succeeded",
            Self::LoggedOut => "on_logged_out",
            Self::UserLeft => "on_user_left",
            Self::UserJoined => "on_user_joined",
            Self::UserUpdate => "on_user_update",
            Self::UserLoggedIn => "on_user_logged_in",
            Self::UserLoggedOut => "on_user_logged_out",
            Self::ChannelNew => "on_channel_new",
            Self::ChannelUpdate => "on_channel_update",
            Self::ChannelRemove => "on_channel_remove",
            Self::ServerUpdate => "on_server_update",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error(_) => EventKind::Error,
            Self::Success { .. } => EventKind::Success,
            Self::Processing { .. } => EventKind::Processing,
            Self::UserTextMessage(_) => EventKind::UserTextMessage,
            Self::FileNew(_) => EventKind::FileNew,
            Self::FileRemove(_) => EventKind::FileRemove,
            Self::ConnectionFailed => EventKind::ConnectionFailed,
            Self::ConnectionLost => EventKind::ConnectionLost,
            Self::Kicked { .. } => EventKind::Kicked,
            Self::ConnectionSucceeded => EventKind::ConnectionSucceeded,
            Self::LoginSucceeded(_) => EventKind::LoginSucceeded,
            Self::LoggedOut => EventKind::LoggedOut,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::UserJoined(_) => EventKind::UserJoined,
            Self::UserUpdate(_) => EventKind::UserUpdate,
            Self::UserLoggedIn(_) => EventKind::UserLoggedIn,
            Self::UserLoggedOut(_) => EventKind::UserLoggedOut,
            Self::ChannelNew(_) => EventKind::ChannelNew,
            Self::ChannelUpdate(_) => EventKind::ChannelUpdate,
            Self::ChannelRemove(_) => EventKind::ChannelRemove,
            Self::ServerUpdate => EventKind::ServerUpdate,
        }
    }

    /// Returns true for the events that end the current connection.
    pub fn is_connection_drop(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::ConnectionLost | Self::Kicked { .. }
        )
    }
}
