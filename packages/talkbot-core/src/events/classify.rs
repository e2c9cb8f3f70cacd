//! Classification of raw transport events.

use serde::{Deserialize, Serialize};

use super::{Channel, Event, RemoteFile, ServerError, TextMessage, User, UserAccount};
use crate::protocol_constants::*;

/// Payload attached to a raw client event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RawPayload {
    #[default]
    None,
    User(User),
    Channel(Channel),
    Message(TextMessage),
    File(RemoteFile),
    Error(ServerError),
    Account(UserAccount),
    /// Boolean flag, e.g. "processing active" for command progress events.
    Flag(bool),
}

/// An event exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// Client event code (see [`crate::protocol_constants`]).
    pub code: u32,
    /// Event source: command id, channel id or user id depending on `code`.
    #[serde(default)]
    pub source: i32,
    #[serde(default)]
    pub payload: RawPayload,
}

impl RawEvent {
    pub fn new(code: u32, source: i32, payload: RawPayload) -> Self {
        Self {
            code,
            source,
            payload,
        }
    }
}

/// Classifies a raw event into the typed [`Event`] union.
///
/// Returns `None` for the empty event, for unknown codes and for payloads
/// that don't match the code. Callers ignore `None`.
pub fn classify(raw: &RawEvent) -> Option<Event> {
    let event = match (raw.code, &raw.payload) {
        (CLIENT_EVENT_NONE, _) => return None,
        (CLIENT_EVENT_CON_SUCCESS, _) => Event::ConnectionSucceeded,
        (CLIENT_EVENT_CON_FAILED, _) => Event::ConnectionFailed,
        (CLIENT_EVENT_CON_LOST, _) => Event::ConnectionLost,
        (CLIENT_EVENT_CMD_PROCESSING, RawPayload::Flag(active)) => Event::Processing {
            command_id: raw.source,
            complete: !active,
        },
        (CLIENT_EVENT_CMD_ERROR, RawPayload::Error(err)) => Event::Error(err.clone()),
        (CLIENT_EVENT_CMD_SUCCESS, _) => Event::Success {
            command_id: raw.source,
        },
        (CLIENT_EVENT_CMD_MYSELF_LOGGEDIN, RawPayload::Account(account)) => {
            Event::LoginSucceeded(account.clone())
        }
        (CLIENT_EVENT_CMD_MYSELF_LOGGEDOUT, _) => Event::LoggedOut,
        (CLIENT_EVENT_CMD_MYSELF_KICKED, RawPayload::User(user)) => Event::Kicked {
            by: Some(user.clone()),
        },
        (CLIENT_EVENT_CMD_MYSELF_KICKED, _) => Event::Kicked { by: None },
        (CLIENT_EVENT_CMD_USER_LOGGEDIN, RawPayload::User(user)) => {
            Event::UserLoggedIn(user.clone())
        }
        (CLIENT_EVENT_CMD_USER_LOGGEDOUT, RawPayload::User(user)) => {
            Event::UserLoggedOut(user.clone())
        }
        (CLIENT_EVENT_CMD_USER_UPDATE, RawPayload::User(user)) => Event::UserUpdate(user.clone()),
        (CLIENT_EVENT_CMD_USER_JOINED, RawPayload::User(user)) => Event::UserJoined(user.clone()),
        (CLIENT_EVENT_CMD_USER_LEFT, RawPayload::User(user)) => Event::UserLeft {
            source: raw.source,
            user: user.clone(),
        },
        (CLIENT_EVENT_CMD_USER_TEXTMSG, RawPayload::Message(msg)) => {
            Event::UserTextMessage(msg.clone())
        }
        (CLIENT_EVENT_CMD_CHANNEL_NEW, RawPayload::Channel(ch)) => Event::ChannelNew(ch.clone()),
        (CLIENT_EVENT_CMD_CHANNEL_UPDATE, RawPayload::Channel(ch)) => {
            Event::ChannelUpdate(ch.clone())
        }
        (CLIENT_EVENT_CMD_CHANNEL_REMOVE, RawPayload::Channel(ch)) => {
            Event::ChannelRemove(ch.clone())
        }
        (CLIENT_EVENT_CMD_SERVER_UPDATE, _) => Event::ServerUpdate,
        (CLIENT_EVENT_CMD_FILE_NEW, RawPayload::File(file)) => Event::FileNew(file.clone()),
        (CLIENT_EVENT_CMD_FILE_REMOVE, RawPayload::File(file)) => Event::FileRemove(file.clone()),
        (code, payload) => {
            log::debug!(
                "[Classify] Ignoring event code {} with payload {:?}",
                code,
                payload
            );
            return None;
        }
    };
    Some(event)
}
