//! Fixed protocol constants that should NOT be changed.
//!
//! Client event codes are assigned by the voice chat client SDK. The transport
//! collaborator hands them to us verbatim inside [`RawEvent`](crate::events::RawEvent).

// ─────────────────────────────────────────────────────────────────────────────
// Client Event Codes
// ─────────────────────────────────────────────────────────────────────────────

/// No event was available (poll timed out).
pub const CLIENT_EVENT_NONE: u32 = 0;
/// TCP/UDP connection to the server was established.
pub const CLIENT_EVENT_CON_SUCCESS: u32 = 10;
/// Connecting to the server failed.
pub const CLIENT_EVENT_CON_FAILED: u32 = 20;
/// Connection to the server was lost.
pub const CLIENT_EVENT_CON_LOST: u32 = 30;
/// Server started or finished processing a command.
pub const CLIENT_EVENT_CMD_PROCESSING: u32 = 200;
/// Server rejected a command.
pub const CLIENT_EVENT_CMD_ERROR: u32 = 210;
/// Server accepted a command.
pub const CLIENT_EVENT_CMD_SUCCESS: u32 = 220;
/// This client logged in.
pub const CLIENT_EVENT_CMD_MYSELF_LOGGEDIN: u32 = 230;
/// This client was logged out.
pub const CLIENT_EVENT_CMD_MYSELF_LOGGEDOUT: u32 = 240;
/// This client was kicked from the server or its channel.
pub const CLIENT_EVENT_CMD_MYSELF_KICKED: u32 = 250;
/// Another user logged in.
pub const CLIENT_EVENT_CMD_USER_LOGGEDIN: u32 = 260;
/// Another user logged out.
pub const CLIENT_EVENT_CMD_USER_LOGGEDOUT: u32 = 270;
/// A user's properties changed.
pub const CLIENT_EVENT_CMD_USER_UPDATE: u32 = 280;
/// A user joined a channel.
pub const CLIENT_EVENT_CMD_USER_JOINED: u32 = 290;
/// A user left a channel. `source` carries the channel that was left.
pub const CLIENT_EVENT_CMD_USER_LEFT: u32 = 300;
/// A text message arrived.
pub const CLIENT_EVENT_CMD_USER_TEXTMSG: u32 = 310;
/// A channel was created.
pub const CLIENT_EVENT_CMD_CHANNEL_NEW: u32 = 320;
/// A channel's properties changed.
pub const CLIENT_EVENT_CMD_CHANNEL_UPDATE: u32 = 330;
/// A channel was removed.
pub const CLIENT_EVENT_CMD_CHANNEL_REMOVE: u32 = 340;
/// Server properties changed.
pub const CLIENT_EVENT_CMD_SERVER_UPDATE: u32 = 350;
/// A file upload completed.
pub const CLIENT_EVENT_CMD_FILE_NEW: u32 = 370;
/// A file was deleted.
pub const CLIENT_EVENT_CMD_FILE_REMOVE: u32 = 380;

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Id of the server's root channel. Used when a channel path cannot be resolved.
pub const ROOT_CHANNEL_ID: i32 = 1;

/// Channel id reported when a user is not in any channel.
pub const NO_CHANNEL_ID: i32 = 0;

// ─────────────────────────────────────────────────────────────────────────────
// Recommendations
// ─────────────────────────────────────────────────────────────────────────────

/// Base URL for building watch links of fetched continuation entries.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Context keys that hold a track's stable external id, in lookup order.
pub const EXTERNAL_ID_KEYS: [&str; 2] = ["videoId", "id"];
