//! Consumer-queue abstraction for decoupling the dispatcher from the bot.
//!
//! The dispatcher depends on the [`EventSink`] trait rather than concrete
//! channels, so the bot can consume events from queues while tests and the
//! headless runner can substitute their own sinks.

use tokio::sync::mpsc;

use super::{RemoteFile, ServerError, TextMessage};

/// Trait for forwarding session events to the bot's consumers.
///
/// Called only from the dispatcher thread and only while the session is
/// connected. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// Forwards a command error reported by the server.
    fn emit_error(&self, error: ServerError);

    /// Forwards a command success acknowledgement.
    fn emit_success(&self, command_id: i32);

    /// Forwards a private text message addressed to the bot.
    fn emit_message(&self, message: TextMessage);

    /// Forwards a file the bot itself uploaded to its current channel.
    fn emit_upload(&self, file: RemoteFile);
}

/// Receiving halves of the bot's consumer queues.
#[derive(Debug)]
pub struct ConsumerQueues {
    pub errors: mpsc::UnboundedReceiver<ServerError>,
    pub successes: mpsc::UnboundedReceiver<i32>,
    pub text_messages: mpsc::UnboundedReceiver<TextMessage>,
    pub uploaded_files: mpsc::UnboundedReceiver<RemoteFile>,
}

/// Channel-backed sink feeding [`ConsumerQueues`].
///
/// Queues are unbounded so the dispatcher never waits on a slow consumer.
/// Sends to a dropped receiver are discarded.
#[derive(Clone)]
pub struct QueueEventSink {
    errors: mpsc::UnboundedSender<ServerError>,
    successes: mpsc::UnboundedSender<i32>,
    text_messages: mpsc::UnboundedSender<TextMessage>,
    uploaded_files: mpsc::UnboundedSender<RemoteFile>,
}

impl QueueEventSink {
    /// Creates a sink and the queues it feeds.
    pub fn new() -> (Self, ConsumerQueues) {
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (successes_tx, successes) = mpsc::unbounded_channel();
        let (messages_tx, text_messages) = mpsc::unbounded_channel();
        let (files_tx, uploaded_files) = mpsc::unbounded_channel();

        (
            Self {
                errors: errors_tx,
                successes: successes_tx,
                text_messages: messages_tx,
                uploaded_files: files_tx,
            },
            ConsumerQueues {
                errors,
                successes,
                text_messages,
                uploaded_files,
            },
        )
    }
}

impl EventSink for QueueEventSink {
    fn emit_error(&self, error: ServerError) {
        let _ = self.errors.send(error);
    }

    fn emit_success(&self, command_id: i32) {
        let _ = self.successes.send(command_id);
    }

    fn emit_message(&self, message: TextMessage) {
        let _ = self.text_messages.send(message);
    }

    fn emit_upload(&self, file: RemoteFile) {
        let _ = self.uploaded_files.send(file);
    }
}

/// Logging sink for debugging and dry runs.
///
/// Logs all forwarded events at debug level.
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit_error(&self, error: ServerError) {
        tracing::debug!(?error, "session_error");
    }

    fn emit_success(&self, command_id: i32) {
        tracing::debug!(command_id, "session_success");
    }

    fn emit_message(&self, message: TextMessage) {
        tracing::debug!(?message, "text_message");
    }

    fn emit_upload(&self, file: RemoteFile) {
        tracing::debug!(?file, "uploaded_file");
    }
}
