//! The session's main event loop.
//!
//! [`EventDispatcher::run`] pulls raw events from the transport, classifies
//! them and applies them in a fixed order:
//!
//! 1. Forward errors, acks, private messages and own uploads to the consumer
//!    queues (connected sessions only).
//! 2. Drive the connect → login → join lifecycle, retrying each stage under
//!    the reconnect policy.
//! 3. Run the auto-return check when someone leaves the bot's channel.
//!
//! Only the first matching rule applies. Afterwards the event is offered to
//! the handler registry, if one is configured.
//!
//! The loop is blocking and meant for a dedicated thread (the app uses
//! `spawn_blocking`). It returns `Ok(())` when closed through a
//! [`DispatcherHandle`] and [`FatalError`] when a lifecycle stage runs out of
//! retries. Every other fault is logged and the loop carries on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::events::{
    classify, ChannelId, Event, EventSink, MessageKind, RemoteFile, ServerError, UserAccount,
};
use crate::handlers::HandlerRegistry;
use crate::occupancy::ChannelOccupancyMonitor;
use crate::protocol_constants::NO_CHANNEL_ID;
use crate::session::{FatalError, LifecycleStage, RetryDecision, SessionState, SessionStateMachine};
use crate::transport::{Transport, TransportResult};

/// Longest uninterrupted sleep while waiting out a backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cloneable control surface for a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    cancel: CancellationToken,
    status: Arc<Mutex<String>>,
    transport: Arc<dyn Transport>,
    handlers: Option<Arc<HandlerRegistry>>,
}

impl DispatcherHandle {
    /// Stops the loop. Takes effect within one poll interval.
    pub fn close(&self) {
        log::info!("[Dispatcher] Close requested");
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sets the status text. Applied now and re-applied after every join.
    pub fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        if let Err(e) = self.transport.change_status(&text) {
            log::warn!("[Dispatcher] Failed to change status: {}", e);
        }
        *self.status.lock() = text;
    }

    /// Handler registry, when event handling is enabled.
    ///
    /// Use it to replace the handler set at runtime or force a reload.
    pub fn handlers(&self) -> Option<&Arc<HandlerRegistry>> {
        self.handlers.as_ref()
    }
}

/// Drives one bot session.
pub struct EventDispatcher {
    transport: Arc<dyn Transport>,
    session: SessionStateMachine,
    sink: Arc<dyn EventSink>,
    occupancy: ChannelOccupancyMonitor,
    handlers: Option<Arc<HandlerRegistry>>,
    /// Used to recognise the bot's own uploads.
    username: String,
    status: Arc<Mutex<String>>,
    account: Option<UserAccount>,
    poll_timeout: Duration,
    cancel: CancellationToken,
}

impl EventDispatcher {
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        occupancy: ChannelOccupancyMonitor,
        handlers: Option<Arc<HandlerRegistry>>,
    ) -> Self {
        Self {
            transport,
            session: SessionStateMachine::new(
                config.reconnect_policy(),
                config.reconnect_on_startup,
            ),
            sink,
            occupancy,
            handlers,
            username: config.username.clone(),
            status: Arc::new(Mutex::new(config.status_text.clone())),
            account: None,
            poll_timeout: config.poll_timeout(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            cancel: self.cancel.clone(),
            status: Arc::clone(&self.status),
            transport: Arc::clone(&self.transport),
            handlers: self.handlers.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    /// Account reported by the last successful login.
    pub fn account(&self) -> Option<&UserAccount> {
        self.account.as_ref()
    }

    /// Stores the status text re-applied after every join.
    pub fn set_status(&self, text: impl Into<String>) {
        *self.status.lock() = text.into();
    }

    /// Issues the first connect.
    pub fn start(&mut self) -> TransportResult<()> {
        log::info!("[Dispatcher] Connecting");
        self.session.begin_connecting();
        self.transport.connect()
    }

    /// Issues the first connect, retrying under the reconnect policy while
    /// the transport refuses it outright.
    ///
    /// Returns `Ok(())` once a connect was accepted or the dispatcher was
    /// closed while backing off.
    pub fn connect(&mut self) -> Result<(), FatalError> {
        let mut result = self.start();
        while let Err(e) = result {
            log::warn!("[Dispatcher] Connect failed: {}", e);
            match self.session.next_retry(LifecycleStage::Reconnect) {
                RetryDecision::Retry { attempt, backoff } => {
                    log::info!(
                        "[Session] Retrying connect in {:?} (attempt {})",
                        backoff,
                        attempt
                    );
                    if !self.sleep_unless_closed(backoff) {
                        return Ok(());
                    }
                    result = self.start();
                }
                RetryDecision::Exhausted(fatal) => {
                    log::error!("[Dispatcher] {}", fatal);
                    return Err(fatal);
                }
            }
        }
        Ok(())
    }

    /// Runs the event loop until closed or fatally failed.
    pub fn run(&mut self) -> Result<(), FatalError> {
        log::info!("[Dispatcher] Event loop started");
        while !self.cancel.is_cancelled() {
            let raw = match self.transport.poll_event(self.poll_timeout) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("[Dispatcher] Poll failed: {}", e);
                    self.sleep_unless_closed(self.poll_timeout);
                    continue;
                }
            };
            let Some(event) = classify(&raw) else {
                continue;
            };
            if let Err(fatal) = self.handle_event(&event) {
                log::error!("[Dispatcher] {}", fatal);
                return Err(fatal);
            }
        }
        log::info!("[Dispatcher] Event loop stopped");
        Ok(())
    }

    /// Applies one classified event, then offers it to the handlers.
    pub fn handle_event(&mut self, event: &Event) -> Result<(), FatalError> {
        log::debug!("[Dispatcher] {:?}", event);
        self.apply(event)?;
        if let Some(handlers) = &self.handlers {
            handlers.dispatch(event);
        }
        Ok(())
    }

    fn apply(&mut self, event: &Event) -> Result<(), FatalError> {
        let state = self.session.state();
        let connected = state == SessionState::Connected;

        match event {
            Event::Error(error) if connected => self.sink.emit_error(error.clone()),
            Event::Success { command_id } if connected => self.sink.emit_success(*command_id),
            Event::UserTextMessage(message) if connected && message.kind == MessageKind::User => {
                self.sink.emit_message(message.clone())
            }
            Event::FileNew(file) if connected && self.is_own_upload(file) => {
                self.sink.emit_upload(file.clone())
            }
            event if event.is_connection_drop() => self.on_connection_drop(event)?,
            Event::ConnectionSucceeded => {
                log::info!("[Session] Connected, logging in");
                self.session.on_stage_succeeded();
                self.best_effort("login", |t| t.login());
            }
            Event::Error(error) => self.on_command_error(error)?,
            Event::LoginSucceeded(account) => {
                log::info!("[Session] Logged in as {}, joining", account.username);
                self.account = Some(account.clone());
                self.session.on_stage_succeeded();
                self.best_effort("join", |t| t.join());
            }
            Event::Success { .. } if state == SessionState::Connecting => {
                log::info!("[Session] Joined channel {}", self.transport.current_channel_id());
                self.session.on_connected();
                let status = self.status.lock().clone();
                self.best_effort("change_status", |t| t.change_status(&status));
            }
            Event::UserLeft { source, user } => {
                let current = self.transport.current_channel_id();
                if left_channel(*source, user.channel_id, current) {
                    self.occupancy.on_user_left(current, user.id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_own_upload(&self, file: &RemoteFile) -> bool {
        file.username == self.username && file.channel_id == self.transport.current_channel_id()
    }

    fn on_connection_drop(&mut self, event: &Event) -> Result<(), FatalError> {
        match event {
            Event::ConnectionFailed => log::warn!("[Session] Connection failed"),
            Event::Kicked { by: Some(user) } => {
                log::warn!("[Session] Kicked by {}", user.username)
            }
            Event::Kicked { by: None } => log::warn!("[Session] Kicked"),
            _ => log::warn!("[Session] Connection lost"),
        }
        self.best_effort("disconnect", |t| t.disconnect());
        self.session.on_disconnected();

        self.retry(LifecycleStage::Reconnect, |t| t.connect())?;
        self.session.begin_connecting();
        Ok(())
    }

    fn on_command_error(&mut self, error: &ServerError) -> Result<(), FatalError> {
        if !self.transport.is_authorized() {
            log::warn!("[Session] Login failed: {}", error.message);
            self.retry(LifecycleStage::Login, |t| t.login())
        } else {
            log::warn!("[Session] Failed to join channel: {}", error.message);
            self.retry(LifecycleStage::Join, |t| t.join())
        }
    }

    /// Waits out the backoff and repeats `action`, or reports exhaustion.
    fn retry(
        &mut self,
        stage: LifecycleStage,
        action: impl FnOnce(&dyn Transport) -> TransportResult<()>,
    ) -> Result<(), FatalError> {
        match self.session.next_retry(stage) {
            RetryDecision::Retry { attempt, backoff } => {
                log::info!(
                    "[Session] Retrying {} in {:?} (attempt {})",
                    stage,
                    backoff,
                    attempt
                );
                if self.sleep_unless_closed(backoff) {
                    self.best_effort(stage_command(stage), action);
                }
                Ok(())
            }
            RetryDecision::Exhausted(fatal) => {
                log::error!("[Session] Giving up on {}", stage);
                Err(fatal)
            }
        }
    }

    fn best_effort(
        &self,
        command: &str,
        action: impl FnOnce(&dyn Transport) -> TransportResult<()>,
    ) {
        if let Err(e) = action(self.transport.as_ref()) {
            log::warn!("[Dispatcher] {} failed: {}", command, e);
        }
    }

    /// Sleeps for `duration` unless the dispatcher is closed first.
    ///
    /// Returns false if closed.
    fn sleep_unless_closed(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

/// Whether a departure concerns the bot's channel. A bot outside any
/// channel has nothing to watch.
fn left_channel(source: ChannelId, user_channel: ChannelId, current: ChannelId) -> bool {
    current != NO_CHANNEL_ID
        && (source == current || (user_channel != NO_CHANNEL_ID && user_channel == current))
}

fn stage_command(stage: LifecycleStage) -> &'static str {
    match stage {
        LifecycleStage::Reconnect => "connect",
        LifecycleStage::Login => "login",
        LifecycleStage::Join => "join",
    }
}
