//! Shared test doubles for the collaborator traits.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogEntry, FetchError, FetchResult, RecommendationSource};
use crate::events::{ChannelId, Member, RawEvent, UserId};
use crate::transport::{Playback, Transport, TransportError, TransportResult};

/// A command issued to [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Login,
    Join,
    ChangeStatus(String),
    ChannelMembers(ChannelId),
    ResolveChannelPath(String),
    MoveUser(UserId, ChannelId),
}

/// Transport that replays scripted events and records every command.
pub struct MockTransport {
    my_id: UserId,
    events: Mutex<VecDeque<RawEvent>>,
    calls: Mutex<Vec<TransportCall>>,
    failing: Mutex<HashSet<&'static str>>,
    members: Mutex<HashMap<ChannelId, Vec<Member>>>,
    paths: Mutex<HashMap<String, ChannelId>>,
    current_channel: AtomicI32,
    authorized: AtomicBool,
    cancel_when_drained: Mutex<Option<CancellationToken>>,
}

impl MockTransport {
    pub fn new(my_id: UserId) -> Self {
        Self {
            my_id,
            events: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            members: Mutex::new(HashMap::new()),
            paths: Mutex::new(HashMap::new()),
            current_channel: AtomicI32::new(0),
            authorized: AtomicBool::new(false),
            cancel_when_drained: Mutex::new(None),
        }
    }

    pub fn push_events(&self, events: impl IntoIterator<Item = RawEvent>) {
        self.events.lock().extend(events);
    }

    /// Cancels `token` the first time a poll finds the script empty.
    pub fn cancel_when_drained(&self, token: CancellationToken) {
        *self.cancel_when_drained.lock() = Some(token);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &TransportCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Makes the named method (`"connect"`, `"poll_event"`, ...) fail.
    pub fn fail_command(&self, name: &'static str) {
        self.failing.lock().insert(name);
    }

    pub fn set_members(&self, channel_id: ChannelId, members: Vec<Member>) {
        self.members.lock().insert(channel_id, members);
    }

    pub fn set_channel_path(&self, path: &str, channel_id: ChannelId) {
        self.paths.lock().insert(path.to_string(), channel_id);
    }

    pub fn set_current_channel(&self, channel_id: ChannelId) {
        self.current_channel.store(channel_id, Ordering::SeqCst);
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    fn record(&self, name: &'static str, call: TransportCall) -> TransportResult<()> {
        self.calls.lock().push(call);
        if self.failing.lock().contains(name) {
            return Err(TransportError::command(name, "scripted failure"));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn poll_event(&self, _timeout: Duration) -> TransportResult<Option<RawEvent>> {
        // Poll failures are one-shot so the loop can carry on.
        if self.failing.lock().remove("poll_event") {
            return Err(TransportError::NotConnected);
        }
        let next = self.events.lock().pop_front();
        if next.is_none() {
            if let Some(token) = self.cancel_when_drained.lock().take() {
                token.cancel();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(next)
    }

    fn connect(&self) -> TransportResult<()> {
        self.record("connect", TransportCall::Connect)
    }

    fn disconnect(&self) -> TransportResult<()> {
        self.record("disconnect", TransportCall::Disconnect)
    }

    fn login(&self) -> TransportResult<()> {
        self.record("login", TransportCall::Login)
    }

    fn join(&self) -> TransportResult<()> {
        self.record("join", TransportCall::Join)
    }

    fn change_status(&self, text: &str) -> TransportResult<()> {
        self.record("change_status", TransportCall::ChangeStatus(text.to_string()))
    }

    fn channel_members(&self, channel_id: ChannelId) -> TransportResult<Vec<Member>> {
        self.record("channel_members", TransportCall::ChannelMembers(channel_id))?;
        Ok(self
            .members
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_channel_path(&self, path: &str) -> TransportResult<ChannelId> {
        self.record(
            "resolve_channel_path",
            TransportCall::ResolveChannelPath(path.to_string()),
        )?;
        Ok(self.paths.lock().get(path).copied().unwrap_or(0))
    }

    fn move_user(&self, user_id: UserId, channel_id: ChannelId) -> TransportResult<()> {
        self.record("move_user", TransportCall::MoveUser(user_id, channel_id))?;
        if user_id == self.my_id {
            self.set_current_channel(channel_id);
        }
        Ok(())
    }

    fn my_user_id(&self) -> UserId {
        self.my_id
    }

    fn current_channel_id(&self) -> ChannelId {
        self.current_channel.load(Ordering::SeqCst)
    }

    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }
}

/// Playback double that remembers whether it was stopped.
pub struct MockPlayback {
    active: AtomicBool,
    stopped: AtomicBool,
}

impl MockPlayback {
    pub fn playing() -> Self {
        Self {
            active: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn idle() -> Self {
        Self {
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Playback for MockPlayback {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Recommendation source returning a fixed list (or a fixed failure).
pub struct ScriptedSource {
    entries: Vec<CatalogEntry>,
    fail: bool,
    delay: Option<Duration>,
    requests: Mutex<Vec<(String, usize)>>,
}

impl ScriptedSource {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            fail: false,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl RecommendationSource for ScriptedSource {
    async fn continuation(&self, track_id: &str, limit: usize) -> FetchResult<Vec<CatalogEntry>> {
        self.requests.lock().push((track_id.to_string(), limit));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(FetchError::HttpStatus(503));
        }
        Ok(self.entries.iter().take(limit).cloned().collect())
    }
}
