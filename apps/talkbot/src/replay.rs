//! Scripted transport for running a session without a live server.
//!
//! [`ReplayTransport`] answers connect/login/join with the events a server
//! would send, then replays a JSON Lines script of raw events, one per line:
//!
//! ```text
//! # a user joins and leaves the bot's channel
//! {"code": 290, "payload": {"type": "user", "data": {"id": 2, "username": "alice", "channel_id": 1}}}
//! {"code": 300, "source": 1, "payload": {"type": "user", "data": {"id": 2, "username": "alice"}}}
//! ```
//!
//! Membership is tracked from join/leave events so the auto-return check sees
//! a consistent channel.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use talkbot_core::events::{ChannelId, Member, RawEvent, RawPayload, UserAccount, UserId};
use talkbot_core::protocol_constants::{
    CLIENT_EVENT_CMD_MYSELF_LOGGEDIN, CLIENT_EVENT_CMD_SUCCESS, CLIENT_EVENT_CMD_USER_JOINED,
    CLIENT_EVENT_CMD_USER_LEFT, CLIENT_EVENT_CON_SUCCESS, ROOT_CHANNEL_ID,
};
use talkbot_core::transport::TransportResult;
use talkbot_core::{Playback, Transport, TransportError};
use tokio_util::sync::CancellationToken;

use crate::config::ReplayConfig;

/// Longest a poll blocks when nothing is left to replay.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Reads a JSON Lines event script. Blank lines and `#` comments are skipped.
pub fn load_script(path: &Path) -> Result<Vec<RawEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    parse_script(&content).with_context(|| format!("Invalid script: {}", path.display()))
}

fn parse_script(content: &str) -> Result<Vec<RawEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

#[derive(Default)]
struct ReplayState {
    /// Server responses to commands; delivered before scripted events.
    responses: VecDeque<RawEvent>,
    script: VecDeque<RawEvent>,
    connected: bool,
    authorized: bool,
    channel: ChannelId,
    members: HashMap<ChannelId, Vec<Member>>,
    next_command_id: i32,
}

impl ReplayState {
    fn respond(&mut self, code: u32, payload: RawPayload) -> i32 {
        self.next_command_id += 1;
        let id = self.next_command_id;
        self.responses.push_back(RawEvent::new(code, id, payload));
        id
    }

    fn remove_member(&mut self, user_id: UserId) {
        for members in self.members.values_mut() {
            members.retain(|m| m.user_id != user_id);
        }
    }

    fn add_member(&mut self, channel_id: ChannelId, member: Member) {
        self.remove_member(member.user_id);
        self.members.entry(channel_id).or_default().push(member);
    }

    /// Keeps membership in step with scripted join/leave events.
    fn track_membership(&mut self, event: &RawEvent) {
        let RawPayload::User(user) = &event.payload else {
            return;
        };
        match event.code {
            CLIENT_EVENT_CMD_USER_JOINED => self.add_member(user.channel_id, Member::from(user)),
            CLIENT_EVENT_CMD_USER_LEFT => self.remove_member(user.id),
            _ => {}
        }
    }
}

/// Loopback transport replaying a script.
pub struct ReplayTransport {
    username: String,
    user_id: UserId,
    join_channel: ChannelId,
    channels: HashMap<String, ChannelId>,
    state: Mutex<ReplayState>,
    drained: CancellationToken,
}

impl ReplayTransport {
    pub fn new(username: &str, config: &ReplayConfig, script: Vec<RawEvent>) -> Self {
        Self {
            username: username.to_string(),
            user_id: config.user_id,
            join_channel: config.join_channel,
            channels: config.channels.clone(),
            state: Mutex::new(ReplayState {
                script: script.into(),
                ..Default::default()
            }),
            drained: CancellationToken::new(),
        }
    }

    /// Cancelled once every scripted event has been delivered.
    pub fn drained(&self) -> CancellationToken {
        self.drained.clone()
    }
}

impl Transport for ReplayTransport {
    fn poll_event(&self, timeout: Duration) -> TransportResult<Option<RawEvent>> {
        {
            let mut state = self.state.lock();
            if let Some(event) = state.responses.pop_front() {
                return Ok(Some(event));
            }
            if let Some(event) = state.script.pop_front() {
                state.track_membership(&event);
                return Ok(Some(event));
            }
        }
        if !self.drained.is_cancelled() {
            log::info!("[Replay] Script drained");
            self.drained.cancel();
        }
        std::thread::sleep(timeout.min(IDLE_POLL));
        Ok(None)
    }

    fn connect(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.connected = true;
        state.respond(CLIENT_EVENT_CON_SUCCESS, RawPayload::None);
        Ok(())
    }

    fn disconnect(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.authorized = false;
        state.channel = 0;
        state.responses.clear();
        state.remove_member(self.user_id);
        Ok(())
    }

    fn login(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.authorized = true;
        state.respond(
            CLIENT_EVENT_CMD_MYSELF_LOGGEDIN,
            RawPayload::Account(UserAccount {
                username: self.username.clone(),
                user_type: 1,
            }),
        );
        Ok(())
    }

    fn join(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        if !state.authorized {
            return Err(TransportError::command("join", "not logged in"));
        }
        state.channel = self.join_channel;
        state.add_member(
            self.join_channel,
            Member {
                user_id: self.user_id,
                username: self.username.clone(),
            },
        );
        state.respond(CLIENT_EVENT_CMD_SUCCESS, RawPayload::None);
        Ok(())
    }

    fn change_status(&self, text: &str) -> TransportResult<()> {
        log::debug!("[Replay] Status: {}", text);
        Ok(())
    }

    fn channel_members(&self, channel_id: ChannelId) -> TransportResult<Vec<Member>> {
        Ok(self
            .state
            .lock()
            .members
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_channel_path(&self, path: &str) -> TransportResult<ChannelId> {
        if path == "/" {
            return Ok(ROOT_CHANNEL_ID);
        }
        Ok(self.channels.get(path).copied().unwrap_or(0))
    }

    fn move_user(&self, user_id: UserId, channel_id: ChannelId) -> TransportResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        log::info!("[Replay] Moving user {} to channel {}", user_id, channel_id);
        let member = state
            .members
            .values()
            .flatten()
            .find(|m| m.user_id == user_id)
            .cloned()
            .unwrap_or(Member {
                user_id,
                username: String::new(),
            });
        state.add_member(channel_id, member);
        if user_id == self.user_id {
            state.channel = channel_id;
        }
        Ok(())
    }

    fn my_user_id(&self) -> UserId {
        self.user_id
    }

    fn current_channel_id(&self) -> ChannelId {
        self.state.lock().channel
    }

    fn is_authorized(&self) -> bool {
        self.state.lock().authorized
    }
}

/// Playback stand-in: nothing ever plays.
pub struct SilentPlayback;

impl Playback for SilentPlayback {
    fn is_active(&self) -> bool {
        false
    }

    fn stop(&self) {
        log::debug!("[Replay] Stop requested with nothing playing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkbot_core::events::User;
    use talkbot_core::protocol_constants::CLIENT_EVENT_CON_LOST;

    const POLL: Duration = Duration::from_millis(1);

    fn transport(script: Vec<RawEvent>) -> ReplayTransport {
        let config = ReplayConfig {
            user_id: 10,
            join_channel: 7,
            channels: HashMap::from([("/Music/".to_string(), 4)]),
            ..Default::default()
        };
        ReplayTransport::new("bot", &config, script)
    }

    fn codes(transport: &ReplayTransport) -> Vec<u32> {
        std::iter::from_fn(|| transport.poll_event(POLL).unwrap())
            .map(|e| e.code)
            .collect()
    }

    fn user_event(code: u32, source: i32, id: UserId, channel_id: ChannelId) -> RawEvent {
        RawEvent::new(
            code,
            source,
            RawPayload::User(User {
                id,
                username: format!("user{id}"),
                channel_id,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn parses_jsonl_with_comments() {
        let events = parse_script(
            "# comment\n\n{\"code\": 30}\n{\"code\": 300, \"source\": 7, \"payload\": {\"type\": \"user\", \"data\": {\"id\": 2}}}\n",
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, CLIENT_EVENT_CON_LOST);
        assert_eq!(events[1].source, 7);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_script("{\"code\": 10}\nnot json\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn handshake_responses_come_before_script() {
        let transport = transport(vec![RawEvent::new(CLIENT_EVENT_CON_LOST, 0, RawPayload::None)]);
        transport.connect().unwrap();
        assert_eq!(codes(&transport), vec![CLIENT_EVENT_CON_SUCCESS, CLIENT_EVENT_CON_LOST]);
        assert!(transport.drained().is_cancelled());
    }

    #[test]
    fn login_and_join_update_identity() {
        let transport = transport(Vec::new());
        assert!(transport.login().is_err());

        transport.connect().unwrap();
        transport.login().unwrap();
        transport.join().unwrap();
        assert!(transport.is_authorized());
        assert_eq!(transport.current_channel_id(), 7);
        assert_eq!(
            codes(&transport),
            vec![
                CLIENT_EVENT_CON_SUCCESS,
                CLIENT_EVENT_CMD_MYSELF_LOGGEDIN,
                CLIENT_EVENT_CMD_SUCCESS,
            ]
        );
        assert_eq!(transport.channel_members(7).unwrap().len(), 1);

        transport.disconnect().unwrap();
        assert!(!transport.is_authorized());
        assert_eq!(transport.current_channel_id(), 0);
    }

    #[test]
    fn scripted_joins_and_leaves_track_membership() {
        let transport = transport(vec![
            user_event(CLIENT_EVENT_CMD_USER_JOINED, 0, 2, 7),
            user_event(CLIENT_EVENT_CMD_USER_LEFT, 7, 2, 0),
        ]);
        transport.connect().unwrap();
        transport.login().unwrap();
        transport.join().unwrap();
        for _ in 0..3 {
            transport.poll_event(POLL).unwrap();
        }

        transport.poll_event(POLL).unwrap();
        assert_eq!(transport.channel_members(7).unwrap().len(), 2);
        transport.poll_event(POLL).unwrap();
        assert_eq!(transport.channel_members(7).unwrap().len(), 1);
    }

    #[test]
    fn resolves_known_paths_only() {
        let transport = transport(Vec::new());
        assert_eq!(transport.resolve_channel_path("/").unwrap(), ROOT_CHANNEL_ID);
        assert_eq!(transport.resolve_channel_path("/Music/").unwrap(), 4);
        assert_eq!(transport.resolve_channel_path("/Other/").unwrap(), 0);
    }

    #[test]
    fn moving_the_bot_changes_its_channel() {
        let transport = transport(Vec::new());
        transport.connect().unwrap();
        transport.login().unwrap();
        transport.join().unwrap();

        transport.move_user(10, 4).unwrap();
        assert_eq!(transport.current_channel_id(), 4);
        assert!(transport.channel_members(7).unwrap().is_empty());
        assert_eq!(transport.channel_members(4).unwrap()[0].username, "bot");
    }
}
