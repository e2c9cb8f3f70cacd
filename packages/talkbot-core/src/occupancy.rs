//! Auto-return when the bot is left alone in a channel.

use std::sync::Arc;

use crate::config::ChannelTarget;
use crate::events::{ChannelId, UserId};
use crate::protocol_constants::ROOT_CHANNEL_ID;
use crate::transport::{Playback, Transport, TransportResult};

/// Decision taken after a user left the bot's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyOutcome {
    /// Other users remain; nothing was done.
    Occupied(usize),
    /// The bot was alone but already sits in its default channel.
    AlreadyHome,
    /// The bot was moved to the given channel.
    Returned(ChannelId),
    /// A transport call failed. The failure was logged.
    Failed,
}

/// Watches channel membership and moves the bot home when it is alone.
///
/// Every transport call here is best-effort: faults are logged and reported
/// as [`OccupancyOutcome::Failed`], never propagated.
pub struct ChannelOccupancyMonitor {
    transport: Arc<dyn Transport>,
    playback: Arc<dyn Playback>,
    default_channel: ChannelTarget,
}

impl ChannelOccupancyMonitor {
    pub fn new(
        transport: Arc<dyn Transport>,
        playback: Arc<dyn Playback>,
        default_channel: ChannelTarget,
    ) -> Self {
        Self {
            transport,
            playback,
            default_channel,
        }
    }

    /// Handles `departed` leaving `channel_id`, the bot's current channel.
    pub fn on_user_left(&self, channel_id: ChannelId, departed: UserId) -> OccupancyOutcome {
        match self.check(channel_id, departed) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("[Occupancy] Auto-return failed: {}", e);
                OccupancyOutcome::Failed
            }
        }
    }

    fn check(&self, channel_id: ChannelId, departed: UserId) -> TransportResult<OccupancyOutcome> {
        let me = self.transport.my_user_id();
        let members = self.transport.channel_members(channel_id)?;

        // The departed user may still be listed if the snapshot lags.
        let others = members
            .iter()
            .filter(|m| m.user_id != me && m.user_id != departed)
            .count();
        log::debug!(
            "[Occupancy] Channel {}: {} member(s) listed, {} other(s)",
            channel_id,
            members.len(),
            others
        );
        if others > 0 {
            return Ok(OccupancyOutcome::Occupied(others));
        }

        log::info!("[Occupancy] Bot is alone in channel {}, returning to default", channel_id);
        if self.playback.is_active() {
            self.playback.stop();
        }

        let home = self.default_channel_id();
        if self.transport.current_channel_id() == home {
            return Ok(OccupancyOutcome::AlreadyHome);
        }
        self.transport.move_user(me, home)?;
        Ok(OccupancyOutcome::Returned(home))
    }

    /// Resolves the configured default channel. Unknown paths fall back to root.
    fn default_channel_id(&self) -> ChannelId {
        match &self.default_channel {
            ChannelTarget::Id(id) => *id,
            ChannelTarget::Path(path) => match self.transport.resolve_channel_path(path) {
                Ok(0) => {
                    log::warn!("[Occupancy] Unknown channel path {}, using root", path);
                    ROOT_CHANNEL_ID
                }
                Ok(id) => id,
                Err(e) => {
                    log::warn!("[Occupancy] Failed to resolve {}: {}, using root", path, e);
                    ROOT_CHANNEL_ID
                }
            },
        }
    }
}
