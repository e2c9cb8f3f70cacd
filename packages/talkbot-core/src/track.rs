//! Playable tracks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol_constants::EXTERNAL_ID_KEYS;

/// How a track can be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Streamable, finite.
    #[default]
    Default,
    /// Not resolved yet. Must go through the catalog's `resolve` before playing.
    Dynamic,
    /// Streamable live source.
    Live,
}

/// One entry of the playback queue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Name of the service the track came from.
    pub service: String,
    pub url: Option<String>,
    pub name: Option<String>,
    /// Container/codec hint (`m4a`, `webm`, ...).
    pub format: Option<String>,
    pub kind: TrackKind,
    /// Service-specific data needed to resolve or continue from this track.
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl Track {
    /// Creates an unresolved track.
    pub fn dynamic(
        service: impl Into<String>,
        url: impl Into<String>,
        name: Option<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            service: service.into(),
            url: Some(url.into()),
            name,
            format: None,
            kind: TrackKind::Dynamic,
            context,
        }
    }

    /// Stable id assigned by the external catalog, if known.
    pub fn external_id(&self) -> Option<&str> {
        EXTERNAL_ID_KEYS
            .iter()
            .find_map(|key| self.context.get(*key).and_then(Value::as_str))
    }

    pub fn is_streamable(&self) -> bool {
        self.kind != TrackKind::Dynamic
    }

    /// Display name, falling back to the URL.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or("<unnamed>")
    }
}
