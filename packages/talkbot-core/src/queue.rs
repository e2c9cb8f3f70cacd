//! Shared playback queue.
//!
//! # Concurrency design
//!
//! Tracks and cursor live behind one `RwLock`. Appends take the write lock
//! once per batch, so a reader that observes length `N` always sees `N`
//! complete tracks and never half of a batch. Cloning a [`TrackQueue`] shares
//! the same underlying queue.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::track::Track;

#[derive(Debug, Default)]
struct QueueInner {
    tracks: Vec<Track>,
    /// Index of the current track.
    cursor: usize,
}

/// Ordered tracks plus a play cursor.
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    inner: Arc<RwLock<QueueInner>>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(QueueInner { tracks, cursor: 0 })),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().tracks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.inner.read().cursor
    }

    pub fn get(&self, index: usize) -> Option<Track> {
        self.inner.read().tracks.get(index).cloned()
    }

    /// The track under the cursor.
    pub fn current(&self) -> Option<Track> {
        let inner = self.inner.read();
        inner.tracks.get(inner.cursor).cloned()
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.inner.read().tracks.clone()
    }

    /// Runs `f` against a consistent view of tracks and cursor.
    pub fn inspect<R>(&self, f: impl FnOnce(&[Track], usize) -> R) -> R {
        let inner = self.inner.read();
        f(&inner.tracks, inner.cursor)
    }

    pub fn push(&self, track: Track) {
        self.inner.write().tracks.push(track);
    }

    /// Appends a batch atomically. Returns the new length.
    pub fn extend(&self, tracks: Vec<Track>) -> usize {
        let mut inner = self.inner.write();
        inner.tracks.extend(tracks);
        inner.tracks.len()
    }

    /// Moves the cursor to the next track and returns it.
    ///
    /// Returns `None` (cursor unchanged) at the end of the queue.
    pub fn advance(&self) -> Option<Track> {
        let mut inner = self.inner.write();
        let next = inner.cursor + 1;
        let track = inner.tracks.get(next).cloned()?;
        inner.cursor = next;
        Some(track)
    }

    /// Moves the cursor to `index`. Returns false if out of range.
    pub fn set_cursor(&self, index: usize) -> bool {
        let mut inner = self.inner.write();
        if index >= inner.tracks.len() {
            return false;
        }
        inner.cursor = index;
        true
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tracks.clear();
        inner.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Track {
        Track {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn advance_walks_forward_and_stops_at_end() {
        let queue = TrackQueue::from_tracks(vec![track("a"), track("b")]);
        assert_eq!(queue.current().unwrap().name.as_deref(), Some("a"));
        assert_eq!(queue.advance().unwrap().name.as_deref(), Some("b"));
        assert!(queue.advance().is_none());
        assert_eq!(queue.cursor(), 1);
    }

    #[test]
    fn extend_appends_in_order() {
        let queue = TrackQueue::from_tracks(vec![track("a")]);
        assert_eq!(queue.extend(vec![track("b"), track("c")]), 3);
        let names: Vec<_> = queue
            .snapshot()
            .into_iter()
            .map(|t| t.name.unwrap())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn clones_share_state() {
        let queue = TrackQueue::new();
        let other = queue.clone();
        other.push(track("x"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn set_cursor_rejects_out_of_range() {
        let queue = TrackQueue::from_tracks(vec![track("a")]);
        assert!(!queue.set_cursor(3));
        assert!(queue.set_cursor(0));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn concurrent_batches_are_never_split() {
        let queue = TrackQueue::new();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        queue.extend(vec![track("x"), track("y"), track("z")]);
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            assert_eq!(queue.len() % 3, 0);
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(queue.len(), 600);
    }
}
