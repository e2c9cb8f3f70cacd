//! Background queue prefetch ("autoplay").
//!
//! When the playback layer starts the last track of the queue, the
//! [`RecommendationFetcher`] asks the recommendation service what follows it
//! and appends the results. Fetches run detached; a failure leaves the queue
//! exactly as it was.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::catalog::RecommendationSource;
use crate::queue::TrackQueue;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::track::Track;

/// Returns true if starting `track` (played from `url`) should trigger a fetch.
///
/// Fires when the track is the queue's last entry, matched by external id,
/// then by URL, then by cursor position. An empty queue always fires.
pub fn should_fetch(queue: &TrackQueue, track: &Track, url: &str) -> bool {
    queue.inspect(|tracks, cursor| {
        let Some(last) = tracks.last() else {
            log::info!("[Prefetch] Trigger: queue is empty");
            return true;
        };
        if let (Some(id), Some(last_id)) = (track.external_id(), last.external_id()) {
            if id == last_id {
                log::info!("[Prefetch] Trigger: current track is last (id {})", id);
                return true;
            }
        }
        if last.url.as_deref() == Some(url) {
            log::info!("[Prefetch] Trigger: current track is last (url match)");
            return true;
        }
        if cursor + 1 >= tracks.len() {
            log::info!("[Prefetch] Trigger: cursor {} is at end of queue", cursor);
            return true;
        }
        log::debug!(
            "[Prefetch] Not the last track (cursor {}, len {})",
            cursor,
            tracks.len()
        );
        false
    })
}

/// Fetches continuation tracks and appends them to the queue.
pub struct RecommendationFetcher<S: TaskSpawner = TokioSpawner> {
    source: Arc<dyn RecommendationSource>,
    queue: TrackQueue,
    spawner: S,
    service: String,
    limit: usize,
    in_flight: Option<Arc<Semaphore>>,
}

impl<S: TaskSpawner> RecommendationFetcher<S> {
    /// `max_in_flight == 0` leaves concurrent fetches uncapped.
    pub fn new(
        source: Arc<dyn RecommendationSource>,
        queue: TrackQueue,
        spawner: S,
        service: impl Into<String>,
        limit: usize,
        max_in_flight: usize,
    ) -> Self {
        Self {
            source,
            queue,
            spawner,
            service: service.into(),
            limit,
            in_flight: (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight))),
        }
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    /// Called by playback right before `track` starts playing from `url`.
    ///
    /// Submits at most one fetch. Tracks without an external id never
    /// trigger. Returns whether a fetch was submitted.
    pub fn on_track_starting(&self, track: &Track, url: &str) -> bool {
        let Some(id) = track.external_id() else {
            return false;
        };
        if !should_fetch(&self.queue, track, url) {
            return false;
        }
        self.fetch_continuation(id, url)
    }

    /// Starts a detached fetch for `track_id`. Never blocks.
    ///
    /// Returns false if the in-flight cap is reached and the fetch was skipped.
    pub fn fetch_continuation(&self, track_id: &str, origin_url: &str) -> bool {
        let permit = match &self.in_flight {
            Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    log::debug!(
                        "[Prefetch] Skipping fetch for {}: too many in flight",
                        track_id
                    );
                    return false;
                }
            },
            None => None,
        };

        let source = Arc::clone(&self.source);
        let queue = self.queue.clone();
        let service = self.service.clone();
        let limit = self.limit;
        let track_id = track_id.to_string();
        let origin_url = origin_url.to_string();

        self.spawner.spawn(async move {
            let _permit = permit;
            fetch_into_queue(source.as_ref(), &queue, &service, &track_id, &origin_url, limit)
                .await;
        });
        true
    }
}

/// Performs one fetch and appends the results. Returns the number appended.
///
/// Entries whose id equals `track_id` are dropped. Errors are logged and
/// leave the queue untouched.
pub async fn fetch_into_queue(
    source: &dyn RecommendationSource,
    queue: &TrackQueue,
    service: &str,
    track_id: &str,
    origin_url: &str,
    limit: usize,
) -> usize {
    log::info!("[Prefetch] Fetching continuation for {}", track_id);
    let started = std::time::Instant::now();

    let entries = match source.continuation(track_id, limit).await {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!(
                "[Prefetch] Fetch for {} ({}) failed: {}",
                track_id,
                origin_url,
                e
            );
            return 0;
        }
    };

    let tracks: Vec<Track> = entries
        .into_iter()
        .filter(|entry| entry.id != track_id)
        .map(|entry| entry.into_track(service))
        .collect();

    if tracks.is_empty() {
        log::info!("[Prefetch] No new tracks for {}", track_id);
        return 0;
    }

    let added = tracks.len();
    let len = queue.extend(tracks);
    log::info!(
        "[Prefetch] Appended {} track(s) in {:.0?}; queue length {}",
        added,
        started.elapsed(),
        len
    );
    added
}
