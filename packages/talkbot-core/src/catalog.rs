//! External track catalog: search, resolution and recommendations.
//!
//! The catalog services themselves are out of scope; the core only talks to
//! them through [`TrackCatalog`] and [`RecommendationSource`].
//! [`HttpRecommendationSource`] is the one concrete source shipped here.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol_constants::WATCH_URL_PREFIX;
use crate::track::Track;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a track-resolution service.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("nothing found for {0}")]
    NothingFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("service error: {0}")]
    Service(String),
}

/// Errors raised while fetching recommendations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recommendation service returned status {0}")]
    HttpStatus(u16),

    #[error("invalid recommendation response: {0}")]
    Parse(String),
}

/// Convenient Result alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Convenient Result alias for recommendation fetches.
pub type FetchResult<T> = Result<T, FetchError>;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog entries
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of a recommendation (watch playlist) response.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    /// The entry as returned by the service.
    pub raw: Map<String, Value>,
}

impl CatalogEntry {
    /// Parses a `{videoId, title, artists: [{name}]}` object.
    ///
    /// Returns `None` for entries without an id.
    pub fn from_json(value: &Value) -> Option<Self> {
        let raw = value.as_object()?.clone();
        let id = raw.get("videoId").and_then(Value::as_str)?.to_string();
        let title = raw
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let artists = raw
            .get("artists")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            id,
            title,
            artists,
            raw,
        })
    }

    /// `"{title} - {artist, artist}"`, or just the title without artists.
    pub fn display_name(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artists.join(", "))
        }
    }

    pub fn watch_url(&self) -> String {
        format!("{WATCH_URL_PREFIX}{}", self.id)
    }

    /// Converts the entry into an unresolved queue track.
    pub fn into_track(self, service: &str) -> Track {
        let name = self.display_name();
        let url = self.watch_url();
        Track::dynamic(service, url, Some(name), self.raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator traits
// ─────────────────────────────────────────────────────────────────────────────

/// Source of continuation tracks for a given track.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Returns up to `limit` entries that follow `track_id`.
    async fn continuation(&self, track_id: &str, limit: usize) -> FetchResult<Vec<CatalogEntry>>;
}

/// Track search and resolution service.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn search(&self, query: &str) -> ResolveResult<Vec<Track>>;

    /// Turns a track (possibly `Dynamic`) into playable tracks.
    ///
    /// With `want_stream` the result must be streamable.
    async fn resolve(&self, track: &Track, want_stream: bool) -> ResolveResult<Vec<Track>>;

    async fn download(&self, track: &Track, destination: &Path) -> ResolveResult<()>;
}

/// Resolves `track` to its first streamable form.
///
/// Already streamable tracks are returned unchanged.
pub async fn resolve_streamable(catalog: &dyn TrackCatalog, track: &Track) -> ResolveResult<Track> {
    if track.is_streamable() {
        return Ok(track.clone());
    }
    catalog
        .resolve(track, true)
        .await?
        .into_iter()
        .find(Track::is_streamable)
        .ok_or_else(|| ResolveError::NothingFound(track.display_name().to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP source
// ─────────────────────────────────────────────────────────────────────────────

/// Recommendation source backed by a JSON endpoint.
///
/// Queries `GET {endpoint}?videoId={id}&limit={n}` and expects
/// `{"tracks": [{"videoId", "title", "artists": [{"name"}]}]}`.
#[derive(Clone)]
pub struct HttpRecommendationSource {
    client: Client,
    endpoint: Url,
}

impl HttpRecommendationSource {
    pub fn new(client: Client, endpoint: &str) -> FetchResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::Parse(format!("endpoint {endpoint}: {e}")))?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, track_id: &str, limit: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("videoId", track_id)
            .append_pair("limit", &limit.to_string());
        url
    }
}

/// Turns a watch-playlist response into at most `limit` entries.
fn read_watch_playlist(
    status: StatusCode,
    body: &str,
    limit: usize,
) -> FetchResult<Vec<CatalogEntry>> {
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }
    let mut entries = parse_watch_playlist(body)?;
    entries.truncate(limit);
    Ok(entries)
}

/// Extracts entries from a watch-playlist response body.
fn parse_watch_playlist(body: &str) -> FetchResult<Vec<CatalogEntry>> {
    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let tracks = value
        .get("tracks")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Parse("missing 'tracks' array".to_string()))?;
    Ok(tracks.iter().filter_map(CatalogEntry::from_json).collect())
}

#[async_trait]
impl RecommendationSource for HttpRecommendationSource {
    async fn continuation(&self, track_id: &str, limit: usize) -> FetchResult<Vec<CatalogEntry>> {
        let url = self.request_url(track_id, limit);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        read_watch_playlist(status, &body, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;
    use serde_json::json;

    #[test]
    fn entry_becomes_dynamic_track() {
        let entry = CatalogEntry::from_json(&json!({
            "videoId": "abc",
            "title": "Song",
            "artists": [{"name": "A"}, {"name": "B"}],
        }))
        .unwrap();

        let track = entry.into_track("ytm");
        assert_eq!(track.kind, TrackKind::Dynamic);
        assert_eq!(track.name.as_deref(), Some("Song - A, B"));
        assert_eq!(
            track.url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(track.external_id(), Some("abc"));
        assert_eq!(track.service, "ytm");
    }

    #[test]
    fn entry_without_artists_uses_title() {
        let entry = CatalogEntry::from_json(&json!({"videoId": "x", "title": "Solo"})).unwrap();
        assert_eq!(entry.display_name(), "Solo");
    }

    #[test]
    fn parse_skips_entries_without_id() {
        let entries = parse_watch_playlist(
            r#"{"tracks": [{"title": "no id"}, {"videoId": "b", "title": "B"}]}"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b");
    }

    #[test]
    fn parse_rejects_unexpected_shape() {
        assert!(matches!(
            parse_watch_playlist(r#"{"items": []}"#),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(
            parse_watch_playlist("not json"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn request_url_carries_id_and_limit() {
        let client = Client::new();
        let source = HttpRecommendationSource::new(client, "http://127.0.0.1:9/watch").unwrap();
        let url = source.request_url("abc", 50);
        assert_eq!(url.as_str(), "http://127.0.0.1:9/watch?videoId=abc&limit=50");
    }

    #[test]
    fn response_is_truncated_to_limit() {
        let body = r#"{"tracks": [
            {"videoId": "a", "title": "A"},
            {"videoId": "b", "title": "B"},
            {"videoId": "c", "title": "C"}
        ]}"#;
        let entries = read_watch_playlist(StatusCode::OK, body, 2).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn non_success_status_is_an_error() {
        assert!(matches!(
            read_watch_playlist(StatusCode::SERVICE_UNAVAILABLE, r#"{"tracks": []}"#, 5),
            Err(FetchError::HttpStatus(503))
        ));
    }

    /// Serves a single canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/watch")
    }

    #[tokio::test]
    async fn http_source_maps_error_status() {
        let endpoint = serve_once("404 Not Found", "").await;
        let source = HttpRecommendationSource::new(Client::new(), &endpoint).unwrap();
        assert!(matches!(
            source.continuation("abc", 10).await,
            Err(FetchError::HttpStatus(404))
        ));
    }

    #[tokio::test]
    async fn http_source_returns_at_most_limit_entries() {
        let endpoint = serve_once(
            "200 OK",
            r#"{"tracks": [{"videoId": "a", "title": "A"}, {"videoId": "b", "title": "B"}]}"#,
        )
        .await;
        let source = HttpRecommendationSource::new(Client::new(), &endpoint).unwrap();
        let entries = source.continuation("abc", 1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "a");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let client = Client::new();
        assert!(HttpRecommendationSource::new(client, "not a url").is_err());
    }

    struct FixedCatalog(Vec<Track>);

    #[async_trait]
    impl TrackCatalog for FixedCatalog {
        async fn search(&self, _query: &str) -> ResolveResult<Vec<Track>> {
            Ok(self.0.clone())
        }

        async fn resolve(&self, _track: &Track, _want_stream: bool) -> ResolveResult<Vec<Track>> {
            Ok(self.0.clone())
        }

        async fn download(&self, _track: &Track, _destination: &Path) -> ResolveResult<()> {
            Err(ResolveError::InvalidArgument("downloads disabled".into()))
        }
    }

    #[tokio::test]
    async fn resolve_streamable_picks_first_playable() {
        let dynamic = Track::dynamic("ytm", "u", None, Map::new());
        let playable = Track {
            name: Some("ok".into()),
            ..Default::default()
        };
        let catalog = FixedCatalog(vec![dynamic.clone(), playable.clone()]);
        assert_eq!(resolve_streamable(&catalog, &dynamic).await.unwrap(), playable);

        let empty = FixedCatalog(Vec::new());
        assert!(matches!(
            resolve_streamable(&empty, &dynamic).await,
            Err(ResolveError::NothingFound(_))
        ));
        // Streamable tracks never hit the catalog.
        assert_eq!(resolve_streamable(&empty, &playable).await.unwrap(), playable);
    }
}
