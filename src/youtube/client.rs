//! YouTube Data API v3 client.
//!
//! Blocking, one request at a time, with a fixed pause before each call.
//! Quota is charged to the shared [`KeyPool`] after every successful request.

use anyhow::Result;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{PlatformError, SearchPage, VideoPlatform, VideoStats, VideoSummary};
use crate::config::YoutubeConfig;
use crate::keys::KeyPool;

const SEARCH_COST: u64 = 100;
const VIDEOS_COST: u64 = 1;
/// Default daily allowance of a project key; charged when the API reports the
/// key exhausted so rotation moves on to the next one.
const DAILY_QUOTA: u64 = 10_000;
const MUSIC_CATEGORY: &str = "10";

pub struct YoutubeClient {
    client: Client,
    api_base: String,
    keys: Mutex<KeyPool>,
    request_delay: Duration,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    page_info: Option<PageInfo>,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_results: Option<u64>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    #[serde(rename = "default")]
    fallback: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    id: String,
    statistics: Option<Statistics>,
}

// Counts arrive as decimal strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl YoutubeClient {
    pub fn new(cfg: &YoutubeConfig, keys: KeyPool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let request_delay = Duration::from_millis(cfg.request_delay_ms);

        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            keys: Mutex::new(keys),
            request_delay,
            last_request: Mutex::new(last_request_before(request_delay)),
        })
    }

    fn pool(&self) -> MutexGuard<'_, KeyPool> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rate_limit(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let elapsed = last.elapsed();
        if elapsed < self.request_delay {
            std::thread::sleep(self.request_delay - elapsed);
        }
        *last = Instant::now();
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        cost: u64,
    ) -> Result<T, PlatformError> {
        let key = self.pool().get_active_key().ok_or(PlatformError::NoCredential)?;
        self.rate_limit();

        let url = format!("{}/{}", self.api_base, endpoint);
        log::debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", key.as_str())])
            .send()?;

        let status = response.status();
        if status.is_success() {
            self.pool().increment_usage(&key, cost);
            return Ok(response.json()?);
        }

        let body = response.text().unwrap_or_default();
        let err = classify_error(status.as_u16(), &body);
        if matches!(err, PlatformError::QuotaExceeded) {
            log::warn!("API key ...{} is out of quota", key_suffix(&key));
            self.pool().increment_usage(&key, DAILY_QUOTA);
        }
        Err(err)
    }

    fn run_search(
        &self,
        mut params: Vec<(&str, String)>,
        max_results: usize,
    ) -> Result<SearchPage, PlatformError> {
        params.extend([
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("videoCategoryId", MUSIC_CATEGORY.to_string()),
            ("maxResults", max_results.to_string()),
        ]);
        let response: SearchResponse = self.get_json("search", &params, SEARCH_COST)?;
        Ok(search_page(response))
    }
}

impl VideoPlatform for YoutubeClient {
    fn search(&self, query: &str, max_results: usize) -> Result<SearchPage, PlatformError> {
        self.run_search(vec![("q", query.to_string())], max_results)
    }

    fn search_channel(
        &self,
        channel_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<SearchPage, PlatformError> {
        self.run_search(
            vec![
                ("channelId", channel_id.to_string()),
                ("q", query.to_string()),
                ("order", "viewCount".to_string()),
            ],
            max_results,
        )
    }

    fn video_statistics(&self, ids: &[String]) -> Result<Vec<VideoStats>, PlatformError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = [("part", "statistics".to_string()), ("id", ids.join(","))];
        let response: VideosResponse = self.get_json("videos", &params, VIDEOS_COST)?;
        Ok(video_stats(response))
    }
}

fn search_page(response: SearchResponse) -> SearchPage {
    let items: Vec<VideoSummary> = response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let snippet = item.snippet;
            let thumbnail_url = snippet
                .as_ref()
                .and_then(|s| s.thumbnails.as_ref())
                .and_then(|t| t.medium.as_ref().or(t.fallback.as_ref()))
                .map(|t| t.url.clone());
            let (title, channel) = snippet
                .map(|s| (s.title, s.channel_title))
                .unwrap_or_default();
            Some(VideoSummary {
                video_id,
                title,
                channel,
                thumbnail_url,
            })
        })
        .collect();
    let total_results = response
        .page_info
        .and_then(|p| p.total_results)
        .unwrap_or(items.len() as u64);
    SearchPage {
        total_results,
        items,
    }
}

fn video_stats(response: VideosResponse) -> Vec<VideoStats> {
    response
        .items
        .into_iter()
        .map(|item| {
            let (views, likes) = item
                .statistics
                .map(|s| (parse_count(s.view_count), parse_count(s.like_count)))
                .unwrap_or((0, 0));
            VideoStats {
                video_id: item.id,
                views,
                likes,
            }
        })
        .collect()
}

/// A start time that lets the first request go out immediately. Falls back to
/// now when the delay reaches back before the monotonic clock's origin.
fn last_request_before(delay: Duration) -> Instant {
    Instant::now().checked_sub(delay).unwrap_or_else(Instant::now)
}

fn parse_count(raw: Option<String>) -> u64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn classify_error(status: u16, body: &str) -> PlatformError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => {
            let quota = parsed
                .error
                .errors
                .iter()
                .any(|e| e.reason == "quotaExceeded" || e.reason == "dailyLimitExceeded");
            if status == 403 && quota {
                PlatformError::QuotaExceeded
            } else {
                PlatformError::Api {
                    status,
                    message: parsed.error.message,
                }
            }
        }
        Err(_) => PlatformError::Api {
            status,
            message: body.chars().take(200).collect(),
        },
    }
}

fn key_suffix(key: &str) -> &str {
    let start = key.char_indices().rev().nth(3).map(|(i, _)| i).unwrap_or(0);
    &key[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn parses_search_response() {
        let body = r#"{
            "pageInfo": {"totalResults": 4213, "resultsPerPage": 5},
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"},
                 "snippet": {"title": "Future House Mix", "channelTitle": "Spinnin'",
                             "thumbnails": {"default": {"url": "d.jpg"},
                                            "medium": {"url": "m.jpg"}}}},
                {"id": {"kind": "youtube#channel", "channelId": "UC1"},
                 "snippet": {"title": "not a video", "channelTitle": "x"}},
                {"id": {"videoId": "def456"},
                 "snippet": {"title": "No Medium", "channelTitle": "y",
                             "thumbnails": {"default": {"url": "d2.jpg"}}}}
            ]
        }"#;
        let page = search_page(serde_json::from_str(body).unwrap());
        assert_eq!(page.total_results, 4213);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].video_id, "abc123");
        assert_eq!(page.items[0].channel, "Spinnin'");
        assert_eq!(page.items[0].thumbnail_url.as_deref(), Some("m.jpg"));
        assert_eq!(page.items[1].thumbnail_url.as_deref(), Some("d2.jpg"));
        assert_eq!(page.items[0].url(), "https://youtube.com/watch?v=abc123");
    }

    #[test]
    fn missing_page_info_counts_items() {
        let body = r#"{"items": [{"id": {"videoId": "a"}}]}"#;
        let page = search_page(serde_json::from_str(body).unwrap());
        assert_eq!(page.total_results, 1);
        assert_eq!(page.items[0].title, "");
    }

    #[test]
    fn parses_string_statistics() {
        let body = r#"{"items": [
            {"id": "a", "statistics": {"viewCount": "15230", "likeCount": "410"}},
            {"id": "b", "statistics": {"viewCount": "99"}},
            {"id": "c"}
        ]}"#;
        let stats = video_stats(serde_json::from_str(body).unwrap());
        assert_eq!(stats[0], VideoStats { video_id: "a".into(), views: 15230, likes: 410 });
        assert_eq!(stats[1].likes, 0);
        assert_eq!(stats[2].views, 0);
    }

    #[test]
    fn quota_errors_are_recognised() {
        let body = r#"{"error": {"code": 403, "message": "Quota exceeded.",
                       "errors": [{"reason": "quotaExceeded", "domain": "youtube.quota"}]}}"#;
        assert!(matches!(classify_error(403, body), PlatformError::QuotaExceeded));

        let daily = r#"{"error": {"errors": [{"reason": "dailyLimitExceeded"}]}}"#;
        assert!(matches!(classify_error(403, daily), PlatformError::QuotaExceeded));
    }

    #[test]
    fn other_errors_keep_status_and_message() {
        let forbidden =
            r#"{"error": {"message": "API key not valid", "errors": [{"reason": "keyInvalid"}]}}"#;
        match classify_error(400, forbidden) {
            PlatformError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_error(502, "<html>bad gateway</html>"),
            PlatformError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn no_key_fails_before_any_request() {
        let cfg = YoutubeConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..YoutubeConfig::default()
        };
        let client = YoutubeClient::new(&cfg, KeyPool::new(Vec::new(), Utc::now())).unwrap();
        assert!(matches!(client.search("house", 5), Err(PlatformError::NoCredential)));
        assert!(client.video_statistics(&[]).unwrap().is_empty());
    }

    #[test]
    fn huge_request_delay_does_not_panic() {
        let cfg = YoutubeConfig {
            request_delay_ms: u64::MAX / 2,
            ..YoutubeConfig::default()
        };
        assert!(YoutubeClient::new(&cfg, KeyPool::new(Vec::new(), Utc::now())).is_ok());
        assert!(last_request_before(Duration::from_secs(u64::MAX / 4)) <= Instant::now());
    }

    #[test]
    fn key_suffix_is_last_four_chars() {
        assert_eq!(key_suffix("AIzaSyABCDEFG"), "DEFG");
        assert_eq!(key_suffix("ab"), "ab");
    }
}
