use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{PlatformError, VideoPlatform, VideoSummary};
use crate::audio::features::TrackFeatures;
use crate::cache::{self, KeyValueCache};
use crate::config::YoutubeConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarTrack {
    pub title: String,
    pub channel: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub views: Option<u64>,
    pub likes: Option<u64>,
}

impl SimilarTrack {
    fn from_video(video: &VideoSummary) -> Self {
        Self {
            title: video.title.clone(),
            channel: video.channel.clone(),
            url: video.url(),
            thumbnail_url: video.thumbnail_url.clone(),
            views: None,
            likes: None,
        }
    }
}

pub fn similar_query(features: &TrackFeatures) -> String {
    format!(
        "{} music {}bpm {}",
        features.genre,
        features.bpm,
        features.key_label()
    )
}

pub fn similar_cache_key(features: &TrackFeatures) -> String {
    format!("similar_{}_{}", features.genre.slug(), features.bpm)
}

fn channel_cache_key(features: &TrackFeatures) -> String {
    format!("channel_{}", features.genre.slug())
}

/// Reference tracks for `features`. Never fails: platform errors fall back to
/// whatever is cached, then to search-link placeholders.
pub fn find_similar_tracks(
    platform: &dyn VideoPlatform,
    cache: &dyn KeyValueCache,
    features: &TrackFeatures,
    cfg: &YoutubeConfig,
) -> Vec<SimilarTrack> {
    let key = similar_cache_key(features);
    if let Some(tracks) = cache::load::<Vec<SimilarTrack>, _>(cache, &key) {
        log::debug!("Similar tracks for {} served from cache", features.name);
        return tracks;
    }

    match fetch_similar(platform, cache, features, cfg) {
        Ok(tracks) => {
            cache::store(cache, &key, &tracks);
            tracks
        }
        Err(err) => {
            log::warn!("Similar track search for {} failed: {}", features.name, err);
            let channel_videos: Vec<VideoSummary> =
                cache::load(cache, &channel_cache_key(features)).unwrap_or_default();
            if channel_videos.is_empty() {
                placeholder_tracks(features)
            } else {
                channel_videos
                    .iter()
                    .take(cfg.max_results)
                    .map(SimilarTrack::from_video)
                    .collect()
            }
        }
    }
}

fn fetch_similar(
    platform: &dyn VideoPlatform,
    cache: &dyn KeyValueCache,
    features: &TrackFeatures,
    cfg: &YoutubeConfig,
) -> Result<Vec<SimilarTrack>, PlatformError> {
    let query = similar_query(features);
    log::info!("Searching similar tracks: {}", query);
    let mut videos = platform.search(&query, cfg.max_results)?.items;
    videos.extend(channel_videos(platform, cache, features, cfg));

    let mut seen = HashSet::new();
    videos.retain(|v| seen.insert(v.video_id.clone()));
    videos.truncate(cfg.max_results);

    let mut tracks: Vec<SimilarTrack> = videos.iter().map(SimilarTrack::from_video).collect();
    let ids: Vec<String> = videos.iter().map(|v| v.video_id.clone()).collect();
    match platform.video_statistics(&ids) {
        Ok(stats) => {
            for (track, video) in tracks.iter_mut().zip(&videos) {
                if let Some(s) = stats.iter().find(|s| s.video_id == video.video_id) {
                    track.views = Some(s.views);
                    track.likes = Some(s.likes);
                }
            }
        }
        Err(err) => log::warn!("Statistics lookup failed: {}", err),
    }
    Ok(tracks)
}

/// Allow-listed channel uploads for the genre. Partial failures are skipped.
fn channel_videos(
    platform: &dyn VideoPlatform,
    cache: &dyn KeyValueCache,
    features: &TrackFeatures,
    cfg: &YoutubeConfig,
) -> Vec<VideoSummary> {
    let channels = cfg.channels_for(features.genre);
    if channels.is_empty() {
        return Vec::new();
    }
    let key = channel_cache_key(features);
    if let Some(videos) = cache::load::<Vec<VideoSummary>, _>(cache, &key) {
        return videos;
    }

    let mut videos = Vec::new();
    for channel in channels {
        match platform.search_channel(channel, features.genre.label(), cfg.max_results) {
            Ok(page) => videos.extend(page.items),
            Err(PlatformError::QuotaExceeded) => {
                log::warn!("Quota exhausted while searching channel {}", channel);
                break;
            }
            Err(err) => log::warn!("Channel {} search failed: {}", channel, err),
        }
    }
    if !videos.is_empty() {
        cache::store(cache, &key, &videos);
    }
    videos
}

fn placeholder_tracks(features: &TrackFeatures) -> Vec<SimilarTrack> {
    let query = similar_query(features);
    let url = reqwest::Url::parse_with_params(
        "https://www.youtube.com/results",
        &[("search_query", &query)],
    )
    .map(|u| u.to_string())
    .unwrap_or_else(|_| "https://www.youtube.com".to_string());
    vec![SimilarTrack {
        title: format!("Search YouTube: {}", query),
        channel: "YouTube".to_string(),
        url,
        thumbnail_url: None,
        views: None,
        likes: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{Energy, Genre, Mode, PitchClass};
    use crate::cache::MemoryCache;
    use crate::youtube::fake::{video, FakePlatform};
    use crate::youtube::{SearchPage, VideoStats};
    use chrono::Duration;

    fn features() -> TrackFeatures {
        TrackFeatures::new(
            "drop.wav",
            126,
            PitchClass::A,
            Mode::Minor,
            Energy::High,
            Genre::FutureHouse,
        )
    }

    fn cfg() -> YoutubeConfig {
        YoutubeConfig {
            max_results: 3,
            ..YoutubeConfig::default()
        }
    }

    fn cache() -> MemoryCache {
        MemoryCache::new(Duration::hours(24))
    }

    fn page(ids: &[&str]) -> SearchPage {
        SearchPage {
            total_results: 1000,
            items: ids.iter().map(|id| video(id, &format!("Track {}", id))).collect(),
        }
    }

    #[test]
    fn builds_query_and_key() {
        assert_eq!(similar_query(&features()), "Future House music 126bpm A Minor");
        assert_eq!(similar_cache_key(&features()), "similar_future_house_126");
    }

    #[test]
    fn fills_statistics_and_caches() {
        let mut platform = FakePlatform::default();
        platform.pages.insert(similar_query(&features()), page(&["a", "b"]));
        platform.stats.insert(
            "a".into(),
            VideoStats { video_id: "a".into(), views: 5000, likes: 120 },
        );
        let cache = cache();

        let tracks = find_similar_tracks(&platform, &cache, &features(), &cfg());
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].url, "https://youtube.com/watch?v=a");
        assert_eq!(tracks[0].views, Some(5000));
        assert_eq!(tracks[0].likes, Some(120));
        assert_eq!(tracks[1].views, None);

        let calls = platform.calls.borrow().len();
        let again = find_similar_tracks(&platform, &cache, &features(), &cfg());
        assert_eq!(again, tracks);
        assert_eq!(platform.calls.borrow().len(), calls);
    }

    #[test]
    fn merges_channel_results_without_duplicates() {
        let mut platform = FakePlatform::default();
        platform.pages.insert(similar_query(&features()), page(&["a", "b"]));
        platform.channel_pages.insert("UC_label".into(), page(&["b", "c", "d"]));
        let mut cfg = cfg();
        cfg.channels.insert("future_house".into(), vec!["UC_label".into()]);

        let tracks = find_similar_tracks(&platform, &cache(), &features(), &cfg);
        let urls: Vec<&str> = tracks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://youtube.com/watch?v=a",
                "https://youtube.com/watch?v=b",
                "https://youtube.com/watch?v=c",
            ]
        );
        assert!(platform.calls.borrow().iter().any(|c| c == "channel:UC_label"));
    }

    #[test]
    fn quota_exhaustion_yields_placeholders() {
        let platform = FakePlatform {
            quota_exhausted: true,
            ..FakePlatform::default()
        };
        let tracks = find_similar_tracks(&platform, &cache(), &features(), &cfg());
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].url.starts_with("https://www.youtube.com/results?search_query="));
        assert!(tracks[0].title.contains("Future House"));
    }

    #[test]
    fn cached_channel_uploads_beat_placeholders() {
        let cache = cache();
        cache::store(&cache, "channel_future_house", &vec![video("x", "Cached Upload")]);
        let platform = FakePlatform {
            quota_exhausted: true,
            ..FakePlatform::default()
        };
        let tracks = find_similar_tracks(&platform, &cache, &features(), &cfg());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Cached Upload");
    }

    #[test]
    fn failed_statistics_keep_tracks() {
        struct NoStats(FakePlatform);
        impl VideoPlatform for NoStats {
            fn search(&self, q: &str, n: usize) -> Result<SearchPage, PlatformError> {
                self.0.search(q, n)
            }
            fn search_channel(
                &self,
                c: &str,
                q: &str,
                n: usize,
            ) -> Result<SearchPage, PlatformError> {
                self.0.search_channel(c, q, n)
            }
            fn video_statistics(&self, _ids: &[String]) -> Result<Vec<VideoStats>, PlatformError> {
                Err(PlatformError::QuotaExceeded)
            }
        }
        let mut inner = FakePlatform::default();
        inner.pages.insert(similar_query(&features()), page(&["a"]));

        let tracks = find_similar_tracks(&NoStats(inner), &cache(), &features(), &cfg());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].views, None);
    }
}
