use serde::{Deserialize, Serialize};
use std::fmt;

use super::{PlatformError, VideoPlatform};
use crate::audio::features::TrackFeatures;
use crate::cache::{self, KeyValueCache};
use crate::config::YoutubeConfig;

const LOW_COMPETITION_RESULTS: u64 = 1_000;
const MEDIUM_COMPETITION_RESULTS: u64 = 10_000;
const VIEWS_SATURATION: f64 = 10_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Competition {
    Low,
    Medium,
    High,
}

impl fmt::Display for Competition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Competition::Low => "Low",
            Competition::Medium => "Medium",
            Competition::High => "High",
        };
        f.pad(label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordStat {
    pub keyword: String,
    pub score: f64,
    pub competition: Competition,
    pub monthly_searches: String,
    pub total_results: u64,
    pub avg_views: f64,
}

pub fn candidate_keywords(features: &TrackFeatures, year: i32) -> Vec<String> {
    let genre = features.genre.label();
    let key = features.key_label();
    vec![
        genre.to_string(),
        format!("{} music", genre),
        format!("{} {}bpm", genre, features.bpm),
        format!("{} {}", genre, key),
        format!("new {} {}", genre, year),
        format!("{} {}", key, genre),
        format!("{} mix {}", genre, year),
        format!("best {}", genre),
        format!("{} playlist", genre),
    ]
}

pub fn competition_level(total_results: u64) -> Competition {
    if total_results < LOW_COMPETITION_RESULTS {
        Competition::Low
    } else if total_results < MEDIUM_COMPETITION_RESULTS {
        Competition::Medium
    } else {
        Competition::High
    }
}

pub fn estimate_monthly_searches(total_results: u64) -> &'static str {
    match competition_level(total_results) {
        Competition::Low => "100-1K",
        Competition::Medium => "1K-10K",
        Competition::High => "10K+",
    }
}

/// 0..=100. Fewer competing results and more views both push the score up.
pub fn keyword_score(total_results: u64, avg_views: f64) -> f64 {
    if total_results == 0 {
        return 0.0;
    }
    let competition_factor = match competition_level(total_results) {
        Competition::Low => 1.0,
        Competition::Medium => 0.7,
        Competition::High => 0.4,
    };
    let view_factor = (avg_views / VIEWS_SATURATION).min(1.0);
    (competition_factor * 0.6 + view_factor * 0.4) * 100.0
}

fn keyword_cache_key(term: &str) -> String {
    format!("keyword_{}", term.to_lowercase())
}

/// Scores every candidate term, highest first. Once the quota runs out the
/// remaining terms are answered from cache only.
pub fn analyze_keywords(
    platform: &dyn VideoPlatform,
    cache: &dyn KeyValueCache,
    features: &TrackFeatures,
    cfg: &YoutubeConfig,
    year: i32,
) -> Vec<KeywordStat> {
    let mut quota_exhausted = false;
    let mut stats = Vec::new();

    for term in candidate_keywords(features, year) {
        let key = keyword_cache_key(&term);
        if let Some(stat) = cache::load::<KeywordStat, _>(cache, &key) {
            stats.push(stat);
            continue;
        }
        if quota_exhausted {
            continue;
        }
        match measure_keyword(platform, &term, cfg.keyword_results) {
            Ok(Some(stat)) => {
                cache::store(cache, &key, &stat);
                stats.push(stat);
            }
            Ok(None) => log::debug!("No videos for '{}'", term),
            Err(PlatformError::QuotaExceeded) => {
                log::warn!("Quota exhausted during keyword analysis; using cached terms only");
                quota_exhausted = true;
            }
            Err(err) => log::warn!("Keyword '{}' skipped: {}", term, err),
        }
    }

    stats.sort_by(|a, b| b.score.total_cmp(&a.score));
    stats
}

fn measure_keyword(
    platform: &dyn VideoPlatform,
    term: &str,
    max_results: usize,
) -> Result<Option<KeywordStat>, PlatformError> {
    let page = platform.search(term, max_results)?;
    if page.items.is_empty() {
        return Ok(None);
    }
    let ids: Vec<String> = page.items.iter().map(|v| v.video_id.clone()).collect();
    let views = platform.video_statistics(&ids)?;
    let avg_views = if views.is_empty() {
        0.0
    } else {
        views.iter().map(|s| s.views as f64).sum::<f64>() / views.len() as f64
    };

    let total = page.total_results;
    Ok(Some(KeywordStat {
        keyword: term.to_string(),
        score: keyword_score(total, avg_views),
        competition: competition_level(total),
        monthly_searches: estimate_monthly_searches(total).to_string(),
        total_results: total,
        avg_views,
    }))
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
        let (key, mode) = (PitchClass::G, Mode::Major);
        TrackFeatures::new("t.wav", 124, key, mode, Energy::Medium, Genre::TechHouse)
    }

    fn stats(id: &str, views: u64) -> VideoStats {
        VideoStats {
            video_id: id.to_string(),
            views,
            likes: 0,
        }
    }

    #[test]
    fn candidate_terms() {
        let terms = candidate_keywords(&features(), 2025);
        assert_eq!(terms.len(), 9);
        assert_eq!(terms[0], "Tech House");
        assert!(terms.contains(&"Tech House 124bpm".to_string()));
        assert!(terms.contains(&"G Major Tech House".to_string()));
        assert!(terms.contains(&"new Tech House 2025".to_string()));
        assert!(terms.contains(&"Tech House mix 2025".to_string()));
    }

    #[test]
    fn score_formula() {
        assert_eq!(keyword_score(0, 50_000.0), 0.0);
        assert!((keyword_score(500, 10_000.0) - 100.0).abs() < 1e-9);
        assert!((keyword_score(5_000, 5_000.0) - 62.0).abs() < 1e-9);
        assert!((keyword_score(1_000_000, 0.0) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn competition_bounds() {
        assert_eq!(competition_level(999), Competition::Low);
        assert_eq!(competition_level(1_000), Competition::Medium);
        assert_eq!(competition_level(9_999), Competition::Medium);
        assert_eq!(competition_level(10_000), Competition::High);
        assert_eq!(estimate_monthly_searches(10), "100-1K");
        assert_eq!(estimate_monthly_searches(5_000), "1K-10K");
        assert_eq!(estimate_monthly_searches(50_000), "10K+");
    }

    #[test]
    fn ranks_terms_by_score() {
        let mut platform = FakePlatform::default();
        platform.pages.insert(
            "Tech House".into(),
            SearchPage { total_results: 2_000_000, items: vec![video("a", "a")] },
        );
        platform.pages.insert(
            "best Tech House".into(),
            SearchPage { total_results: 300, items: vec![video("b", "b"), video("c", "c")] },
        );
        platform.stats.insert("a".into(), stats("a", 1_000_000));
        platform.stats.insert("b".into(), stats("b", 8_000));
        platform.stats.insert("c".into(), stats("c", 4_000));

        let cache = MemoryCache::new(Duration::hours(24));
        let cfg = YoutubeConfig::default();
        let ranked = analyze_keywords(&platform, &cache, &features(), &cfg, 2025);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].keyword, "best Tech House");
        assert_eq!(ranked[0].avg_views, 6_000.0);
        assert_eq!(ranked[0].competition, Competition::Low);
        assert!((ranked[0].score - 84.0).abs() < 1e-9);
        assert_eq!(ranked[1].keyword, "Tech House");
        assert_eq!(ranked[1].monthly_searches, "10K+");
    }

    #[test]
    fn quota_exhaustion_serves_cache_only() {
        let cache = MemoryCache::new(Duration::hours(24));
        let cached = KeywordStat {
            keyword: "Tech House playlist".into(),
            score: 55.0,
            competition: Competition::Medium,
            monthly_searches: "1K-10K".into(),
            total_results: 4_000,
            avg_views: 2_500.0,
        };
        cache::store(&cache, "keyword_tech house playlist", &cached);

        let platform = FakePlatform {
            quota_exhausted: true,
            ..FakePlatform::default()
        };
        let cfg = YoutubeConfig::default();
        let ranked = analyze_keywords(&platform, &cache, &features(), &cfg, 2025);
        assert_eq!(ranked, vec![cached]);
        // first term hits the quota, later ones never reach the platform
        assert_eq!(platform.calls.borrow().len(), 1);
    }
}
