//! Video platform access: the query interface, its YouTube Data API
//! implementation, and the similar-track / keyword features built on it.

pub mod client;
pub mod keywords;
pub mod similar;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("API quota exceeded")]
    QuotaExceeded,
    #[error("no API key configured")]
    NoCredential,
    #[error("network access disabled")]
    Offline,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail_url: Option<String>,
}

impl VideoSummary {
    pub fn url(&self) -> String {
        format!("https://youtube.com/watch?v={}", self.video_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPage {
    pub total_results: u64,
    pub items: Vec<VideoSummary>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoStats {
    pub video_id: String,
    pub views: u64,
    pub likes: u64,
}

/// Query surface of the video platform. Every call may spend quota.
pub trait VideoPlatform {
    /// Keyword search restricted to music videos.
    fn search(&self, query: &str, max_results: usize) -> Result<SearchPage, PlatformError>;

    /// Search inside one channel.
    fn search_channel(
        &self,
        channel_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<SearchPage, PlatformError>;

    /// Statistics for a batch of video ids. Unknown ids are omitted.
    fn video_statistics(&self, ids: &[String]) -> Result<Vec<VideoStats>, PlatformError>;
}

/// Stand-in used with `--offline`: every call fails without touching the network.
pub struct OfflinePlatform;

impl VideoPlatform for OfflinePlatform {
    fn search(&self, _query: &str, _max_results: usize) -> Result<SearchPage, PlatformError> {
        Err(PlatformError::Offline)
    }

    fn search_channel(
        &self,
        _channel_id: &str,
        _query: &str,
        _max_results: usize,
    ) -> Result<SearchPage, PlatformError> {
        Err(PlatformError::Offline)
    }

    fn video_statistics(&self, _ids: &[String]) -> Result<Vec<VideoStats>, PlatformError> {
        Err(PlatformError::Offline)
    }
}
