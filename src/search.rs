use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::tools;

/// One entry of a `yt-dlp --flat-playlist` search result.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoCandidate {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "duration")]
    pub duration_secs: Option<f64>,
    pub view_count: Option<u64>,
}

impl VideoCandidate {
    pub fn watch_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id))
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    entries: Vec<Option<VideoCandidate>>,
}

pub(crate) fn parse_search_results(json: &str) -> Result<Vec<VideoCandidate>> {
    let page: SearchPage = serde_json::from_str(json)?;
    Ok(page.entries.into_iter().flatten().collect())
}

/// Keeps candidates whose length in minutes is strictly below `max_minutes`.
/// Entries without a known duration (live streams, premieres) are dropped.
pub(crate) fn filter_short(
    candidates: Vec<VideoCandidate>,
    max_minutes: f64,
) -> Vec<VideoCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.duration_secs.is_some_and(|d| d / 60.0 < max_minutes))
        .collect()
}

async fn fetch(subject: &str, count: usize, settings: &Settings) -> Result<Vec<VideoCandidate>> {
    let query = format!("ytsearch{}:{}", count, subject);
    let stdout = tools::run(
        &settings.tools.yt_dlp,
        ["--flat-playlist", "--dump-single-json", "--", query.as_str()],
    )
    .await?;
    let candidates = parse_search_results(&stdout)?;
    debug!("search {:?} returned {} entries", query, candidates.len());
    Ok(filter_short(candidates, settings.max_video_minutes))
}

/// Searches for `subject`, widening the search once when the first page has no
/// short enough video. An empty result means nothing qualified.
pub(crate) async fn search_videos(
    subject: &str,
    settings: &Settings,
) -> Result<Vec<VideoCandidate>> {
    info!("Fetching videos...");
    let mut videos = fetch(subject, settings.search_results, settings).await?;

    if videos.is_empty() {
        info!(
            "No videos shorter than {} minutes found. Fetching more videos...",
            settings.max_video_minutes
        );
        videos = fetch(subject, settings.search_results * 2, settings).await?;
    }

    if !videos.is_empty() {
        info!("Videos fetched successfully! {} candidates", videos.len());
    }
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "_type": "playlist",
        "id": "rust tutorial",
        "entries": [
            {"id": "aaa", "title": "Long talk", "url": "https://www.youtube.com/watch?v=aaa", "duration": 3600.0, "view_count": 10},
            {"id": "bbb", "title": "Short clip", "url": null, "duration": 125, "view_count": null},
            {"id": "ccc", "title": null, "duration": null},
            {"id": "ddd", "title": "Exactly ten", "duration": 600.0},
            null
        ]
    }"#;

    #[test]
    fn test_parse_search_results() {
        let candidates = parse_search_results(SAMPLE).unwrap();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0].title(), "Long talk");
        assert_eq!(candidates[1].duration_secs, Some(125.0));
        assert_eq!(candidates[2].title(), "ccc");
    }

    #[test]
    fn test_filter_short_keeps_order_and_strict_bound() {
        let candidates = parse_search_results(SAMPLE).unwrap();
        let short = filter_short(candidates, 10.0);
        let ids: Vec<_> = short.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["bbb"]);
    }

    #[test]
    fn test_watch_url_fallback() {
        let candidates = parse_search_results(SAMPLE).unwrap();
        assert_eq!(candidates[0].watch_url(), "https://www.youtube.com/watch?v=aaa");
        assert_eq!(candidates[1].watch_url(), "https://www.youtube.com/watch?v=bbb");
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_search_results(r#"{"id": "x"}"#).unwrap().is_empty());
        assert!(parse_search_results("not json").is_err());
    }
}
