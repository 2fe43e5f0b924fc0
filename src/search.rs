#![forbid(unsafe_code)]

//! Topic search against the YouTube Data API v3.
//!
//! Only used when the caller asks for videos by topic instead of by ID;
//! everything else in the pipeline is keyless.

use anyhow::{Context, Result};
use serde::Deserialize;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";
const MAX_RESULTS_CEILING: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// Searches for videos matching `topic`, most relevant first, and returns
/// their IDs. Requires an API key; `max_results` is clamped to the API's
/// 1..=50 window.
pub fn search_videos(topic: &str, max_results: usize, api_key: Option<&str>) -> Result<Vec<String>> {
    let api_key = api_key.context(
        "YOUTUBE_API_KEY is not set; topic search needs a YouTube Data API v3 key",
    )?;
    let max_results = clamp_results(max_results);
    eprintln!("Searching YouTube for: '{topic}' (max {max_results} results)");

    let response = ureq::get(SEARCH_ENDPOINT)
        .query("part", "id")
        .query("q", topic)
        .query("maxResults", &max_results.to_string())
        .query("type", "video")
        .query("order", "relevance")
        .query("key", api_key)
        .call()
        .context("querying the YouTube search API")?;
    let payload: SearchResponse = response
        .into_json()
        .context("parsing the search response")?;
    Ok(video_ids(payload))
}

fn clamp_results(requested: usize) -> usize {
    requested.clamp(1, MAX_RESULTS_CEILING)
}

/// Non-video results (channels, playlists) carry no `videoId` and are
/// skipped.
fn video_ids(payload: SearchResponse) -> Vec<String> {
    payload
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .collect()
}
