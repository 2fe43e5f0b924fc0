#![forbid(unsafe_code)]

//! Two-tier video metadata resolution.
//!
//! Tier one shells out to `yt-dlp`, which yields the full field set (view
//! count, duration). When that fails for any reason the resolver falls back
//! to scraping the watch page's meta tags, which yields title, description
//! and author only. Callers must treat missing fields as normal: the
//! outcome type describes failure instead of raising it.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";
const DESCRIPTION_LIMIT: usize = 500;

/// Upstream warnings that are noise in every known deployment; everything
/// else from the extractor's stderr is relayed.
const BENIGN_EXTRACTOR_WARNINGS: [&str; 3] = [
    "Remote component",
    "n challenge solving failed",
    "Ignoring unsupported",
];

#[cfg(test)]
static YT_DLP_STUB: Mutex<Option<PathBuf>> = Mutex::new(None);
#[cfg(test)]
static STUB_USE_LOCK: Mutex<()> = Mutex::new(());

fn yt_dlp_command() -> Command {
    #[cfg(test)]
    {
        if let Some(path) = YT_DLP_STUB.lock().unwrap().clone() {
            return Command::new(path);
        }
    }
    Command::new("yt-dlp")
}

#[cfg(test)]
pub(crate) fn set_ytdlp_stub_path(path: PathBuf) -> YtDlpStubGuard {
    let guard = STUB_USE_LOCK.lock().unwrap();
    {
        let mut lock = YT_DLP_STUB.lock().unwrap();
        *lock = Some(path);
    }
    YtDlpStubGuard { lock: Some(guard) }
}

#[cfg(test)]
pub(crate) struct YtDlpStubGuard {
    lock: Option<MutexGuard<'static, ()>>,
}

#[cfg(test)]
impl Drop for YtDlpStubGuard {
    fn drop(&mut self) {
        *YT_DLP_STUB.lock().unwrap() = None;
        self.lock.take();
    }
}

/// Descriptive fields for one video. Every field is optional because both
/// tiers may only partially know the video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub view_count: Option<String>,
    pub duration: Option<String>,
}

/// How the metadata was obtained, or why it could not be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// Tier one: structured extractor, full field set.
    Extracted(VideoMetadata),
    /// Tier two: HTML scrape; never carries view count or duration.
    Scraped(VideoMetadata),
    /// Both tiers failed; the message is the fallback's error.
    Failed(String),
}

/// Serialized form of the metadata section in an ingestion result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetadataOutcome {
    pub fn into_fields(self) -> MetadataFields {
        match self {
            MetadataOutcome::Extracted(meta) | MetadataOutcome::Scraped(meta) => MetadataFields {
                title: meta.title,
                description: meta.description,
                author: meta.author,
                view_count: meta.view_count,
                duration: meta.duration,
                error: None,
            },
            MetadataOutcome::Failed(message) => MetadataFields {
                error: Some(message),
                ..MetadataFields::default()
            },
        }
    }
}

/// Resolves metadata for a canonical video ID. Never raises: a total
/// failure comes back as [`MetadataOutcome::Failed`].
pub fn resolve(video_id: &str) -> MetadataOutcome {
    match extract_structured(video_id) {
        Ok(meta) => MetadataOutcome::Extracted(meta),
        Err(err) => {
            eprintln!("  Warning: structured extraction failed for {video_id}: {err}");
            match scrape_watch_page(video_id) {
                Ok(meta) => MetadataOutcome::Scraped(meta),
                Err(err) => MetadataOutcome::Failed(err.to_string()),
            }
        }
    }
}

/// Subset of the extractor's `--dump-single-json` payload we care about.
/// Everything is optional because older videos may lack metadata.
#[derive(Deserialize)]
struct ExtractorInfo {
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<i64>,
    duration: Option<i64>,
}

fn extract_structured(video_id: &str) -> Result<VideoMetadata> {
    let mut command = yt_dlp_command();
    command
        .arg("--dump-single-json")
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--no-progress");

    // A local node runtime lets the extractor solve player challenges; it
    // must keep working without one.
    if let Some(node) = find_in_path("node") {
        command
            .arg("--js-runtimes")
            .arg(format!("node:{}", node.display()));
    }

    command.arg(ids::watch_url(video_id));

    let output = command
        .output()
        .with_context(|| format!("running metadata extractor for {video_id}"))?;

    relay_extractor_warnings(&output.stderr);

    if !output.status.success() {
        bail!(
            "metadata extractor failed for {video_id} (status {})",
            output.status
        );
    }

    let info: ExtractorInfo =
        serde_json::from_slice(&output.stdout).context("deserializing extractor JSON")?;

    Ok(VideoMetadata {
        title: info.title,
        description: info
            .description
            .filter(|text| !text.is_empty())
            .map(truncate_description),
        author: info.uploader.or(info.channel),
        view_count: info
            .view_count
            .filter(|count| *count != 0)
            .map(|count| count.to_string()),
        duration: info
            .duration
            .filter(|seconds| *seconds != 0)
            .map(|seconds| format!("PT{seconds}S")),
    })
}

fn truncate_description(text: String) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        text
    } else {
        text.chars().take(DESCRIPTION_LIMIT).collect()
    }
}

fn relay_extractor_warnings(stderr: &[u8]) {
    for line in String::from_utf8_lossy(stderr).lines() {
        let line = line.trim();
        if line.is_empty()
            || BENIGN_EXTRACTOR_WARNINGS
                .iter()
                .any(|benign| line.contains(benign))
        {
            continue;
        }
        eprintln!("  {line}");
    }
}

/// Looks up an executable on `PATH`, the way a shell would.
fn find_in_path(name: &str) -> Option<PathBuf> {
    find_in_path_entries(name, env::var_os("PATH")?)
}

fn find_in_path_entries(name: &str, path_var: impl AsRef<OsStr>) -> Option<PathBuf> {
    env::split_paths(path_var.as_ref())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn scrape_watch_page(video_id: &str) -> Result<VideoMetadata> {
    let url = ids::watch_url(video_id);
    let response = ureq::get(&url)
        .set("User-Agent", BROWSER_USER_AGENT)
        .call()
        .with_context(|| format!("fetching watch page for {video_id}"))?;
    let html = response.into_string().context("reading watch page body")?;
    Ok(extract_scraped_fields(&html))
}

fn meta_tag_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"<meta property="og:title" content="(.*?)">"#),
            Regex::new(r#"<meta property="og:description" content="(.*?)">"#),
            Regex::new(r#"<link itemprop="name" content="(.*?)">"#),
        ]
        .map(|pattern| pattern.expect("static pattern compiles"))
    })
}

/// Pulls title, description and author out of the watch page. A missing tag
/// yields `None` for that field, not a failure.
fn extract_scraped_fields(html: &str) -> VideoMetadata {
    let [title, description, author] = meta_tag_patterns();
    let capture = |pattern: &Regex| {
        pattern
            .captures(html)
            .map(|captures| captures[1].to_owned())
    };
    VideoMetadata {
        title: capture(title),
        description: capture(description),
        author: capture(author),
        view_count: None,
        duration: None,
    }
}
