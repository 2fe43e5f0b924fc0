#![forbid(unsafe_code)]

//! Command-line ingester.
//!
//! Resolves metadata and caption tracks for a single video (given as a URL
//! or bare ID) or for the results of a topic search, prints the outcome as
//! pretty JSON, and optionally upserts everything into the local database.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use tubescribe_tools::config::{ConfigOverrides, resolve_config};
use tubescribe_tools::ingest::{self, IngestResult};
use tubescribe_tools::search;
use tubescribe_tools::store::{IngestStore, StoreError};

const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IngestArgs {
    video_input: Option<String>,
    topic: Option<String>,
    max_results: usize,
    include_text: bool,
    upload: bool,
    db_path_override: Option<PathBuf>,
}

impl IngestArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut video_input: Option<String> = None;
        let mut topic: Option<String> = None;
        let mut max_results: Option<usize> = None;
        let mut include_text = false;
        let mut upload = false;
        let mut db_path_override: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--topic=") {
                topic = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--max-results=") {
                max_results = Some(Self::parse_max_results(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--db-path=") {
                db_path_override = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--topic" | "-t" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--topic requires a value"))?;
                    topic = Some(value);
                }
                "--max-results" | "-m" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--max-results requires a value"))?;
                    max_results = Some(Self::parse_max_results(&value)?);
                }
                "--db-path" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--db-path requires a value"))?;
                    db_path_override = Some(PathBuf::from(value));
                }
                "--transcript" => include_text = true,
                "--upload" => upload = true,
                _ if arg.starts_with('-') => bail!("unknown argument: {arg}"),
                _ => {
                    if video_input.is_some() {
                        bail!("video specified multiple times");
                    }
                    video_input = Some(arg);
                }
            }
        }

        if video_input.is_none() && topic.is_none() {
            bail!(
                "Usage: ingest [--transcript] [--upload] [--db-path <path>] <url_or_id>\n       ingest [--transcript] [--upload] [--db-path <path>] --topic <topic> [--max-results <n>]"
            );
        }

        Ok(Self {
            video_input,
            topic,
            max_results: max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            include_text,
            upload,
            db_path_override,
        })
    }

    fn parse_max_results(value: &str) -> Result<usize> {
        value
            .parse::<usize>()
            .with_context(|| format!("invalid --max-results value: {value}"))
    }
}

async fn upload_result(store: &IngestStore, result: &IngestResult) -> Result<(), StoreError> {
    store.upsert_video(result).await?;
    store
        .upsert_transcripts(&result.video_id, &result.transcripts)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = IngestArgs::parse()?;
    let config = resolve_config(ConfigOverrides {
        db_path: args.db_path_override.clone(),
        env_path: None,
    })?;

    let inputs = if let Some(topic) = &args.topic {
        let ids = search::search_videos(topic, args.max_results, config.youtube_api_key.as_deref())?;
        if ids.is_empty() {
            bail!("no videos found for topic: {topic}");
        }
        ids
    } else {
        vec![args.video_input.clone().unwrap_or_default()]
    };

    let store = if args.upload {
        Some(
            IngestStore::open(&config.db_path)
                .await
                .with_context(|| format!("opening database {}", config.db_path.display()))?,
        )
    } else {
        None
    };

    let mut results = Vec::with_capacity(inputs.len());
    for input in &inputs {
        eprintln!("Fetching data for: {input}");
        let result = ingest::ingest(input, args.include_text, &config.proxy);
        if let Some(store) = &store {
            match upload_result(store, &result).await {
                Ok(()) => eprintln!(
                    "✓ Data for {} uploaded to {}",
                    result.video_id,
                    config.db_path.display()
                ),
                Err(err) => eprintln!("Error during DB upload for {}: {err}", result.video_id),
            }
        }
        results.push(result);
    }

    // Single-video invocations print one object, topic searches an array.
    if results.len() == 1 && args.topic.is_none() {
        println!("{}", serde_json::to_string_pretty(&results[0])?);
    } else {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}
