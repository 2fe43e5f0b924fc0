#![forbid(unsafe_code)]

//! Single-video ingestion orchestration.
//!
//! One call takes any accepted identifier form through normalization,
//! metadata resolution and transcript listing, and always produces a
//! serializable result. Partial failure lives inside the result: metadata
//! may carry an error while transcripts succeeded, and vice versa. Only
//! proxy misconfiguration is promoted to the result's top-level error,
//! since nothing network-bound can proceed without an agent.

use serde::{Deserialize, Serialize};

use crate::config::ProxyConfig;
use crate::ids;
use crate::resolver::{self, MetadataFields};
use crate::transcripts::{self, TranscriptEntry};

/// Machine-readable failure attached to an ingestion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Everything learned about one video in one ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    pub video_id: String,
    pub url: String,
    pub metadata: MetadataFields,
    pub transcripts: Vec<TranscriptEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Ingests one video identified by a URL or bare ID. Never returns an
/// error: every failure mode is captured inside the result.
pub fn ingest(input: &str, include_text: bool, proxy: &ProxyConfig) -> IngestResult {
    let video_id = ids::normalize(input);
    let url = ids::watch_url(&video_id);
    let metadata = resolver::resolve(&video_id).into_fields();
    let (transcripts, error) = match transcripts::list_transcripts(&video_id, include_text, proxy)
    {
        Ok(entries) => (entries, None),
        Err(err) => (
            Vec::new(),
            Some(ErrorDetail {
                kind: "ProxyError".to_owned(),
                message: err.to_string(),
            }),
        ),
    };
    IngestResult {
        video_id,
        url,
        metadata,
        transcripts,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::set_watch_base_stub;
    use crate::resolver::set_ytdlp_stub_path;
    use crate::testutil::{install_failing_ytdlp_stub, install_ytdlp_stub, serve_html_once};
    use tempfile::tempdir;

    #[test]
    fn total_failure_still_returns_a_result() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let stub = install_failing_ytdlp_stub(temp.path())?;
        let _stub_guard = set_ytdlp_stub_path(stub);
        let _base_guard = set_watch_base_stub("http://127.0.0.1:1");

        let result = ingest(
            "https://www.youtube.com/watch?v=abc12345678",
            true,
            &ProxyConfig::Direct,
        );
        assert_eq!(result.video_id, "abc12345678");
        assert!(result.metadata.error.is_some(), "metadata failure recorded");
        assert_eq!(result.transcripts.len(), 1);
        assert_eq!(result.transcripts[0].language_code, "error");
        assert!(result.error.is_none(), "degraded retrieval is not fatal");
        Ok(())
    }

    #[test]
    fn proxy_misconfiguration_is_the_only_top_level_error() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let stub = install_failing_ytdlp_stub(temp.path())?;
        let _stub_guard = set_ytdlp_stub_path(stub);
        let _base_guard = set_watch_base_stub("http://127.0.0.1:1");

        let proxy = ProxyConfig::Generic("http://proxy.example:99999".to_owned());
        let result = ingest("abc12345678", false, &proxy);
        let error = result.error.expect("proxy failure is fatal");
        assert_eq!(error.kind, "ProxyError");
        assert!(error.message.contains("proxy configuration failed"));
        assert!(result.transcripts.is_empty());
        Ok(())
    }

    #[test]
    fn successful_metadata_rides_alongside_missing_transcripts() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let stub = install_ytdlp_stub(temp.path())?;
        let _stub_guard = set_ytdlp_stub_path(stub);
        let base = serve_html_once("<html>no captions here</html>");
        let _base_guard = set_watch_base_stub(&base);

        let result = ingest("https://youtu.be/abc12345678", false, &ProxyConfig::Direct);
        assert_eq!(result.video_id, "abc12345678");
        assert_eq!(result.metadata.title.as_deref(), Some("Stub Title"));
        assert_eq!(result.metadata.duration.as_deref(), Some("PT120S"));
        assert!(result.metadata.error.is_none());
        assert_eq!(result.transcripts.len(), 1);
        assert_eq!(result.transcripts[0].language_code, "error");
        Ok(())
    }

    #[test]
    fn result_serializes_with_stable_field_names() {
        let result = IngestResult {
            video_id: "abc12345678".into(),
            url: "https://www.youtube.com/watch?v=abc12345678".into(),
            metadata: MetadataFields::default(),
            transcripts: Vec::new(),
            error: Some(ErrorDetail {
                kind: "ProxyError".into(),
                message: "boom".into(),
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["type"], "ProxyError");
        assert_eq!(json["video_id"], "abc12345678");
    }
}
