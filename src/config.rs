#![forbid(unsafe_code)]

//! Runtime configuration for the ingestion pipeline.
//!
//! Values resolve in precedence order: programmatic override, then process
//! environment, then the `.env` file next to the working directory. The
//! `.env` parser accepts `export` prefixes, single/double quotes, and
//! comments so hand-edited files keep working.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DB_FILE: &str = "youtube_data.db";

/// Proxy selection for transcript retrieval, in fixed precedence order:
/// a full proxy URL beats a credentialed pair beats no proxy. When both
/// are configured the credentialed pair is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyConfig {
    /// `HTTP_PROXY`: one URL used for both http and https traffic.
    Generic(String),
    /// `HTTP_PROXY_USER` + `HTTP_PROXY_PASS`: a managed rotating-proxy
    /// account, reached through the provider's shared endpoint.
    Credentialed { username: String, password: String },
    #[default]
    Direct,
}

impl ProxyConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("HTTP_PROXY") {
            return ProxyConfig::Generic(url);
        }
        if let (Some(username), Some(password)) =
            (lookup("HTTP_PROXY_USER"), lookup("HTTP_PROXY_PASS"))
        {
            return ProxyConfig::Credentialed { username, password };
        }
        ProxyConfig::Direct
    }
}

/// Everything the binaries need to run: where the database lives, how to
/// reach the transcript service, and the optional search API key.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub db_path: PathBuf,
    pub proxy: ProxyConfig,
    pub youtube_api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn load_config() -> Result<IngestConfig> {
    resolve_config(ConfigOverrides::default())
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<IngestConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_config(&file_vars, env_var_string, overrides))
}

fn build_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> IngestConfig {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let db_path = overrides
        .db_path
        .or_else(|| lookup("INGEST_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));

    IngestConfig {
        db_path,
        proxy: ProxyConfig::from_lookup(lookup),
        youtube_api_key: lookup("YOUTUBE_API_KEY"),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> IngestConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_config(&vars, |_| None, ConfigOverrides::default())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from("");
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_FILE));
        assert_eq!(config.proxy, ProxyConfig::Direct);
        assert!(config.youtube_api_key.is_none());
    }

    #[test]
    fn reads_db_path_and_api_key() {
        let config =
            config_from("INGEST_DB_PATH=\"/data/videos.db\"\nYOUTUBE_API_KEY=\"key123\"\n");
        assert_eq!(config.db_path, PathBuf::from("/data/videos.db"));
        assert_eq!(config.youtube_api_key.as_deref(), Some("key123"));
    }

    #[test]
    fn generic_proxy_url_selects_generic_mode() {
        let config = config_from("HTTP_PROXY=\"http://proxy.example:8080\"\n");
        assert_eq!(
            config.proxy,
            ProxyConfig::Generic("http://proxy.example:8080".into())
        );
    }

    #[test]
    fn credential_pair_selects_credentialed_mode() {
        let config = config_from("HTTP_PROXY_USER=\"alice\"\nHTTP_PROXY_PASS=\"s3cret\"\n");
        assert_eq!(
            config.proxy,
            ProxyConfig::Credentialed {
                username: "alice".into(),
                password: "s3cret".into(),
            }
        );
    }

    #[test]
    fn generic_url_wins_over_credentials() {
        // A full proxy URL silently shadows the credentialed pair.
        let config = config_from(
            "HTTP_PROXY=\"http://proxy.example:8080\"\nHTTP_PROXY_USER=\"alice\"\nHTTP_PROXY_PASS=\"s3cret\"\n",
        );
        assert_eq!(
            config.proxy,
            ProxyConfig::Generic("http://proxy.example:8080".into())
        );
    }

    #[test]
    fn username_alone_means_direct() {
        let config = config_from("HTTP_PROXY_USER=\"alice\"\n");
        assert_eq!(config.proxy, ProxyConfig::Direct);
    }

    #[test]
    fn env_lookup_beats_file_values() {
        let vars = read_env_file(make_config("INGEST_DB_PATH=\"/from-file\"\n").path()).unwrap();
        let config = build_config(
            &vars,
            |key| (key == "INGEST_DB_PATH").then(|| "/from-env".to_string()),
            ConfigOverrides::default(),
        );
        assert_eq!(config.db_path, PathBuf::from("/from-env"));
    }

    #[test]
    fn overrides_beat_everything() {
        let vars = read_env_file(make_config("INGEST_DB_PATH=\"/from-file\"\n").path()).unwrap();
        let config = build_config(
            &vars,
            |_| Some("/from-env".to_string()),
            ConfigOverrides {
                db_path: Some(PathBuf::from("/override")),
                env_path: None,
            },
        );
        assert_eq!(config.db_path, PathBuf::from("/override"));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export HTTP_PROXY="http://p:1"
            HTTP_PROXY_USER='bob'
            YOUTUBE_API_KEY = key
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("HTTP_PROXY").unwrap(), "http://p:1");
        assert_eq!(vars.get("HTTP_PROXY_USER").unwrap(), "bob");
        assert_eq!(vars.get("YOUTUBE_API_KEY").unwrap(), "key");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }
}
