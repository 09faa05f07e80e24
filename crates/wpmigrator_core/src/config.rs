use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://www.data.gov/wp-json/wp/v2";
pub const DEFAULT_USER_AGENT: &str = "wpmigrator/0.2";
pub const DEFAULT_CONFIG_FILENAME: &str = "wpmigrator.toml";
pub const DEFAULT_FILTER_TAGS: &[&str] = &["usdatagov"];

pub const DEFAULT_CONTENT_KEYS: &[&str] = &[
    "id",
    "date",
    "date_gmt",
    "guid",
    "modified",
    "modified_gmt",
    "slug",
    "status",
    "type",
    "link",
    "title",
    "excerpt",
    "author",
    "featured_media",
    "comment_status",
    "ping_status",
    "sticky",
    "template",
    "format",
    "meta",
    "categories",
    "tags",
    "acf",
];

pub const DEFAULT_AUTHOR_KEYS: &[&str] = &["id", "name", "url", "description", "slug", "meta", "acf"];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigratorConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub fields: FieldsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SourceSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub rate_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FilterSection {
    /// Tag names whose posts are left out of the migration.
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub pages_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FieldsSection {
    pub posts: Option<Vec<String>>,
    pub pages: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
}

impl MigratorConfig {
    /// Resolve the REST base URL: env WP_API_URL > config > DEFAULT_API_URL.
    pub fn api_url(&self) -> String {
        env_override("WP_API_URL")
            .or_else(|| self.source.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolve user agent: env WP_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WP_USER_AGENT")
            .or_else(|| self.source.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn timeout_ms(&self) -> u64 {
        env_number("WP_HTTP_TIMEOUT_MS")
            .or(self.source.timeout_ms)
            .unwrap_or(30_000)
    }

    pub fn retries(&self) -> usize {
        env_number("WP_HTTP_RETRIES")
            .or(self.source.retries)
            .unwrap_or(0)
    }

    pub fn retry_delay_ms(&self) -> u64 {
        env_number("WP_HTTP_RETRY_DELAY_MS")
            .or(self.source.retry_delay_ms)
            .unwrap_or(500)
    }

    pub fn rate_limit_ms(&self) -> u64 {
        env_number("WP_RATE_LIMIT_MS")
            .or(self.source.rate_limit_ms)
            .unwrap_or(0)
    }

    pub fn filter_tags(&self) -> Vec<String> {
        self.filter
            .tags
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_FILTER_TAGS))
    }

    pub fn pages_dir(&self) -> &str {
        self.output.pages_dir.as_deref().unwrap_or("")
    }

    pub fn post_keys(&self) -> Vec<String> {
        self.fields
            .posts
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_CONTENT_KEYS))
    }

    pub fn page_keys(&self) -> Vec<String> {
        self.fields
            .pages
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_CONTENT_KEYS))
    }

    pub fn author_keys(&self) -> Vec<String> {
        self.fields
            .authors
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_AUTHOR_KEYS))
    }
}

/// Config file location: env WPMIGRATOR_CONFIG > `wpmigrator.toml` under `cwd`.
pub fn config_path(cwd: &Path) -> PathBuf {
    match env_override("WPMIGRATOR_CONFIG") {
        Some(path) => cwd.join(path),
        None => cwd.join(DEFAULT_CONFIG_FILENAME),
    }
}

/// Load and parse a MigratorConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<MigratorConfig> {
    if !config_path.exists() {
        return Ok(MigratorConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: MigratorConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_override(key).and_then(|value| value.parse::<T>().ok())
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
