use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::TigerclawError;

const SCANNER_PREFIX: &str = "TIGERCLAW_SCANNER_";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    /// Absent means the graph is unavailable; graph-backed steps degrade.
    pub neo4j_password: Option<String>,

    // Data root and files derived from it
    pub home: PathBuf,
    pub index_path: PathBuf,
    pub lock_path: PathBuf,
    pub feed_path: PathBuf,
    pub suggestions_path: PathBuf,
    pub cache_dir: PathBuf,
    pub themes_path: PathBuf,

    // Scan
    pub concurrency: usize,
    pub search_timeout: Duration,
    pub aux_timeout: Duration,
    pub lock_wait: Duration,
    pub lock_stale: Duration,
    /// Source name (lowercase) -> program and arguments.
    pub scanner_commands: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, TigerclawError> {
        Self::from_vars(env::vars())
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, TigerclawError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: BTreeMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let home = PathBuf::from(get("TIGERCLAW_HOME").unwrap_or("."));

        let scanner_commands = vars
            .iter()
            .filter_map(|(key, value)| {
                let source = key.strip_prefix(SCANNER_PREFIX)?.to_ascii_lowercase();
                let argv: Vec<String> = value.split_whitespace().map(String::from).collect();
                (!argv.is_empty()).then_some((source, argv))
            })
            .collect();

        Ok(Self {
            neo4j_uri: get("NEO4J_URI").unwrap_or("bolt://localhost:7687").to_string(),
            neo4j_user: get("NEO4J_USER").unwrap_or("neo4j").to_string(),
            neo4j_password: get("NEO4J_PASSWORD").map(String::from),
            index_path: home.join(".pipeline-index.json"),
            lock_path: home.join(".pipeline-index.json.lock"),
            feed_path: home.join(".discoveries.jsonl"),
            suggestions_path: home.join(".ripple-suggestions.jsonl"),
            cache_dir: home.join(".enrichment-cache"),
            themes_path: home.join("themes.json"),
            home,
            concurrency: parse_number(get("SCAN_CONCURRENCY"), "SCAN_CONCURRENCY", 4)?,
            search_timeout: secs(get("SCAN_SEARCH_TIMEOUT_SECS"), "SCAN_SEARCH_TIMEOUT_SECS", 180)?,
            aux_timeout: secs(get("SCAN_AUX_TIMEOUT_SECS"), "SCAN_AUX_TIMEOUT_SECS", 120)?,
            lock_wait: secs(get("LOCK_WAIT_SECS"), "LOCK_WAIT_SECS", 30)?,
            lock_stale: secs(get("LOCK_STALE_SECS"), "LOCK_STALE_SECS", 300)?,
            scanner_commands,
        })
    }

    /// (uri, user, password) when a graph is configured.
    pub fn graph_credentials(&self) -> Option<(&str, &str, &str)> {
        self.neo4j_password
            .as_deref()
            .map(|pw| (self.neo4j_uri.as_str(), self.neo4j_user.as_str(), pw))
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            neo4j_uri = %self.neo4j_uri,
            neo4j_user = %self.neo4j_user,
            graph = self.neo4j_password.is_some(),
            home = %self.home.display(),
            concurrency = self.concurrency,
            scanners = ?self.scanner_commands.keys().collect::<Vec<_>>(),
            "Config loaded"
        );
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<&str>, key: &str, default: T) -> Result<T, TigerclawError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| TigerclawError::Config(format!("{key} must be a number, got '{v}'"))),
    }
}

fn secs(raw: Option<&str>, key: &str, default: u64) -> Result<Duration, TigerclawError> {
    parse_number(raw, key, default).map(Duration::from_secs)
}
