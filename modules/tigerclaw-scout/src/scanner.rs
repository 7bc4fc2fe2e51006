//! Scanner collaborators: the data sources a scan fans out to.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use tigerclaw_common::{Config, SignalRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Brave,
    Arxiv,
    S2,
    Hn,
    Departure,
    Conference,
    Patent,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::Brave,
        Source::Arxiv,
        Source::S2,
        Source::Hn,
        Source::Departure,
        Source::Conference,
        Source::Patent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Brave => "brave",
            Source::Arxiv => "arxiv",
            Source::S2 => "s2",
            Source::Hn => "hn",
            Source::Departure => "departure",
            Source::Conference => "conference",
            Source::Patent => "patent",
        }
    }

    /// Primary web search; everything else is an auxiliary scan.
    pub fn is_primary(&self) -> bool {
        *self == Source::Brave
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim().to_ascii_lowercase();
        Source::ALL
            .into_iter()
            .find(|s| s.as_str() == raw)
            .ok_or_else(|| {
                let known: Vec<_> = Source::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown source '{raw}' (expected one of: {})", known.join(", "))
            })
    }
}

/// One fan-out unit: a source queried for a theme or a domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanJob {
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_key: Option<String>,
    pub domain: String,
    pub query: String,
}

impl ScanJob {
    /// `brave:THE-1` or `brave:photonics`.
    pub fn target(&self) -> String {
        format!("{}:{}", self.source, self.theme_key.as_deref().unwrap_or(&self.domain))
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--query".to_string(),
            self.query.clone(),
            "--domain".to_string(),
            self.domain.clone(),
        ];
        if let Some(key) = &self.theme_key {
            args.push("--theme".to_string());
            args.push(key.clone());
        }
        args
    }
}

#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, job: &ScanJob) -> Result<Vec<SignalRecord>>;
}

/// Runs a configured external command per source. The child is killed when
/// the scan future is dropped, which is how timeouts and aborts reach it.
pub struct CommandScanner {
    commands: BTreeMap<String, Vec<String>>,
}

impl CommandScanner {
    pub fn new(commands: BTreeMap<String, Vec<String>>) -> Self {
        Self { commands }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scanner_commands.clone())
    }

    pub fn configured(&self, source: Source) -> bool {
        self.commands.contains_key(source.as_str())
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    async fn scan(&self, job: &ScanJob) -> Result<Vec<SignalRecord>> {
        let argv = self
            .commands
            .get(job.source.as_str())
            .ok_or_else(|| anyhow!("no scanner command configured for {}", job.source))?;
        let (program, base_args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty scanner command for {}", job.source))?;

        debug!(target = %job.target(), program = %program, "Spawning scanner");
        let output = Command::new(program)
            .args(base_args)
            .args(job.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run scanner for {}", job.target()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            bail!("scanner for {} exited with {}: {tail}", job.target(), output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = parse_records(&stdout).with_context(|| format!("bad scanner output for {}", job.target()))?;
        info!(target = %job.target(), records = records.len(), "Scanner finished");
        Ok(records)
    }
}

/// Parse a scanner's stdout: a JSON array of signal records, possibly
/// surrounded by log noise. Elements that are not records are skipped with
/// a warning.
pub fn parse_records(stdout: &str) -> Result<Vec<SignalRecord>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> = match serde_json::from_str(trimmed) {
        Ok(values) => values,
        Err(first) => {
            let start = trimmed.find('[');
            let end = trimmed.rfind(']');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&trimmed[s..=e])?,
                _ => return Err(first.into()),
            }
        }
    };

    let mut records = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<SignalRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => warn!(position, error = %e, "Skipping malformed scanner record"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_parsing() {
        assert_eq!("Brave".parse::<Source>(), Ok(Source::Brave));
        assert_eq!("s2".parse::<Source>(), Ok(Source::S2));
        assert!("twitter".parse::<Source>().is_err());
        assert!(Source::Brave.is_primary());
        assert!(!Source::Patent.is_primary());
    }

    #[test]
    fn job_target_prefers_theme_key() {
        let job = ScanJob {
            source: Source::Arxiv,
            theme_key: Some("THE-1".into()),
            domain: "photonics".into(),
            query: "photonic interconnect".into(),
        };
        assert_eq!(job.target(), "arxiv:THE-1");
        assert_eq!(
            job.args(),
            vec!["--query", "photonic interconnect", "--domain", "photonics", "--theme", "THE-1"]
        );
    }

    #[test]
    fn parses_arrays_with_surrounding_noise() {
        let out = "searching...\n[{\"name\": \"Jane Doe\"}, 42, {\"name\": \"Wei Liu\"}]\ndone\n";
        let records = parse_records(out).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Wei Liu");
        assert!(parse_records("").unwrap().is_empty());
        assert!(parse_records("no json here").is_err());
    }

    #[test]
    fn records_with_affiliation_and_background_are_kept() {
        let out = r#"[{"name": "Jane Doe", "affiliation": "MIT", "background": "MIT CSAIL"}]"#;
        let records = parse_records(out).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].affiliation_text(), Some("MIT"));
        assert_eq!(records[0].background.as_deref(), Some("MIT CSAIL"));
    }

    #[tokio::test]
    async fn unconfigured_source_is_an_error() {
        let scanner = CommandScanner::new(BTreeMap::new());
        let job = ScanJob {
            source: Source::Hn,
            theme_key: None,
            domain: "ai".into(),
            query: "ai".into(),
        };
        assert!(!scanner.configured(Source::Hn));
        assert!(scanner.scan(&job).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_the_configured_command() {
        let mut commands = BTreeMap::new();
        commands.insert(
            "brave".to_string(),
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo '[{\"name\": \"Jane Doe\", \"_source\": \"brave\"}]'".to_string(),
            ],
        );
        let scanner = CommandScanner::new(commands);
        let job = ScanJob {
            source: Source::Brave,
            theme_key: None,
            domain: "ai".into(),
            query: "ai".into(),
        };
        let records = scanner.scan(&job).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provenance.source.as_deref(), Some("brave"));
    }
}
