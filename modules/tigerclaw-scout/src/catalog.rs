//! Theme catalog: the thesis buckets scans are planned from.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tigerclaw_common::keywords::theme_keywords;
use tigerclaw_common::TigerclawError;
use tigerclaw_graph::{GraphStore, NodeRef, Props};

const QUERY_KEYWORDS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTheme {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_liner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl CatalogTheme {
    /// Keywords of title, one-liner and primitive, in order of appearance.
    pub fn vocabulary(&self) -> Vec<String> {
        let text = [
            Some(self.title.as_str()),
            self.one_liner.as_deref(),
            self.primitive.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        theme_keywords(&text)
    }

    /// Search query for this theme.
    pub fn query(&self) -> String {
        self.vocabulary()
            .into_iter()
            .take(QUERY_KEYWORDS)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn props(&self) -> Props {
        Props::new()
            .with("title", self.title.as_str())
            .with_opt("domain", self.domain.as_deref())
            .with_opt("one_liner", self.one_liner.as_deref())
            .with_opt("primitive", self.primitive.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeCatalog {
    themes: Vec<CatalogTheme>,
}

impl ThemeCatalog {
    pub fn new(themes: Vec<CatalogTheme>) -> Self {
        Self { themes }
    }

    /// Load the catalog. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, TigerclawError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No theme catalog found");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let themes: Vec<CatalogTheme> = serde_json::from_str(&raw)?;
        info!(themes = themes.len(), "Loaded theme catalog");
        Ok(Self { themes })
    }

    pub fn themes(&self) -> &[CatalogTheme] {
        &self.themes
    }

    pub fn get(&self, key: &str) -> Option<&CatalogTheme> {
        self.themes.iter().find(|t| t.key == key)
    }

    pub fn in_domain(&self, domain: &str) -> Vec<&CatalogTheme> {
        self.themes
            .iter()
            .filter(|t| t.domain.as_deref() == Some(domain))
            .collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.themes.iter().map(|t| t.title.clone()).collect()
    }

    /// Upsert every theme as a Theme node. Returns how many were written.
    pub async fn sync_to_graph(&self, store: &dyn GraphStore) -> usize {
        let mut written = 0;
        for theme in &self.themes {
            match store.upsert_node(&NodeRef::theme(theme.key.as_str()), &theme.props()).await {
                Ok(()) => written += 1,
                Err(e) => warn!(error = %e, theme = %theme.key, "Failed to upsert theme"),
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme() -> CatalogTheme {
        CatalogTheme {
            key: "THE-1".into(),
            title: "Photonic interconnect for AI clusters".into(),
            one_liner: Some("Optical links replacing copper in the rack".into()),
            primitive: Some("co-packaged optics".into()),
            ..Default::default()
        }
    }

    #[test]
    fn query_uses_first_six_vocabulary_words() {
        assert_eq!(theme().query(), "photonic interconnect clusters optical links copper");
    }

    #[test]
    fn missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ThemeCatalog::load(&dir.path().join("themes.json")).unwrap();
        assert!(catalog.themes().is_empty());
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ThemeCatalog::load(&path).is_err());
    }
}
