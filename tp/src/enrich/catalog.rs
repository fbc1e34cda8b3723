//! Destination catalog: free-text location to enrichment sources

use std::collections::HashMap;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::normalize_text;

const EMBEDDED_CATALOG: &str = include_str!("../../data/catalog.yml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A known destination and the pages worth reading about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub sources: Vec<String>,
}

/// Search endpoint used when no destination matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackSource {
    pub url: String,

    /// Query parameter that receives the location text
    #[serde(default = "default_param")]
    pub param: String,
}

fn default_param() -> String {
    "search".to_string()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    destinations: Vec<Destination>,

    #[serde(default)]
    fallback: Vec<FallbackSource>,
}

/// Sources chosen for one location
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSelection {
    /// Catalog name on a hit, `None` when the generic fallback was used
    pub destination: Option<String>,
    pub urls: Vec<String>,
}

impl SourceSelection {
    pub fn is_catalog_hit(&self) -> bool {
        self.destination.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct DestinationCatalog {
    destinations: Vec<Destination>,
    fallback: Vec<FallbackSource>,
    index: HashMap<String, usize>,
}

impl DestinationCatalog {
    /// Catalog compiled into the binary
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_yaml(EMBEDDED_CATALOG)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Ok(Self::new(file.destinations, file.fallback))
    }

    /// Load from `path` when given, otherwise the embedded catalog
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                debug!(path = %path.display(), "DestinationCatalog::load: reading override");
                let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_yaml(&content)
            }
            None => Self::embedded(),
        }
    }

    pub fn new(destinations: Vec<Destination>, fallback: Vec<FallbackSource>) -> Self {
        let mut index = HashMap::new();
        for (i, dest) in destinations.iter().enumerate() {
            for key in std::iter::once(&dest.name).chain(dest.aliases.iter()) {
                let key = normalize_text(key);
                if key.is_empty() {
                    continue;
                }
                if let Some(prev) = index.insert(key.clone(), i) {
                    if prev != i {
                        warn!(%key, first = %destinations[prev].name, second = %dest.name, "Duplicate catalog key");
                    }
                }
            }
        }
        Self {
            destinations,
            fallback,
            index,
        }
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Find the destination a free-text location refers to
    ///
    /// Tries the whole string, then each comma-separated part, then single
    /// words. The first key that hits wins, so "Shibuya, Tokyo, Japan" resolves
    /// to Tokyo before Japan.
    pub fn lookup(&self, location: &str) -> Option<&Destination> {
        debug!(%location, "DestinationCatalog::lookup: called");
        let whole = normalize_text(location);
        if whole.is_empty() {
            return None;
        }

        let parts = location.split(',').map(normalize_text).filter(|p| !p.is_empty());
        let words = whole.split(' ').map(str::to_string);
        std::iter::once(whole.clone())
            .chain(parts)
            .chain(words)
            .find_map(|key| self.index.get(&key))
            .map(|&i| &self.destinations[i])
    }

    /// Source URLs for a location: the matching destination's pages, or the
    /// fallback search endpoints with the location as the query
    pub fn select(&self, location: &str) -> SourceSelection {
        if let Some(dest) = self.lookup(location) {
            return SourceSelection {
                destination: Some(dest.name.clone()),
                urls: dest.sources.clone(),
            };
        }

        let query = location.trim();
        let urls = self
            .fallback
            .iter()
            .filter_map(|f| match Url::parse_with_params(&f.url, &[(f.param.as_str(), query)]) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    warn!(url = %f.url, error = %e, "Skipping invalid fallback source");
                    None
                }
            })
            .collect();
        SourceSelection {
            destination: None,
            urls,
        }
    }
}
