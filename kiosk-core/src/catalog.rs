use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Ordered list of URL categories, loaded once at startup and immutable
/// thereafter. The per-cycle working set is derived from the flattened view.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlCatalog {
    #[serde(default, rename = "category")]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl UrlCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let catalog: UrlCatalog =
            toml::from_str(&content).map_err(|source| CatalogError::Parse {
                source,
                path: path.to_path_buf(),
            })?;
        info!(
            path = %path.display(),
            urls = catalog.len(),
            categories = catalog.categories.len(),
            "loaded url catalog"
        );
        Ok(catalog)
    }

    /// Missing or malformed catalog files fall back to a small built-in
    /// default list rather than failing startup.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %err,
                    "failed to load url catalog, using built-in defaults"
                );
                Self::default_catalog()
            }
        }
    }

    pub fn default_catalog() -> Self {
        Self {
            categories: vec![Category {
                name: "default".to_string(),
                urls: vec![
                    "https://news.ycombinator.com/".to_string(),
                    "https://github.com/trending".to_string(),
                    "https://tldr.tech/".to_string(),
                    "https://www.theverge.com/".to_string(),
                    "https://techcrunch.com/".to_string(),
                ],
            }],
        }
    }

    /// All URLs in file order: the concatenation of every category's list.
    pub fn flattened(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|category| category.urls.iter().cloned())
            .collect()
    }

    /// URLs of a single category, matched case-insensitively. An absent
    /// category yields an empty slice.
    pub fn category(&self, name: &str) -> &[String] {
        self.categories
            .iter()
            .find(|category| category.name.eq_ignore_ascii_case(name))
            .map(|category| category.urls.as_slice())
            .unwrap_or(&[])
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories
            .iter()
            .map(|category| category.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|category| category.urls.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
