//! Recursive document discovery under a contexts directory

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::types::Document;

/// Loads every file under a root directory whose relative path matches a glob
pub struct DocumentLoader {
    root: PathBuf,
    matcher: GlobMatcher,
}

impl DocumentLoader {
    /// Create a loader; an invalid glob is a configuration error
    pub fn new(root: impl Into<PathBuf>, glob: &str) -> Result<Self> {
        let matcher = Glob::new(glob)
            .map_err(|e| Error::config(format!("Invalid document glob '{}': {}", glob, e)))?
            .compile_matcher();

        Ok(Self {
            root: root.into(),
            matcher,
        })
    }

    /// Create from config
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.contexts_dir.clone(), &config.glob)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a path relative to the root is selected by the glob
    pub fn matches(&self, relative: &Path) -> bool {
        self.matcher.is_match(relative)
    }

    /// Load all matching documents, in sorted path order.
    ///
    /// Files that are not valid UTF-8 are skipped with a warning.
    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(Error::config(format!(
                "Contexts directory not found: {}",
                self.root.display()
            )));
        }

        let mut documents = Vec::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!("Failed to walk {}: {}", self.root.display(), e)))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if !self.matches(relative) {
                continue;
            }

            let bytes = std::fs::read(path)?;
            match String::from_utf8(bytes) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), chars = text.chars().count(), "Loaded document");
                    documents.push(Document::new(path.to_string_lossy(), text));
                }
                Err(_) => {
                    skipped += 1;
                    tracing::warn!(path = %path.display(), "Skipping non-text file");
                }
            }
        }

        tracing::info!(
            root = %self.root.display(),
            documents = documents.len(),
            skipped,
            "Loaded context documents"
        );

        Ok(documents)
    }
}
