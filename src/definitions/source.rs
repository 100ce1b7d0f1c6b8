//! Where definition documents come from.
//!
//! Sources are re-read on every merge, so a reload picks up edited files.

use crate::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Raw text of one definition document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Name used in error labels (usually the file path)
    pub name: String,
    pub text: String,
}

/// Trait for anything that can supply definition documents.
pub trait DefinitionSource: Send + Sync {
    /// Read the current contents of every document.
    fn read(&self) -> Result<Vec<SourceDocument>>;

    /// Describe the source (for display purposes).
    fn describe(&self) -> String;
}

/// Definition documents stored as files.
///
/// A path that does not exist contributes nothing; deployments without
/// initial preferences simply have no file.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    /// Create a source reading the given files in order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Configured paths.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl DefinitionSource for FileSource {
    fn read(&self) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "definition file does not exist, skipping");
                continue;
            }
            documents.push(SourceDocument {
                name: path.display().to_string(),
                text: fs::read_to_string(path)?,
            });
        }
        Ok(documents)
    }

    fn describe(&self) -> String {
        if self.paths.is_empty() {
            return "no definition files".to_string();
        }
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single definition document held in memory.
#[derive(Debug, Clone)]
pub struct InlineSource {
    document: SourceDocument,
}

impl InlineSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document: SourceDocument {
                name: name.into(),
                text: text.into(),
            },
        }
    }
}

impl DefinitionSource for InlineSource {
    fn read(&self) -> Result<Vec<SourceDocument>> {
        Ok(vec![self.document.clone()])
    }

    fn describe(&self) -> String {
        format!("inline:{}", self.document.name)
    }
}

/// SHA-256 over the documents' names and text, as lowercase hex.
///
/// Collaborators compare digests to tell whether seed data changed between
/// merges.
pub fn digest(documents: &[SourceDocument]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
