//! Metadata sources.
//!
//! A source supplies either raw bytes (parsed by the resolver's parser) or a
//! pre-parsed tree. Trees handed out by a source are always fresh copies, so
//! annotations from one refresh cycle never leak into the next.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{MetadataError, MetadataResult};
use crate::model::MetadataTree;

/// What a source produced for one fetch.
#[derive(Debug)]
pub enum SourceDocument {
    /// Raw document bytes.
    Bytes(Vec<u8>),
    /// An already parsed tree.
    Tree(MetadataTree),
}

/// A pluggable transport for metadata documents.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches the current document.
    ///
    /// # Errors
    ///
    /// Returns a source error if the document cannot be retrieved.
    async fn fetch(&self) -> MetadataResult<SourceDocument>;

    /// Returns a description for logs.
    fn id(&self) -> String;
}

/// Reads a metadata file on every fetch.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    path: PathBuf,
}

impl FilesystemSource {
    /// Creates a source for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataSource for FilesystemSource {
    async fn fetch(&self) -> MetadataResult<SourceDocument> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            MetadataError::source(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if bytes.is_empty() {
            return Err(MetadataError::source(format!(
                "{} is empty",
                self.path.display()
            )));
        }
        Ok(SourceDocument::Bytes(bytes))
    }

    fn id(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[derive(Debug)]
enum InMemoryContent {
    Bytes(Vec<u8>),
    Tree(MetadataTree),
}

/// Serves a document held in memory; the content can be replaced at runtime.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    content: Arc<RwLock<InMemoryContent>>,
}

impl InMemorySource {
    /// Creates a source serving raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::new(RwLock::new(InMemoryContent::Bytes(bytes.into()))),
        }
    }

    /// Creates a source serving a pre-parsed tree.
    #[must_use]
    pub fn from_tree(tree: MetadataTree) -> Self {
        Self {
            content: Arc::new(RwLock::new(InMemoryContent::Tree(tree))),
        }
    }

    /// Replaces the served bytes.
    pub fn replace_bytes(&self, bytes: impl Into<Vec<u8>>) {
        *self.content.write() = InMemoryContent::Bytes(bytes.into());
    }

    /// Replaces the served tree.
    pub fn replace_tree(&self, tree: MetadataTree) {
        *self.content.write() = InMemoryContent::Tree(tree);
    }
}

#[async_trait]
impl MetadataSource for InMemorySource {
    async fn fetch(&self) -> MetadataResult<SourceDocument> {
        Ok(match &*self.content.read() {
            InMemoryContent::Bytes(bytes) => SourceDocument::Bytes(bytes.clone()),
            InMemoryContent::Tree(tree) => SourceDocument::Tree(tree.detached_copy()),
        })
    }

    fn id(&self) -> String {
        "in-memory".to_string()
    }
}
