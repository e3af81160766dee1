//! Bucket -> index synchronisation
//!
//! For every supported object under the prefix: fetch, hash, skip when the
//! hash matches the last indexing, otherwise extract, chunk, embed and
//! persist. Documents that disappeared from the bucket are pruned.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use crossbeam::channel::Sender;
use serde::Serialize;

use crate::bucket::ObjectStore;
use crate::document::{DocumentKind, IndexedDocument};
use crate::query::Embedder;
use crate::storage::{lock_index, SharedIndex};
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::{DocumentStatus, Result};
use super::chunker::DocumentChunker;
use super::extract::extract_text;

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IndexReport {
    pub listed: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
    pub chunks: usize,
}

impl std::fmt::Display for IndexReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Indexing Report:")?;
        writeln!(f, "  Listed: {}", self.listed)?;
        writeln!(f, "  Indexed: {} ({} chunks)", self.indexed, self.chunks)?;
        writeln!(f, "  Unchanged: {}", self.unchanged)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Removed: {}", self.removed)
    }
}

pub struct Indexer {
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    chunker: DocumentChunker,
    prefix: String,
    force: bool,
    progress: Option<Sender<ProgressMessage>>,
}

impl Indexer {
    pub fn new(index: SharedIndex, embedder: Arc<dyn Embedder>, chunker: DocumentChunker) -> Self {
        Self {
            index,
            embedder,
            chunker,
            prefix: String::new(),
            force: false,
            progress: None,
        }
    }

    /// Only index keys under this prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Re-embed documents even when their content hash is unchanged
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_progress(mut self, tx: Sender<ProgressMessage>) -> Self {
        self.progress = Some(tx);
        self
    }

    fn emit(&self, msg: ProgressMessage) {
        if let Some(tx) = &self.progress {
            tx.send(msg).ok();
        }
    }

    pub async fn run(&self, store: &dyn ObjectStore) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        self.emit(ProgressMessage::Started { phase: ProgressPhase::Listing, total: 0 });
        let objects = store.list(&self.prefix).await?;
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Listing });

        report.listed = objects.len();
        if objects.is_empty() {
            tracing::warn!("No documents found in {} under '{}'", store.name(), self.prefix);
        } else {
            tracing::info!("Found {} documents in {}", objects.len(), store.name());
        }

        self.emit(ProgressMessage::Started { phase: ProgressPhase::Indexing, total: objects.len() });
        let mut seen = HashSet::new();

        for (i, object) in objects.iter().enumerate() {
            let key = object.key.clone();
            seen.insert(key.clone());
            self.emit(ProgressMessage::Progress {
                phase: ProgressPhase::Indexing,
                current: i + 1,
                key: Some(key.clone()),
            });

            let Some(kind) = DocumentKind::from_key(&key) else {
                tracing::warn!("Unsupported file type: {}", key);
                report.skipped += 1;
                self.emit(ProgressMessage::Document { key, status: DocumentStatus::Unsupported, chunks: 0 });
                continue;
            };

            let bytes = match store.get(&key).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("Error reading {}: {}", key, e);
                    report.failed += 1;
                    self.emit(ProgressMessage::Error(key, e.to_string()));
                    continue;
                }
            };

            match self.process_document(store.name(), &key, kind, bytes).await {
                Ok((status, chunks)) => {
                    match status {
                        DocumentStatus::Unchanged => report.unchanged += 1,
                        _ => {
                            report.indexed += 1;
                            report.chunks += chunks;
                        }
                    }
                    self.emit(ProgressMessage::Document { key, status, chunks });
                }
                Err(e) => {
                    tracing::error!("Failed to index {}: {}", key, e);
                    report.failed += 1;
                    self.emit(ProgressMessage::Error(key, e.to_string()));
                }
            }
        }
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Indexing });

        self.emit(ProgressMessage::Started { phase: ProgressPhase::Pruning, total: 0 });
        report.removed = self.prune(&seen).await?;
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Pruning });

        tracing::info!(
            "Indexed {} documents ({} chunks), {} unchanged, {} skipped, {} failed, {} removed",
            report.indexed,
            report.chunks,
            report.unchanged,
            report.skipped,
            report.failed,
            report.removed
        );
        Ok(report)
    }

    /// Extract, chunk, embed and store one document on the blocking pool
    async fn process_document(
        &self,
        bucket: &str,
        key: &str,
        kind: DocumentKind,
        bytes: Vec<u8>,
    ) -> Result<(DocumentStatus, usize)> {
        let index = self.index.clone();
        let embedder = self.embedder.clone();
        let chunker = self.chunker.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let force = self.force;

        tokio::task::spawn_blocking(move || -> Result<(DocumentStatus, usize)> {
            let hash = blake3::hash(&bytes).to_hex().to_string();

            let previous = {
                let index = lock_index(&index);
                index.get_document(&key)?
            };

            let status = match &previous {
                Some(doc) if doc.content_hash == hash && !force => {
                    tracing::debug!("Unchanged: {}", key);
                    return Ok((DocumentStatus::Unchanged, doc.chunks));
                }
                Some(_) => DocumentStatus::Modified,
                None => DocumentStatus::New,
            };

            let text = extract_text(kind, &bytes)?;
            let chunks = chunker.chunk_document(&bucket, &key, &text);
            tracing::debug!("{}: {} characters, {} chunks", key, text.chars().count(), chunks.len());
            let vectors = embedder.embed_chunks(&chunks)?;

            let doc = IndexedDocument {
                key: key.clone(),
                kind,
                content_hash: hash,
                characters: text.chars().count(),
                chunks: chunks.len(),
                indexed_at: Utc::now(),
            };

            lock_index(&index).upsert_document(&doc, &chunks, &vectors)?;
            Ok((status, chunks.len()))
        })
        .await?
    }

    /// Remove indexed documents under the prefix that are no longer listed
    async fn prune(&self, seen: &HashSet<String>) -> Result<usize> {
        let index = self.index.clone();
        let prefix = self.prefix.clone();
        let seen = seen.clone();
        let progress = self.progress.clone();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut index = lock_index(&index);
            let stale: Vec<String> = index
                .documents()?
                .into_iter()
                .map(|d| d.key)
                .filter(|k| k.starts_with(&prefix) && !seen.contains(k))
                .collect();

            for key in &stale {
                tracing::info!("Removing {} from index (deleted from bucket)", key);
                index.remove_document(key)?;
                if let Some(tx) = &progress {
                    tx.send(ProgressMessage::Removed(key.clone())).ok();
                }
            }
            Ok(stale.len())
        })
        .await?
    }
}
