//! Persistence seam for finished narratives.
//!
//! The core never chooses a storage engine. A validated document and its
//! metadata are handed to a [`NarrativeSink`], which answers with an
//! identifier; everything else is the sink's concern.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use textgen::Citation;
use uuid::Uuid;

use crate::error::SinkError;
use crate::narrative::NarrativeDocument;

/// Metadata stored alongside a narrative document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeMetadata {
    /// Run date the narrative belongs to.
    pub date: NaiveDate,
    /// Topic keyword.
    pub keyword: String,
    /// Display title.
    pub title: String,
    /// Research sources backing the narrative.
    pub sources: Vec<Citation>,
    /// Position within the run's output.
    pub sort_order: usize,
}

/// Destination for validated narratives.
#[async_trait]
pub trait NarrativeSink: Send + Sync {
    /// Store a document, returning its identifier.
    async fn store(
        &self,
        document: &NarrativeDocument,
        metadata: &NarrativeMetadata,
    ) -> Result<String, SinkError>;
}

/// A stored narrative held by [`MemorySink`].
#[derive(Debug, Clone)]
pub struct StoredNarrative {
    /// Assigned identifier.
    pub id: String,
    /// The stored document.
    pub document: NarrativeDocument,
    /// Its metadata.
    pub metadata: NarrativeMetadata,
}

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    stored: Mutex<Vec<StoredNarrative>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.stored.lock().expect("sink lock").len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of everything stored so far.
    pub fn stored(&self) -> Vec<StoredNarrative> {
        self.stored.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl NarrativeSink for MemorySink {
    async fn store(
        &self,
        document: &NarrativeDocument,
        metadata: &NarrativeMetadata,
    ) -> Result<String, SinkError> {
        let id = Uuid::new_v4().to_string();
        self.stored.lock().expect("sink lock").push(StoredNarrative {
            id: id.clone(),
            document: document.clone(),
            metadata: metadata.clone(),
        });
        Ok(id)
    }
}
