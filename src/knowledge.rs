//! Knowledge Stores
//!
//! One retrieval store per domain, created on demand by the
//! [`KnowledgeManager`]. The store contract is a set of async traits so
//! network-backed and in-process implementations are interchangeable.

pub mod manager;
pub mod store;
pub mod updater;

pub use manager::{KnowledgeManager, CHUNK_SIZE};
pub use store::{
    CompletionService, EmbeddingService, ExtractiveCompletion, HashedEmbedding,
    KnowledgeStore, KnowledgeStoreBuilder, LocalKnowledgeStore, LocalStoreBuilder, QueryMode,
    QueryParams,
};
pub use updater::{KnowledgeUpdater, UpdateRequest};

use serde::{Deserialize, Serialize};

/// Outcome of a write or update operation reported to the caller as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
