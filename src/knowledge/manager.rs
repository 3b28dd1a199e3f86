//! Per-domain knowledge store manager.
//!
//! Owns one store per domain, created lazily. Initialization errors propagate
//! to the caller; inserts report an [`OperationResult`]; cross-domain queries
//! fan out concurrently and fold each domain's failure into its own entry.

use super::store::{
    CompletionService, EmbeddingService, KnowledgeStore, KnowledgeStoreBuilder, QueryParams,
};
use super::OperationResult;
use crate::agent::kind::normalize_agent_type;
use crate::config::PathsConfig;
use crate::error::OrchestratorError;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed character window used when chunking inserted documents.
pub const CHUNK_SIZE: usize = 2000;

/// Split text into windows of at most `size` characters, on char boundaries.
pub fn chunk_text(content: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(size)
        .map(|window| window.iter().collect::<String>())
        .collect()
}

/// Stores are keyed by long name so `ism` and `investor_summary` share one store.
fn domain_key(domain: &str) -> String {
    normalize_agent_type(domain.trim())
}

pub struct KnowledgeManager {
    paths: PathsConfig,
    embedding: Arc<dyn EmbeddingService>,
    completion: Arc<dyn CompletionService>,
    builder: Arc<dyn KnowledgeStoreBuilder>,
    request_timeout: Option<Duration>,
    instances: RwLock<HashMap<String, Arc<dyn KnowledgeStore>>>,
    initialized: RwLock<HashSet<String>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl KnowledgeManager {
    pub fn new(
        paths: PathsConfig,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
        builder: Arc<dyn KnowledgeStoreBuilder>,
    ) -> Self {
        Self {
            paths,
            embedding,
            completion,
            builder,
            request_timeout: None,
            instances: RwLock::new(HashMap::new()),
            initialized: RwLock::new(HashSet::new()),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Bound every store query and insert by a deadline.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn storage_path(&self, domain: &str) -> PathBuf {
        self.paths.knowledge_base_path(domain)
    }

    /// Create the store for a domain, or return the existing one.
    ///
    /// Storage initialization runs only for a domain seen for the first time
    /// or when `force_reinit` is set.
    pub async fn initialize_rag_instance(
        &self,
        domain: &str,
        force_reinit: bool,
    ) -> Result<Arc<dyn KnowledgeStore>, OrchestratorError> {
        if domain.trim().is_empty() {
            return Err(OrchestratorError::InvalidDomain(
                "Domain must be a non-empty string.".to_string(),
            ));
        }

        let domain = domain_key(domain);
        let domain = domain.as_str();

        if !force_reinit {
            if let Some(existing) = self.get_rag_instance(domain) {
                return Ok(existing);
            }
        }

        let _guard = self.init_lock.lock().await;
        if !force_reinit {
            if let Some(existing) = self.get_rag_instance(domain) {
                return Ok(existing);
            }
        }

        let working_dir = self.storage_path(domain);
        std::fs::create_dir_all(&working_dir)
            .map_err(|e| OrchestratorError::knowledge(domain, e))?;

        let store = self.builder.build(
            domain,
            &working_dir,
            self.embedding.clone(),
            self.completion.clone(),
        )?;

        let first_time = !self.initialized.read().contains(domain);
        if first_time || force_reinit {
            store
                .initialize_storages()
                .await
                .map_err(|e| tag_domain(domain, e))?;
            self.initialized.write().insert(domain.to_string());
        }

        self.instances
            .write()
            .insert(domain.to_string(), store.clone());
        tracing::info!(domain, path = %working_dir.display(), force_reinit, "Knowledge store initialized");
        Ok(store)
    }

    /// Pure read. Never creates a store.
    pub fn get_rag_instance(&self, domain: &str) -> Option<Arc<dyn KnowledgeStore>> {
        self.instances.read().get(&domain_key(domain)).cloned()
    }

    async fn ensure_instance(
        &self,
        domain: &str,
    ) -> Result<Arc<dyn KnowledgeStore>, OrchestratorError> {
        if let Some(existing) = self.get_rag_instance(domain) {
            return Ok(existing);
        }
        tracing::warn!(domain, "Knowledge store not initialized, initializing on demand");
        self.initialize_rag_instance(domain, false).await
    }

    /// Chunk and insert a document. Failures come back in the result, never as an error.
    pub async fn insert_document(&self, domain: &str, content: &str) -> OperationResult {
        match self.try_insert_document(domain, content).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(domain, error = %e, "Document insertion failed");
                OperationResult::failed(e.to_string())
            }
        }
    }

    async fn try_insert_document(
        &self,
        domain: &str,
        content: &str,
    ) -> Result<OperationResult, OrchestratorError> {
        let store = self.ensure_instance(domain).await?;
        if content.is_empty() {
            return Ok(OperationResult::ok("Empty document skipped."));
        }

        let chunks = chunk_text(content, CHUNK_SIZE);
        let started = Instant::now();
        self.bounded("insert_document", store.insert_custom_chunks(content, &chunks))
            .await
            .map_err(|e| tag_domain(domain, e))?;
        tracing::info!(
            domain,
            chunks = chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inserted document"
        );
        Ok(OperationResult::ok(format!(
            "Document inserted successfully into domain '{}'.",
            domain
        )))
    }

    /// Query a single domain, initializing it on demand.
    pub async fn query_domain(
        &self,
        domain: &str,
        query: &str,
        params: QueryParams,
    ) -> Result<String, OrchestratorError> {
        let store = self.ensure_instance(domain).await?;
        self.bounded("query_domain", store.query(query, &params))
            .await
            .map_err(|e| tag_domain(domain, e))
    }

    /// Query several domains concurrently. Each domain maps to its result or an inline error.
    pub async fn cross_domain_query(
        &self,
        domains: &[String],
        query: &str,
        params: QueryParams,
    ) -> BTreeMap<String, String> {
        let tasks = domains.iter().map(|domain| {
            let domain = domain.clone();
            async move {
                let outcome = AssertUnwindSafe(self.query_domain(&domain, query, params))
                    .catch_unwind()
                    .await;
                let text = match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => format!("Error querying domain {}: {}", domain, e),
                    Err(_) => format!("Error querying domain {}: query task panicked", domain),
                };
                (domain, text)
            }
        });

        let mut results = BTreeMap::new();
        match AssertUnwindSafe(join_all(tasks)).catch_unwind().await {
            Ok(pairs) => {
                for (domain, text) in pairs {
                    results.insert(domain, text);
                }
            }
            Err(_) => {
                tracing::error!("Cross-domain query failed outside any domain task");
                results.insert(
                    "error".to_string(),
                    "Cross-domain query failed".to_string(),
                );
            }
        }
        results
    }

    /// Domains with a materialized store, by long name, sorted.
    pub fn list_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.instances.read().keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Drop every store and forget which domains were initialized.
    pub fn cleanup(&self) {
        self.instances.write().clear();
        self.initialized.write().clear();
        tracing::info!("Knowledge stores cleaned up");
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, OrchestratorError>>,
    ) -> Result<T, OrchestratorError> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                OrchestratorError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                }
            })?,
            None => fut.await,
        }
    }
}

fn tag_domain(domain: &str, err: OrchestratorError) -> OrchestratorError {
    match err {
        OrchestratorError::KnowledgeStore { .. } | OrchestratorError::Timeout { .. } => err,
        other => OrchestratorError::knowledge(domain, other),
    }
}
