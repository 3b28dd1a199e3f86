//! Knowledge store contract and the in-tree local store.

use crate::error::OrchestratorError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Retrieval mode passed through to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Local,
    Global,
    Hybrid,
    Naive,
    #[default]
    Mix,
}

impl QueryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Naive => "naive",
            QueryMode::Mix => "mix",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(QueryMode::Local),
            "global" => Ok(QueryMode::Global),
            "hybrid" => Ok(QueryMode::Hybrid),
            "naive" => Ok(QueryMode::Naive),
            "mix" => Ok(QueryMode::Mix),
            other => Err(format!("Unknown query mode: {}", other)),
        }
    }
}

/// Query parameters: retrieval mode and result-count cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub mode: QueryMode,
    pub top_k: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            mode: QueryMode::Mix,
            top_k: 5,
        }
    }
}

impl QueryParams {
    pub fn new(mode: QueryMode, top_k: usize) -> Self {
        Self { mode, top_k }
    }
}

/// Turns text into vectors.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrchestratorError>;
}

/// Answers a question given retrieved context.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, question: &str, context: &str) -> Result<String, OrchestratorError>;
}

/// A single domain's retrieval store.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// One-time storage setup. Safe to call again.
    async fn initialize_storages(&self) -> Result<(), OrchestratorError>;

    async fn query(&self, text: &str, params: &QueryParams) -> Result<String, OrchestratorError>;

    /// Insert pre-chunked text, bypassing the store's own chunker.
    async fn insert_custom_chunks(
        &self,
        full_text: &str,
        chunks: &[String],
    ) -> Result<(), OrchestratorError>;
}

/// Constructs a store bound to a directory and its embedding and completion functions.
pub trait KnowledgeStoreBuilder: Send + Sync {
    fn build(
        &self,
        domain: &str,
        working_dir: &Path,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Arc<dyn KnowledgeStore>, OrchestratorError>;
}

const CHUNK_FILE: &str = "kv_store_chunks.json";
const NO_CONTEXT: &str = "No relevant information found in the knowledge base.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    content: String,
    embedding: Vec<f32>,
}

/// Chunk store persisted as JSON in the domain directory, queried by cosine similarity.
pub struct LocalKnowledgeStore {
    domain: String,
    working_dir: PathBuf,
    embedding: Arc<dyn EmbeddingService>,
    completion: Arc<dyn CompletionService>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl LocalKnowledgeStore {
    pub fn new(
        domain: &str,
        working_dir: &Path,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            working_dir: working_dir.to_path_buf(),
            embedding,
            completion,
            chunks: RwLock::new(Vec::new()),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    fn chunk_file(&self) -> PathBuf {
        self.working_dir.join(CHUNK_FILE)
    }

    fn persist(&self) -> Result<(), OrchestratorError> {
        let serialized = {
            let chunks = self.chunks.read();
            serde_json::to_vec(&*chunks)?
        };
        std::fs::create_dir_all(&self.working_dir)?;
        let tmp = self.working_dir.join(format!("{}.tmp", CHUNK_FILE));
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, self.chunk_file())?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for LocalKnowledgeStore {
    async fn initialize_storages(&self) -> Result<(), OrchestratorError> {
        std::fs::create_dir_all(&self.working_dir)?;
        let path = self.chunk_file();
        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let loaded: Vec<StoredChunk> = serde_json::from_slice(&bytes)
                .map_err(|e| OrchestratorError::knowledge(&self.domain, e))?;
            tracing::debug!(domain = %self.domain, chunks = loaded.len(), "Loaded knowledge chunks");
            *self.chunks.write() = loaded;
        }
        Ok(())
    }

    async fn query(&self, text: &str, params: &QueryParams) -> Result<String, OrchestratorError> {
        let query_vec = self
            .embedding
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let context = {
            let chunks = self.chunks.read();
            let mut scored: Vec<(f32, &str)> = chunks
                .iter()
                .map(|c| (cosine_similarity(&query_vec, &c.embedding), c.content.as_str()))
                .filter(|(score, _)| *score > 0.0)
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored
                .into_iter()
                .take(params.top_k.max(1))
                .map(|(_, content)| content.to_string())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        if context.is_empty() {
            return Ok(NO_CONTEXT.to_string());
        }
        if params.mode == QueryMode::Naive {
            return Ok(context);
        }
        self.completion.complete(text, &context).await
    }

    async fn insert_custom_chunks(
        &self,
        _full_text: &str,
        chunks: &[String],
    ) -> Result<(), OrchestratorError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let embeddings = self.embedding.embed(chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(OrchestratorError::knowledge(
                &self.domain,
                format!(
                    "embedding count {} does not match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            ));
        }
        {
            let mut stored = self.chunks.write();
            stored.extend(chunks.iter().zip(embeddings).map(|(content, embedding)| StoredChunk {
                content: content.clone(),
                embedding,
            }));
        }
        self.persist()
    }
}

/// Builds [`LocalKnowledgeStore`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStoreBuilder;

impl KnowledgeStoreBuilder for LocalStoreBuilder {
    fn build(
        &self,
        domain: &str,
        working_dir: &Path,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Arc<dyn KnowledgeStore>, OrchestratorError> {
        Ok(Arc::new(LocalKnowledgeStore::new(
            domain,
            working_dir,
            embedding,
            completion,
        )))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
}

/// Hashed bag-of-words embedding. Needs no network.
#[derive(Debug, Clone, Copy)]
pub struct HashedEmbedding {
    dimensions: usize,
}

impl HashedEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            vector[token_bucket(&token, self.dimensions)] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

/// Bucket from the first eight bytes of the token's blake3 digest. Stored
/// vectors depend on this staying fixed across builds.
fn token_bucket(token: &str, dimensions: usize) -> usize {
    let digest = blake3::hash(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(head) % dimensions as u64) as usize
}

impl Default for HashedEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingService for HashedEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrchestratorError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Extractive completion: returns the context sentences that share terms with the question.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveCompletion;

#[async_trait]
impl CompletionService for ExtractiveCompletion {
    async fn complete(&self, question: &str, context: &str) -> Result<String, OrchestratorError> {
        let terms: Vec<String> = tokenize(question).collect();
        let sentences: Vec<&str> = context
            .split_inclusive(['.', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| {
                let lower = s.to_lowercase();
                terms.iter().any(|t| lower.contains(t.as_str()))
            })
            .collect();
        if sentences.is_empty() {
            Ok(context.trim().to_string())
        } else {
            Ok(sentences.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_store(dir: &Path) -> LocalKnowledgeStore {
        LocalKnowledgeStore::new(
            "test",
            dir,
            Arc::new(HashedEmbedding::default()),
            Arc::new(ExtractiveCompletion),
        )
    }

    #[test]
    fn test_query_mode_parse_and_default() {
        assert_eq!(QueryMode::default(), QueryMode::Mix);
        assert_eq!("NAIVE".parse::<QueryMode>().unwrap(), QueryMode::Naive);
        assert!("semantic".parse::<QueryMode>().is_err());
        assert_eq!(QueryParams::default().top_k, 5);
    }

    #[test]
    fn test_token_bucket_is_pinned_to_blake3() {
        // blake3("") starts af 13 49 b9 f5 f9 a1 a6.
        assert_eq!(token_bucket("", 256), 0xaf);
        assert_eq!(token_bucket("", 1 << 16), 0x13af);
        assert_eq!(token_bucket("barrier", 1), 0);
    }

    #[tokio::test]
    async fn test_hashed_embedding_is_reproducible() {
        let text = "Autocall barrier observed annually".to_string();
        let first = HashedEmbedding::default().embed(&[text.clone()]).await.unwrap();
        let second = HashedEmbedding::new(256).embed(&[text]).await.unwrap();
        assert_eq!(first, second);
        let norm: f32 = first[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_handles_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_insert_then_query_returns_matching_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = local_store(dir.path());
        store.initialize_storages().await.unwrap();
        store
            .insert_custom_chunks(
                "",
                &[
                    "The autocall barrier is observed annually.".to_string(),
                    "Dealer fees are disclosed separately.".to_string(),
                ],
            )
            .await
            .unwrap();

        let answer = store
            .query("autocall barrier", &QueryParams::default())
            .await
            .unwrap();
        assert!(answer.contains("autocall barrier"));
    }

    #[tokio::test]
    async fn test_chunks_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = local_store(dir.path());
            store
                .insert_custom_chunks("", &["Persisted clause.".to_string()])
                .await
                .unwrap();
        }
        let reloaded = local_store(dir.path());
        reloaded.initialize_storages().await.unwrap();
        assert_eq!(reloaded.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = local_store(dir.path());
        let answer = store
            .query("anything", &QueryParams::new(QueryMode::Naive, 3))
            .await
            .unwrap();
        assert_eq!(answer, NO_CONTEXT);
    }
}
