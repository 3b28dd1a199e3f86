//! Service wiring.
//!
//! Builds every long-lived service once from a [`FindocConfig`]. Both the CLI
//! and the integration tests go through here, so there is a single place that
//! decides which backends the knowledge stores and agents talk to.

use crate::agent::factory::AgentFactory;
use crate::agent::generation::{GenerationService, TemplateGenerationService};
use crate::agent::registry::AgentRegistry;
use crate::config::{FindocConfig, ProviderKind};
use crate::conversation::ConversationManager;
use crate::error::OrchestratorError;
use crate::knowledge::store::{
    CompletionService, EmbeddingService, ExtractiveCompletion, HashedEmbedding, LocalStoreBuilder,
};
use crate::knowledge::{KnowledgeManager, KnowledgeUpdater};
use crate::monitor::AgentMonitor;
use crate::orchestrator::GlobalAgent;
use crate::provider::{OpenAiClient, OpenAiCompletion, OpenAiEmbedding, OpenAiGenerationService};
use crate::router::SmartAgentRouter;
use std::sync::Arc;
use std::time::Duration;

/// Backends chosen by `generation.provider`.
struct Backends {
    embedding: Arc<dyn EmbeddingService>,
    completion: Arc<dyn CompletionService>,
    generation: Arc<dyn GenerationService>,
}

fn build_backends(config: &FindocConfig) -> Result<Backends, OrchestratorError> {
    let max_tool_calls = config.generation.max_tool_calls_per_run as usize;
    match config.generation.provider {
        ProviderKind::Offline => Ok(Backends {
            embedding: Arc::new(HashedEmbedding::default()),
            completion: Arc::new(ExtractiveCompletion),
            generation: Arc::new(TemplateGenerationService::new(max_tool_calls)),
        }),
        ProviderKind::OpenAi => {
            let timeout = Duration::from_secs(config.generation.timeout_seconds);
            let client = Arc::new(OpenAiClient::new(&config.openai, timeout)?);
            Ok(Backends {
                embedding: Arc::new(OpenAiEmbedding::new(
                    client.clone(),
                    config.openai.embedding_model.clone(),
                )),
                completion: Arc::new(OpenAiCompletion::new(
                    client.clone(),
                    config.openai.completion_model.clone(),
                )),
                generation: Arc::new(OpenAiGenerationService::new(client, max_tool_calls)),
            })
        }
    }
}

pub struct Services {
    pub config: FindocConfig,
    pub knowledge: Arc<KnowledgeManager>,
    pub registry: Arc<AgentRegistry>,
    pub factory: Arc<AgentFactory>,
    pub monitor: Arc<AgentMonitor>,
    pub conversations: Arc<ConversationManager>,
    pub updater: Arc<KnowledgeUpdater>,
    pub global_agent: Arc<GlobalAgent>,
}

impl Services {
    /// Validate the config and wire every service. Nothing is started: the
    /// monitor loop runs only after [`AgentMonitor::start_monitoring`].
    pub fn bootstrap(config: FindocConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let backends = build_backends(&config)?;
        let request_timeout = config.generation.request_timeout_secs.map(Duration::from_secs);

        let knowledge = Arc::new(
            KnowledgeManager::new(
                config.paths.clone(),
                backends.embedding,
                backends.completion,
                Arc::new(LocalStoreBuilder),
            )
            .with_request_timeout(request_timeout),
        );

        let registry = Arc::new(AgentRegistry::new(
            &config.paths,
            &config.generation.default_model,
        ));
        registry.install_default_blueprints(knowledge.clone(), backends.generation, request_timeout);

        let factory = Arc::new(AgentFactory::new(registry.clone(), config.factory.clone()));
        let monitor = Arc::new(AgentMonitor::new(
            registry.clone(),
            factory.clone(),
            config.monitor.clone(),
        ));
        let conversations = Arc::new(ConversationManager::new(
            config.paths.conversation_storage.clone(),
        ));
        let updater = Arc::new(KnowledgeUpdater::new(knowledge.clone()));
        let global_agent = Arc::new(GlobalAgent::new(
            SmartAgentRouter::new(),
            factory.clone(),
            conversations.clone(),
            updater.clone(),
        ));

        tracing::info!(
            provider = ?config.generation.provider,
            agents = registry.list_agent_types().len(),
            "Services initialized"
        );

        Ok(Self {
            config,
            knowledge,
            registry,
            factory,
            monitor,
            conversations,
            updater,
            global_agent,
        })
    }

    /// Stop the monitor loop and drop cached agents and stores.
    pub fn shutdown(&self) {
        self.monitor.stop_monitoring();
        self.factory.cleanup_all_agents();
        self.knowledge.cleanup();
    }
}
