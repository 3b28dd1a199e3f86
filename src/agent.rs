//! Document Agents
//!
//! The agent contract, the four document kinds built on it, and the registry
//! and factory that own agent construction and lifecycle.

pub mod base;
pub mod factory;
pub mod generation;
pub mod input;
pub mod kind;
pub mod large_text;
pub mod profiles;
pub mod registry;
pub mod templates;
pub mod tools;

pub use base::{AgentConfig, AgentSpec, DocumentAgent, FinancialAgent, HistoryMessage};
pub use factory::{
    ActiveAgentRecord, AgentFactory, AgentFactoryConfig, AgentHandle, CreationOutcome,
};
pub use generation::{GenerationService, TemplateGenerationService};
pub use kind::{normalize_agent_type, short_agent_type, DocumentKind};
pub use large_text::{DocumentSection, LargeTextAgent, LargeTextOptions, TemplateVariables};
pub use registry::{AgentBlueprint, AgentCapability, AgentMetadata, AgentRegistry, AgentStatus};
