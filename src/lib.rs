//! Findoc: Multi-Agent Financial Document Orchestration
//!
//! Generates structured financial legal documents (investor summaries, base
//! shelf prospectuses, product supplements, pricing supplements) by routing
//! free-text requests to specialized agents that draw on per-domain knowledge
//! stores. A registry and factory own agent lifecycles, a background monitor
//! tracks their health, and a global agent manages sessions and feedback.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod knowledge;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod provider;
pub mod router;
pub mod services;
pub mod tooling;

pub use agent::{DocumentKind, FinancialAgent};
pub use config::{ConfigLoader, FindocConfig};
pub use error::OrchestratorError;
pub use knowledge::{KnowledgeManager, OperationResult};
pub use orchestrator::GlobalAgent;
pub use services::Services;
