//! Integration tests for multi-agent document orchestration

mod factory_retry;
mod feedback_flow;
mod knowledge_flow;
mod monitor_metrics;
mod router_scenarios;
mod session_isolation;
mod support;
