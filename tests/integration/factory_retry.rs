use findoc::agent::registry::document_blueprint;
use findoc::agent::{AgentBlueprint, AgentSpec, CreationOutcome, DocumentKind, FinancialAgent, TemplateGenerationService};
use findoc::orchestrator::RequestOptions;
use findoc::OrchestratorError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::integration::support::offline_services;

/// Fails the first `failures` constructions, then builds a real agent.
fn flaky_blueprint(services: &findoc::Services, kind: DocumentKind, failures: u32) -> (AgentBlueprint, Arc<AtomicU32>) {
    let inner = document_blueprint(
        kind,
        services.knowledge.clone(),
        Arc::new(TemplateGenerationService::default()),
        None,
    );
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let build = inner.build.clone();
    let blueprint = AgentBlueprint::new(Arc::new(
        move |spec: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= failures {
                return Err(OrchestratorError::ConstructionFailed {
                    agent_type: spec.agent_type.clone(),
                    reason: format!("transient failure {}", attempt),
                });
            }
            build(spec)
        },
    ));
    (blueprint, attempts)
}

#[tokio::test]
async fn retry_recovers_from_transient_construction_failures() {
    let (_dir, services) = offline_services();
    let (blueprint, attempts) = flaky_blueprint(&services, DocumentKind::ProductSupplement, 2);
    services.registry.register_blueprint("pds", blueprint);

    let outcome = services
        .factory
        .try_create_agent_with_retry("pds", None, Some(3))
        .await;
    let CreationOutcome::Created(agent) = outcome else {
        panic!("expected an agent, got {:?}", outcome.reason());
    };
    assert_eq!(agent.agent_type(), "pds");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(services
        .factory
        .active_agent_types()
        .contains(&"product_supplement".to_string()));
}

#[tokio::test]
async fn retry_reports_last_failure_when_exhausted() {
    let (_dir, services) = offline_services();
    let (blueprint, attempts) = flaky_blueprint(&services, DocumentKind::ProductSupplement, 10);
    services.registry.register_blueprint("product_supplement", blueprint);

    let outcome = services
        .factory
        .try_create_agent_with_retry("product_supplement", None, Some(2))
        .await;
    match outcome {
        CreationOutcome::RetriesExhausted { attempts: n, last_reason, .. } => {
            assert_eq!(n, 2);
            assert!(last_reason.contains("transient failure 2"));
        }
        other => panic!("unexpected outcome: {:?}", other.reason()),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_type_is_not_retried() {
    let (_dir, services) = offline_services();
    let outcome = services
        .factory
        .try_create_agent_with_retry("term_sheet", None, Some(5))
        .await;
    assert!(matches!(outcome, CreationOutcome::NotFound { .. }));
}

#[tokio::test]
async fn recovered_agent_serves_requests() {
    let (_dir, services) = offline_services();
    let (blueprint, _) = flaky_blueprint(&services, DocumentKind::ProductSupplement, 1);
    services.registry.register_blueprint("pds", blueprint);

    let options = RequestOptions {
        agents: vec!["pds".to_string()],
        ..RequestOptions::default()
    };
    let first = services
        .global_agent
        .process_request("Prepare a product supplement", options.clone())
        .await;
    assert!(!first.success);

    let second = services
        .global_agent
        .process_request("Prepare a product supplement", options)
        .await;
    assert!(second.success, "{}", second.message);
    assert_eq!(
        second.primary_result.unwrap().metadata.agent_impl,
        "PDSAgent"
    );
}
