use findoc::agent::{AgentBlueprint, AgentSpec, FinancialAgent};
use findoc::monitor::{Alert, AlertLevel, MonitorStatus};
use findoc::orchestrator::RequestOptions;
use findoc::OrchestratorError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::integration::support::{offline_services, ISM_REQUEST};

fn failing_blueprint() -> AgentBlueprint {
    AgentBlueprint::new(Arc::new(
        |spec: &AgentSpec| -> Result<Arc<dyn FinancialAgent>, OrchestratorError> {
            Err(OrchestratorError::ConstructionFailed {
                agent_type: spec.agent_type.clone(),
                reason: "provider credentials missing".to_string(),
            })
        },
    ))
}

#[tokio::test]
async fn health_check_sees_knowledge_store_after_generation() {
    let (_dir, services) = offline_services();
    let before = services.monitor.run_health_check("investor_summary");
    assert_eq!(before.details["knowledge_status"], json!("available"));

    services
        .global_agent
        .process_request(ISM_REQUEST, RequestOptions::default())
        .await;

    let after = services.monitor.run_health_check("investor_summary");
    assert_eq!(after.status, MonitorStatus::Healthy);
    assert_eq!(after.details["knowledge_status"], json!("initialized"));
}

#[test]
fn success_rate_tracks_mixed_outcomes() {
    let (_dir, services) = offline_services();
    let monitor = &services.monitor;
    assert_eq!(monitor.run_health_check("pricing_supplement").status, MonitorStatus::Healthy);

    services.registry.register_blueprint("prs", failing_blueprint());
    assert_eq!(monitor.run_health_check("pricing_supplement").status, MonitorStatus::Critical);

    let metrics = monitor.get_agent_performance("pricing_supplement").unwrap();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.error_count, 1);
    assert!((metrics.success_rate - 0.5).abs() < 1e-9);

    let summary = monitor.get_monitoring_summary();
    assert_eq!(summary.health_status["pricing_supplement"], MonitorStatus::Critical);
    assert_eq!(summary.recent_alerts, 1);
}

#[test]
fn alert_callbacks_fire_once_per_alert_until_removed() {
    let (_dir, services) = offline_services();
    let monitor = &services.monitor;
    services.registry.register_blueprint("bsp", failing_blueprint());

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let id = monitor.add_alert_callback(Arc::new(move |alert: &Alert| {
        assert_eq!(alert.level, AlertLevel::Critical);
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    monitor.run_health_check("base_shelf_prospectus");
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    assert!(monitor.remove_alert_callback(id));
    monitor.run_health_check("base_shelf_prospectus");
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.get_alerts(Some(AlertLevel::Critical), 1).len(), 2);
}

#[tokio::test]
async fn unavailable_agent_fails_request_without_error_state() {
    let (_dir, services) = offline_services();
    services.registry.register_blueprint("prs", failing_blueprint());

    let options = RequestOptions {
        agents: vec!["pricing_supplement".to_string()],
        ..RequestOptions::default()
    };
    let response = services.global_agent.process_request(ISM_REQUEST, options).await;
    assert!(!response.success);
    assert_eq!(
        response.message,
        "Failed to generate PRICING_SUPPLEMENT document: Agent pricing_supplement not available"
    );
    assert_eq!(
        response.next_actions[..2],
        ["Check agent availability and configuration", "Verify input data completeness"]
    );
}
