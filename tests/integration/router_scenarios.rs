use findoc::agent::DocumentKind;
use findoc::orchestrator::RequestOptions;
use std::collections::BTreeSet;

use crate::integration::support::{offline_services, ISM_REQUEST};

const SHELF_REQUEST: &str = "Need an investor summary for the autocallable structured note and a base shelf prospectus under the shelf program with a shelf filing";

#[tokio::test]
async fn routed_secondary_agents_run_after_primary() {
    let (_dir, services) = offline_services();
    let response = services
        .global_agent
        .process_request(SHELF_REQUEST, RequestOptions::default())
        .await;

    let primary = response.primary_result.expect("primary result");
    assert_eq!(primary.agent_type, "base_shelf_prospectus");
    assert_eq!(response.secondary_results.len(), 1);
    assert_eq!(response.secondary_results[0].agent_type, "investor_summary");

    let aggregated = response.aggregated_content.expect("aggregated content");
    assert_eq!(aggregated.primary_agent, "base_shelf_prospectus");
    assert_eq!(aggregated.secondary_agents, vec!["investor_summary".to_string()]);
    assert!(response.reasoning.contains("Additional agents needed: INVESTOR_SUMMARY"));
}

#[tokio::test]
async fn run_all_executes_every_agent_with_routed_primary_first() {
    let (_dir, services) = offline_services();
    let options = RequestOptions {
        run_all: true,
        ..RequestOptions::default()
    };
    let response = services.global_agent.process_request(ISM_REQUEST, options).await;

    assert_eq!(
        response.primary_result.as_ref().map(|r| r.agent_type.as_str()),
        Some("investor_summary")
    );
    let secondary: BTreeSet<&str> = response
        .secondary_results
        .iter()
        .map(|r| r.agent_type.as_str())
        .collect();
    assert_eq!(
        secondary,
        BTreeSet::from(["base_shelf_prospectus", "pricing_supplement", "product_supplement"])
    );
    assert_eq!(response.aggregated_content.unwrap().total_agents, 4);
}

#[tokio::test]
async fn routing_decision_is_recorded_with_the_request() {
    let (_dir, services) = offline_services();
    let request = "Create an investor summary issued by Acme Bank on the S&P 500 with $1,000,000 USD principal";
    let response = services
        .global_agent
        .process_request(request, RequestOptions::default())
        .await;

    let expected = services.global_agent.router().analyze_request(request);
    assert_eq!(response.confidence_score, expected.confidence_score);

    let record = services
        .global_agent
        .get_session_record(&response.session_id)
        .expect("session record");
    assert_eq!(record.routing_decision.primary_agent, DocumentKind::InvestorSummary);
    assert_eq!(
        record.routing_decision.extracted_data.get("issuer").and_then(|v| v.as_str()),
        Some("Acme Bank")
    );

    let requests = services
        .conversations
        .get_conversation_history(&response.session_id, None, &["request"]);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content, request);
    assert_eq!(
        requests[0].metadata["routing_decision"]["primary_agent"],
        serde_json::json!("investor_summary")
    );
}

#[tokio::test]
async fn unmatched_request_falls_back_to_investor_summary() {
    let (_dir, services) = offline_services();
    let response = services
        .global_agent
        .process_request("hello there", RequestOptions::default())
        .await;
    assert_eq!(response.confidence_score, 0.0);
    assert_eq!(
        response.primary_result.map(|r| r.agent_type),
        Some("investor_summary".to_string())
    );
    assert!(response.secondary_results.is_empty());
}

#[test]
fn direct_routing_accepts_short_and_long_names() {
    let (_dir, services) = offline_services();
    let router = services.global_agent.router();

    let short = router.route_request("bsp", "generate_document").unwrap();
    assert_eq!(short.agent_type, "bsp");
    assert_eq!(short.capability.agent_type, DocumentKind::BaseShelfProspectus);
    assert!(short.supported);

    let long = router
        .route_request("pricing_supplement", "generate_document")
        .unwrap();
    assert_eq!(long.capability.agent_type, DocumentKind::PricingSupplement);

    assert!(router.route_request("term_sheet", "generate_document").is_none());
}
