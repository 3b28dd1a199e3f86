use findoc::knowledge::QueryParams;
use findoc::orchestrator::{ConversationState, FeedbackType, RequestOptions};
use serde_json::json;

use crate::integration::support::{offline_services, ISM_REQUEST};

#[tokio::test]
async fn inserted_knowledge_reaches_generated_document() {
    let (_dir, services) = offline_services();
    let inserted = services
        .knowledge
        .insert_document(
            "ism",
            "Investor summary guidance: Zephyrine principal protection applies at maturity.",
        )
        .await;
    assert!(inserted.success, "{}", inserted.message);

    let response = services
        .global_agent
        .process_request(ISM_REQUEST, RequestOptions::default())
        .await;
    assert!(response.success, "{}", response.message);

    let primary = response.primary_result.unwrap();
    assert_eq!(primary.agent_type, "investor_summary");
    assert_eq!(primary.metadata.agent_impl, "ISMAgent");
    let document = primary.output.unwrap().to_string();
    assert!(document.contains("Zephyrine"));
}

#[tokio::test]
async fn knowledge_persists_across_bootstraps() {
    let (dir, services) = offline_services();
    services
        .knowledge
        .insert_document("bsp", "Shelf program limits are set by the issuer board.")
        .await;
    let config = services.config.clone();
    drop(services);

    let reopened = findoc::Services::bootstrap(config).unwrap();
    let answer = reopened
        .knowledge
        .query_domain("base_shelf_prospectus", "shelf program limits", QueryParams::default())
        .await
        .unwrap();
    assert!(answer.contains("issuer board"));
    drop(dir);
}

#[tokio::test]
async fn short_and_long_domain_names_keep_both_documents() {
    let (dir, services) = offline_services();
    let first = services
        .knowledge
        .insert_document("ism", "Alpha clause: Zephyrine coupon applies.")
        .await;
    let second = services
        .knowledge
        .insert_document("investor_summary", "Beta clause: Quorvex barrier applies.")
        .await;
    assert!(first.success && second.success);
    assert_eq!(services.knowledge.list_domains(), vec!["investor_summary".to_string()]);
    let config = services.config.clone();
    drop(services);

    let reopened = findoc::Services::bootstrap(config).unwrap();
    for (domain, word) in [("ism", "Zephyrine"), ("investor_summary", "Quorvex")] {
        let answer = reopened
            .knowledge
            .query_domain(domain, word, QueryParams::default())
            .await
            .unwrap();
        assert!(answer.contains(word), "{domain}: {answer}");
    }
    drop(dir);
}

#[tokio::test]
async fn approved_knowledge_update_is_applied_to_target_store() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let session_id = agent
        .process_request(ISM_REQUEST, RequestOptions::default())
        .await
        .session_id;

    let response = agent
        .handle_feedback(
            &session_id,
            "Investor summary note: Quorvex barrier is observed daily.",
            FeedbackType::KnowledgeUpdate,
            Some("ism"),
            "high",
        )
        .await;
    assert!(response.success);
    assert_eq!(response.conversation_state, ConversationState::AwaitingFeedback);

    let pending = agent.get_knowledge_update_summary(&session_id).unwrap();
    assert_eq!(pending.pending_updates, 1);

    let applied = agent
        .apply_pending_knowledge_updates(&session_id, "compliance_officer")
        .await;
    assert_eq!(applied.len(), 1);
    assert!(applied[0].success, "{}", applied[0].message);
    assert_eq!(applied[0].target_agent, "ism");
    assert_eq!(
        agent.get_knowledge_update_summary(&session_id).unwrap().pending_updates,
        0
    );
    assert_eq!(
        agent.get_session_state(&session_id),
        Some(ConversationState::AwaitingFeedback)
    );

    let answer = services
        .knowledge
        .query_domain("ism", "investor summary barrier", QueryParams::default())
        .await
        .unwrap();
    assert!(answer.contains("Quorvex"));
}

#[tokio::test]
async fn invalid_update_request_is_reported_not_raised() {
    let (_dir, services) = offline_services();
    let result = services
        .updater
        .apply_update(&json!({"action": "delete", "domain": "ism", "content": "x"}))
        .await;
    assert!(!result.success);
    assert_eq!(
        result.message,
        "Action 'delete' is not supported. Only 'insert' is allowed."
    );
}
