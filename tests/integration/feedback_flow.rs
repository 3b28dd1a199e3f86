use findoc::orchestrator::{ConversationState, FeedbackType, RequestOptions};

use crate::integration::support::{offline_services, ISM_REQUEST};

#[tokio::test]
async fn approval_completes_session() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let first = agent.process_request(ISM_REQUEST, RequestOptions::default()).await;
    assert_eq!(first.conversation_state, ConversationState::AwaitingFeedback);

    let approved = agent
        .handle_feedback(&first.session_id, "Looks good", FeedbackType::Approval, None, "medium")
        .await;
    assert!(approved.success);
    assert_eq!(approved.conversation_state, ConversationState::Completed);
    assert_eq!(approved.next_actions, vec!["Download final document", "Archive session"]);
    assert_eq!(
        agent.get_session_state(&first.session_id),
        Some(ConversationState::Completed)
    );

    let summary = agent.get_feedback_summary(&first.session_id).unwrap();
    assert_eq!(summary.total_feedback, 1);
    assert_eq!(summary.pending_feedback, 0);
    assert_eq!(summary.feedback_by_status["approved"], 1);
}

#[tokio::test]
async fn rejection_regenerates_with_feedback_appended() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let session_id = agent
        .process_request(ISM_REQUEST, RequestOptions::default())
        .await
        .session_id;

    let response = agent
        .handle_feedback(&session_id, "Too technical", FeedbackType::Rejection, None, "high")
        .await;
    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Document regenerated based on feedback: Too technical");
    assert_eq!(response.conversation_state, ConversationState::AwaitingFeedback);
    assert_eq!(
        response.primary_result.as_ref().map(|r| r.agent_type.as_str()),
        Some("investor_summary")
    );

    let history = agent.get_conversation_history(&session_id, None);
    let types: Vec<&str> = history.iter().map(|m| m.message_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["request", "feedback_received", "rejection_processed", "document_regenerated"]
    );
}

#[tokio::test]
async fn clarification_keeps_session_awaiting_feedback() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let session_id = agent
        .process_request(ISM_REQUEST, RequestOptions::default())
        .await
        .session_id;

    let response = agent
        .handle_feedback(
            &session_id,
            "What tenor should be used?",
            FeedbackType::ClarificationRequest,
            None,
            "low",
        )
        .await;
    assert!(response.success);
    assert_eq!(
        response.message,
        "Clarification requested: What tenor should be used?. Please provide additional details."
    );
    assert_eq!(
        agent.get_session_state(&session_id),
        Some(ConversationState::AwaitingFeedback)
    );
}

#[tokio::test]
async fn feedback_for_unknown_session_is_an_error_response() {
    let (_dir, services) = offline_services();
    let response = services
        .global_agent
        .handle_feedback("missing", "hello", FeedbackType::Approval, None, "medium")
        .await;
    assert!(!response.success);
    assert_eq!(response.message, "Session missing not found");
    assert_eq!(response.conversation_state, ConversationState::Error);
}

#[tokio::test]
async fn explicit_agents_override_routing() {
    let (_dir, services) = offline_services();
    let options = RequestOptions {
        agents: vec!["prs".to_string(), "bsp".to_string()],
        ..RequestOptions::default()
    };
    let response = services.global_agent.process_request(ISM_REQUEST, options).await;
    assert!(response.success, "{}", response.message);
    assert_eq!(
        response.primary_result.unwrap().agent_type,
        "pricing_supplement"
    );
    assert_eq!(response.secondary_results.len(), 1);
    assert_eq!(response.secondary_results[0].agent_type, "base_shelf_prospectus");
    let aggregated = response.aggregated_content.unwrap();
    assert_eq!(aggregated.total_agents, 2);
}

#[tokio::test]
async fn invalid_explicit_agents_fail_the_request() {
    let (_dir, services) = offline_services();
    let options = RequestOptions {
        agents: vec!["xyz".to_string()],
        ..RequestOptions::default()
    };
    let response = services.global_agent.process_request(ISM_REQUEST, options).await;
    assert!(!response.success);
    assert_eq!(response.conversation_state, ConversationState::Error);
    assert!(response
        .message
        .starts_with("Error processing request: No valid agents provided."));
}

#[tokio::test]
async fn large_text_mode_returns_sections() {
    let (_dir, services) = offline_services();
    let options = RequestOptions {
        use_large_text_templates: true,
        enforce_placeholder_validation: false,
        ..RequestOptions::default()
    };
    let response = services.global_agent.process_request(ISM_REQUEST, options).await;
    assert!(response.success, "{}", response.message);
    let primary = response.primary_result.unwrap();
    assert_eq!(primary.metadata.agent_impl, "LargeTextISMAgent");
    let sections = primary.output.unwrap()["sections"].as_array().unwrap().len();
    assert!(sections > 0);
}
