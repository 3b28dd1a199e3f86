use findoc::orchestrator::{ConversationState, FeedbackType, RequestOptions};
use std::sync::Arc;

use crate::integration::support::{offline_services, ISM_REQUEST};

#[tokio::test]
async fn cleanup_removes_only_the_target_session() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let a = agent.process_request(ISM_REQUEST, RequestOptions::default()).await.session_id;
    let b = agent
        .process_request("Draft a pricing supplement term sheet", RequestOptions::default())
        .await
        .session_id;
    assert_ne!(a, b);

    assert!(agent.cleanup_session(&a));
    assert!(agent.get_session_state(&a).is_none());
    assert!(agent.get_session_info(&a).is_none());
    assert!(!agent.cleanup_session(&a));

    assert_eq!(agent.get_session_state(&b), Some(ConversationState::AwaitingFeedback));
    assert_eq!(agent.get_conversation_history(&b, None).len(), 1);
}

#[tokio::test]
async fn feedback_in_one_session_does_not_touch_another() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let a = agent.process_request(ISM_REQUEST, RequestOptions::default()).await.session_id;
    let b = agent.process_request(ISM_REQUEST, RequestOptions::default()).await.session_id;
    let b_updated_before = agent.get_session_info(&b).unwrap().updated_at;

    agent
        .handle_feedback(&a, "Approved", FeedbackType::Approval, None, "medium")
        .await;

    assert_eq!(agent.get_session_state(&a), Some(ConversationState::Completed));
    assert_eq!(agent.get_session_state(&b), Some(ConversationState::AwaitingFeedback));
    assert_eq!(agent.get_feedback_summary(&b).unwrap().total_feedback, 0);
    assert_eq!(agent.get_session_info(&b).unwrap().updated_at, b_updated_before);
}

#[tokio::test]
async fn caller_supplied_session_id_is_reused() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let first = agent
        .process_request(ISM_REQUEST, RequestOptions::in_session("desk-42"))
        .await;
    assert_eq!(first.session_id, "desk-42");
    let second = agent
        .process_request("Add a term sheet", RequestOptions::in_session("desk-42"))
        .await;
    assert_eq!(second.session_id, "desk-42");

    let info = agent.get_session_info("desk-42").unwrap();
    assert_eq!(info.title.as_deref(), Some("Document Generation Session desk-42"));
    assert_eq!(agent.get_conversation_history("desk-42", None).len(), 2);
    assert_eq!(agent.get_conversation_statistics().counters.total_conversations, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_independent_sessions() {
    let (_dir, services) = offline_services();
    let agent = Arc::clone(&services.global_agent);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                agent
                    .process_request(ISM_REQUEST, RequestOptions::default())
                    .await
                    .session_id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    for id in &ids {
        assert_eq!(agent.get_conversation_history(id, None).len(), 1);
    }
}

#[tokio::test]
async fn audit_trail_is_scoped_per_session() {
    let (_dir, services) = offline_services();
    let agent = &services.global_agent;
    let a = agent.process_request(ISM_REQUEST, RequestOptions::default()).await.session_id;
    let _b = agent.process_request(ISM_REQUEST, RequestOptions::default()).await.session_id;

    let trail = agent.get_audit_trail(Some(&a), 1);
    assert!(!trail.is_empty());
    assert!(trail.iter().all(|entry| entry.session_id == a));
    assert!(agent.get_audit_trail(None, 1).len() > trail.len());
}
