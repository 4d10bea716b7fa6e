//! End-to-end session flows against the in-memory service.

use std::sync::Arc;

use ingatini_client::MockRagService;
use ingatini_core::{
    ApiStatus, DocumentId, DocumentRef, IngatiniConfig, RemoteOperation, Role, UploadFile,
    ValidationError,
};
use ingatini_session::{Session, SessionError};

// =============================================================================
// Helpers
// =============================================================================

fn make_session() -> (Arc<MockRagService>, Session) {
    let mock = Arc::new(MockRagService::new());
    let session = Session::new(mock.clone(), &IngatiniConfig::default());
    (mock, session)
}

fn text_file(name: &str, len: usize) -> Option<UploadFile> {
    Some(UploadFile::new(name, vec![b'a'; len]))
}

fn contents(session: &Session) -> Vec<String> {
    session
        .transcript()
        .iter()
        .map(|t| t.content.clone())
        .collect()
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_refund_policy_exchange() {
    let (mock, mut session) = make_session();
    let alice = session.establish("alice").await.unwrap();
    mock.seed_document(
        &alice.id,
        DocumentRef {
            id: DocumentId::from("doc1"),
            chunk_count: 4,
            file_name: Some("policy.pdf".into()),
        },
    );
    // Re-establish to pick up the seeded document.
    session.establish("alice").await.unwrap();
    mock.answer("What is the refund policy?", "30 days.", &["doc1"]);

    let turn = session.ask("What is the refund policy?").await.unwrap();

    assert_eq!(turn.role, Role::Assistant);
    assert_eq!(turn.content, "30 days.");
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "What is the refund policy?");
    assert_eq!(
        transcript[1].evidence.as_ref().unwrap()[0].document_id,
        DocumentId::from("doc1")
    );

    let sent = mock.recorded_queries();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, alice.id);
    assert_eq!(sent[0].document_ids, Some(vec![DocumentId::from("doc1")]));
}

#[tokio::test]
async fn test_out_of_order_resolution_appends_in_resolution_order() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    mock.answer("Q1", "A1", &[]);
    mock.answer("Q2", "A2", &[]);
    let release_q1 = mock.hold("Q1");

    let d1 = session.submit("Q1").unwrap();
    let d2 = session.submit("Q2").unwrap();
    assert_eq!(session.orchestrator().pending_count(), 2);

    let service = session.service();
    let slow = {
        let service = session.service();
        tokio::spawn(async move { d1.run(service.as_ref()).await })
    };
    let fast = d2.run(service.as_ref()).await;
    session.resolve(fast).unwrap();
    assert!(session.orchestrator().is_awaiting_response());

    release_q1.send(()).unwrap();
    let late = slow.await.unwrap();
    session.resolve(late).unwrap();

    assert_eq!(contents(&session), vec!["Q1", "Q2", "A2", "A1"]);
    assert!(!session.orchestrator().is_awaiting_response());
}

#[tokio::test]
async fn test_evidence_truncated_to_three() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    mock.answer("q", "a", &["d1", "d2", "d3", "d4", "d5"]);

    let turn = session.ask("q").await.unwrap();

    let ids: Vec<DocumentId> = turn
        .evidence
        .unwrap()
        .into_iter()
        .map(|e| e.document_id)
        .collect();
    assert_eq!(
        ids,
        vec![
            DocumentId::from("d1"),
            DocumentId::from("d2"),
            DocumentId::from("d3")
        ]
    );
}

#[tokio::test]
async fn test_submit_without_identity_appends_nothing() {
    let (mock, mut session) = make_session();
    let err = session.submit("x").unwrap_err();
    assert_eq!(err, ValidationError::NoIdentity);
    assert!(session.transcript().is_empty());
    assert!(mock.recorded_queries().is_empty());
}

#[tokio::test]
async fn test_failed_query_sets_error_turn_and_flag() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    mock.fail(RemoteOperation::Query, 500, None);

    let turn = session.ask("q").await.unwrap();

    assert_eq!(turn.role, Role::Error);
    assert_eq!(turn.content, "Failed to get response");
    assert!(turn.evidence.is_none());
    assert_eq!(session.orchestrator().error(), Some("Failed to send query"));

    mock.recover(RemoteOperation::Query);
    session.ask("again").await.unwrap();
    assert!(session.orchestrator().error().is_none());
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn test_over_long_question_fails_remotely_after_user_turn() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    let question = "a".repeat(2001);

    let dispatch = session.submit(&question).unwrap();
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript()[0].role, Role::User);

    let service = session.service();
    let turn = session.resolve(dispatch.run(service.as_ref()).await).unwrap();

    assert_eq!(turn.role, Role::Error);
    assert_eq!(turn.content, "Failed to get response");
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.orchestrator().error(), Some("Failed to send query"));
    assert_eq!(mock.recorded_queries()[0].query_text.len(), 2001);
}

#[tokio::test]
async fn test_sign_out_drops_in_flight_exchange() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    let release = mock.hold("slow");
    let dispatch = session.submit("slow").unwrap();
    let handle = {
        let service = session.service();
        tokio::spawn(async move { dispatch.run(service.as_ref()).await })
    };

    session.sign_out();
    session.establish("bob").await.unwrap();
    release.send(()).unwrap();
    let late = handle.await.unwrap();

    assert!(matches!(
        session.resolve(late),
        Err(SessionError::UnknownRequest(_))
    ));
    assert!(session.transcript().is_empty());
}

// =============================================================================
// Documents
// =============================================================================

#[tokio::test]
async fn test_uploads_accumulate_and_scope_queries() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();

    let mut attached = Vec::new();
    for (i, name) in ["a.txt", "b.pdf", "a.txt"].iter().enumerate() {
        let doc = session.attach(text_file(name, 1500)).await.unwrap();
        assert_eq!(doc.chunk_count, 2);
        attached.push(doc.id);
        assert_eq!(session.scope().len(), i + 1);
    }

    session.ask("q").await.unwrap();
    assert_eq!(mock.recorded_queries()[0].document_ids, Some(attached));

    session.sign_out();
    assert!(session.scope().is_empty());

    session.establish("bob").await.unwrap();
    assert!(session.scope().is_empty());
    session.ask("q2").await.unwrap();
    assert_eq!(mock.recorded_queries()[1].document_ids, None);
}

#[tokio::test]
async fn test_upload_validation() {
    let (_, mut session) = make_session();
    let err = session.attach(text_file("a.txt", 10)).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(ValidationError::NoIdentity)));

    session.establish("alice").await.unwrap();
    let err = session.attach(None).await.unwrap_err();
    assert_eq!(err.to_string(), "Please select a file");
}

#[tokio::test]
async fn test_document_list_failure_degrades_silently() {
    let (mock, mut session) = make_session();
    mock.fail(RemoteOperation::ListDocuments, 500, Some("db down"));

    let identity = session.establish("alice").await.unwrap();

    assert_eq!(identity.display_name, "alice");
    assert!(session.scope().is_empty());
    assert!(session.history().error().is_none());
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_reload_is_idempotent() {
    let (_, mut session) = make_session();
    session.establish("alice").await.unwrap();
    session.ask("first").await.unwrap();
    session.ask("second").await.unwrap();

    let once = session.load_history().await.unwrap().to_vec();
    let twice = session.load_history().await.unwrap().to_vec();

    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);
    assert_eq!(once[0].query_text, "second");
}

#[tokio::test]
async fn test_history_failure_is_dismissible() {
    let (mock, mut session) = make_session();
    session.establish("alice").await.unwrap();
    session.ask("q").await.unwrap();
    session.load_history().await.unwrap();

    mock.fail(RemoteOperation::QueryHistory, 500, None);
    assert!(session.refresh_history().await.is_err());
    assert_eq!(session.history().entries().len(), 1);
    assert_eq!(
        session.history().error(),
        Some("Failed to load query history")
    );
    session.history_mut().dismiss_error();
    assert!(session.history().error().is_none());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_status_transitions() {
    let (mock, mut session) = make_session();
    assert_eq!(session.api_status(), ApiStatus::Checking);
    assert_eq!(session.probe_health().await, ApiStatus::Connected);
    assert_eq!(session.api_status().to_string(), "API Connected");

    mock.set_healthy(false);
    assert_eq!(session.probe_health().await, ApiStatus::Disconnected);
    assert_eq!(session.api_status().to_string(), "API Disconnected");
}
