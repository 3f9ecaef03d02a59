use std::sync::Arc;

use tokio::sync::Semaphore;

use super::common::*;
use crate::assessment::levels::SustainabilityTier;
use crate::assessment::session::{
    AssessmentSession, FinalizeBlocker, SessionError, SessionPhase,
};
use crate::assessment::structure::{IndicatorId, ResponseLevelId};
use crate::storage::keys;
use crate::storage::ResultStore;

async fn fully_answered_session(
    backend: Arc<StubBackend>,
    store: Arc<MemoryStore>,
) -> AssessmentSession<StubBackend, MemoryStore> {
    let mut session = AssessmentSession::open(backend, store, 1)
        .await
        .expect("assessment opens");
    session
        .select_segment(tourist_segment())
        .await
        .expect("segment selects");

    for (indicator, level) in [(11u32, 1102u32), (12, 1202)] {
        session
            .record_response(IndicatorId(indicator), ResponseLevelId(level))
            .expect("answer records");
    }
    session.next_chapter().expect("advance to last chapter");
    for (indicator, level) in [(21u32, 2102u32), (22, 2202)] {
        session
            .record_response(IndicatorId(indicator), ResponseLevelId(level))
            .expect("answer records");
    }
    session
}

#[tokio::test]
async fn finalize_requires_last_chapter_and_all_answers() {
    let backend = Arc::new(StubBackend::new());
    let mut session = AssessmentSession::open(backend, Arc::new(MemoryStore::default()), 1)
        .await
        .expect("assessment opens");
    session
        .select_segment(tourist_segment())
        .await
        .expect("segment selects");

    // First chapter: not the last, finalize refused.
    assert!(!session.can_finalize());
    match session.finalize().await {
        Err(SessionError::NotReadyToFinalize {
            blocker: FinalizeBlocker::NotAtLastChapter,
        }) => {}
        other => panic!("expected not-at-last-chapter refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn finalize_computes_persists_and_completes() {
    let backend = Arc::new(StubBackend::new());
    let store = Arc::new(MemoryStore::default());
    let mut session = fully_answered_session(backend.clone(), store.clone()).await;
    wait_for_saves(&session).await;

    assert!(session.can_finalize());
    let result = session.finalize().await.expect("finalize succeeds");

    assert_eq!(result.total_score, 40);
    assert_eq!(result.max_score, 40);
    assert_eq!(result.percentage, 100);
    // 40 points against the tourist-winery table (94/113 cut-offs).
    assert_eq!(result.tier, SustainabilityTier::Minimum);
    assert_eq!(result.chapters.len(), 3);
    assert_eq!(result.chapters[2].indicators_total, 0);

    assert_eq!(session.phase(), SessionPhase::Completed);
    assert_eq!(backend.completions(), vec![session.id()]);

    let stored = store.load(keys::LOCAL_HISTORY).expect("history persisted");
    let entries = stored.as_array().expect("history is an array");
    assert_eq!(entries.len(), 1);
    assert!(store.load(keys::CURRENT_ASSESSMENT).is_none());
}

#[tokio::test]
async fn backend_finalize_failure_does_not_block_local_result() {
    let mut backend = StubBackend::new();
    backend.fail_complete = true;
    let backend = Arc::new(backend);
    let store = Arc::new(MemoryStore::default());

    let mut session = fully_answered_session(backend.clone(), store.clone()).await;
    wait_for_saves(&session).await;

    let result = session.finalize().await.expect("local finalize succeeds");
    assert_eq!(result.percentage, 100);
    assert_eq!(session.phase(), SessionPhase::Completed);
    assert!(backend.completions().is_empty());
    assert!(store.load(keys::LOCAL_HISTORY).is_some());
}

#[tokio::test]
async fn finalize_waits_for_in_flight_saves() {
    let gate = Arc::new(Semaphore::new(0));
    let mut backend = StubBackend::new();
    backend.save_gate = Some(gate.clone());
    let backend = Arc::new(backend);

    let mut session = fully_answered_session(backend, Arc::new(MemoryStore::default())).await;

    // Every save is still held open by the gate.
    assert!(session.is_saving());
    assert!(!session.can_finalize());
    match session.finalize().await {
        Err(SessionError::NotReadyToFinalize {
            blocker: FinalizeBlocker::SavesInFlight,
        }) => {}
        other => panic!("expected saves-in-flight refusal, got {other:?}"),
    }

    gate.add_permits(4);
    wait_for_saves(&session).await;

    assert!(session.can_finalize());
    session.finalize().await.expect("finalize succeeds");
}

#[tokio::test]
async fn unanswered_indicator_blocks_finalize_on_last_chapter() {
    let backend = Arc::new(StubBackend::new());
    let mut session = AssessmentSession::open(backend, Arc::new(MemoryStore::default()), 1)
        .await
        .expect("assessment opens");
    session
        .select_segment(tourist_segment())
        .await
        .expect("segment selects");

    session
        .record_response(IndicatorId(11), ResponseLevelId(1102))
        .expect("answer records");
    session
        .record_response(IndicatorId(12), ResponseLevelId(1202))
        .expect("answer records");
    session.next_chapter().expect("advance to last chapter");
    session
        .record_response(IndicatorId(21), ResponseLevelId(2102))
        .expect("answer records");
    wait_for_saves(&session).await;

    match session.finalize().await {
        Err(SessionError::NotReadyToFinalize {
            blocker: FinalizeBlocker::Unanswered(1),
        }) => {}
        other => panic!("expected unanswered refusal, got {other:?}"),
    }
}
