use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::assessment::responses::SavedResponse;
use crate::assessment::structure::{
    AssessmentId, AssessmentStructure, Chapter, ChapterId, ChapterStructure, Indicator,
    IndicatorEntry, IndicatorId, ResponseLevel, ResponseLevelId, Segment, SegmentId,
};
use crate::backend::{AssessmentBackend, AssessmentSummary, BackendError, OpenedAssessment};
use crate::storage::{ResultStore, StorageError};

pub(super) fn level(id: u32, points: u32) -> ResponseLevel {
    ResponseLevel {
        id: ResponseLevelId(id),
        name: format!("Nivel {points}"),
        description: None,
        points,
    }
}

pub(super) fn indicator(id: u32, enabled: bool) -> IndicatorEntry {
    IndicatorEntry {
        indicator: Indicator {
            id: IndicatorId(id),
            name: format!("Indicador {id}"),
            description: None,
        },
        enabled,
        levels: vec![
            level(id * 100, 0),
            level(id * 100 + 1, 5),
            level(id * 100 + 2, 10),
        ],
    }
}

pub(super) fn chapter(id: u32, indicators: Vec<IndicatorEntry>) -> ChapterStructure {
    ChapterStructure {
        chapter: Chapter {
            id: ChapterId(id),
            name: format!("Capítulo {id}"),
            description: None,
        },
        indicators,
    }
}

/// Two answerable chapters with two enabled indicators each, plus a
/// trailing chapter whose indicators are all disabled for the segment.
pub(super) fn sample_structure() -> AssessmentStructure {
    AssessmentStructure {
        chapters: vec![
            chapter(1, vec![indicator(11, true), indicator(12, true)]),
            chapter(2, vec![indicator(21, true), indicator(22, true)]),
            chapter(3, vec![indicator(31, false)]),
        ],
    }
}

pub(super) fn tourist_segment() -> Segment {
    Segment {
        id: SegmentId(4),
        name: "Bodega Turística".to_string(),
        min_visitors: Some(5000),
        max_visitors: Some(20000),
    }
}

#[derive(Debug, Clone)]
pub(super) struct RecordedSave {
    pub(super) version: u64,
    pub(super) snapshot: Vec<SavedResponse>,
}

/// In-memory backend double. Saves can be held open through `save_gate`
/// so tests can observe the in-flight counter.
pub(super) struct StubBackend {
    pub(super) structure: AssessmentStructure,
    pub(super) segments: Vec<Segment>,
    pub(super) pending: Mutex<Option<OpenedAssessment>>,
    pub(super) next_id: AtomicU64,
    pub(super) saves: Mutex<Vec<RecordedSave>>,
    pub(super) completions: Mutex<Vec<AssessmentId>>,
    pub(super) cancellations: Mutex<Vec<AssessmentId>>,
    pub(super) fail_complete: bool,
    pub(super) fail_structure: bool,
    pub(super) fail_open: AtomicBool,
    pub(super) save_gate: Option<Arc<Semaphore>>,
}

impl StubBackend {
    pub(super) fn new() -> Self {
        Self {
            structure: sample_structure(),
            segments: vec![tourist_segment()],
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
            saves: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            fail_complete: false,
            fail_structure: false,
            fail_open: AtomicBool::new(false),
            save_gate: None,
        }
    }

    pub(super) fn recorded_saves(&self) -> Vec<RecordedSave> {
        self.saves.lock().expect("saves mutex poisoned").clone()
    }

    pub(super) fn completions(&self) -> Vec<AssessmentId> {
        self.completions
            .lock()
            .expect("completions mutex poisoned")
            .clone()
    }

    pub(super) fn cancellations(&self) -> Vec<AssessmentId> {
        self.cancellations
            .lock()
            .expect("cancellations mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl AssessmentBackend for StubBackend {
    async fn open_assessment(&self, _business: u64) -> Result<OpenedAssessment, BackendError> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(BackendError::Connection);
        }
        if let Some(pending) = self.pending.lock().expect("pending mutex poisoned").take() {
            return Ok(pending);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(OpenedAssessment {
            id: AssessmentId(id),
            resumed: false,
            segment: None,
            saved_responses: Vec::new(),
        })
    }

    async fn segments(&self, _assessment: AssessmentId) -> Result<Vec<Segment>, BackendError> {
        Ok(self.segments.clone())
    }

    async fn select_segment(
        &self,
        _assessment: AssessmentId,
        _segment: SegmentId,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn structure(
        &self,
        _assessment: AssessmentId,
    ) -> Result<AssessmentStructure, BackendError> {
        if self.fail_structure {
            return Err(BackendError::Status {
                status: 500,
                message: "Error 500".to_string(),
            });
        }
        Ok(self.structure.clone())
    }

    async fn save_responses(
        &self,
        _assessment: AssessmentId,
        snapshot: Vec<SavedResponse>,
        version: u64,
    ) -> Result<(), BackendError> {
        if let Some(gate) = &self.save_gate {
            let permit = gate.acquire().await.expect("gate never closed");
            permit.forget();
        }
        self.saves
            .lock()
            .expect("saves mutex poisoned")
            .push(RecordedSave { version, snapshot });
        Ok(())
    }

    async fn complete(&self, assessment: AssessmentId) -> Result<(), BackendError> {
        if self.fail_complete {
            return Err(BackendError::Connection);
        }
        self.completions
            .lock()
            .expect("completions mutex poisoned")
            .push(assessment);
        Ok(())
    }

    async fn cancel(&self, assessment: AssessmentId) -> Result<(), BackendError> {
        self.cancellations
            .lock()
            .expect("cancellations mutex poisoned")
            .push(assessment);
        Ok(())
    }

    async fn history(&self, _business: u64) -> Result<Vec<AssessmentSummary>, BackendError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl ResultStore for MemoryStore {
    fn load(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .expect("store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.values
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values.lock().expect("store mutex poisoned").remove(key);
    }
}

/// Poll until every spawned save has drained.
pub(super) async fn wait_for_saves<B, S>(session: &crate::assessment::AssessmentSession<B, S>)
where
    B: AssessmentBackend + 'static,
    S: ResultStore + ?Sized,
{
    for _ in 0..500 {
        if session.saves_in_flight() == 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    panic!("saves never drained");
}
