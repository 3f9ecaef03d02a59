use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::levels::{classify_by_score, SegmentKind, SustainabilityTier};
use super::responses::ResponseMap;
use super::scoring::{self, ChapterScore};
use super::structure::{AssessmentId, AssessmentStructure};
use crate::storage::{keys, ResultStore, StorageError};

/// Snapshot of one completed assessment, persisted locally so results
/// survive a reload even when the backend finalize call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    #[serde(rename = "id_autoevaluacion")]
    pub assessment: AssessmentId,
    #[serde(rename = "segmento", default)]
    pub segment_name: Option<String>,
    #[serde(rename = "fecha_inicio")]
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "puntaje_total")]
    pub total_score: u32,
    #[serde(rename = "puntaje_maximo")]
    pub max_score: u32,
    #[serde(rename = "porcentaje")]
    pub percentage: u32,
    #[serde(rename = "nivel")]
    pub tier: SustainabilityTier,
    #[serde(rename = "capitulos")]
    pub chapters: Vec<ChapterScore>,
}

impl AssessmentResult {
    /// Compute the final record from the session's structure and answers.
    pub fn compute(
        assessment: AssessmentId,
        segment_name: Option<&str>,
        responses: &ResponseMap,
        structure: &AssessmentStructure,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let total = scoring::total_score(responses, structure);
        let kind = SegmentKind::from_name(segment_name);

        Self {
            assessment,
            segment_name: segment_name.map(str::to_string),
            completed_at,
            total_score: total,
            max_score: scoring::max_score(structure),
            percentage: scoring::percentage(responses, structure),
            tier: classify_by_score(total, kind),
            chapters: scoring::chapter_scores(responses, structure),
        }
    }
}

/// Local history of completed results over the persistence port: an array
/// keyed by assessment identity, last write wins on duplicates, newest
/// first.
pub struct LocalHistory<'a, S: ResultStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ResultStore + ?Sized> LocalHistory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn all(&self) -> Vec<AssessmentResult> {
        let Some(raw) = self.store.load(keys::LOCAL_HISTORY) else {
            return Vec::new();
        };

        let mut history: Vec<AssessmentResult> = match serde_json::from_value(raw) {
            Ok(history) => history,
            Err(err) => {
                warn!(%err, "stored history has unexpected shape, starting empty");
                return Vec::new();
            }
        };

        history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        history
    }

    pub fn latest(&self) -> Option<AssessmentResult> {
        self.all().into_iter().next()
    }

    /// Insert or replace the entry with the same assessment id, keeping
    /// the newest entry first.
    pub fn upsert(&self, result: &AssessmentResult) -> Result<(), StorageError> {
        let mut history = self.all();

        match history
            .iter_mut()
            .find(|entry| entry.assessment == result.assessment)
        {
            Some(existing) => *existing = result.clone(),
            None => history.insert(0, result.clone()),
        }
        history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        let value: Value =
            serde_json::to_value(&history).map_err(|source| StorageError::Serialize {
                key: keys::LOCAL_HISTORY.to_string(),
                source,
            })?;
        self.store.save(keys::LOCAL_HISTORY, &value)
    }
}
