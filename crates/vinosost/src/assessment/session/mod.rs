//! Assessment flow controller: segment selection, chapter-by-chapter
//! answering with gated navigation, and local-first finalization.

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use super::responses::ResponseMap;
use super::results::{AssessmentResult, LocalHistory};
use super::structure::{
    AssessmentId, AssessmentStructure, ChapterStructure, IndicatorId, ResponseLevelId, Segment,
};
use crate::backend::{AssessmentBackend, BackendError};
use crate::storage::{keys, ResultStore};

/// Where the session currently is in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    SelectingSegment,
    /// Index into the active chapter sequence (chapters with zero enabled
    /// indicators are excluded from the sequence entirely).
    Answering { chapter: usize },
    Completed,
    /// A structure or segment load failed; the failed call can be retried.
    Failed,
}

/// What is still blocking finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeBlocker {
    NotAtLastChapter,
    Unanswered(usize),
    SavesInFlight,
}

impl fmt::Display for FinalizeBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeBlocker::NotAtLastChapter => write!(f, "not at the last chapter"),
            FinalizeBlocker::Unanswered(count) => {
                write!(f, "{count} enabled indicator(s) still unanswered")
            }
            FinalizeBlocker::SavesInFlight => write!(f, "response saves still in flight"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("operation not valid in the current phase")]
    InvalidPhase,
    #[error("the selected segment has no chapters with enabled indicators")]
    EmptyStructure,
    #[error("indicator {0:?} is not part of the enabled structure")]
    UnknownIndicator(IndicatorId),
    #[error("level {level:?} does not belong to indicator {indicator:?}")]
    UnknownLevel {
        indicator: IndicatorId,
        level: ResponseLevelId,
    },
    #[error("chapter '{chapter}' still has {remaining} unanswered indicator(s)")]
    ChapterIncomplete { chapter: String, remaining: usize },
    #[error("already at the last chapter")]
    NoFurtherChapter,
    #[error("assessment is not ready to finalize: {blocker}")]
    NotReadyToFinalize { blocker: FinalizeBlocker },
}

/// One user's traversal of the questionnaire, generic over the backend
/// and persistence ports so it can run against doubles.
pub struct AssessmentSession<B, S: ?Sized> {
    backend: Arc<B>,
    store: Arc<S>,
    id: AssessmentId,
    business: u64,
    phase: SessionPhase,
    segment: Option<Segment>,
    structure: Option<AssessmentStructure>,
    // Indexes into structure.chapters, restricted to answerable chapters.
    sequence: Vec<usize>,
    responses: ResponseMap,
    saves_in_flight: Arc<AtomicUsize>,
    save_version: u64,
}

impl<B, S> AssessmentSession<B, S>
where
    B: AssessmentBackend + 'static,
    S: ResultStore + ?Sized,
{
    /// Create or resume an assessment. A pending assessment with a chosen
    /// segment re-enters answering with its saved responses; otherwise the
    /// session starts at segment selection.
    pub async fn open(backend: Arc<B>, store: Arc<S>, business: u64) -> Result<Self, SessionError> {
        let opened = backend.open_assessment(business).await?;

        let mut session = Self {
            backend,
            store,
            id: opened.id,
            business,
            phase: SessionPhase::SelectingSegment,
            segment: None,
            structure: None,
            sequence: Vec::new(),
            responses: ResponseMap::new(),
            saves_in_flight: Arc::new(AtomicUsize::new(0)),
            save_version: 0,
        };

        if let Err(err) = session
            .store
            .save(keys::CURRENT_ASSESSMENT, &json!(opened.id.0))
        {
            warn!(%err, "could not persist current assessment id");
        }

        if let Some(segment) = opened.segment.filter(|_| opened.resumed) {
            session.segment = Some(segment);
            session.load_structure().await?;
            let rebuilt = session
                .structure
                .as_ref()
                .map(|structure| ResponseMap::from_saved(&opened.saved_responses, structure));
            if let Some(responses) = rebuilt {
                session.responses = responses;
            }
            session.phase = SessionPhase::Answering { chapter: 0 };
        }

        Ok(session)
    }

    pub fn id(&self) -> AssessmentId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn segment(&self) -> Option<&Segment> {
        self.segment.as_ref()
    }

    pub fn structure(&self) -> Option<&AssessmentStructure> {
        self.structure.as_ref()
    }

    pub fn responses(&self) -> &ResponseMap {
        &self.responses
    }

    pub fn saves_in_flight(&self) -> usize {
        self.saves_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_saving(&self) -> bool {
        self.saves_in_flight() > 0
    }

    /// Candidate segments for this assessment.
    pub async fn available_segments(&self) -> Result<Vec<Segment>, SessionError> {
        Ok(self.backend.segments(self.id).await?)
    }

    /// Record the chosen segment and load the structure it enables.
    /// Re-selecting mid-assessment is allowed; answers that survive the
    /// structure change are kept.
    pub async fn select_segment(&mut self, segment: Segment) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Completed {
            return Err(SessionError::InvalidPhase);
        }

        if let Err(err) = self.backend.select_segment(self.id, segment.id).await {
            self.phase = SessionPhase::Failed;
            return Err(err.into());
        }
        self.segment = Some(segment);

        self.load_structure().await?;

        let snapshot = self.responses.snapshot();
        let rebuilt = {
            let structure = self.structure.as_ref().ok_or(SessionError::InvalidPhase)?;
            ResponseMap::from_saved(&snapshot, structure)
        };
        self.responses = rebuilt;
        self.phase = SessionPhase::Answering { chapter: 0 };
        Ok(())
    }

    async fn load_structure(&mut self) -> Result<(), SessionError> {
        let structure = match self.backend.structure(self.id).await {
            Ok(structure) => structure,
            Err(err) => {
                self.phase = SessionPhase::Failed;
                return Err(err.into());
            }
        };

        let sequence: Vec<usize> = structure
            .chapters
            .iter()
            .enumerate()
            .filter(|(_, chapter)| chapter.enabled_count() > 0)
            .map(|(index, _)| index)
            .collect();

        if sequence.is_empty() {
            self.phase = SessionPhase::Failed;
            return Err(SessionError::EmptyStructure);
        }

        self.structure = Some(structure);
        self.sequence = sequence;
        Ok(())
    }

    fn chapter_at(&self, position: usize) -> Option<&ChapterStructure> {
        let structure = self.structure.as_ref()?;
        self.sequence
            .get(position)
            .and_then(|index| structure.chapters.get(*index))
    }

    /// The chapter currently being answered.
    pub fn current_chapter(&self) -> Option<&ChapterStructure> {
        match self.phase {
            SessionPhase::Answering { chapter } => self.chapter_at(chapter),
            _ => None,
        }
    }

    pub fn chapter_count(&self) -> usize {
        self.sequence.len()
    }

    fn unanswered_in(&self, chapter: &ChapterStructure) -> usize {
        chapter
            .enabled_indicators()
            .filter(|entry| !self.responses.is_answered(entry.indicator.id))
            .count()
    }

    fn unanswered_total(&self) -> usize {
        self.sequence
            .iter()
            .filter_map(|index| self.structure.as_ref()?.chapters.get(*index))
            .map(|chapter| self.unanswered_in(chapter))
            .sum()
    }

    /// Record an answer for an enabled indicator and fire a non-blocking
    /// full-snapshot save. Save failures are logged, never surfaced; the
    /// user re-answering is the retry path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record_response(
        &mut self,
        indicator: IndicatorId,
        level: ResponseLevelId,
    ) -> Result<(), SessionError> {
        if !matches!(self.phase, SessionPhase::Answering { .. }) {
            return Err(SessionError::InvalidPhase);
        }

        let structure = self.structure.as_ref().ok_or(SessionError::InvalidPhase)?;
        let entry = structure
            .find_enabled(indicator)
            .ok_or(SessionError::UnknownIndicator(indicator))?;
        let chosen = entry
            .level(level)
            .ok_or(SessionError::UnknownLevel { indicator, level })?;

        self.responses.record(indicator, level, chosen.points);

        self.save_version += 1;
        let version = self.save_version;
        let snapshot = self.responses.snapshot();
        let backend = Arc::clone(&self.backend);
        let in_flight = Arc::clone(&self.saves_in_flight);
        let id = self.id;

        in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            if let Err(err) = backend.save_responses(id, snapshot, version).await {
                warn!(assessment = id.0, version, %err, "response save failed");
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }

    /// Advance to the next chapter. Refuses while the current chapter has
    /// unanswered enabled indicators.
    pub fn next_chapter(&mut self) -> Result<(), SessionError> {
        let SessionPhase::Answering { chapter } = self.phase else {
            return Err(SessionError::InvalidPhase);
        };

        let current = self.chapter_at(chapter).ok_or(SessionError::InvalidPhase)?;
        let remaining = self.unanswered_in(current);
        if remaining > 0 {
            return Err(SessionError::ChapterIncomplete {
                chapter: current.chapter.name.clone(),
                remaining,
            });
        }

        if chapter + 1 >= self.sequence.len() {
            return Err(SessionError::NoFurtherChapter);
        }

        self.phase = SessionPhase::Answering {
            chapter: chapter + 1,
        };
        Ok(())
    }

    /// Move back one chapter; never gated. Returns whether a move happened.
    pub fn previous_chapter(&mut self) -> bool {
        match self.phase {
            SessionPhase::Answering { chapter } if chapter > 0 => {
                self.phase = SessionPhase::Answering {
                    chapter: chapter - 1,
                };
                true
            }
            _ => false,
        }
    }

    fn finalize_blocker(&self) -> Option<FinalizeBlocker> {
        let SessionPhase::Answering { chapter } = self.phase else {
            return Some(FinalizeBlocker::NotAtLastChapter);
        };
        if chapter + 1 != self.sequence.len() {
            return Some(FinalizeBlocker::NotAtLastChapter);
        }
        let unanswered = self.unanswered_total();
        if unanswered > 0 {
            return Some(FinalizeBlocker::Unanswered(unanswered));
        }
        if self.is_saving() {
            return Some(FinalizeBlocker::SavesInFlight);
        }
        None
    }

    /// Whether finalize would currently be accepted: last chapter reached,
    /// every enabled indicator answered, and no save in flight.
    pub fn can_finalize(&self) -> bool {
        self.finalize_blocker().is_none()
    }

    /// Compute the final score, tier, and per-chapter breakdown locally,
    /// persist the result, and complete the session. The backend completar
    /// call is attempted but its failure does not block local completion.
    pub async fn finalize(&mut self) -> Result<AssessmentResult, SessionError> {
        if let Some(blocker) = self.finalize_blocker() {
            return Err(SessionError::NotReadyToFinalize { blocker });
        }

        if let Err(err) = self.backend.complete(self.id).await {
            warn!(assessment = self.id.0, %err, "backend finalize failed, keeping local result");
        }

        let structure = self.structure.as_ref().ok_or(SessionError::InvalidPhase)?;
        let result = AssessmentResult::compute(
            self.id,
            self.segment.as_ref().map(|segment| segment.name.as_str()),
            &self.responses,
            structure,
            Utc::now(),
        );

        if let Err(err) = LocalHistory::new(&*self.store).upsert(&result) {
            warn!(assessment = self.id.0, %err, "could not persist result locally");
        }
        self.store.remove(keys::CURRENT_ASSESSMENT);

        self.phase = SessionPhase::Completed;
        Ok(result)
    }

    /// Discard the pending assessment (best-effort remotely) and start a
    /// fresh one back at segment selection.
    pub async fn cancel_and_restart(&mut self) -> Result<(), SessionError> {
        if let Err(err) = self.backend.cancel(self.id).await {
            warn!(assessment = self.id.0, %err, "remote cancel failed, discarding locally");
        }

        // The remote assessment may already be gone at this point, so the
        // stale session must not stay answerable.
        let opened = match self.backend.open_assessment(self.business).await {
            Ok(opened) => opened,
            Err(err) => {
                self.phase = SessionPhase::Failed;
                return Err(err.into());
            }
        };
        self.id = opened.id;
        self.segment = None;
        self.structure = None;
        self.sequence.clear();
        self.responses = ResponseMap::new();
        self.save_version = 0;
        self.phase = SessionPhase::SelectingSegment;

        if let Err(err) = self
            .store
            .save(keys::CURRENT_ASSESSMENT, &json!(opened.id.0))
        {
            warn!(%err, "could not persist current assessment id");
        }

        Ok(())
    }
}
