//! Port to the upstream assessment backend plus its reqwest-based
//! implementation. Everything the flow controller needs from the network
//! goes through [`AssessmentBackend`] so sessions can run against test
//! doubles.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::responses::SavedResponse;
use crate::assessment::structure::{AssessmentId, AssessmentStructure, Segment, SegmentId};

/// Result of the create-or-resume call. The backend answers 201 for a
/// freshly created assessment and 200 when a pending one already exists;
/// a pending assessment carries its prior segment and saved responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedAssessment {
    #[serde(rename = "id_autoevaluacion")]
    pub id: AssessmentId,
    #[serde(skip)]
    pub resumed: bool,
    #[serde(rename = "segmento", default)]
    pub segment: Option<Segment>,
    #[serde(rename = "respuestas", default)]
    pub saved_responses: Vec<SavedResponse>,
}

/// Entry in the historical list of completed assessments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    #[serde(rename = "id_autoevaluacion")]
    pub id: AssessmentId,
    #[serde(rename = "fecha_inicio")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completada")]
    pub completed: bool,
    #[serde(rename = "puntaje", default)]
    pub score: Option<u32>,
    #[serde(rename = "segmento", default)]
    pub segment_name: Option<String>,
}

/// Failure taxonomy for backend calls: nothing reached the server, the
/// server answered non-2xx, or the body had an unexpected shape.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("No se pudo conectar con el servidor backend")]
    Connection,
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {body}")]
    Decode { body: String },
}

/// Async port over the upstream REST API.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    /// Create a new assessment for the business, or resume the pending one.
    async fn open_assessment(&self, business: u64) -> Result<OpenedAssessment, BackendError>;

    /// Candidate segments for the assessment.
    async fn segments(&self, assessment: AssessmentId) -> Result<Vec<Segment>, BackendError>;

    /// Record the chosen segment.
    async fn select_segment(
        &self,
        assessment: AssessmentId,
        segment: SegmentId,
    ) -> Result<(), BackendError>;

    /// Chapter/indicator/level structure with per-indicator enabled flags
    /// already resolved for the chosen segment.
    async fn structure(
        &self,
        assessment: AssessmentId,
    ) -> Result<AssessmentStructure, BackendError>;

    /// Upsert the full response snapshot. `version` increases with every
    /// save so the receiver can discard stale snapshots that complete out
    /// of order.
    async fn save_responses(
        &self,
        assessment: AssessmentId,
        snapshot: Vec<SavedResponse>,
        version: u64,
    ) -> Result<(), BackendError>;

    /// Mark the assessment completed.
    async fn complete(&self, assessment: AssessmentId) -> Result<(), BackendError>;

    /// Discard a pending assessment.
    async fn cancel(&self, assessment: AssessmentId) -> Result<(), BackendError>;

    /// Historical list of assessments for the business.
    async fn history(&self, business: u64) -> Result<Vec<AssessmentSummary>, BackendError>;
}
