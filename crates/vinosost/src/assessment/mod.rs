//! Sustainability self-assessment domain: questionnaire structure, the
//! response map, the scorer, the tier classifier, result snapshots, and
//! the session flow controller.

pub mod export;
pub mod levels;
pub mod responses;
pub mod results;
pub mod scoring;
pub mod session;
pub mod structure;

pub use export::{history_csv, result_csv, ExportError};
pub use levels::{
    classify_by_percentage, classify_by_score, MaturityLevel, SegmentKind, SustainabilityTier,
};
pub use responses::{ResponseMap, SavedResponse};
pub use results::{AssessmentResult, LocalHistory};
pub use scoring::{ChapterScore, ChaptersProgress, ScoreComparison};
pub use session::{AssessmentSession, SessionError, SessionPhase};
pub use structure::{
    AssessmentId, AssessmentStructure, Chapter, ChapterId, ChapterStructure, Indicator,
    IndicatorEntry, IndicatorId, ResponseLevel, ResponseLevelId, Segment, SegmentId,
};
