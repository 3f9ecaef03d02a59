use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::structure::{AssessmentStructure, IndicatorId, ResponseLevelId};

/// One (indicator, chosen level) pair as transmitted to and from the
/// backend's `respuestas` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResponse {
    #[serde(rename = "id_indicador")]
    pub indicator: IndicatorId,
    #[serde(rename = "id_nivel_respuesta")]
    pub level: ResponseLevelId,
}

/// Accumulated answers for one assessment.
///
/// Tracks both the chosen level id per indicator (what the backend
/// receives) and the chosen point value (what the scorer consumes).
/// At most one response per indicator; re-answering overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMap {
    points: BTreeMap<IndicatorId, u32>,
    levels: BTreeMap<IndicatorId, ResponseLevelId>,
}

impl ResponseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a map from backend-saved pairs, resolving point values
    /// against the structure. Pairs referencing unknown or disabled
    /// indicators are dropped; duplicate pairs for one indicator keep the
    /// last occurrence.
    pub fn from_saved(pairs: &[SavedResponse], structure: &AssessmentStructure) -> Self {
        let mut map = Self::new();
        for pair in pairs {
            let Some(entry) = structure.find_enabled(pair.indicator) else {
                continue;
            };
            let Some(level) = entry.level(pair.level) else {
                continue;
            };
            map.record(pair.indicator, pair.level, level.points);
        }
        map
    }

    /// Record an answer, overwriting any prior answer for the indicator.
    pub fn record(&mut self, indicator: IndicatorId, level: ResponseLevelId, points: u32) {
        self.points.insert(indicator, points);
        self.levels.insert(indicator, level);
    }

    pub fn points_for(&self, indicator: IndicatorId) -> Option<u32> {
        self.points.get(&indicator).copied()
    }

    pub fn level_for(&self, indicator: IndicatorId) -> Option<ResponseLevelId> {
        self.levels.get(&indicator).copied()
    }

    pub fn is_answered(&self, indicator: IndicatorId) -> bool {
        self.points.contains_key(&indicator)
    }

    pub fn answered_count(&self) -> usize {
        self.points.len()
    }

    /// Full snapshot of every recorded (indicator, level) pair, in
    /// indicator order. This is what each save transmits.
    pub fn snapshot(&self) -> Vec<SavedResponse> {
        self.levels
            .iter()
            .map(|(indicator, level)| SavedResponse {
                indicator: *indicator,
                level: *level,
            })
            .collect()
    }
}
