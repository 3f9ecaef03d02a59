//! Pure scoring functions over (structure, responses). Deterministic and
//! side-effect free; disabled indicators never contribute.

use serde::{Deserialize, Serialize};

use super::responses::ResponseMap;
use super::structure::{AssessmentStructure, ChapterId};

/// Per-chapter score breakdown, serialized with the backend's field names
/// so result snapshots stay interchangeable with upstream records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterScore {
    #[serde(rename = "id_capitulo")]
    pub chapter: ChapterId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "puntaje_obtenido")]
    pub obtained: u32,
    #[serde(rename = "puntaje_maximo")]
    pub maximum: u32,
    #[serde(rename = "porcentaje")]
    pub percentage: u32,
    #[serde(rename = "indicadores_completados")]
    pub indicators_completed: usize,
    #[serde(rename = "indicadores_total")]
    pub indicators_total: usize,
}

/// How many chapters are fully answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaptersProgress {
    #[serde(rename = "completados")]
    pub completed: usize,
    #[serde(rename = "total")]
    pub total: usize,
    #[serde(rename = "porcentaje")]
    pub percentage: u32,
}

/// Delta between two completed assessments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComparison {
    #[serde(rename = "diferencia_puntos")]
    pub points_delta: i64,
    #[serde(rename = "diferencia_porcentaje")]
    pub percentage_delta: i64,
    #[serde(rename = "mejora")]
    pub improved: bool,
}

/// Maximum attainable score: the best level of every enabled indicator.
pub fn max_score(structure: &AssessmentStructure) -> u32 {
    structure
        .enabled_indicators()
        .map(|entry| entry.max_points())
        .sum()
}

/// Obtained score: chosen points of every answered, enabled indicator.
/// Unanswered indicators contribute 0.
pub fn total_score(responses: &ResponseMap, structure: &AssessmentStructure) -> u32 {
    structure
        .enabled_indicators()
        .filter_map(|entry| responses.points_for(entry.indicator.id))
        .sum()
}

/// Rounded obtained/maximum percentage; a zero maximum yields 0.
pub fn percentage(responses: &ResponseMap, structure: &AssessmentStructure) -> u32 {
    ratio_percentage(total_score(responses, structure), max_score(structure))
}

fn ratio_percentage(obtained: u32, maximum: u32) -> u32 {
    if maximum == 0 {
        return 0;
    }
    ((obtained as f64 / maximum as f64) * 100.0).round() as u32
}

/// The same obtained/maximum computation scoped to each chapter, plus
/// completed/total indicator counts.
pub fn chapter_scores(responses: &ResponseMap, structure: &AssessmentStructure) -> Vec<ChapterScore> {
    structure
        .chapters
        .iter()
        .map(|chapter| {
            let mut obtained = 0u32;
            let mut maximum = 0u32;
            let mut completed = 0usize;
            let mut total = 0usize;

            for entry in chapter.enabled_indicators() {
                total += 1;
                maximum += entry.max_points();
                if let Some(points) = responses.points_for(entry.indicator.id) {
                    obtained += points;
                    completed += 1;
                }
            }

            ChapterScore {
                chapter: chapter.chapter.id,
                name: chapter.chapter.name.clone(),
                obtained,
                maximum,
                percentage: ratio_percentage(obtained, maximum),
                indicators_completed: completed,
                indicators_total: total,
            }
        })
        .collect()
}

/// Count of chapters whose enabled indicators are all answered. A chapter
/// with no enabled indicators never counts as completed.
pub fn chapters_progress(responses: &ResponseMap, structure: &AssessmentStructure) -> ChaptersProgress {
    let total = structure.chapters.len();
    let completed = structure
        .chapters
        .iter()
        .filter(|chapter| {
            chapter.enabled_count() > 0
                && chapter
                    .enabled_indicators()
                    .all(|entry| responses.is_answered(entry.indicator.id))
        })
        .count();

    ChaptersProgress {
        completed,
        total,
        percentage: if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        },
    }
}

/// Compare two completed runs by points and by relative percentage.
pub fn compare(
    current_score: u32,
    previous_score: u32,
    current_max: u32,
    previous_max: u32,
) -> ScoreComparison {
    let current_pct = if current_max > 0 {
        current_score as f64 / current_max as f64 * 100.0
    } else {
        0.0
    };
    let previous_pct = if previous_max > 0 {
        previous_score as f64 / previous_max as f64 * 100.0
    } else {
        0.0
    };

    ScoreComparison {
        points_delta: current_score as i64 - previous_score as i64,
        percentage_delta: (current_pct - previous_pct).round() as i64,
        improved: current_pct > previous_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::structure::{
        Chapter, ChapterStructure, Indicator, IndicatorEntry, IndicatorId, ResponseLevel,
        ResponseLevelId,
    };

    fn level(id: u32, points: u32) -> ResponseLevel {
        ResponseLevel {
            id: ResponseLevelId(id),
            name: format!("Nivel {points}"),
            description: None,
            points,
        }
    }

    fn indicator(id: u32, enabled: bool, points: &[u32]) -> IndicatorEntry {
        IndicatorEntry {
            indicator: Indicator {
                id: IndicatorId(id),
                name: format!("Indicador {id}"),
                description: None,
            },
            enabled,
            levels: points
                .iter()
                .enumerate()
                .map(|(i, p)| level(id * 100 + i as u32, *p))
                .collect(),
        }
    }

    fn chapter(id: u32, indicators: Vec<IndicatorEntry>) -> ChapterStructure {
        ChapterStructure {
            chapter: Chapter {
                id: ChapterId(id),
                name: format!("Capítulo {id}"),
                description: None,
            },
            indicators,
        }
    }

    /// One chapter, two enabled indicators, levels {0, 5, 10} each.
    fn two_indicator_structure() -> AssessmentStructure {
        AssessmentStructure {
            chapters: vec![chapter(
                1,
                vec![
                    indicator(1, true, &[0, 5, 10]),
                    indicator(2, true, &[0, 5, 10]),
                ],
            )],
        }
    }

    #[test]
    fn scores_answered_structure() {
        let structure = two_indicator_structure();
        let mut responses = ResponseMap::new();
        responses.record(IndicatorId(1), ResponseLevelId(102), 10);
        responses.record(IndicatorId(2), ResponseLevelId(201), 5);

        assert_eq!(total_score(&responses, &structure), 15);
        assert_eq!(max_score(&structure), 20);
        assert_eq!(percentage(&responses, &structure), 75);
    }

    #[test]
    fn empty_responses_score_zero() {
        let structure = two_indicator_structure();
        let responses = ResponseMap::new();

        assert_eq!(total_score(&responses, &structure), 0);
        assert_eq!(max_score(&structure), 20);
        assert_eq!(percentage(&responses, &structure), 0);

        let chapters = chapter_scores(&responses, &structure);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].indicators_completed, 0);
        assert_eq!(chapters[0].indicators_total, 2);
        assert_eq!(chapters[0].percentage, 0);
    }

    #[test]
    fn percentage_guards_zero_max() {
        let structure = AssessmentStructure {
            chapters: vec![chapter(1, vec![indicator(1, false, &[0, 5])])],
        };
        let responses = ResponseMap::new();

        assert_eq!(max_score(&structure), 0);
        assert_eq!(percentage(&responses, &structure), 0);
    }

    #[test]
    fn disabled_chapter_is_excluded_everywhere() {
        let mut structure = two_indicator_structure();
        structure.chapters.push(chapter(
            2,
            vec![indicator(3, false, &[0, 20]), indicator(4, false, &[0, 20])],
        ));

        let mut responses = ResponseMap::new();
        responses.record(IndicatorId(1), ResponseLevelId(102), 10);
        responses.record(IndicatorId(2), ResponseLevelId(202), 10);

        assert_eq!(max_score(&structure), 20);
        assert_eq!(total_score(&responses, &structure), 20);

        let chapters = chapter_scores(&responses, &structure);
        assert_eq!(chapters[1].maximum, 0);
        assert_eq!(chapters[1].indicators_total, 0);

        // The all-disabled chapter never counts toward completion.
        let progress = chapters_progress(&responses, &structure);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 2);
    }

    #[test]
    fn total_never_exceeds_max_for_valid_responses() {
        let structure = two_indicator_structure();
        for (p1, p2) in [(0, 0), (0, 10), (5, 5), (10, 10)] {
            let mut responses = ResponseMap::new();
            responses.record(IndicatorId(1), ResponseLevelId(100), p1);
            responses.record(IndicatorId(2), ResponseLevelId(200), p2);
            assert!(total_score(&responses, &structure) <= max_score(&structure));
        }
    }

    #[test]
    fn percentage_is_deterministic() {
        let structure = two_indicator_structure();
        let mut responses = ResponseMap::new();
        responses.record(IndicatorId(1), ResponseLevelId(101), 5);

        let first = percentage(&responses, &structure);
        let second = percentage(&responses, &structure);
        assert_eq!(first, second);
        assert_eq!(first, 25);
    }

    #[test]
    fn comparison_reports_improvement() {
        let delta = compare(90, 60, 120, 120);
        assert_eq!(delta.points_delta, 30);
        assert_eq!(delta.percentage_delta, 25);
        assert!(delta.improved);

        let regression = compare(60, 90, 120, 120);
        assert!(!regression.improved);
        assert_eq!(regression.points_delta, -30);
    }
}
