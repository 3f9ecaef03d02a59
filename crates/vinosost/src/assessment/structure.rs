use serde::{Deserialize, Serialize};

/// Identifier wrapper for one assessment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResponseLevelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u32);

/// Themed grouping of indicators (e.g. "Gestión Ambiental").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "id_capitulo")]
    pub id: ChapterId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
}

/// A single scored question within a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "id_indicador")]
    pub id: IndicatorId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
}

/// One selectable answer option for an indicator, carrying a point value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseLevel {
    #[serde(rename = "id_nivel_respuesta")]
    pub id: ResponseLevelId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "puntos")]
    pub points: u32,
}

/// Indicator plus the per-segment enabled flag and its answer options.
///
/// The backend may omit `habilitado` entirely; absence means enabled,
/// matching the upstream contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorEntry {
    #[serde(rename = "indicador")]
    pub indicator: Indicator,
    #[serde(rename = "habilitado", default = "enabled_default")]
    pub enabled: bool,
    #[serde(rename = "niveles_respuesta", default)]
    pub levels: Vec<ResponseLevel>,
}

fn enabled_default() -> bool {
    true
}

impl IndicatorEntry {
    /// Maximum contribution of this indicator; an indicator with no levels
    /// contributes 0.
    pub fn max_points(&self) -> u32 {
        self.levels.iter().map(|level| level.points).max().unwrap_or(0)
    }

    pub fn level(&self, id: ResponseLevelId) -> Option<&ResponseLevel> {
        self.levels.iter().find(|level| level.id == id)
    }
}

/// One chapter with its indicator entries, as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterStructure {
    #[serde(rename = "capitulo")]
    pub chapter: Chapter,
    #[serde(rename = "indicadores", default)]
    pub indicators: Vec<IndicatorEntry>,
}

impl ChapterStructure {
    pub fn enabled_indicators(&self) -> impl Iterator<Item = &IndicatorEntry> {
        self.indicators.iter().filter(|entry| entry.enabled)
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled_indicators().count()
    }
}

/// Full chapter/indicator/level structure for one assessment session.
/// Immutable for the duration of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentStructure {
    #[serde(rename = "capitulos", default)]
    pub chapters: Vec<ChapterStructure>,
}

impl AssessmentStructure {
    pub fn enabled_indicators(&self) -> impl Iterator<Item = &IndicatorEntry> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.enabled_indicators())
    }

    pub fn find_enabled(&self, id: IndicatorId) -> Option<&IndicatorEntry> {
        self.enabled_indicators()
            .find(|entry| entry.indicator.id == id)
    }
}

/// Business-size classification by annual visitor volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "id_segmento")]
    pub id: SegmentId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "min_turistas", default)]
    pub min_visitors: Option<u32>,
    #[serde(rename = "max_turistas", default)]
    pub max_visitors: Option<u32>,
}
