//! Sustainability tier classification against per-segment reference
//! ranges, with a percentage-only fallback when no segment is known.

use serde::{Deserialize, Serialize};

/// One of three ordered sustainability outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SustainabilityTier {
    Minimum,
    Medium,
    High,
}

impl SustainabilityTier {
    pub const fn label(self) -> &'static str {
        match self {
            SustainabilityTier::Minimum => "Nivel Mínimo de Sostenibilidad",
            SustainabilityTier::Medium => "Nivel Medio de Sostenibilidad",
            SustainabilityTier::High => "Nivel Alto de Sostenibilidad",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            SustainabilityTier::Minimum => {
                "Cumple con los requisitos básicos, se recomienda implementar mejoras."
            }
            SustainabilityTier::Medium => {
                "Buen desempeño con oportunidades de mejora para alcanzar la excelencia."
            }
            SustainabilityTier::High => {
                "Cumple con los estándares más exigentes de sostenibilidad."
            }
        }
    }
}

/// Five-step maturity scale over the completion percentage, used by the
/// history and export views alongside the segment-based tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    Starting,
    Developing,
    Consolidated,
    Advanced,
    Exemplary,
}

impl MaturityLevel {
    /// Band lookup with half-open bounds; 100% lands on the top level.
    pub fn for_percentage(percentage: u32) -> Self {
        match percentage {
            0..=24 => MaturityLevel::Starting,
            25..=49 => MaturityLevel::Developing,
            50..=74 => MaturityLevel::Consolidated,
            75..=89 => MaturityLevel::Advanced,
            _ => MaturityLevel::Exemplary,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MaturityLevel::Starting => "Inicial",
            MaturityLevel::Developing => "En Desarrollo",
            MaturityLevel::Consolidated => "Consolidado",
            MaturityLevel::Advanced => "Avanzado",
            MaturityLevel::Exemplary => "Ejemplar",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            MaturityLevel::Starting => "Recién comenzando el camino de sostenibilidad",
            MaturityLevel::Developing => "Avanzando con oportunidades de mejora",
            MaturityLevel::Consolidated => "Prácticas sostenibles establecidas",
            MaturityLevel::Advanced => "Alto nivel de sostenibilidad",
            MaturityLevel::Exemplary => "Referente en sostenibilidad enoturística",
        }
    }
}

/// Inclusive score band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: u32,
    pub max: u32,
}

/// The three contiguous bands that define a segment's tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRanges {
    pub minimum: ScoreBand,
    pub medium: ScoreBand,
    pub high: ScoreBand,
}

/// Normalized winery-size key used to pick a reference range table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    MicroWinery,
    SmallWinery,
    MediumWinery,
    TouristWinery,
    LargeWinery,
}

const fn band(min: u32, max: u32) -> ScoreBand {
    ScoreBand { min, max }
}

impl SegmentKind {
    /// Normalize a backend segment display name. Matching mirrors the
    /// reference scoring guide: micro/artesanal, pequeña, mediana, gran,
    /// then plain "bodega"; anything else falls back to micro.
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return SegmentKind::MicroWinery;
        };
        let lower = name.to_lowercase();

        if lower.contains("micro") || lower.contains("artesanal") {
            SegmentKind::MicroWinery
        } else if lower.contains("pequeña") || lower.contains("pequena") {
            SegmentKind::SmallWinery
        } else if lower.contains("mediana") {
            SegmentKind::MediumWinery
        } else if lower.contains("gran") {
            SegmentKind::LargeWinery
        } else if lower.contains("bodega") {
            SegmentKind::TouristWinery
        } else {
            SegmentKind::MicroWinery
        }
    }

    /// Reference score bands for this segment size.
    pub const fn ranges(self) -> SegmentRanges {
        match self {
            SegmentKind::MicroWinery => SegmentRanges {
                minimum: band(17, 38),
                medium: band(39, 45),
                high: band(46, 51),
            },
            SegmentKind::SmallWinery => SegmentRanges {
                minimum: band(23, 51),
                medium: band(52, 61),
                high: band(62, 69),
            },
            SegmentKind::MediumWinery => SegmentRanges {
                minimum: band(32, 71),
                medium: band(72, 85),
                high: band(86, 96),
            },
            SegmentKind::TouristWinery | SegmentKind::LargeWinery => SegmentRanges {
                minimum: band(42, 93),
                medium: band(94, 112),
                high: band(113, 126),
            },
        }
    }
}

/// Classify an absolute score against a segment's range table. Lower
/// bounds are inclusive and checked highest tier first; scores below the
/// minimum band still classify as Minimum.
pub fn classify_by_score(score: u32, segment: SegmentKind) -> SustainabilityTier {
    let ranges = segment.ranges();

    if score >= ranges.high.min {
        SustainabilityTier::High
    } else if score >= ranges.medium.min {
        SustainabilityTier::Medium
    } else {
        SustainabilityTier::Minimum
    }
}

/// Segment-free approximation over the completion percentage.
pub fn classify_by_percentage(percentage: u32) -> SustainabilityTier {
    if percentage >= 75 {
        SustainabilityTier::High
    } else if percentage >= 50 {
        SustainabilityTier::Medium
    } else {
        SustainabilityTier::Minimum
    }
}
