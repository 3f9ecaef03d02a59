//! CSV export of completed results, mirroring the columns of the
//! downloadable history and detail views.

use chrono::{DateTime, Utc};

use super::levels::MaturityLevel;
use super::results::AssessmentResult;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not build CSV output: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not finish CSV output: {0}")]
    Flush(String),
    #[error("CSV output was not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%d/%m/%Y %H:%M").to_string()
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// One row per completed assessment, newest-first order preserved from
/// the input slice.
pub fn history_csv(results: &[AssessmentResult]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "ID",
        "Fecha",
        "Puntaje Obtenido",
        "Puntaje Máximo",
        "Porcentaje",
        "Nivel de Sostenibilidad",
        "Nivel del Segmento",
    ])?;

    for result in results {
        let maturity = MaturityLevel::for_percentage(result.percentage);
        writer.write_record([
            result.assessment.0.to_string(),
            format_date(&result.completed_at),
            result.total_score.to_string(),
            result.max_score.to_string(),
            format!("{}%", result.percentage),
            maturity.label().to_string(),
            result.tier.label().to_string(),
        ])?;
    }

    into_string(writer)
}

/// Detailed single-result export: a general-information block followed by
/// the per-chapter breakdown.
pub fn result_csv(result: &AssessmentResult) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(["Información de la Evaluación"])?;
    let id = result.assessment.0.to_string();
    writer.write_record(["ID", id.as_str()])?;
    let date = format_date(&result.completed_at);
    writer.write_record(["Fecha", date.as_str()])?;
    let total = format!("{} / {}", result.total_score, result.max_score);
    writer.write_record(["Puntaje Total", total.as_str()])?;
    let percentage = format!("{}%", result.percentage);
    writer.write_record(["Porcentaje", percentage.as_str()])?;
    writer.write_record([
        "Nivel",
        MaturityLevel::for_percentage(result.percentage).label(),
    ])?;

    writer.write_record([""])?;
    writer.write_record(["Detalle por Capítulo"])?;
    writer.write_record([
        "Capítulo",
        "Puntaje",
        "Máximo",
        "Porcentaje",
        "Indicadores Completados",
    ])?;
    for chapter in &result.chapters {
        writer.write_record([
            chapter.name.clone(),
            chapter.obtained.to_string(),
            chapter.maximum.to_string(),
            format!("{}%", chapter.percentage),
            format!(
                "{} / {}",
                chapter.indicators_completed, chapter.indicators_total
            ),
        ])?;
    }

    into_string(writer)
}
