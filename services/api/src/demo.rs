use crate::infra::{InMemoryBackend, InMemoryStore};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vinosost::assessment::{
    history_csv, result_csv, AssessmentSession, LocalHistory, Segment, SegmentKind, SessionError,
};
use vinosost::error::AppError;
use vinosost::storage::FileStore;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Winery identifier used to open the assessment
    #[arg(long, default_value_t = 1)]
    pub(crate) bodega: u64,
    /// Segment display name to select (substring match, defaults to the first)
    #[arg(long)]
    pub(crate) segmento: Option<String>,
}

fn visitor_band(segment: &Segment) -> String {
    match (segment.min_visitors, segment.max_visitors) {
        (Some(min), Some(max)) => format!("{min} a {max} visitantes/año"),
        (Some(min), None) => format!("más de {min} visitantes/año"),
        (None, Some(max)) => format!("hasta {max} visitantes/año"),
        (None, None) => "sin datos de visitantes".to_string(),
    }
}

fn pick_segment(segments: &[Segment], wanted: Option<&str>) -> Option<Segment> {
    match wanted {
        Some(wanted) => {
            let wanted = wanted.to_lowercase();
            segments
                .iter()
                .find(|segment| segment.name.to_lowercase().contains(&wanted))
                .cloned()
        }
        None => segments.first().cloned(),
    }
}

/// Walk a whole self-assessment against the in-memory backend: open,
/// choose a segment, answer every chapter, and print the final result.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let backend = Arc::new(InMemoryBackend::new());
    let store = Arc::new(InMemoryStore::default());

    let mut session = AssessmentSession::open(backend.clone(), store.clone(), args.bodega).await?;
    println!(
        "Autoevaluación {} abierta para la bodega {}",
        session.id().0,
        args.bodega
    );

    let segments = session.available_segments().await?;
    println!("\nSegmentos disponibles:");
    for segment in &segments {
        println!("- {} ({})", segment.name, visitor_band(segment));
    }

    let Some(chosen) = pick_segment(&segments, args.segmento.as_deref()) else {
        println!("Ningún segmento coincide con la selección");
        return Ok(());
    };
    println!("\nSegmento seleccionado: {}", chosen.name);
    session.select_segment(chosen).await?;

    let mut answered = 0usize;
    loop {
        let Some(chapter) = session.current_chapter().cloned() else {
            break;
        };
        println!("\nCapítulo: {}", chapter.chapter.name);

        for entry in chapter.enabled_indicators() {
            let mut levels = entry.levels.clone();
            levels.sort_by_key(|level| level.points);

            // Mostly top answers with the occasional middle one, so the
            // demo lands inside the medium band instead of a perfect run.
            let chosen = if answered % 3 == 2 {
                levels.get(levels.len() / 2)
            } else {
                levels.last()
            };
            let Some(level) = chosen else { continue };

            session.record_response(entry.indicator.id, level.id)?;
            println!(
                "  {} -> {} ({} pts)",
                entry.indicator.name, level.name, level.points
            );
            answered += 1;
        }

        match session.next_chapter() {
            Ok(()) => {}
            Err(SessionError::NoFurtherChapter) => break,
            Err(err) => return Err(err.into()),
        }
    }

    while session.is_saving() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let segment_name = session.segment().map(|segment| segment.name.clone());
    let result = session.finalize().await?;

    println!("\nResultado final");
    println!(
        "Puntaje: {} / {} ({}%)",
        result.total_score, result.max_score, result.percentage
    );
    println!("{}", result.tier.label());
    println!("  {}", result.tier.description());

    let kind = SegmentKind::from_name(segment_name.as_deref());
    let ranges = kind.ranges();
    println!(
        "Tabla del segmento: mínimo {}-{} | medio {}-{} | alto {}-{}",
        ranges.minimum.min,
        ranges.minimum.max,
        ranges.medium.min,
        ranges.medium.max,
        ranges.high.min,
        ranges.high.max
    );

    println!("\nDesglose por capítulo:");
    for chapter in &result.chapters {
        println!(
            "- {}: {}/{} pts ({}%), {}/{} indicadores",
            chapter.name,
            chapter.obtained,
            chapter.maximum,
            chapter.percentage,
            chapter.indicators_completed,
            chapter.indicators_total
        );
    }

    println!(
        "\nRespuestas sincronizadas en {} envíos",
        backend.save_count()
    );
    let history = LocalHistory::new(&*store);
    println!("Historial local: {} resultado(s)", history.all().len());

    Ok(())
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Directory holding the stored assessment data
    #[arg(long, default_value = "datos")]
    pub(crate) datos: PathBuf,
    /// Export the chapter breakdown of one stored result instead of the
    /// whole history
    #[arg(long)]
    pub(crate) id: Option<u64>,
    /// Write the CSV to this file instead of standard output
    #[arg(long)]
    pub(crate) salida: Option<PathBuf>,
}

/// Export the locally stored history (or one stored result) as CSV.
pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let store = FileStore::new(&args.datos);
    let history = LocalHistory::new(&store);
    let results = history.all();

    if results.is_empty() {
        println!("No hay resultados guardados en {}", args.datos.display());
        return Ok(());
    }

    let csv = match args.id {
        Some(id) => {
            let Some(result) = results.iter().find(|result| result.assessment.0 == id) else {
                println!("No hay ningún resultado con id {id}");
                return Ok(());
            };
            result_csv(result)?
        }
        None => history_csv(&results)?,
    };

    match args.salida {
        Some(path) => {
            std::fs::write(&path, &csv)?;
            println!(
                "{} resultado(s) exportados a {}",
                results.len(),
                path.display()
            );
        }
        None => print!("{csv}"),
    }

    Ok(())
}

/// Print the reference score-range table for every winery segment.
pub(crate) fn run_rangos() {
    let table = [
        ("Bodega Micro/Artesanal", SegmentKind::MicroWinery),
        ("Pequeña Bodega", SegmentKind::SmallWinery),
        ("Bodega Mediana", SegmentKind::MediumWinery),
        ("Bodega Turística", SegmentKind::TouristWinery),
        ("Gran Bodega", SegmentKind::LargeWinery),
    ];

    println!("Rangos de puntaje por segmento");
    for (name, kind) in table {
        let ranges = kind.ranges();
        println!("\n{name}");
        println!("  Mínimo: {} - {}", ranges.minimum.min, ranges.minimum.max);
        println!("  Medio:  {} - {}", ranges.medium.min, ranges.medium.max);
        println!("  Alto:   {} - {}", ranges.high.min, ranges.high.max);
    }
}
