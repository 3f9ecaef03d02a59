use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use vinosost::assessment::{
    AssessmentId, AssessmentStructure, Chapter, ChapterId, ChapterStructure, Indicator,
    IndicatorEntry, IndicatorId, ResponseLevel, ResponseLevelId, SavedResponse, Segment, SegmentId,
};
use vinosost::backend::{AssessmentBackend, AssessmentSummary, BackendError, OpenedAssessment};
use vinosost::config::BackendConfig;
use vinosost::storage::{ResultStore, StorageError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) proxy: Arc<BackendProxy>,
}

/// What the upstream answered, already shaped for relaying: a status, the
/// session cookies to pass back, and a JSON body.
pub(crate) struct UpstreamReply {
    pub(crate) status: u16,
    pub(crate) set_cookies: Vec<String>,
    pub(crate) body: Value,
}

/// Thin pass-through client for the upstream REST API. The browser only
/// ever talks to this service; credentials travel as forwarded headers.
pub(crate) struct BackendProxy {
    client: reqwest::Client,
    base_url: String,
}

const FORWARDED_HEADERS: [&str; 3] = ["authorization", "cookie", "content-type"];

impl BackendProxy {
    pub(crate) fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|_| BackendError::Connection)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Forward one request to `{base}/api/v1{path_and_query}` and shape
    /// whatever comes back. An unreachable upstream becomes a 503 with the
    /// standard connection message rather than an error.
    pub(crate) async fn forward(
        &self,
        method: &Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> UpstreamReply {
        let url = format!("{}/api/v1{}", self.base_url, path_and_query);
        debug!(%url, %method, "proxying to backend");

        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut request = self.client.request(method, &url);

        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request.body(body.to_vec());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(%err, "backend unreachable");
                return UpstreamReply {
                    status: 503,
                    set_cookies: Vec::new(),
                    body: json!({ "message": BackendError::Connection.to_string() }),
                };
            }
        };

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let text = response.text().await.unwrap_or_default();

        UpstreamReply {
            status,
            set_cookies,
            body: shape_upstream_body(&text),
        }
    }
}

/// Upstream bodies are JSON whenever the call worked; anything else (HTML
/// error pages, plain text) gets wrapped so clients always receive JSON.
pub(crate) fn shape_upstream_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

fn level(id: u32, name: &str, points: u32) -> ResponseLevel {
    ResponseLevel {
        id: ResponseLevelId(id),
        name: name.to_string(),
        description: None,
        points,
    }
}

fn indicator(id: u32, name: &str, top_points: u32) -> IndicatorEntry {
    IndicatorEntry {
        indicator: Indicator {
            id: IndicatorId(id),
            name: name.to_string(),
            description: None,
        },
        enabled: true,
        levels: vec![
            level(id * 10, "No implementado", 0),
            level(id * 10 + 1, "Parcialmente implementado", top_points / 2),
            level(id * 10 + 2, "Totalmente implementado", top_points),
        ],
    }
}

/// Sample questionnaire with a 51-point maximum, matching the micro
/// winery reference table.
pub(crate) fn demo_structure() -> AssessmentStructure {
    AssessmentStructure {
        chapters: vec![
            ChapterStructure {
                chapter: Chapter {
                    id: ChapterId(1),
                    name: "Gestión del Agua y la Energía".to_string(),
                    description: None,
                },
                indicators: vec![
                    indicator(11, "Medición del consumo de agua", 6),
                    indicator(12, "Reutilización de aguas de proceso", 6),
                    indicator(13, "Energías renovables en bodega", 6),
                ],
            },
            ChapterStructure {
                chapter: Chapter {
                    id: ChapterId(2),
                    name: "Experiencia Enoturística".to_string(),
                    description: None,
                },
                indicators: vec![
                    indicator(21, "Accesibilidad de las visitas", 7),
                    indicator(22, "Interpretación del patrimonio local", 7),
                    indicator(23, "Compra a proveedores de la zona", 7),
                ],
            },
            ChapterStructure {
                chapter: Chapter {
                    id: ChapterId(3),
                    name: "Gestión de Residuos".to_string(),
                    description: None,
                },
                indicators: vec![
                    indicator(31, "Separación de residuos en origen", 6),
                    indicator(32, "Compostaje de orujos y raspones", 6),
                ],
            },
        ],
    }
}

pub(crate) fn demo_segments() -> Vec<Segment> {
    vec![
        Segment {
            id: SegmentId(1),
            name: "Bodega Micro/Artesanal".to_string(),
            min_visitors: None,
            max_visitors: Some(1000),
        },
        Segment {
            id: SegmentId(2),
            name: "Pequeña Bodega".to_string(),
            min_visitors: Some(1000),
            max_visitors: Some(5000),
        },
        Segment {
            id: SegmentId(3),
            name: "Bodega Mediana".to_string(),
            min_visitors: Some(5000),
            max_visitors: Some(20000),
        },
        Segment {
            id: SegmentId(4),
            name: "Gran Bodega".to_string(),
            min_visitors: Some(20000),
            max_visitors: None,
        },
    ]
}

/// Self-contained backend used by the CLI demo: the sample questionnaire
/// behind the same port the HTTP client implements.
#[derive(Default)]
pub(crate) struct InMemoryBackend {
    next_id: AtomicU64,
    saves: Mutex<Vec<(u64, usize)>>,
}

impl InMemoryBackend {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn save_count(&self) -> usize {
        self.saves.lock().expect("saves mutex poisoned").len()
    }
}

#[async_trait]
impl AssessmentBackend for InMemoryBackend {
    async fn open_assessment(&self, _business: u64) -> Result<OpenedAssessment, BackendError> {
        Ok(OpenedAssessment {
            id: AssessmentId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            resumed: false,
            segment: None,
            saved_responses: Vec::new(),
        })
    }

    async fn segments(&self, _assessment: AssessmentId) -> Result<Vec<Segment>, BackendError> {
        Ok(demo_segments())
    }

    async fn select_segment(
        &self,
        _assessment: AssessmentId,
        _segment: SegmentId,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn structure(
        &self,
        _assessment: AssessmentId,
    ) -> Result<AssessmentStructure, BackendError> {
        Ok(demo_structure())
    }

    async fn save_responses(
        &self,
        _assessment: AssessmentId,
        snapshot: Vec<SavedResponse>,
        version: u64,
    ) -> Result<(), BackendError> {
        self.saves
            .lock()
            .expect("saves mutex poisoned")
            .push((version, snapshot.len()));
        Ok(())
    }

    async fn complete(&self, _assessment: AssessmentId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn cancel(&self, _assessment: AssessmentId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn history(&self, _business: u64) -> Result<Vec<AssessmentSummary>, BackendError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl ResultStore for InMemoryStore {
    fn load(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        if let Ok(mut guard) = self.values.lock() {
            guard.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.values.lock() {
            guard.remove(key);
        }
    }
}
