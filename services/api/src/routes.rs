use crate::infra::AppState;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Extension;
use axum::Json;
use serde_json::json;

const MAX_PROXY_BODY_BYTES: usize = 1024 * 1024;

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/registro", post(proxy_endpoint))
        .route("/api/auth/login", post(proxy_endpoint))
        .route(
            "/api/autoevaluaciones",
            post(proxy_endpoint).get(proxy_endpoint),
        )
        .route("/api/autoevaluaciones/:id", get(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/estructura", get(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/segmentos", get(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/segmento", put(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/respuestas", post(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/completar", post(proxy_endpoint))
        .route("/api/autoevaluaciones/:id/cancelar", post(proxy_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Relay one browser call to the upstream API. The incoming `/api/...`
/// path maps onto the upstream `/api/v1/...` surface; credentials travel
/// only as forwarded headers, and upstream session cookies are passed
/// back verbatim.
pub(crate) async fn proxy_endpoint(
    Extension(state): Extension<AppState>,
    request: Request,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| parts.uri.path());
    let upstream_path = path_and_query
        .strip_prefix("/api")
        .unwrap_or(path_and_query)
        .to_string();

    let bytes = match to_bytes(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                HeaderMap::new(),
                Json(json!({ "message": "request body too large" })),
            );
        }
    };

    let reply = state
        .proxy
        .forward(&parts.method, &upstream_path, &parts.headers, bytes)
        .await;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for cookie in reply.set_cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }

    (status, headers, Json(reply.body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::BackendProxy;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use vinosost::config::BackendConfig;

    fn test_state(ready: bool) -> AppState {
        let config = BackendConfig {
            base_url: "http://localhost:9".to_string(),
            timeout_secs: 1,
        };
        let handle = PrometheusBuilder::new()
            .build_recorder()
            .handle();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(handle),
            proxy: Arc::new(BackendProxy::new(&config).expect("proxy builds")),
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        let state = test_state(false);
        let response = readiness_endpoint(Extension(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_backend_becomes_503_with_message() {
        // Port 9 (discard) refuses connections, so the forward fails fast.
        let state = test_state(true);
        let reply = state
            .proxy
            .forward(
                &axum::http::Method::GET,
                "/autoevaluaciones?id_bodega=1",
                &HeaderMap::new(),
                axum::body::Bytes::new(),
            )
            .await;

        assert_eq!(reply.status, 503);
        assert_eq!(
            reply.body,
            json!({ "message": "No se pudo conectar con el servidor backend" })
        );
    }
}
