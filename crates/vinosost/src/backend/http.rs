use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{AssessmentBackend, AssessmentSummary, BackendError, OpenedAssessment};
use crate::assessment::responses::SavedResponse;
use crate::assessment::structure::{AssessmentId, AssessmentStructure, Segment, SegmentId};
use crate::config::BackendConfig;

/// Reqwest-backed implementation of [`AssessmentBackend`] against the
/// upstream `/api/v1` REST surface.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|_| BackendError::Connection)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Attach a bearer token to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), BackendError> {
        let url = format!("{}/api/v1{}", self.base_url, path);
        debug!(%url, "backend request");

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|_| BackendError::Connection)?;
        let status = response.status();
        let text = response.text().await.map_err(|_| BackendError::Connection)?;

        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            // Extract a human message from the body when the backend sent
            // one; otherwise fall back to a generic status string.
            let message = parsed
                .as_ref()
                .and_then(|value| {
                    value
                        .get("message")
                        .or_else(|| value.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        format!("Error {}", status.as_u16())
                    } else {
                        text.clone()
                    }
                });
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        match parsed {
            Some(value) => Ok((status, value)),
            None if text.trim().is_empty() => Ok((status, Value::Null)),
            None => Err(BackendError::Decode { body: text }),
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, BackendError> {
        let body = value.to_string();
        serde_json::from_value(value).map_err(|_| BackendError::Decode { body })
    }
}

#[async_trait]
impl AssessmentBackend for HttpBackend {
    async fn open_assessment(&self, business: u64) -> Result<OpenedAssessment, BackendError> {
        let (status, body) = self
            .send(
                Method::POST,
                "/autoevaluaciones",
                Some(json!({ "id_bodega": business })),
            )
            .await?;

        let mut opened: OpenedAssessment = Self::decode(body)?;
        opened.resumed = status != StatusCode::CREATED;
        Ok(opened)
    }

    async fn segments(&self, assessment: AssessmentId) -> Result<Vec<Segment>, BackendError> {
        let (_, body) = self
            .send(
                Method::GET,
                &format!("/autoevaluaciones/{}/segmentos", assessment.0),
                None,
            )
            .await?;
        Self::decode(body)
    }

    async fn select_segment(
        &self,
        assessment: AssessmentId,
        segment: SegmentId,
    ) -> Result<(), BackendError> {
        self.send(
            Method::PUT,
            &format!("/autoevaluaciones/{}/segmento", assessment.0),
            Some(json!({ "id_segmento": segment.0 })),
        )
        .await?;
        Ok(())
    }

    async fn structure(
        &self,
        assessment: AssessmentId,
    ) -> Result<AssessmentStructure, BackendError> {
        let (_, body) = self
            .send(
                Method::GET,
                &format!("/autoevaluaciones/{}/estructura", assessment.0),
                None,
            )
            .await?;
        Self::decode(body)
    }

    async fn save_responses(
        &self,
        assessment: AssessmentId,
        snapshot: Vec<SavedResponse>,
        version: u64,
    ) -> Result<(), BackendError> {
        self.send(
            Method::POST,
            &format!("/autoevaluaciones/{}/respuestas", assessment.0),
            Some(json!({ "respuestas": snapshot, "version": version })),
        )
        .await?;
        Ok(())
    }

    async fn complete(&self, assessment: AssessmentId) -> Result<(), BackendError> {
        self.send(
            Method::POST,
            &format!("/autoevaluaciones/{}/completar", assessment.0),
            None,
        )
        .await?;
        Ok(())
    }

    async fn cancel(&self, assessment: AssessmentId) -> Result<(), BackendError> {
        self.send(
            Method::POST,
            &format!("/autoevaluaciones/{}/cancelar", assessment.0),
            None,
        )
        .await?;
        Ok(())
    }

    async fn history(&self, business: u64) -> Result<Vec<AssessmentSummary>, BackendError> {
        let (_, body) = self
            .send(
                Method::GET,
                &format!("/autoevaluaciones?id_bodega={business}"),
                None,
            )
            .await?;
        Self::decode(body)
    }
}
