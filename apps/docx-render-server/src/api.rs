//! API handlers for the DOCX render server
//!
//! Provides REST endpoints for:
//! - Health checks
//! - Template rendering (fetch, merge, download)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use docx_engine::DocumentEngine;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::compose::{document_response, resolve_file_name};
use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "docx-render-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Render request body
///
/// `templateUrl` and `fileName` are accepted as older spellings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderApiRequest {
    /// Where to fetch the `.docx` template from
    #[serde(default, alias = "templateUrl")]
    pub template_location: Option<String>,

    /// Data record merged into the template
    #[serde(default)]
    pub data: Option<Value>,

    /// Download name without extension
    #[serde(default, alias = "fileName")]
    pub output_name: Option<String>,
}

/// A request that passed validation
#[derive(Debug)]
pub struct RenderJob {
    pub location: Url,
    pub data: Value,
    pub file_name: String,
}

impl RenderApiRequest {
    pub fn validate(self) -> Result<RenderJob, ServerError> {
        let (location, data) = match (self.template_location, self.data) {
            (Some(location), Some(data)) if !location.trim().is_empty() => (location, data),
            _ => {
                return Err(ServerError::BadRequest(
                    "templateLocation and data are required".to_string(),
                ))
            }
        };

        if !data.is_object() {
            return Err(ServerError::BadRequest(
                "data must be a JSON object".to_string(),
            ));
        }

        let location = Url::parse(location.trim()).map_err(|e| {
            ServerError::BadRequest(format!("templateLocation is not a valid URI: {}", e))
        })?;

        let file_name = resolve_file_name(self.output_name.as_deref(), &data);

        Ok(RenderJob {
            location,
            data,
            file_name,
        })
    }
}

/// Handler: POST /render
pub async fn handle_render(
    State(state): State<AppState>,
    payload: Result<Json<RenderApiRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let job = req.validate()?;

    let request_id = Uuid::new_v4();
    info!(%request_id, "Render request: template={}, file={}", job.location, job.file_name);

    let template = state.fetcher.fetch(&job.location).await?;
    debug!(%request_id, "Template fetched: {} bytes", template.len());

    let document = render_blocking(
        Arc::clone(&state.engine),
        template,
        job.data,
        state.timeout_ms,
    )
    .await?;

    info!(%request_id, "Rendered {} ({} bytes)", job.file_name, document.len());
    document_response(document, &job.file_name)
}

/// Run the CPU-bound render off the async executor, bounded by a deadline
async fn render_blocking(
    engine: Arc<dyn DocumentEngine>,
    template: Vec<u8>,
    data: Value,
    timeout_ms: u64,
) -> Result<Vec<u8>, ServerError> {
    let task = tokio::task::spawn_blocking(move || engine.render(&template, &data));

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(result)) => result.map_err(ServerError::from),
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Render task failed: {}",
            join_error
        ))),
        Err(_) => Err(ServerError::Timeout(timeout_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> RenderApiRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_validate_accepts_current_and_legacy_names() {
        let job = request(json!({
            "templateLocation": "https://example.com/t.docx",
            "data": { "Name": "Ada" },
            "outputName": "Letter"
        }))
        .validate()
        .unwrap();
        assert_eq!(job.location.as_str(), "https://example.com/t.docx");
        assert_eq!(job.file_name, "Letter.docx");

        let job = request(json!({
            "templateUrl": "https://example.com/t.docx",
            "data": {},
            "fileName": "Legacy"
        }))
        .validate()
        .unwrap();
        assert_eq!(job.file_name, "Legacy.docx");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        for body in [
            json!({ "data": {} }),
            json!({ "templateLocation": "https://example.com/t.docx" }),
            json!({ "templateLocation": "   ", "data": {} }),
            json!({ "templateLocation": "https://example.com/t.docx", "data": null }),
        ] {
            let err = request(body).validate().unwrap_err();
            assert!(matches!(err, ServerError::BadRequest(_)));
        }
    }

    #[test]
    fn test_validate_rejects_non_object_data_and_bad_uri() {
        let err = request(json!({ "templateLocation": "https://e.com/t.docx", "data": [1] }))
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: data must be a JSON object");

        let err = request(json!({ "templateLocation": "not a uri", "data": {} }))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("not a valid URI"));
    }
}
