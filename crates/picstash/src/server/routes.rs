//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use picstash_core::{parse_json_items, IngestionItem, Rejection, SubmissionKind};

use super::multipart::{collect_uploads, BodyBudget};
use super::AppState;

/// Liveness check.
pub async fn ping() -> &'static str {
    "pong"
}

/// `POST /images`: ingest a JSON list of URLs / data URIs, or a form upload.
///
/// Responds with `{"result": [...], "ids": [...]}`, or with an empty body
/// when the submission is refused as a whole.
pub async fn ingest_images(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let kind = SubmissionKind::from_content_type(
        request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );

    let items = match kind {
        SubmissionKind::Json => json_items(request, &state).await,
        SubmissionKind::Multipart => form_items(request, &state).await,
        SubmissionKind::Unsupported => Err(Rejection::UnsupportedMedia),
    };

    let report = match items {
        Ok(items) => state.ingestor.ingest_batch(items).await,
        Err(rejection) => Err(rejection),
    };

    match report {
        Ok(report) => {
            let status = StatusCode::from_u16(report.status.http_status())
                .unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(report.response())).into_response()
        }
        Err(rejection) => {
            tracing::debug!("Submission refused: {}", rejection);
            let status = StatusCode::from_u16(rejection.http_status())
                .unwrap_or(StatusCode::BAD_REQUEST);
            status.into_response()
        }
    }
}

async fn json_items(
    request: Request,
    state: &Arc<AppState>,
) -> Result<Vec<IngestionItem>, Rejection> {
    let body = axum::body::to_bytes(request.into_body(), state.max_body_bytes)
        .await
        .map_err(|_| Rejection::Malformed)?;
    parse_json_items(&body)
}

async fn form_items(
    request: Request,
    state: &Arc<AppState>,
) -> Result<Vec<IngestionItem>, Rejection> {
    // Forms without a multipart boundary (urlencoded) cannot carry files
    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|_| Rejection::Malformed)?;

    let budget = BodyBudget::new(state.max_body_bytes as u64);
    let items =
        collect_uploads(multipart, state.ingestor.temp_store(), &state.upload, budget).await;
    if items.is_empty() {
        return Err(Rejection::Malformed);
    }
    Ok(items)
}
