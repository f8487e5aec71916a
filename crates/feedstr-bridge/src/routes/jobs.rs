//! Async add-feed endpoints.

use axum::extract::{Path, State};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::jobs::JobStatus;
use crate::state::AppState;

/// Form body for `POST /add-async`.
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub url: Option<String>,
}

/// Response for `POST /add-async`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response for `GET /add-status/{id}`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npub: Option<String>,
}

/// Submit an add-feed job. Returns the job id immediately; progress is
/// polled via `add_status`.
pub async fn add_async(
    State(state): State<AppState>,
    Form(request): Form<AddRequest>,
) -> Json<SubmitResponse> {
    let url = match request.url.map(|u| u.trim().to_string()) {
        Some(url) if !url.is_empty() => url,
        _ => {
            return Json(SubmitResponse {
                job_id: None,
                error: Some("Feed URL is required".to_string()),
            });
        }
    };

    let job_id = state.jobs.submit(state.registrar.clone(), url);
    metrics::gauge!("jobs_tracked").set(state.jobs.len() as f64);

    Json(SubmitResponse {
        job_id: Some(job_id),
        error: None,
    })
}

/// Poll an add-feed job. Unknown (or already purged) ids report failure.
pub async fn add_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<StatusResponse> {
    let Some(job) = state.jobs.query(&id) else {
        return Json(StatusResponse {
            status: JobStatus::Failed.as_str(),
            message: None,
            error: Some("Job not found".to_string()),
            url: None,
            npub: None,
        });
    };

    Json(StatusResponse {
        status: job.status.as_str(),
        message: Some(job.message),
        error: job.error,
        url: job.feed_url,
        npub: job.npub,
    })
}
