//! Registered-feed listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// One feed in the listing.
#[derive(Debug, Serialize)]
pub struct FeedSummary {
    pub url: String,
    pub npub: String,
    pub state: &'static str,
    pub failure_count: u32,
}

/// List every registered feed with its identity and health.
pub async fn list_feeds(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedSummary>>, StatusCode> {
    let records = state.store.all_feeds().map_err(|e| {
        tracing::error!(error = %e, "failed to list feeds");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let summaries = records
        .into_iter()
        .map(|record| FeedSummary {
            npub: feedstr_core::npub_from_hex(&record.public_key).unwrap_or_default(),
            url: record.url,
            state: record.health.state.as_str(),
            failure_count: record.health.failure_count,
        })
        .collect();

    Ok(Json(summaries))
}

#[cfg(test)]
mod tests {
    use crate::routes::{router, test_support::test_state};
    use crate::store::FeedRecord;
    use axum::body::Body;
    use axum::http::Request;
    use feedstr_core::FeedIdentity;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_list_feeds() {
        let state = test_state();
        let identity = FeedIdentity::generate();
        state
            .store
            .insert(&FeedRecord {
                url: "https://example.com/feed".to_string(),
                public_key: identity.public_key_hex(),
                secret_key: identity.secret_key_hex(),
                health: Default::default(),
            })
            .unwrap();

        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/feeds").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_success());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let feeds: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(feeds.as_array().unwrap().len(), 1);
        assert_eq!(feeds[0]["url"], "https://example.com/feed");
        assert_eq!(feeds[0]["state"], "active");
        assert!(feeds[0]["npub"].as_str().unwrap().starts_with("npub1"));
    }
}
