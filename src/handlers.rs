use crate::attribution;
use crate::candidate_store::CandidateStore;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::influencer_store::InfluencerDirectory;
use crate::models::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Deduplication cache to reject rapid duplicate submissions for the
    /// same email before they reach the database.
    pub recent_submission_cache: Cache<String, i64>,
}

/// Health check endpoint.
///
/// Reports ok only when storage answers a probe query.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error"})),
            )
        }
    }
}

/// POST /api/influencers
///
/// Creates an influencer. The unique code is caller-supplied (rejected on
/// collision) or generated with a capped collision-retry loop.
///
/// # Returns
///
/// * `201` with the created influencer, including its code and
///   `referral_count: 0`, or `400`/`409` on validation/conflict.
pub async fn create_influencer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateInfluencerRequest>,
) -> Result<(StatusCode, Json<Influencer>), AppError> {
    tracing::info!("POST /api/influencers - email: {}", payload.email);

    let directory = InfluencerDirectory::new(state.db.clone());
    let influencer = directory
        .create(&payload, state.config.code_max_retries)
        .await?;

    Ok((StatusCode::CREATED, Json(influencer)))
}

/// GET /api/influencers
///
/// All influencers, newest created first.
pub async fn list_influencers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Influencer>>, AppError> {
    let directory = InfluencerDirectory::new(state.db.clone());
    Ok(Json(directory.get_all().await.context("listing influencers")?))
}

/// GET /api/influencers/:code
pub async fn get_influencer(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Influencer>, AppError> {
    let directory = InfluencerDirectory::new(state.db.clone());
    let influencer = directory
        .find_by_unique_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No influencer with code {}", code)))?;

    Ok(Json(influencer))
}

/// GET /api/influencers/:code/referrals
///
/// Candidates attributed to the influencer holding `code`, via the two-tier
/// lookup (join table first, denormalized column second). Unknown codes and
/// lookup failures both yield an empty array rather than an error.
pub async fn get_influencer_referrals(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<Vec<Candidate>> {
    let directory = InfluencerDirectory::new(state.db.clone());
    Json(directory.get_referrals(&code).await)
}

/// POST /api/influencers/update-referrals
///
/// Batch backfill of referral links for historical candidates. Always 200;
/// the body carries a per-entry success/error report.
pub async fn update_referrals(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReferralUpdateRequest>,
) -> Json<Vec<ReferralUpdateOutcome>> {
    tracing::info!(
        "POST /api/influencers/update-referrals - {} entries",
        payload.entries.len()
    );

    Json(attribution::reconcile_referrals(&state.db, &payload.entries).await)
}

/// POST /api/candidates
///
/// Submits a candidate application, optionally attributed to an influencer
/// code. An unresolvable code never blocks the application; it is echoed
/// back with a `referralWarning`.
///
/// # Returns
///
/// * `201` with `{candidateId, referralCode}`, `400` on missing name/email,
///   `409` on duplicate email.
pub async fn submit_candidate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CandidateSubmission>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    tracing::info!(
        "POST /api/candidates - email: {}, influencer code: {:?}",
        payload.email,
        payload.influencer_code
    );

    let dedup_key = payload.email.trim().to_lowercase();
    if !dedup_key.is_empty() && state.recent_submission_cache.get(&dedup_key).await.is_some() {
        return Err(AppError::Conflict(format!(
            "A submission for {} was already received moments ago",
            dedup_key
        )));
    }

    let response = attribution::submit_candidate(&state.db, payload).await?;

    state
        .recent_submission_cache
        .insert(dedup_key, chrono::Utc::now().timestamp_millis())
        .await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/candidates
///
/// All candidates, newest first, left-joined with the job title when the
/// application targets a listing.
pub async fn list_candidates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CandidateWithJob>>, AppError> {
    let store = CandidateStore::new(state.db.clone());
    Ok(Json(store.get_all().await.context("listing candidates")?))
}
