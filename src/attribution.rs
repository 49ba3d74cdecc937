//! Referral attribution and candidate submission.
//!
//! The submission workflow, as one logical transaction:
//! 1. Validate the payload (name/email present) before any write
//! 2. Normalize array fields and pack low-frequency fields into additional_info
//! 3. Insert the candidate, denormalized referral_code included
//! 4. Best-effort: resolve the influencer code, link, bump the counter
//! 5. Commit; report the candidate id and the submitted code
//!
//! Candidate capture is the primary goal; referral bookkeeping is advisory.
//! Step 4 runs inside a savepoint so its failure can never fail or roll back
//! the application itself; it is logged and surfaced as a response warning.

use crate::candidate_store;
use crate::errors::AppError;
use crate::influencer_store;
use crate::models::{
    CandidateSubmission, NewCandidate, ReferralUpdateEntry, ReferralUpdateOutcome,
    SubmissionResponse,
};
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde_json::{json, Map, Value};
use sqlx::{Acquire, PgPool, Postgres, Transaction};

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    // Basic checks
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex
    // Matches: local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    if !email_regex.is_match(email) {
        tracing::warn!("❌ Invalid email format: {}", email);
        return false;
    }

    true
}

/// Validate and normalize Indian phone number
///
/// Uses phonenumber library (port of Google's libphonenumber) to:
/// - Parse phone number with Indian region (IN)
/// - Validate if it's a valid Indian number
/// - Return normalized E.164 format (+919876543210)
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_in_phone(raw: &str) -> (bool, String) {
    // Skip empty or very short strings
    if raw.trim().is_empty() || raw.len() < 8 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::IN), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("✓ Valid IN phone: {} → {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::warn!("❌ Invalid IN phone number: {}", raw);
                (false, "Invalid Indian phone number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("❌ Failed to parse IN phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// Rejects incomplete payloads before the transaction begins.
pub fn validate_submission(submission: &CandidateSubmission) -> Result<(), AppError> {
    if submission.name.trim().is_empty() || submission.email.trim().is_empty() {
        return Err(AppError::Validation(
            "name and email are required".to_string(),
        ));
    }
    Ok(())
}

/// Flattens an array-valued form field into a JSON array: entries are
/// trimmed, blanks dropped, and an empty list stores as NULL.
pub fn flatten_list(values: Option<Vec<String>>) -> Option<Value> {
    values.and_then(|list| {
        let flattened: Vec<String> = list
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if flattened.is_empty() {
            None
        } else {
            Some(Value::from(flattened))
        }
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Packs the low-frequency fields together with any caller-supplied blob
/// into the additional_info column.
fn pack_additional_info(submission: &CandidateSubmission) -> Option<Value> {
    let mut info = match &submission.additional_info {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("extra".to_string(), other.clone());
            map
        }
        None => Map::new(),
    };

    if let Some(employer) = submission.current_employer.as_deref().map(str::trim) {
        if !employer.is_empty() {
            info.insert("current_employer".to_string(), json!(employer));
        }
    }
    if let Some(salary) = submission.expected_salary.as_deref().map(str::trim) {
        if !salary.is_empty() {
            info.insert("expected_salary".to_string(), json!(salary));
        }
    }
    if let Some(notice) = submission.notice_period.as_deref().map(str::trim) {
        if !notice.is_empty() {
            info.insert("notice_period".to_string(), json!(notice));
        }
    }

    if info.is_empty() {
        None
    } else {
        Some(Value::Object(info))
    }
}

/// Normalizes a submission into an insertable record.
pub fn normalize_submission(submission: CandidateSubmission) -> NewCandidate {
    let additional_info = pack_additional_info(&submission);

    NewCandidate {
        name: submission.name.trim().to_string(),
        email: submission.email.trim().to_lowercase(),
        phone: submission.phone.trim().to_string(),
        city: non_blank(submission.city),
        work_radius_km: submission.work_radius_km,
        age: submission.age,
        education: non_blank(submission.education),
        experience: non_blank(submission.experience),
        languages: flatten_list(submission.languages),
        license_types: flatten_list(submission.license_types),
        additional_cities: flatten_list(submission.additional_cities),
        pan_number: non_blank(submission.pan_number),
        aadhar_number: non_blank(submission.aadhar_number),
        pan_file: non_blank(submission.pan_file),
        aadhar_file: non_blank(submission.aadhar_file),
        additional_info,
        // Denormalized copy of the submitted code, written even when it
        // resolves to nothing: an application is never blocked by a bad code.
        referral_code: non_blank(submission.influencer_code),
        job_id: submission.job_id,
    }
}

#[derive(Debug)]
enum LinkOutcome {
    /// Join row written (or already present) and counter bumped.
    Linked,
    /// The code matched no influencer; nothing was written.
    Unmatched,
}

/// Resolves the influencer code and writes the attribution inside a
/// savepoint. An error here rolls back only the savepoint; the enclosing
/// candidate insert survives.
async fn link_referral(
    tx: &mut Transaction<'_, Postgres>,
    candidate_id: i64,
    code: &str,
) -> Result<LinkOutcome, AppError> {
    let mut sp = tx.begin().await.map_err(AppError::DatabaseError)?;

    let Some(influencer) = influencer_store::lookup_by_unique_code(&mut *sp, code)
        .await
        .map_err(AppError::DatabaseError)?
    else {
        sp.commit().await.map_err(AppError::DatabaseError)?;
        return Ok(LinkOutcome::Unmatched);
    };

    let inserted =
        influencer_store::record_referral(&mut *sp, influencer.id, candidate_id).await?;
    if inserted.is_some() {
        let updated = influencer_store::increment_referral_count(&mut *sp, influencer.id).await?;
        tracing::info!(
            "✓ Attributed candidate {} to influencer {} (referral_count now {})",
            candidate_id,
            influencer.unique_code,
            updated.referral_count
        );
    }

    sp.commit().await.map_err(AppError::DatabaseError)?;
    Ok(LinkOutcome::Linked)
}

/// Creates a candidate and, when an influencer code was supplied, attributes
/// the application to that influencer.
///
/// Only the candidate insert is strictly atomic: a duplicate email rolls the
/// whole submission back with a `Conflict`, while any referral-linking
/// failure is absorbed and reported via `referral_warning`.
pub async fn submit_candidate(
    db: &PgPool,
    submission: CandidateSubmission,
) -> Result<SubmissionResponse, AppError> {
    validate_submission(&submission)?;
    let record = normalize_submission(submission);

    let mut tx = db.begin().await.map_err(AppError::DatabaseError)?;

    let candidate_id = candidate_store::insert(&mut *tx, &record).await?;

    let mut referral_warning = None;
    if let Some(code) = record.referral_code.as_deref() {
        match link_referral(&mut tx, candidate_id, code).await {
            Ok(LinkOutcome::Linked) => {}
            Ok(LinkOutcome::Unmatched) => {
                tracing::warn!(
                    "Influencer code {} on candidate {} matched no influencer",
                    code,
                    candidate_id
                );
                referral_warning = Some(format!(
                    "Influencer code {} did not match any influencer; application recorded without attribution",
                    code
                ));
            }
            Err(e) => {
                // Candidate capture wins over referral bookkeeping: log the
                // failure and keep going.
                tracing::warn!(
                    "Referral linking failed for candidate {} (code {}): {}",
                    candidate_id,
                    code,
                    e
                );
                referral_warning = Some(
                    "Referral attribution could not be completed; application recorded without attribution"
                        .to_string(),
                );
            }
        }
    }

    tx.commit().await.map_err(AppError::DatabaseError)?;

    tracing::info!(
        "✓ Candidate {} submitted (referral code: {:?})",
        candidate_id,
        record.referral_code.as_deref()
    );

    Ok(SubmissionResponse {
        candidate_id,
        referral_code: record.referral_code,
        referral_warning,
    })
}

/// Backfills referral links for historical candidates, one entry at a time.
///
/// Idempotent by construction: the join row uses an ignore-on-conflict
/// insert and the counter is bumped only when a row was actually inserted,
/// so re-running a batch never double-counts. One bad entry never aborts the
/// rest of the batch.
pub async fn reconcile_referrals(
    db: &PgPool,
    entries: &[ReferralUpdateEntry],
) -> Vec<ReferralUpdateOutcome> {
    let mut outcomes = Vec::with_capacity(entries.len());

    for entry in entries {
        match reconcile_entry(db, entry).await {
            Ok(message) => outcomes.push(ReferralUpdateOutcome {
                candidate_id: entry.candidate_id,
                status: "success".to_string(),
                message: Some(message.to_string()),
            }),
            Err(e) => {
                tracing::error!(
                    "Failed to reconcile candidate {} with code {}: {}",
                    entry.candidate_id,
                    entry.influencer_code,
                    e
                );
                outcomes.push(ReferralUpdateOutcome {
                    candidate_id: entry.candidate_id,
                    status: "error".to_string(),
                    message: Some(e.to_string()),
                });
                // Continue processing other entries even if one fails
            }
        }
    }

    outcomes
}

async fn reconcile_entry(
    db: &PgPool,
    entry: &ReferralUpdateEntry,
) -> Result<&'static str, AppError> {
    let code = entry.influencer_code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("influencerCode is required".to_string()));
    }

    let mut tx = db.begin().await.map_err(AppError::DatabaseError)?;

    let influencer = influencer_store::lookup_by_unique_code(&mut *tx, code)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(format!("No influencer with code {}", code)))?;

    let candidate = candidate_store::find_by_id(&mut *tx, entry.candidate_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| {
            AppError::NotFound(format!("No candidate with id {}", entry.candidate_id))
        })?;

    // Backfill the denormalized column for rows that predate the join table.
    if candidate.referral_code.as_deref() != Some(code) {
        sqlx::query("UPDATE candidates SET referral_code = $1 WHERE id = $2")
            .bind(code)
            .bind(candidate.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;
    }

    let inserted = influencer_store::record_referral(&mut *tx, influencer.id, candidate.id)
        .await?
        .is_some();
    if inserted {
        influencer_store::increment_referral_count(&mut *tx, influencer.id).await?;
    }

    tx.commit().await.map_err(AppError::DatabaseError)?;

    Ok(if inserted { "linked" } else { "already linked" })
}
