use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

// ============ Database Models ============

/// An influencer holding a shareable unique code used to attribute
/// candidate signups.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Influencer {
    /// Unique identifier for the influencer.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Contact email; globally unique.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Human-shareable referral token; globally unique.
    pub unique_code: String,
    /// Denormalized count of linked candidates. Maintained with an atomic
    /// increment; reconcilable from the join table via `recount_referrals`.
    pub referral_count: i32,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// A job applicant's submitted record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique identifier for the candidate.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Email address; globally unique.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// City of residence.
    pub city: Option<String>,
    /// How far the candidate will travel for work, in km.
    pub work_radius_km: Option<i32>,
    /// Age in years.
    pub age: Option<i32>,
    /// Education level.
    pub education: Option<String>,
    /// Free-form work-experience summary.
    pub experience: Option<String>,
    /// Spoken languages, stored as a JSON array.
    pub languages: Option<Value>,
    /// Held license types, stored as a JSON array.
    pub license_types: Option<Value>,
    /// Additional cities the candidate can work in, stored as a JSON array.
    pub additional_cities: Option<Value>,
    /// PAN document number.
    pub pan_number: Option<String>,
    /// Aadhar document number; unique where present.
    pub aadhar_number: Option<String>,
    /// Uploaded PAN document file name (opaque reference).
    pub pan_file: Option<String>,
    /// Uploaded Aadhar document file name (opaque reference).
    pub aadhar_file: Option<String>,
    /// Packed low-frequency fields that don't warrant first-class columns.
    pub additional_info: Option<Value>,
    /// Denormalized copy of the influencer code submitted with the
    /// application. Written even when the code resolves to nothing; the
    /// `influencer_referrals` table is the source of truth for attribution.
    pub referral_code: Option<String>,
    /// Application status; updated by administrative flows.
    pub status: String,
    /// Referenced job listing, when the application targets one.
    pub job_id: Option<i64>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// A candidate row joined with the title of the job it targets.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CandidateWithJob {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub candidate: Candidate,
    /// Title of the referenced job, when one exists.
    pub job_title: Option<String>,
}

/// A link recording that a candidate's signup is attributed to an influencer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Referral {
    /// Surrogate identifier.
    pub id: i64,
    /// The influencer the signup is attributed to.
    pub influencer_id: i64,
    /// The attributed candidate.
    pub candidate_id: i64,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request payload for creating an influencer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInfluencerRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Caller-supplied code; rejected on collision. Generated when absent.
    pub unique_code: Option<String>,
}

/// Candidate application payload. The wire contract is camelCase, matching
/// the registration form client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: Option<String>,
    pub work_radius_km: Option<i32>,
    pub age: Option<i32>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub languages: Option<Vec<String>>,
    pub license_types: Option<Vec<String>>,
    pub additional_cities: Option<Vec<String>>,
    pub pan_number: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_file: Option<String>,
    pub aadhar_file: Option<String>,
    pub job_id: Option<i64>,
    // Low-frequency fields; packed into additional_info at normalization.
    pub current_employer: Option<String>,
    pub expected_salary: Option<String>,
    pub notice_period: Option<String>,
    /// Caller-supplied structured extras, merged into additional_info.
    pub additional_info: Option<Value>,
    /// Optional influencer code attributing this application.
    pub influencer_code: Option<String>,
}

/// Response to a candidate submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    /// Identifier of the newly created candidate.
    pub candidate_id: i64,
    /// The originally submitted influencer code (not necessarily resolved).
    pub referral_code: Option<String>,
    /// Present when referral linking did not complete; the application
    /// itself still succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_warning: Option<String>,
}

/// Batch request for backfilling referral links on historical candidates.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralUpdateRequest {
    pub entries: Vec<ReferralUpdateEntry>,
}

/// One `(candidate, influencer code)` pair to reconcile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralUpdateEntry {
    pub candidate_id: i64,
    pub influencer_code: String,
}

/// Per-entry reconciliation outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralUpdateOutcome {
    pub candidate_id: i64,
    /// "success" or "error".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============ Internal Records ============

/// Normalized candidate record, ready for insertion. Produced from a
/// `CandidateSubmission` by the attribution service; array fields are
/// flattened to JSON and low-frequency fields packed into `additional_info`.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: Option<String>,
    pub work_radius_km: Option<i32>,
    pub age: Option<i32>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub languages: Option<Value>,
    pub license_types: Option<Value>,
    pub additional_cities: Option<Value>,
    pub pan_number: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_file: Option<String>,
    pub aadhar_file: Option<String>,
    pub additional_info: Option<Value>,
    pub referral_code: Option<String>,
    pub job_id: Option<i64>,
}
