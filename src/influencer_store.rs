use crate::attribution::{is_valid_email, validate_in_phone};
use crate::candidate_store;
use crate::errors::{unique_violation_constraint, AppError};
use crate::models::{Candidate, CreateInfluencerRequest, Influencer, Referral};
use crate::referral_code;
use chrono::Utc;
use sqlx::{PgExecutor, PgPool};

/// Directory of influencer records.
///
/// Owns influencer CRUD, referral-code allocation, and the two-tier referral
/// lookup serving both the join table and the historical denormalized column.
pub struct InfluencerDirectory {
    pool: PgPool,
}

impl InfluencerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an influencer with `referral_count = 0`.
    ///
    /// A caller-supplied `unique_code` is rejected on collision; otherwise a
    /// code is generated from the name and the clock, retrying with numeric
    /// suffixes up to `max_retries` before giving up with a `Conflict`.
    pub async fn create(
        &self,
        req: &CreateInfluencerRequest,
        max_retries: u32,
    ) -> Result<Influencer, AppError> {
        let name = req.name.trim().to_string();
        let email = req.email.trim().to_lowercase();
        let phone = req.phone.trim();

        if name.is_empty() || email.is_empty() || phone.is_empty() {
            return Err(AppError::Validation(
                "name, email and phone are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(AppError::Validation(format!("Invalid email: {}", email)));
        }
        let (phone_valid, normalized_phone) = validate_in_phone(phone);
        if !phone_valid {
            return Err(AppError::Validation(format!(
                "Invalid phone number: {}",
                phone
            )));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Influencer with email {} already exists",
                email
            )));
        }

        let unique_code = match req
            .unique_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => {
                let code = code.to_uppercase();
                if self.find_by_unique_code(&code).await?.is_some() {
                    return Err(AppError::Conflict(format!(
                        "Unique code {} is already taken",
                        code
                    )));
                }
                code
            }
            None => self.allocate_code(&name, max_retries).await?,
        };

        let influencer = sqlx::query_as::<_, Influencer>(
            r#"
            INSERT INTO influencers (name, email, phone, unique_code)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(&email)
        .bind(&normalized_phone)
        .bind(&unique_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation_constraint(&e) {
            // The pre-checks race with concurrent creates; the constraints
            // are the final arbiter.
            Some(c) if c.contains("email") => {
                AppError::Conflict(format!("Influencer with email {} already exists", email))
            }
            Some(_) => AppError::Conflict(format!("Unique code {} is already taken", unique_code)),
            None => AppError::DatabaseError(e),
        })?;

        tracing::info!(
            "✓ Created influencer {} with code {}",
            influencer.id,
            influencer.unique_code
        );

        Ok(influencer)
    }

    /// Allocates an unused referral code, retrying with numeric suffixes.
    async fn allocate_code(&self, name: &str, max_retries: u32) -> Result<String, AppError> {
        let base = referral_code::base_code(name, Utc::now().timestamp_millis());
        let mut candidate = base.clone();
        let mut attempt = 0u32;

        while self.find_by_unique_code(&candidate).await?.is_some() {
            attempt += 1;
            if attempt > max_retries {
                tracing::error!(
                    "Exhausted {} attempts allocating a referral code for '{}'",
                    max_retries,
                    name
                );
                return Err(AppError::Conflict(format!(
                    "Could not allocate a unique referral code after {} attempts",
                    max_retries
                )));
            }
            candidate = referral_code::with_suffix(&base, attempt);
        }

        Ok(candidate)
    }

    pub async fn find_by_unique_code(&self, code: &str) -> Result<Option<Influencer>, AppError> {
        lookup_by_unique_code(&self.pool, code)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Influencer>, AppError> {
        sqlx::query_as::<_, Influencer>("SELECT * FROM influencers WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// All influencers, newest created first.
    pub async fn get_all(&self) -> Result<Vec<Influencer>, AppError> {
        sqlx::query_as::<_, Influencer>(
            "SELECT * FROM influencers ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    /// Candidates attributed to the influencer holding `code`.
    ///
    /// Two-tier lookup: the join table is consulted first; when it yields
    /// nothing (historical candidates predate it) the denormalized
    /// `referral_code` column is queried instead. Errors on either tier are
    /// absorbed; the worst case is an empty result, never a failed read.
    pub async fn get_referrals(&self, code: &str) -> Vec<Candidate> {
        match self.referrals_via_join(code).await {
            Ok(rows) if !rows.is_empty() => rows,
            Ok(_) => {
                tracing::debug!(
                    "No join rows for code {}, falling back to denormalized column",
                    code
                );
                self.referrals_via_column(code).await
            }
            Err(e) => {
                tracing::warn!(
                    "Join lookup for code {} failed ({}), falling back to denormalized column",
                    code,
                    e
                );
                self.referrals_via_column(code).await
            }
        }
    }

    async fn referrals_via_join(&self, code: &str) -> Result<Vec<Candidate>, sqlx::Error> {
        sqlx::query_as::<_, Candidate>(
            r#"
            SELECT c.*
            FROM candidates c
            JOIN influencer_referrals ir ON ir.candidate_id = c.id
            JOIN influencers i ON i.id = ir.influencer_id
            WHERE i.unique_code = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
    }

    async fn referrals_via_column(&self, code: &str) -> Vec<Candidate> {
        match candidate_store::by_referral_code(&self.pool, code).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    "Denormalized referral lookup for code {} failed: {}",
                    code,
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Looks up an influencer by unique code on any executor, so the attribution
/// transaction can resolve codes without leaving its connection.
pub async fn lookup_by_unique_code<'e, E>(
    executor: E,
    code: &str,
) -> Result<Option<Influencer>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Influencer>("SELECT * FROM influencers WHERE unique_code = $1")
        .bind(code)
        .fetch_optional(executor)
        .await
}

/// Inserts a referral link row. Returns the new row, or `None` when the
/// `(influencer, candidate)` pair was already linked and nothing was written,
/// which is what makes reconciliation idempotent.
pub async fn record_referral<'e, E>(
    executor: E,
    influencer_id: i64,
    candidate_id: i64,
) -> Result<Option<Referral>, AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Referral>(
        r#"
        INSERT INTO influencer_referrals (influencer_id, candidate_id)
        VALUES ($1, $2)
        ON CONFLICT (influencer_id, candidate_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(influencer_id)
    .bind(candidate_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::DatabaseError)
}

/// Atomically bumps an influencer's referral counter and returns the updated
/// row. Expressed at the storage layer so concurrent submissions can never
/// lose an increment.
pub async fn increment_referral_count<'e, E>(
    executor: E,
    influencer_id: i64,
) -> Result<Influencer, AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Influencer>(
        r#"
        UPDATE influencers
        SET referral_count = referral_count + 1
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(influencer_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::DatabaseError)
}
