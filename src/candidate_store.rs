use crate::errors::{unique_violation_constraint, AppError};
use crate::models::{Candidate, CandidateWithJob, NewCandidate};
use sqlx::{PgExecutor, PgPool};

/// Store for candidate application records.
pub struct CandidateStore {
    pool: PgPool,
}

impl CandidateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Candidate>, AppError> {
        sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Candidate>, AppError> {
        sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_by_aadhar(&self, aadhar: &str) -> Result<Option<Candidate>, AppError> {
        sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE aadhar_number = $1")
            .bind(aadhar)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// All candidates, newest first, with the title of the job each
    /// application targets when one is referenced.
    pub async fn get_all(&self) -> Result<Vec<CandidateWithJob>, AppError> {
        sqlx::query_as::<_, CandidateWithJob>(
            r#"
            SELECT c.*, j.title AS job_title
            FROM candidates c
            LEFT JOIN jobs j ON j.id = c.job_id
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    /// Candidates whose denormalized `referral_code` column matches exactly.
    pub async fn get_by_referral_code(&self, code: &str) -> Result<Vec<Candidate>, AppError> {
        by_referral_code(&self.pool, code)
            .await
            .map_err(AppError::DatabaseError)
    }
}

/// Exact-match query on the denormalized referral column. Shared with the
/// influencer directory's fallback read path.
pub async fn by_referral_code<'e, E>(executor: E, code: &str) -> Result<Vec<Candidate>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Candidate>(
        "SELECT * FROM candidates WHERE referral_code = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(code)
    .fetch_all(executor)
    .await
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Candidate>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Plain insert of a normalized candidate record; no referral logic.
/// Executor-generic so the attribution service can run it inside its
/// transaction. Unique violations surface as `Conflict`.
pub async fn insert<'e, E>(executor: E, record: &NewCandidate) -> Result<i64, AppError>
where
    E: PgExecutor<'e>,
{
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO candidates (
            name, email, phone, city, work_radius_km, age, education,
            experience, languages, license_types, additional_cities,
            pan_number, aadhar_number, pan_file, aadhar_file,
            additional_info, referral_code, job_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING id
        "#,
    )
    .bind(&record.name)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(&record.city)
    .bind(record.work_radius_km)
    .bind(record.age)
    .bind(&record.education)
    .bind(&record.experience)
    .bind(&record.languages)
    .bind(&record.license_types)
    .bind(&record.additional_cities)
    .bind(&record.pan_number)
    .bind(&record.aadhar_number)
    .bind(&record.pan_file)
    .bind(&record.aadhar_file)
    .bind(&record.additional_info)
    .bind(&record.referral_code)
    .bind(record.job_id)
    .fetch_one(executor)
    .await
    .map_err(|e| match unique_violation_constraint(&e) {
        Some(c) if c.contains("aadhar") => AppError::Conflict(format!(
            "A candidate with Aadhar number {} already exists",
            record.aadhar_number.as_deref().unwrap_or("")
        )),
        Some(_) => AppError::Conflict(format!(
            "A candidate with email {} already exists",
            record.email
        )),
        None => AppError::DatabaseError(e),
    })?;

    Ok(row.0)
}
