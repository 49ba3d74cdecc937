use sqlx::{postgres::PgPoolOptions, PgPool};

/// Idempotent schema bootstrap, run at startup. The join table is the source
/// of truth for attribution; `candidates.referral_code` is a denormalized
/// copy of the submitted code kept for historical reads.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS influencers (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        unique_code TEXT NOT NULL UNIQUE,
        referral_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS candidates (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        city TEXT,
        work_radius_km INTEGER,
        age INTEGER,
        education TEXT,
        experience TEXT,
        languages JSONB,
        license_types JSONB,
        additional_cities JSONB,
        pan_number TEXT,
        aadhar_number TEXT UNIQUE,
        pan_file TEXT,
        aadhar_file TEXT,
        additional_info JSONB,
        referral_code TEXT,
        status TEXT NOT NULL DEFAULT 'new',
        job_id BIGINT REFERENCES jobs(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS influencer_referrals (
        id BIGSERIAL PRIMARY KEY,
        influencer_id BIGINT NOT NULL REFERENCES influencers(id) ON DELETE CASCADE,
        candidate_id BIGINT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (influencer_id, candidate_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_candidates_referral_code ON candidates (referral_code)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}
