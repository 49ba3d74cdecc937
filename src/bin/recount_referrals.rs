//! Script to reconcile drifted referral counters from the join table.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

/// Main entry point for the recount script.
///
/// Rewrites every influencer's referral_count from a COUNT(*) over
/// influencer_referrals and reports how many rows had drifted. Linking
/// failures during submission are absorbed by design, so counters can lag
/// behind the join table; this puts them back in step.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database. Recounting referrals...");

    let query = r#"
        UPDATE influencers i
        SET referral_count = counted.n
        FROM (
            SELECT i2.id, COUNT(ir.id)::int AS n
            FROM influencers i2
            LEFT JOIN influencer_referrals ir ON ir.influencer_id = i2.id
            GROUP BY i2.id
        ) counted
        WHERE counted.id = i.id
        AND i.referral_count IS DISTINCT FROM counted.n
    "#;

    let result = sqlx::query(query).execute(&pool).await?;

    tracing::info!(
        "Recount complete. Corrected {} drifted referral counter(s).",
        result.rows_affected()
    );

    Ok(())
}
