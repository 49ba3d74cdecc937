/// Integration tests for the candidate-submission and referral-attribution
/// flow, run against a real Postgres database.
/// Marked ignored to avoid running against production by accident; set
/// TEST_DATABASE_URL to run.
use std::env;

use referral_intake_api::attribution;
use referral_intake_api::candidate_store::{self, CandidateStore};
use referral_intake_api::db::Database;
use referral_intake_api::errors::AppError;
use referral_intake_api::influencer_store::InfluencerDirectory;
use referral_intake_api::models::{
    CandidateSubmission, CreateInfluencerRequest, NewCandidate, ReferralUpdateEntry,
};

async fn test_db() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.ensure_schema().await?;
    Ok(db)
}

/// Unique tag so repeated runs never trip the email constraints.
fn unique_tag() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn submission(name: &str, email: String, code: Option<String>) -> CandidateSubmission {
    CandidateSubmission {
        name: name.to_string(),
        email,
        phone: "8888888888".to_string(),
        influencer_code: code,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore]
async fn end_to_end_referral_attribution() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let directory = InfluencerDirectory::new(db.pool.clone());

    let influencer = directory
        .create(
            &CreateInfluencerRequest {
                name: "Asha Rao".to_string(),
                email: format!("asha+{}@example.com", tag),
                phone: "9876543210".to_string(),
                unique_code: None,
            },
            25,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(influencer.referral_count, 0);

    // Code shape: 1-3 uppercase letters then digits
    let prefix: String = influencer
        .unique_code
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    assert!((1..=3).contains(&prefix.len()));
    assert!(prefix.chars().all(|c| c.is_ascii_uppercase()));
    assert!(influencer.unique_code[prefix.len()..]
        .chars()
        .all(|c| c.is_ascii_digit()));

    let response = attribution::submit_candidate(
        &db.pool,
        submission(
            "Ravi",
            format!("ravi+{}@example.com", tag),
            Some(influencer.unique_code.clone()),
        ),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(
        response.referral_code.as_deref(),
        Some(influencer.unique_code.as_str())
    );
    assert!(response.referral_warning.is_none());

    let refreshed = directory
        .find_by_unique_code(&influencer.unique_code)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("influencer still present");
    assert_eq!(refreshed.referral_count, 1);

    let referrals = directory.get_referrals(&influencer.unique_code).await;
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].id, response.candidate_id);
    assert_eq!(
        referrals[0].referral_code.as_deref(),
        Some(influencer.unique_code.as_str())
    );

    Ok(())
}

#[tokio::test]
#[ignore]
async fn duplicate_email_fails_whole_submission() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let email = format!("dup+{}@example.com", tag);

    attribution::submit_candidate(&db.pool, submission("First", email.clone(), None))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let second = attribution::submit_candidate(&db.pool, submission("Second", email.clone(), None)).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    // No partial second row: the email still resolves to exactly one candidate
    let store = CandidateStore::new(db.pool.clone());
    let found = store
        .find_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("first candidate present");
    assert_eq!(found.name, "First");

    Ok(())
}

#[tokio::test]
#[ignore]
async fn unknown_code_never_gates_submission() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let unknown_code = format!("NOPE{}", tag.rem_euclid(100_000));

    let response = attribution::submit_candidate(
        &db.pool,
        submission(
            "Ravi",
            format!("stray+{}@example.com", tag),
            Some(unknown_code.clone()),
        ),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // The submission succeeds and echoes the unresolvable code, with a warning
    assert_eq!(response.referral_code.as_deref(), Some(unknown_code.as_str()));
    assert!(response.referral_warning.is_some());

    // No influencer holds the code, so the join tier is empty; the
    // denormalized column still serves the candidate
    let directory = InfluencerDirectory::new(db.pool.clone());
    assert!(directory
        .find_by_unique_code(&unknown_code)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .is_none());

    let referrals = directory.get_referrals(&unknown_code).await;
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].id, response.candidate_id);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn join_rows_win_over_denormalized_column() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let directory = InfluencerDirectory::new(db.pool.clone());

    let influencer = directory
        .create(
            &CreateInfluencerRequest {
                name: "Meena Iyer".to_string(),
                email: format!("meena+{}@example.com", tag),
                phone: "9876543210".to_string(),
                unique_code: None,
            },
            25,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Candidate A goes through attribution: join row + denormalized column
    let attributed = attribution::submit_candidate(
        &db.pool,
        submission(
            "Attributed",
            format!("attributed+{}@example.com", tag),
            Some(influencer.unique_code.clone()),
        ),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Candidate B gets only the denormalized column and no join row,
    // like a historical row predating the join table
    let historical = NewCandidate {
        name: "Historical".to_string(),
        email: format!("historical+{}@example.com", tag),
        phone: "7777777777".to_string(),
        city: None,
        work_radius_km: None,
        age: None,
        education: None,
        experience: None,
        languages: None,
        license_types: None,
        additional_cities: None,
        pan_number: None,
        aadhar_number: None,
        pan_file: None,
        aadhar_file: None,
        additional_info: None,
        referral_code: Some(influencer.unique_code.clone()),
        job_id: None,
    };
    candidate_store::insert(&db.pool, &historical)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // The join tier is non-empty, so only the attributed candidate is served
    let referrals = directory.get_referrals(&influencer.unique_code).await;
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].id, attributed.candidate_id);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn reconciliation_is_idempotent() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let directory = InfluencerDirectory::new(db.pool.clone());

    let influencer = directory
        .create(
            &CreateInfluencerRequest {
                name: "Kiran Shah".to_string(),
                email: format!("kiran+{}@example.com", tag),
                phone: "9876543210".to_string(),
                unique_code: None,
            },
            25,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // A candidate submitted without any code
    let orphan = attribution::submit_candidate(
        &db.pool,
        submission("Orphan", format!("orphan+{}@example.com", tag), None),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let entries = vec![ReferralUpdateEntry {
        candidate_id: orphan.candidate_id,
        influencer_code: influencer.unique_code.clone(),
    }];

    let first = attribution::reconcile_referrals(&db.pool, &entries).await;
    assert_eq!(first[0].status, "success");

    let second = attribution::reconcile_referrals(&db.pool, &entries).await;
    assert_eq!(second[0].status, "success");

    // Re-running never double-increments
    let refreshed = directory
        .find_by_unique_code(&influencer.unique_code)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("influencer still present");
    assert_eq!(refreshed.referral_count, 1);

    // The denormalized column was backfilled
    let store = CandidateStore::new(db.pool.clone());
    let candidate = store
        .find_by_email(&format!("orphan+{}@example.com", tag))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("candidate present");
    assert_eq!(
        candidate.referral_code.as_deref(),
        Some(influencer.unique_code.as_str())
    );

    Ok(())
}

#[tokio::test]
#[ignore]
async fn candidate_lookups_by_contact_and_document() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let phone = format!("9{:09}", tag.rem_euclid(1_000_000_000));
    let aadhar = format!("{:012}", tag.rem_euclid(1_000_000_000_000));
    let code = format!("LKP{}", tag.rem_euclid(100_000));

    let response = attribution::submit_candidate(
        &db.pool,
        CandidateSubmission {
            name: "Lookup Target".to_string(),
            email: format!("lookup+{}@example.com", tag),
            phone: phone.clone(),
            aadhar_number: Some(aadhar.clone()),
            influencer_code: Some(code.clone()),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let store = CandidateStore::new(db.pool.clone());

    let by_phone = store
        .find_by_phone(&phone)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("candidate found by phone");
    assert_eq!(by_phone.id, response.candidate_id);

    let by_aadhar = store
        .find_by_aadhar(&aadhar)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .expect("candidate found by aadhar");
    assert_eq!(by_aadhar.id, response.candidate_id);

    let by_code = store
        .get_by_referral_code(&code)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code[0].id, response.candidate_id);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn caller_supplied_code_collision_is_rejected() -> anyhow::Result<()> {
    let db = test_db().await?;
    let tag = unique_tag();
    let directory = InfluencerDirectory::new(db.pool.clone());
    let code = format!("TKN{}", tag.rem_euclid(100_000));

    directory
        .create(
            &CreateInfluencerRequest {
                name: "First Holder".to_string(),
                email: format!("holder+{}@example.com", tag),
                phone: "9876543210".to_string(),
                unique_code: Some(code.clone()),
            },
            25,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let collision = directory
        .create(
            &CreateInfluencerRequest {
                name: "Second Holder".to_string(),
                email: format!("other+{}@example.com", tag),
                phone: "9876543210".to_string(),
                unique_code: Some(code),
            },
            25,
        )
        .await;

    assert!(matches!(collision, Err(AppError::Conflict(_))));

    Ok(())
}
