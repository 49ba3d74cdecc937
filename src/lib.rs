//! Candidate Registration & Referral Tracking API Library
//!
//! This library provides the core functionality for the candidate-intake
//! API: relational storage over Postgres, influencer referral attribution,
//! data models, and HTTP handlers.
//!
//! # Modules
//!
//! - `attribution`: Candidate submission and referral attribution workflow.
//! - `candidate_store`: Candidate storage operations.
//! - `config`: Configuration management.
//! - `db`: Database connection, pool management, and schema bootstrap.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `influencer_store`: Influencer directory and referral lookups.
//! - `models`: Core data models.
//! - `referral_code`: Referral-code generation.

// Re-export primary modules for shared use in tests and other binaries
pub mod attribution;
pub mod candidate_store;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod influencer_store;
pub mod models;
pub mod referral_code;
