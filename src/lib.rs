//! Quest company intelligence API library.
//!
//! Aggregates employee data from Apollo.io (cached in Postgres or memory),
//! web mentions and company profiles into one scored view per company.
//!
//! # Modules
//!
//! - `apollo_storage`: Cache status, freshness rule and write-back.
//! - `circuit_breaker`: Circuit breaker for external APIs.
//! - `classification`: Keyword rule tables for seniority, departments and search intent.
//! - `company_search`: Company name normalization and suggestions.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema.
//! - `db_storage`: Postgres enrichment store.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `intelligence`: Multi-source orchestrator.
//! - `memory_storage`: In-memory enrichment store.
//! - `models`: Core data models.
//! - `scoring`: Enrichment score, insights and recommendations.
//! - `services`: External service clients (Apollo) and source providers.

pub mod apollo_storage;
pub mod circuit_breaker;
pub mod classification;
pub mod company_search;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod intelligence;
pub mod memory_storage;
pub mod models;
pub mod scoring;
pub mod services;
