//! Movco Lead API Library
//!
//! Backend for a moving-quote lead-generation service: customers submit
//! addresses and room photos, an external AI vision service estimates volume
//! and cost, and the resulting lead is distributed to partner removal
//! companies by postcode coverage and prepaid wallet balance.
//!
//! # Modules
//!
//! - `analysis`: AI vision proxy with heuristic fallback.
//! - `analysis_cache`: Checksum-validated cache entries for analysis results.
//! - `circuit_breaker`: Circuit breaker for the vision upstream.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `distribution`: Lead distribution and wallet charging.
//! - `errors`: Error handling types.
//! - `handlers`: Quote, booking-interest and admin HTTP handlers; router.
//! - `models`: Core data models.
//! - `payment_client`: Payment gateway checkout client.
//! - `postcode`: UK postcode area-code extraction.
//! - `services`: External service clients (vision, booking notifier).
//! - `wallet_handler`: Gateway webhook and checkout-creation handlers.
//! - `wallet_models`: Gateway event payload models.

pub mod analysis;
pub mod analysis_cache;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod distribution;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod payment_client;
pub mod postcode;
pub mod services;
pub mod wallet_handler;
pub mod wallet_models;
