//! Persistence layer for the scheduled reports service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - The Postgres-backed report store
//! - Query metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
