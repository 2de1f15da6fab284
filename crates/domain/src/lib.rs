//! Domain layer for the scheduled reports backend.
//!
//! This crate contains:
//! - Domain models (ReportDefinition, RecurrenceSchedule, aggregation trees)
//! - Pure report logic (time window rewriting, flattening, column reconciliation)
//! - Collaborator traits (report store, query executor, exporter, mailer)

pub mod models;
pub mod services;
