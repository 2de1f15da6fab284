//! Shared utilities and common types for the scheduled reports backend.
//!
//! This crate provides validation helpers used by request payloads across
//! the other crates.

pub mod validation;
