//! Report definition storage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::ReportDefinition;

/// Errors raised by a report store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Report store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored report {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Report {id} cannot be stored: {reason}")]
    Invalid { id: String, reason: String },
}

/// Persistent home of report definitions, partitioned by tenant.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ReportDefinition>, StoreError>;

    /// Inserts or replaces the definition with the same id.
    async fn put(&self, report: &ReportDefinition) -> Result<(), StoreError>;

    /// Returns false when no definition had that id.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Definitions of one tenant, oldest first.
    async fn list_by_tenant(&self, tenant: &str) -> Result<Vec<ReportDefinition>, StoreError>;

    /// Every tenant with at least one stored definition.
    async fn list_tenants(&self) -> Result<Vec<String>, StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local store, used by tests and database-less runs.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<BTreeMap<String, ReportDefinition>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn get(&self, id: &str) -> Result<Option<ReportDefinition>, StoreError> {
        Ok(self.reports.read().await.get(id).cloned())
    }

    async fn put(&self, report: &ReportDefinition) -> Result<(), StoreError> {
        self.reports
            .write()
            .await
            .insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.reports.write().await.remove(id).is_some())
    }

    async fn list_by_tenant(&self, tenant: &str) -> Result<Vec<ReportDefinition>, StoreError> {
        let mut reports: Vec<_> = self
            .reports
            .read()
            .await
            .values()
            .filter(|r| r.company_id == tenant)
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(reports)
    }

    async fn list_tenants(&self) -> Result<Vec<String>, StoreError> {
        let mut tenants: Vec<String> = self
            .reports
            .read()
            .await
            .values()
            .map(|r| r.company_id.clone())
            .collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }
}
