//! Audit record store
//!
//! [`AuditRepository`] is the fallible storage seam with a Postgres backend
//! ([`super::postgres::PgAuditRepository`]) and an in-process backend
//! ([`MemoryAuditRepository`]) that share ordering, filtering and grouping
//! semantics. [`AuditStore`] wraps a repository for the write path: its
//! operations never fail, they log and return a sentinel instead.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::models::{
    AuditFilter, AuditGroup, AuditRecord, GroupKey, NewAuditRecord, Page, ResultUpdate,
};
use crate::db::{DbError, DbResult};

/// Fallible access to the audit collection
///
/// Reads are always ordered by `timestamp` descending, with insertion order
/// (newest first) breaking ties. Groups are ordered by count descending,
/// ties going to the group seen first.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persist an attempt record and return its correlation id
    async fn insert(&self, record: NewAuditRecord) -> DbResult<Uuid>;

    /// Apply a terminal update; `None` when no record has this id
    async fn update_result(&self, id: Uuid, update: ResultUpdate)
        -> DbResult<Option<AuditRecord>>;

    async fn find(&self, filter: &AuditFilter, page: Page) -> DbResult<Vec<AuditRecord>>;

    async fn count(&self, filter: &AuditFilter) -> DbResult<i64>;

    async fn aggregate(&self, filter: &AuditFilter, key: GroupKey) -> DbResult<Vec<AuditGroup>>;
}

/// In-process audit repository
///
/// Records are kept in insertion order. `set_unavailable(true)` makes every
/// call fail, which is how tests simulate a store outage.
#[derive(Debug, Default)]
pub struct MemoryAuditRepository {
    records: RwLock<Vec<AuditRecord>>,
    unavailable: AtomicBool,
}

impl MemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a fully formed record as-is, terminal state included
    pub async fn seed(&self, record: AuditRecord) {
        self.records.write().await.push(record);
    }

    /// Every stored record in insertion order
    pub async fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    fn check(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory audit store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for MemoryAuditRepository {
    async fn insert(&self, record: NewAuditRecord) -> DbResult<Uuid> {
        self.check()?;
        let id = record.id;
        self.records.write().await.push(record.into_record());
        Ok(id)
    }

    async fn update_result(
        &self,
        id: Uuid,
        update: ResultUpdate,
    ) -> DbResult<Option<AuditRecord>> {
        self.check()?;
        let mut records = self.records.write().await;
        Ok(records.iter_mut().find(|r| r.id == id).map(|record| {
            record.action = update.action;
            record.result = update.result;
            record.updated_at = Some(update.updated_at);
            record.clone()
        }))
    }

    async fn find(&self, filter: &AuditFilter, page: Page) -> DbResult<Vec<AuditRecord>> {
        self.check()?;
        let records = self.records.read().await;

        // Iterating newest-inserted first makes the stable sort break
        // timestamp ties the same way `ORDER BY timestamp DESC, seq DESC` does.
        let mut matched: Vec<&AuditRecord> =
            records.iter().rev().filter(|r| filter.matches(r)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matched
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &AuditFilter) -> DbResult<i64> {
        self.check()?;
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| filter.matches(r)).count() as i64)
    }

    async fn aggregate(&self, filter: &AuditFilter, key: GroupKey) -> DbResult<Vec<AuditGroup>> {
        self.check()?;
        let records = self.records.read().await;

        let mut order: Vec<Option<String>> = Vec::new();
        let mut groups: HashMap<Option<String>, AuditGroup> = HashMap::new();

        for record in records.iter().filter(|r| filter.matches(r)) {
            let group_key = match key {
                GroupKey::ResourceType => Some(record.resource_type.to_string()),
                GroupKey::Actor => record.performed_by.user_id.clone(),
            };

            let group = groups.entry(group_key.clone()).or_insert_with(|| {
                order.push(group_key.clone());
                AuditGroup {
                    key: group_key,
                    first_actor: record.performed_by.clone(),
                    ..Default::default()
                }
            });

            group.count += 1;
            if record.result.success {
                group.successful += 1;
            } else {
                group.failed += 1;
                if record.updated_at.is_none() {
                    group.pending += 1;
                }
            }
        }

        let mut out: Vec<AuditGroup> =
            order.into_iter().filter_map(|k| groups.remove(&k)).collect();
        out.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(out)
    }
}

/// Never-failing facade over an [`AuditRepository`]
///
/// Errors are logged and turned into `None` or an empty list. Audit logging
/// must not break the request it observes.
#[derive(Clone)]
pub struct AuditStore {
    repo: Arc<dyn AuditRepository>,
}

impl std::fmt::Debug for AuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditStore").finish_non_exhaustive()
    }
}

impl AuditStore {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// Store backed by a fresh in-process repository
    pub fn in_memory() -> (Self, Arc<MemoryAuditRepository>) {
        let repo = Arc::new(MemoryAuditRepository::new());
        (Self::new(repo.clone()), repo)
    }

    /// The fallible repository, for readers that must surface outages
    pub fn repository(&self) -> Arc<dyn AuditRepository> {
        self.repo.clone()
    }

    pub async fn create(&self, record: NewAuditRecord) -> Option<Uuid> {
        let action = record.action;
        let resource_type = record.resource_type;
        match self.repo.insert(record).await {
            Ok(id) => {
                debug!(audit_id = %id, %action, %resource_type, "Audit record created");
                Some(id)
            },
            Err(e) => {
                error!(%action, %resource_type, error = %e, "Failed to create audit record");
                None
            },
        }
    }

    pub async fn update(&self, id: Uuid, update: ResultUpdate) -> Option<AuditRecord> {
        let action = update.action;
        match self.repo.update_result(id, update).await {
            Ok(Some(record)) => {
                debug!(audit_id = %id, %action, "Audit record finalized");
                Some(record)
            },
            Ok(None) => {
                warn!(audit_id = %id, %action, "Audit record to finalize was not found");
                None
            },
            Err(e) => {
                error!(audit_id = %id, %action, error = %e, "Failed to finalize audit record");
                None
            },
        }
    }

    pub async fn find(&self, filter: &AuditFilter, page: Page) -> Vec<AuditRecord> {
        self.repo.find(filter, page).await.unwrap_or_else(|e| {
            error!(error = %e, "Failed to query audit records");
            Vec::new()
        })
    }

    pub async fn aggregate(&self, filter: &AuditFilter, key: GroupKey) -> Vec<AuditGroup> {
        self.repo.aggregate(filter, key).await.unwrap_or_else(|e| {
            error!(error = %e, ?key, "Failed to aggregate audit records");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::{
        ActorSnapshot, AuditAction, AuditResult, RequestDetails, ResourceType,
    };
    use chrono::{Duration, Utc};

    fn actor(id: &str) -> ActorSnapshot {
        ActorSnapshot {
            user_id: Some(id.to_string()),
            email: Some(format!("{}@school.test", id)),
            role: Some("admin".to_string()),
            full_name: Some(id.to_uppercase()),
        }
    }

    fn attempt(kind: ResourceType, target: &str, by: &str) -> NewAuditRecord {
        NewAuditRecord::builder(kind)
            .target_id(target)
            .performed_by(actor(by))
            .request_details(RequestDetails {
                method: "DELETE".to_string(),
                url: format!("/api/v1/{}", target),
                ip: "10.0.0.1".to_string(),
                ..Default::default()
            })
            .build()
    }

    fn success() -> ResultUpdate {
        ResultUpdate {
            action: AuditAction::DeleteSuccess,
            result: AuditResult {
                success: true,
                status_code: Some(200),
                ..Default::default()
            },
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_then_update_moves_to_terminal_state() {
        let (store, repo) = AuditStore::in_memory();

        let id = store.create(attempt(ResourceType::Student, "S1", "u1")).await.unwrap();
        let updated = store.update(id, success()).await.unwrap();

        assert_eq!(updated.action, AuditAction::DeleteSuccess);
        assert!(updated.result.success);
        assert!(updated.updated_at.is_some());
        assert_eq!(repo.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let (store, _) = AuditStore::in_memory();
        assert!(store.update(Uuid::new_v4(), success()).await.is_none());
    }

    #[tokio::test]
    async fn test_outage_turns_into_sentinels() {
        let (store, repo) = AuditStore::in_memory();
        repo.set_unavailable(true);

        assert!(store.create(attempt(ResourceType::User, "U1", "u1")).await.is_none());
        assert!(store.update(Uuid::new_v4(), success()).await.is_none());
        assert!(store.find(&AuditFilter::default(), Page::first(10)).await.is_empty());
        assert!(store
            .aggregate(&AuditFilter::default(), GroupKey::Actor)
            .await
            .is_empty());

        // the fallible view still reports the failure
        assert!(store.repository().count(&AuditFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_find_orders_newest_first_and_paginates() {
        let repo = MemoryAuditRepository::new();
        let now = Utc::now();
        for (i, target) in ["a", "b", "c"].iter().enumerate() {
            let record = NewAuditRecord::builder(ResourceType::Course)
                .target_id(*target)
                .timestamp(now - Duration::minutes(10 - i as i64))
                .build();
            repo.insert(record).await.unwrap();
        }

        let page = repo.find(&AuditFilter::default(), Page::new(0, 2)).await.unwrap();
        let targets: Vec<_> = page.iter().filter_map(|r| r.target_id.as_deref()).collect();
        assert_eq!(targets, vec!["c", "b"]);

        let rest = repo.find(&AuditFilter::default(), Page::new(2, 2)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].target_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_aggregate_counts_and_first_wins_identity() {
        let repo = MemoryAuditRepository::new();

        let first = attempt(ResourceType::Student, "S1", "u1");
        let first_id = repo.insert(first).await.unwrap();
        repo.update_result(first_id, success()).await.unwrap();

        let mut renamed = attempt(ResourceType::Student, "S2", "u1");
        renamed.performed_by.full_name = Some("Renamed".to_string());
        repo.insert(renamed).await.unwrap();

        repo.insert(attempt(ResourceType::User, "U9", "u2")).await.unwrap();

        let by_actor = repo
            .aggregate(&AuditFilter::default(), GroupKey::Actor)
            .await
            .unwrap();
        assert_eq!(by_actor.len(), 2);
        assert_eq!(by_actor[0].key.as_deref(), Some("u1"));
        assert_eq!(by_actor[0].count, 2);
        assert_eq!(by_actor[0].successful, 1);
        assert_eq!(by_actor[0].failed, 1);
        assert_eq!(by_actor[0].pending, 1);
        assert_eq!(by_actor[0].first_actor.full_name.as_deref(), Some("U1"));

        let by_kind = repo
            .aggregate(&AuditFilter::default(), GroupKey::ResourceType)
            .await
            .unwrap();
        assert_eq!(by_kind[0].key.as_deref(), Some("Student"));
        assert_eq!(by_kind[1].key.as_deref(), Some("User"));
    }

    #[tokio::test]
    async fn test_second_update_overwrites_first() {
        let repo = MemoryAuditRepository::new();
        let id = repo.insert(attempt(ResourceType::Gallery, "G1", "u1")).await.unwrap();

        repo.update_result(id, success()).await.unwrap();
        let failed = ResultUpdate {
            action: AuditAction::DeleteFailed,
            result: AuditResult {
                success: false,
                status_code: Some(500),
                ..Default::default()
            },
            updated_at: Utc::now(),
        };
        let record = repo.update_result(id, failed).await.unwrap().unwrap();

        assert_eq!(record.action, AuditAction::DeleteFailed);
        assert_eq!(record.result.status_code, Some(500));
    }
}
