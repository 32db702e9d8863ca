//! PostgreSQL audit repository
//!
//! Nested record fields are flattened into indexed columns of
//! `delete_audit_logs`. The identity column `seq` breaks timestamp ties and
//! decides which record of a group counts as "first".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use super::models::{
    ActorSnapshot, AuditAction, AuditFilter, AuditGroup, AuditRecord, AuditResult, GroupKey,
    Metadata, NewAuditRecord, Page, RequestDetails, ResourceType, ResultUpdate,
};
use super::store::AuditRepository;
use crate::db::{DbError, DbResult};

const TABLE: &str = "delete_audit_logs";

const RECORD_COLUMNS: &str = r#"
    id, action, resource_type, target_id, target_ids,
    performed_by_user_id, performed_by_email, performed_by_role, performed_by_full_name,
    request_method, request_url, request_ip, request_user_agent, request_headers,
    result_success, result_message, result_deleted_count, result_error, result_status_code,
    metadata, timestamp, updated_at
"#;

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    resource_type: String,
    target_id: Option<String>,
    target_ids: Vec<String>,
    performed_by_user_id: Option<String>,
    performed_by_email: Option<String>,
    performed_by_role: Option<String>,
    performed_by_full_name: Option<String>,
    request_method: String,
    request_url: String,
    request_ip: String,
    request_user_agent: Option<String>,
    request_headers: Json<BTreeMap<String, String>>,
    result_success: bool,
    result_message: Option<String>,
    result_deleted_count: Option<i64>,
    result_error: Option<String>,
    result_status_code: Option<i32>,
    metadata: Json<Metadata>,
    timestamp: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = row
            .action
            .parse::<AuditAction>()
            .map_err(|v| DbError::decode(TABLE, format!("unknown action '{}'", v)))?;
        let resource_type = row
            .resource_type
            .parse::<ResourceType>()
            .map_err(|v| DbError::decode(TABLE, format!("unknown resource type '{}'", v)))?;
        let status_code = row
            .result_status_code
            .map(u16::try_from)
            .transpose()
            .map_err(|_| DbError::decode(TABLE, "status code out of range"))?;

        Ok(AuditRecord {
            id: row.id,
            action,
            resource_type,
            target_id: row.target_id,
            target_ids: row.target_ids,
            performed_by: ActorSnapshot {
                user_id: row.performed_by_user_id,
                email: row.performed_by_email,
                role: row.performed_by_role,
                full_name: row.performed_by_full_name,
            },
            request_details: RequestDetails {
                method: row.request_method,
                url: row.request_url,
                ip: row.request_ip,
                user_agent: row.request_user_agent,
                headers: row.request_headers.0,
            },
            result: AuditResult {
                success: row.result_success,
                message: row.result_message,
                deleted_count: row.result_deleted_count,
                error: row.result_error,
                status_code,
            },
            metadata: row.metadata.0,
            timestamp: row.timestamp,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    key: Option<String>,
    count: i64,
    successful: i64,
    failed: i64,
    pending: i64,
    first_user_id: Option<String>,
    first_email: Option<String>,
    first_role: Option<String>,
    first_full_name: Option<String>,
}

impl From<GroupRow> for AuditGroup {
    fn from(row: GroupRow) -> Self {
        AuditGroup {
            key: row.key,
            count: row.count,
            successful: row.successful,
            failed: row.failed,
            pending: row.pending,
            first_actor: ActorSnapshot {
                user_id: row.first_user_id,
                email: row.first_email,
                role: row.first_role,
                full_name: row.first_full_name,
            },
        }
    }
}

/// Append `WHERE ...` for every populated filter field
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    qb.push(" WHERE TRUE");

    if let Some(since) = filter.since {
        qb.push(" AND timestamp >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND timestamp <= ").push_bind(until);
    }
    if !filter.resource_types.is_empty() {
        let kinds: Vec<String> =
            filter.resource_types.iter().map(|k| k.as_str().to_string()).collect();
        qb.push(" AND resource_type = ANY(").push_bind(kinds).push(")");
    }
    if !filter.actions.is_empty() {
        let actions: Vec<String> =
            filter.actions.iter().map(|a| a.as_str().to_string()).collect();
        qb.push(" AND action = ANY(").push_bind(actions).push(")");
    }
    if let Some(success) = filter.success {
        qb.push(" AND result_success = ").push_bind(success);
    }
    if let Some(ref user_id) = filter.user_id {
        qb.push(" AND performed_by_user_id = ").push_bind(user_id.clone());
    }
    if let Some(ref ip) = filter.ip {
        qb.push(" AND request_ip = ").push_bind(ip.clone());
    }
    if let Some(ref target) = filter.target_id {
        qb.push(" AND (target_id = ")
            .push_bind(target.clone())
            .push(" OR ")
            .push_bind(target.clone())
            .push(" = ANY(target_ids))");
    }
}

/// Audit repository over a `sqlx` connection pool
#[derive(Debug, Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn insert(&self, record: NewAuditRecord) -> DbResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO delete_audit_logs (
                id, action, resource_type, target_id, target_ids,
                performed_by_user_id, performed_by_email, performed_by_role, performed_by_full_name,
                request_method, request_url, request_ip, request_user_agent, request_headers,
                metadata, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(record.action.as_str())
        .bind(record.resource_type.as_str())
        .bind(&record.target_id)
        .bind(&record.target_ids)
        .bind(&record.performed_by.user_id)
        .bind(&record.performed_by.email)
        .bind(&record.performed_by.role)
        .bind(&record.performed_by.full_name)
        .bind(&record.request_details.method)
        .bind(&record.request_details.url)
        .bind(&record.request_details.ip)
        .bind(&record.request_details.user_agent)
        .bind(Json(&record.request_details.headers))
        .bind(Json(&record.metadata))
        .bind(record.timestamp)
        .fetch_one(&self.pool)
        .await?;

        debug!(audit_id = %id, action = %record.action, "Inserted delete audit row");
        Ok(id)
    }

    async fn update_result(
        &self,
        id: Uuid,
        update: ResultUpdate,
    ) -> DbResult<Option<AuditRecord>> {
        let sql = format!(
            r#"
            UPDATE delete_audit_logs
            SET action = $2,
                result_success = $3,
                result_message = $4,
                result_deleted_count = $5,
                result_error = $6,
                result_status_code = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let row = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(id)
            .bind(update.action.as_str())
            .bind(update.result.success)
            .bind(&update.result.message)
            .bind(update.result.deleted_count)
            .bind(&update.result.error)
            .bind(update.result.status_code.map(i32::from))
            .bind(update.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AuditRecord::try_from).transpose()
    }

    async fn find(&self, filter: &AuditFilter, page: Page) -> DbResult<Vec<AuditRecord>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM {}", RECORD_COLUMNS, TABLE));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC, seq DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = qb.build_query_as::<AuditRow>().fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "Queried delete audit rows");

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    async fn count(&self, filter: &AuditFilter) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", TABLE));
        push_filter(&mut qb, filter);

        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn aggregate(&self, filter: &AuditFilter, key: GroupKey) -> DbResult<Vec<AuditGroup>> {
        let column = match key {
            GroupKey::ResourceType => "resource_type",
            GroupKey::Actor => "performed_by_user_id",
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT {column} AS key,
                   COUNT(*) AS count,
                   COUNT(*) FILTER (WHERE result_success) AS successful,
                   COUNT(*) FILTER (WHERE NOT result_success) AS failed,
                   COUNT(*) FILTER (WHERE NOT result_success AND updated_at IS NULL) AS pending,
                   (ARRAY_AGG(performed_by_user_id ORDER BY seq))[1] AS first_user_id,
                   (ARRAY_AGG(performed_by_email ORDER BY seq))[1] AS first_email,
                   (ARRAY_AGG(performed_by_role ORDER BY seq))[1] AS first_role,
                   (ARRAY_AGG(performed_by_full_name ORDER BY seq))[1] AS first_full_name
            FROM {TABLE}
            "#
        ));
        push_filter(&mut qb, filter);
        qb.push(format!(" GROUP BY {column} ORDER BY count DESC, MIN(seq) ASC"));

        let rows = qb.build_query_as::<GroupRow>().fetch_all(&self.pool).await?;
        debug!(groups = rows.len(), ?key, "Aggregated delete audit rows");

        Ok(rows.into_iter().map(AuditGroup::from).collect())
    }
}
