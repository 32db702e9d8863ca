//! Delete-audit data models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of audit records returned per query
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Maximum number of audit records that can be returned in a single query.
/// This prevents excessive memory usage and query timeouts.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// Request headers copied into `requestDetails.headers` at attempt time
pub const CAPTURED_HEADERS: [&str; 5] =
    ["origin", "referer", "x-request-id", "x-forwarded-for", "x-real-ip"];

/// Free-form context attached to a record; opaque to the store
pub type Metadata = BTreeMap<String, JsonValue>;

/// Lifecycle tag of an audit record
///
/// The phase ({attempt, success, failed}) crossed with the shape
/// ({single, bulk}) of the delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DeleteAttempt,
    DeleteSuccess,
    DeleteFailed,
    BulkDeleteAttempt,
    BulkDeleteSuccess,
    BulkDeleteFailed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 6] = [
        Self::DeleteAttempt,
        Self::DeleteSuccess,
        Self::DeleteFailed,
        Self::BulkDeleteAttempt,
        Self::BulkDeleteSuccess,
        Self::BulkDeleteFailed,
    ];

    /// Tag written when the attempt record is created
    pub fn attempt(bulk: bool) -> Self {
        if bulk {
            Self::BulkDeleteAttempt
        } else {
            Self::DeleteAttempt
        }
    }

    /// Tag written by the terminal update
    pub fn terminal(bulk: bool, success: bool) -> Self {
        match (bulk, success) {
            (false, true) => Self::DeleteSuccess,
            (false, false) => Self::DeleteFailed,
            (true, true) => Self::BulkDeleteSuccess,
            (true, false) => Self::BulkDeleteFailed,
        }
    }

    pub fn is_bulk(self) -> bool {
        matches!(
            self,
            Self::BulkDeleteAttempt | Self::BulkDeleteSuccess | Self::BulkDeleteFailed
        )
    }

    pub fn state(self) -> AuditState {
        match self {
            Self::DeleteAttempt | Self::BulkDeleteAttempt => AuditState::Attempted,
            Self::DeleteSuccess | Self::BulkDeleteSuccess => AuditState::Succeeded,
            Self::DeleteFailed | Self::BulkDeleteFailed => AuditState::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeleteAttempt => "DELETE_ATTEMPT",
            Self::DeleteSuccess => "DELETE_SUCCESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::BulkDeleteAttempt => "BULK_DELETE_ATTEMPT",
            Self::BulkDeleteSuccess => "BULK_DELETE_SUCCESS",
            Self::BulkDeleteFailed => "BULK_DELETE_FAILED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Per-record state machine: ATTEMPTED -> SUCCEEDED | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditState {
    Attempted,
    Succeeded,
    Failed,
}

/// Domain resource kinds whose deletion is audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Student,
    User,
    Course,
    Gallery,
    Notification,
    Referral,
    Enquiry,
    Testimonial,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        Self::Student,
        Self::User,
        Self::Course,
        Self::Gallery,
        Self::Notification,
        Self::Referral,
        Self::Enquiry,
        Self::Testimonial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::User => "User",
            Self::Course => "Course",
            Self::Gallery => "Gallery",
            Self::Notification => "Notification",
            Self::Referral => "Referral",
            Self::Enquiry => "Enquiry",
            Self::Testimonial => "Testimonial",
        }
    }

    /// Kinds removed as a side effect of deleting this kind
    ///
    /// Deleting a user account also removes the student profiles that
    /// reference it.
    pub fn cascades_to(&self) -> &'static [ResourceType] {
        match self {
            Self::User => &[Self::Student],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Who performed the delete, denormalized at attempt time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
}

impl ActorSnapshot {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// HTTP request context captured at attempt time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub method: String,
    pub url: String,
    pub ip: String,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Outcome fields, defaulted until the terminal update arrives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub success: bool,
    pub message: Option<String>,
    pub deleted_count: Option<i64>,
    pub error: Option<String>,
    pub status_code: Option<u16>,
}

/// One audit record per delete operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Correlation id linking the attempt to its terminal update
    pub id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_ids: Vec<String>,
    pub performed_by: ActorSnapshot,
    pub request_details: RequestDetails,
    #[serde(default)]
    pub result: AuditResult,
    #[serde(default)]
    pub metadata: Metadata,
    /// Attempt time
    pub timestamp: DateTime<Utc>,
    /// Time of the terminal update; absent while the record is ATTEMPTED
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    pub fn is_bulk(&self) -> bool {
        !self.target_ids.is_empty()
    }

    pub fn state(&self) -> AuditState {
        self.action.state()
    }

    /// Scalar match on `targetId` or membership in `targetIds`
    pub fn matches_target(&self, id: &str) -> bool {
        self.target_id.as_deref() == Some(id) || self.target_ids.iter().any(|t| t == id)
    }
}

/// Attempt record ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub target_id: Option<String>,
    pub target_ids: Vec<String>,
    pub performed_by: ActorSnapshot,
    pub request_details: RequestDetails,
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
}

impl NewAuditRecord {
    pub fn builder(resource_type: ResourceType) -> NewAuditRecordBuilder {
        NewAuditRecordBuilder::new(resource_type)
    }

    /// The stored form of this attempt, before any terminal update
    pub fn into_record(self) -> AuditRecord {
        AuditRecord {
            id: self.id,
            action: self.action,
            resource_type: self.resource_type,
            target_id: self.target_id,
            target_ids: self.target_ids,
            performed_by: self.performed_by,
            request_details: self.request_details,
            result: AuditResult::default(),
            metadata: self.metadata,
            timestamp: self.timestamp,
            updated_at: None,
        }
    }
}

/// Builder for attempt records
///
/// The ATTEMPT tag is derived from the target shape: any non-empty
/// `target_ids` makes the record bulk and clears the scalar `target_id`.
#[derive(Debug, Clone)]
pub struct NewAuditRecordBuilder {
    resource_type: ResourceType,
    target_id: Option<String>,
    target_ids: Vec<String>,
    performed_by: ActorSnapshot,
    request_details: RequestDetails,
    metadata: Metadata,
    timestamp: Option<DateTime<Utc>>,
}

impl NewAuditRecordBuilder {
    fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            target_id: None,
            target_ids: Vec::new(),
            performed_by: ActorSnapshot::anonymous(),
            request_details: RequestDetails::default(),
            metadata: Metadata::new(),
            timestamp: None,
        }
    }

    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    pub fn target_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.target_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn performed_by(mut self, actor: ActorSnapshot) -> Self {
        self.performed_by = actor;
        self
    }

    pub fn request_details(mut self, details: RequestDetails) -> Self {
        self.request_details = details;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> NewAuditRecord {
        let bulk = !self.target_ids.is_empty();
        NewAuditRecord {
            id: Uuid::new_v4(),
            action: AuditAction::attempt(bulk),
            resource_type: self.resource_type,
            target_id: if bulk { None } else { self.target_id },
            target_ids: self.target_ids,
            performed_by: self.performed_by,
            request_details: self.request_details,
            metadata: self.metadata,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Terminal update applied to an attempt record
#[derive(Debug, Clone, PartialEq)]
pub struct ResultUpdate {
    pub action: AuditAction,
    pub result: AuditResult,
    pub updated_at: DateTime<Utc>,
}

/// Filter over audit records; every populated field must match
///
/// Empty `resource_types` / `actions` mean "any". The target filter matches
/// the scalar `targetId` or membership in `targetIds`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub resource_types: Vec<ResourceType>,
    pub actions: Vec<AuditAction>,
    pub success: Option<bool>,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub target_id: Option<String>,
}

impl AuditFilter {
    /// Relative window ending now
    pub fn last_hours(hours: i64) -> Self {
        Self {
            since: Some(Utc::now() - Duration::hours(hours)),
            ..Default::default()
        }
    }

    /// Absolute window, either side optional
    pub fn between(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self {
            since,
            until,
            ..Default::default()
        }
    }

    pub fn resource_type(mut self, kind: ResourceType) -> Self {
        self.resource_types = vec![kind];
        self
    }

    pub fn resource_types(mut self, kinds: impl IntoIterator<Item = ResourceType>) -> Self {
        self.resource_types = kinds.into_iter().collect();
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.actions = vec![action];
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = AuditAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// In-process evaluation, mirroring the SQL predicate of the Postgres store
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if self.since.is_some_and(|since| record.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.timestamp > until) {
            return false;
        }
        if !self.resource_types.is_empty() && !self.resource_types.contains(&record.resource_type) {
            return false;
        }
        if !self.actions.is_empty() && !self.actions.contains(&record.action) {
            return false;
        }
        if self.success.is_some_and(|success| record.result.success != success) {
            return false;
        }
        if let Some(ref user_id) = self.user_id {
            if record.performed_by.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(ref ip) = self.ip {
            if &record.request_details.ip != ip {
                return false;
            }
        }
        if let Some(ref target) = self.target_id {
            if !record.matches_target(target) {
                return false;
            }
        }
        true
    }
}

/// Offset/limit window over a `timestamp DESC` ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn first(limit: i64) -> Self {
        Self {
            offset: 0,
            limit: limit.clamp(1, MAX_AUDIT_QUERY_LIMIT),
        }
    }

    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0),
            limit: limit.clamp(1, MAX_AUDIT_QUERY_LIMIT),
        }
    }
}

/// Grouping dimension for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    ResourceType,
    /// `performedBy.userId`
    Actor,
}

/// One aggregation bucket
///
/// `failed` counts every record whose `result.success` is false, which
/// includes attempts still waiting for their terminal update; `pending`
/// breaks those out. `first_actor` is the identity of the first record
/// stored in the bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditGroup {
    pub key: Option<String>,
    pub count: i64,
    pub successful: i64,
    pub failed: i64,
    pub pending: i64,
    pub first_actor: ActorSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_action_cross_product() {
        assert_eq!(AuditAction::terminal(false, true), AuditAction::DeleteSuccess);
        assert_eq!(AuditAction::terminal(false, false), AuditAction::DeleteFailed);
        assert_eq!(AuditAction::terminal(true, true), AuditAction::BulkDeleteSuccess);
        assert_eq!(AuditAction::terminal(true, false), AuditAction::BulkDeleteFailed);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&AuditAction::BulkDeleteFailed).unwrap();
        assert_eq!(json, r#""BULK_DELETE_FAILED""#);

        let parsed: AuditAction = "delete_attempt".parse().unwrap();
        assert_eq!(parsed, AuditAction::DeleteAttempt);
        assert!("DELETE_MAYBE".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_resource_type_round_trips_through_str() {
        for kind in ResourceType::ALL {
            assert_eq!(kind.as_str().parse::<ResourceType>().unwrap(), kind);
        }
        assert_eq!("student".parse::<ResourceType>().unwrap(), ResourceType::Student);
        assert_eq!(ResourceType::User.cascades_to(), &[ResourceType::Student]);
        assert!(ResourceType::Course.cascades_to().is_empty());
    }

    #[test]
    fn test_builder_makes_bulk_and_scalar_exclusive() {
        let record = NewAuditRecord::builder(ResourceType::Student)
            .target_id("S1")
            .target_ids(["A", "B"])
            .build();

        assert_eq!(record.action, AuditAction::BulkDeleteAttempt);
        assert!(record.target_id.is_none());
        assert_eq!(record.target_ids, vec!["A".to_string(), "B".to_string()]);

        let single = NewAuditRecord::builder(ResourceType::Student)
            .target_id("S1")
            .build();
        assert_eq!(single.action, AuditAction::DeleteAttempt);
        assert_eq!(single.target_id.as_deref(), Some("S1"));
    }

    #[test]
    fn test_filter_target_matches_scalar_or_member() {
        let scalar = NewAuditRecord::builder(ResourceType::Student)
            .target_id("X")
            .build()
            .into_record();
        let member = NewAuditRecord::builder(ResourceType::Student)
            .target_ids(["W", "X"])
            .build()
            .into_record();
        let other = NewAuditRecord::builder(ResourceType::Student)
            .target_id("Y")
            .build()
            .into_record();

        let filter = AuditFilter::default().target_id("X");
        assert!(filter.matches(&scalar));
        assert!(filter.matches(&member));
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = NewAuditRecord::builder(ResourceType::Course)
            .target_id("C9")
            .metadata("reason", json!({"ticket": 42}))
            .build()
            .into_record();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["resourceType"], json!("Course"));
        assert_eq!(value["action"], json!("DELETE_ATTEMPT"));
        assert_eq!(value["result"]["success"], json!(false));
        assert_eq!(value["metadata"]["reason"]["ticket"], json!(42));
        assert!(value["updatedAt"].is_null());
    }
}
