//! Read access to the business collections
//!
//! The analyzer only ever reads: students created in a window, and whether
//! a user id still resolves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::{DbError, DbResult};

/// A student row with the fields an orphan finding reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub application_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CollectionLookup: Send + Sync {
    /// Fail fast when the backing store cannot be reached
    async fn ping(&self) -> DbResult<()>;

    /// Students created at or after `since` that reference a user
    async fn students_with_parent_since(&self, since: DateTime<Utc>)
        -> DbResult<Vec<StudentRecord>>;

    async fn find_user(&self, id: &str) -> DbResult<Option<UserRecord>>;
}

#[derive(Debug, Clone)]
pub struct PgCollectionLookup {
    pool: PgPool,
}

impl PgCollectionLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionLookup for PgCollectionLookup {
    async fn ping(&self) -> DbResult<()> {
        crate::db::health_check(&self.pool).await
    }

    async fn students_with_parent_since(
        &self,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<StudentRecord>> {
        let rows = sqlx::query_as::<_, StudentRecord>(
            r#"
            SELECT id, user_id, full_name, email, application_number, created_at
            FROM students
            WHERE created_at >= $1 AND user_id IS NOT NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_user(&self, id: &str) -> DbResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

/// In-memory collections for tests and local dry runs
#[derive(Debug, Default)]
pub struct MemoryCollectionLookup {
    users: RwLock<HashMap<String, UserRecord>>,
    students: RwLock<Vec<StudentRecord>>,
    offline: bool,
}

impl MemoryCollectionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lookup whose every call fails as if the store were down
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub async fn add_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn add_student(&self, student: StudentRecord) {
        self.students.write().await.push(student);
    }

    fn check(&self) -> DbResult<()> {
        if self.offline {
            return Err(DbError::Unavailable("collections offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionLookup for MemoryCollectionLookup {
    async fn ping(&self) -> DbResult<()> {
        self.check()
    }

    async fn students_with_parent_since(
        &self,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<StudentRecord>> {
        self.check()?;
        let mut rows: Vec<StudentRecord> = self
            .students
            .read()
            .await
            .iter()
            .filter(|s| s.created_at >= since && s.user_id.is_some())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn find_user(&self, id: &str) -> DbResult<Option<UserRecord>> {
        self.check()?;
        Ok(self.users.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn student(id: &str, user: Option<&str>, age_hours: i64) -> StudentRecord {
        StudentRecord {
            id: id.to_string(),
            user_id: user.map(str::to_string),
            full_name: None,
            email: None,
            application_number: None,
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn test_memory_lookup_window_and_parent() {
        let lookup = MemoryCollectionLookup::new();
        lookup.add_student(student("S-new", Some("U1"), 1)).await;
        lookup.add_student(student("S-old", Some("U1"), 48)).await;
        lookup.add_student(student("S-free", None, 1)).await;

        let rows = lookup
            .students_with_parent_since(Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "S-new");
        assert!(lookup.find_user("U1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_lookup_fails() {
        let lookup = MemoryCollectionLookup::offline();
        assert!(matches!(lookup.ping().await, Err(DbError::Unavailable(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_lookup(pool: PgPool) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO users (id, email) VALUES ('U1', 'u1@example.com')")
            .execute(&pool)
            .await?;
        sqlx::query("INSERT INTO students (id, user_id) VALUES ('S1', 'U1'), ('S2', 'U-gone')")
            .execute(&pool)
            .await?;

        let lookup = PgCollectionLookup::new(pool);
        lookup.ping().await.unwrap();

        let rows = lookup
            .students_with_parent_since(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(lookup.find_user("U1").await.unwrap().is_some());
        assert!(lookup.find_user("U-gone").await.unwrap().is_none());
        Ok(())
    }
}
