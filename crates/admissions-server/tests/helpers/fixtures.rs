//! Row fixtures for the collections the delete endpoints touch

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

// ============================================================================
// User Fixtures
// ============================================================================

#[derive(Debug, Clone)]
pub struct UserFixture {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}

impl UserFixture {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            email: format!("{}@school.test", id),
            id,
            full_name: None,
            role: "student".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, $3, $4)")
            .bind(&self.id)
            .bind(&self.email)
            .bind(&self.full_name)
            .bind(&self.role)
            .execute(pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Student Fixtures
// ============================================================================

#[derive(Debug, Clone)]
pub struct StudentFixture {
    pub id: String,
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub application_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StudentFixture {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            application_number: Some(format!("APP-{}", id)),
            full_name: Some(format!("Student {}", id)),
            id,
            user_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn owned_by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn created_hours_ago(mut self, hours: i64) -> Self {
        self.created_at = Utc::now() - Duration::hours(hours);
        self
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO students (id, user_id, full_name, application_number, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&self.id)
        .bind(&self.user_id)
        .bind(&self.full_name)
        .bind(&self.application_number)
        .bind(self.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
