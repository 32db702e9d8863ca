//! Delete a user and the students referencing it
//!
//! Both deletes run in one transaction. `deleted_count` counts the user row
//! plus every cascaded student row.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::audit::ResourceType;
use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_identifier, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserCommand {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub id: String,
    pub deleted: bool,
    pub deleted_count: i64,
    /// Students removed along with the user
    pub cascaded: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteUserError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("User '{0}' not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DeleteUserError> for AppError {
    fn from(err: DeleteUserError) -> Self {
        match err {
            DeleteUserError::Validation(e) => e.into(),
            DeleteUserError::NotFound(id) => AppError::NotFound(format!("User '{}' not found", id)),
            DeleteUserError::Database(e) => AppError::Database(DbError::Sqlx(e)),
        }
    }
}

impl Request<Result<DeleteUserResponse, DeleteUserError>> for DeleteUserCommand {}

impl DeleteUserCommand {
    pub fn validate(&self) -> Result<(), DeleteUserError> {
        validate_identifier(&self.id, "id")?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    command: DeleteUserCommand,
) -> Result<DeleteUserResponse, DeleteUserError> {
    command.validate()?;
    let id = command.id.trim().to_string();

    let mut tx = pool.begin().await?;

    let user: Option<String> = sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING id")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?;

    if user.is_none() {
        tx.rollback().await?;
        return Err(DeleteUserError::NotFound(id));
    }

    let cascaded: Vec<String> =
        sqlx::query_scalar("DELETE FROM students WHERE user_id = $1 RETURNING id")
            .bind(&id)
            .fetch_all(&mut *tx)
            .await?;

    tx.commit().await?;

    if !cascaded.is_empty() {
        tracing::info!(
            user_id = %id,
            cascaded_kind = %ResourceType::Student,
            cascaded = cascaded.len(),
            "User delete cascaded"
        );
    }

    Ok(DeleteUserResponse {
        deleted_count: 1 + cascaded.len() as i64,
        id,
        deleted: true,
        cascaded,
    })
}
