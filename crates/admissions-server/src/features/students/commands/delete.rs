use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::DbError;
use crate::error::AppError;
use crate::features::shared::validation::{validate_identifier, InputValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteStudentCommand {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStudentResponse {
    pub id: String,
    pub deleted: bool,
    pub deleted_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteStudentError {
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error("Student '{0}' not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DeleteStudentError> for AppError {
    fn from(err: DeleteStudentError) -> Self {
        match err {
            DeleteStudentError::Validation(e) => e.into(),
            DeleteStudentError::NotFound(id) => AppError::NotFound(format!("Student '{}' not found", id)),
            DeleteStudentError::Database(e) => AppError::Database(DbError::Sqlx(e)),
        }
    }
}

impl Request<Result<DeleteStudentResponse, DeleteStudentError>> for DeleteStudentCommand {}

impl DeleteStudentCommand {
    pub fn validate(&self) -> Result<(), DeleteStudentError> {
        validate_identifier(&self.id, "id")?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    command: DeleteStudentCommand,
) -> Result<DeleteStudentResponse, DeleteStudentError> {
    command.validate()?;

    let deleted: Option<String> =
        sqlx::query_scalar("DELETE FROM students WHERE id = $1 RETURNING id")
            .bind(command.id.trim())
            .fetch_optional(&pool)
            .await?;

    match deleted {
        Some(id) => Ok(DeleteStudentResponse {
            id,
            deleted: true,
            deleted_count: 1,
        }),
        None => Err(DeleteStudentError::NotFound(command.id)),
    }
}
