//! Student deletes, single and bulk

pub mod commands;
pub mod routes;

pub use commands::{
    BulkDeleteStudentsCommand, BulkDeleteStudentsError, BulkDeleteStudentsResponse,
    DeleteStudentCommand, DeleteStudentError, DeleteStudentResponse,
};
pub use routes::students_routes;
