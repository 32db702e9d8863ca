pub mod bulk_delete;
pub mod delete;

pub use bulk_delete::{
    BulkDeleteStudentsCommand, BulkDeleteStudentsError, BulkDeleteStudentsResponse,
};
pub use delete::{DeleteStudentCommand, DeleteStudentError, DeleteStudentResponse};
