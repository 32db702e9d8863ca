pub mod delete;

pub use delete::{DeleteUserCommand, DeleteUserError, DeleteUserResponse};
