//! User deletes; removing a user cascades to its students

pub mod commands;
pub mod routes;

pub use commands::{DeleteUserCommand, DeleteUserError, DeleteUserResponse};
pub use routes::users_routes;
