pub mod user;

pub use user::{CreateUserData, UpdateUserData, User};
