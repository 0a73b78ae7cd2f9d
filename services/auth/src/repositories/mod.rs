//! Database access for the authentication service

pub mod user;

pub use user::{UserRepository, hash_password, verify_password};
