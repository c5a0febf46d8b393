//! Storage module for persistent data
//!
//! SQLite holds users, sessions, documents and chat exchanges; original
//! uploads live in a plain directory.

mod database;
mod files;

pub use database::{Database, UserDeletion};
pub use files::{sanitize_filename, FileStore};
