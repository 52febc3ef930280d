//! Developer storage
//!
//! SQLite via sqlx. Tags live in their own table so the search can filter
//! on them in SQL.

pub mod sqlite_store;

pub use sqlite_store::{DevStore, NewDeveloper};
