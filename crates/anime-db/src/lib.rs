//! Anime Service Database Layer
//!
//! This crate provides the persistence layer for the anime service,
//! using SQLite via sqlx for users and anime records.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;
