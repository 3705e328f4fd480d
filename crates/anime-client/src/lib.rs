//! Anime Service HTTP client
//!
//! A typed client for the anime REST API that signs every request with
//! HTTP Basic credentials.

pub mod client;
pub mod error;

pub use client::{Anime, AnimeClient, AnimeClientConfig, Page};
pub use error::ClientError;
