//! Client side of the badge backend.
//!
//! `BadgeApi` describes the remote endpoints the core needs (catalog,
//! submissions, submit, logout, token exchange). `ApiClient` implements it over
//! reqwest; tests substitute a recording fake.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{BadgeApi, CatalogFetch, IconFile};
pub use client::ApiClient;
pub use error::ApiError;
