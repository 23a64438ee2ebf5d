//! Data models for the badge catalog and the signed-in user.
//!
//! - `ApprovedBadge`: a server-approved badge as served by the catalog
//! - `SubmissionBadge`, `SubmissionStatus`: the current user's own submissions
//! - `AuthState`, `AuthUser`: bearer token plus cached profile
//!
//! All types serialize to the camelCase JSON the badge backend speaks.

pub mod auth;
pub mod badge;

pub use auth::{AuthState, AuthUser};
pub use badge::{ApprovedBadge, BadgeList, SubmissionBadge, SubmissionStatus};
