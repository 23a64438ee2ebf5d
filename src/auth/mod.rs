//! Authentication against the OAuth provider and the badge backend.
//!
//! This module provides:
//! - `OAuthHandshake`: the host's way of sending the user through the
//!   provider's consent screen and handing back the callback location
//! - login, logout and local-identity switching on `BadgeSync`
//!
//! Sessions are persisted per local identity, so switching the active local
//! account never exposes another account's token.

pub mod oauth;
pub mod session;

pub use oauth::{authorize_url, exchange_url, OAuthHandshake};
