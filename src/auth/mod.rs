//! Azure AD authentication module.
//!
//! Acquires an application token for Microsoft Graph via the OAuth2
//! client-credentials grant.

pub mod oauth;

pub use oauth::{AccessToken, OAuth2Client};
