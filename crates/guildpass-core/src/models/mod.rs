//! Data models shared between the token store and the API client.
//!
//! - `SessionCredentials`: the access/refresh pair plus the remember-me choice
//! - Token endpoint wire types: `LoginRequest`, `TokenPair`, `RefreshRequest`, `RefreshResponse`
//! - `UserProfile`: the cached profile of the signed-in player

pub mod token;
pub mod user;

pub use token::{LoginRequest, RefreshRequest, RefreshResponse, SessionCredentials, TokenPair};
pub use user::UserProfile;
