//! Storage traits for the authorization engine.
//!
//! Every persistence concern sits behind an async trait so that backends
//! can be swapped without touching the engine. The engine only ever sees
//! hashed token values; implementations must preserve the atomicity
//! contracts documented on [`AuthCodeStorage::consume`] and
//! [`RefreshTokenStorage::rotate`].

mod access_token;
mod auth_code;
mod client;
mod jti;
mod refresh_token;
mod user;

pub use access_token::AccessTokenStorage;
pub use auth_code::AuthCodeStorage;
pub use client::ClientStorage;
pub use jti::JtiStorage;
pub use refresh_token::RefreshTokenStorage;
pub use user::UserStorage;
