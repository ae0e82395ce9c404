//! In-memory storage backend for the keygate authorization engine.
//!
//! Implements every storage trait from `keygate-auth` over
//! `RwLock<HashMap>` maps. The atomicity contracts (single-use code
//! consumption, at-most-once refresh rotation, jti registration) hold
//! because each operation runs under one write lock.
//!
//! Intended for tests and single-process deployments; nothing here
//! survives a restart.
//!
//! # Example
//!
//! ```ignore
//! use keygate_auth_memory::MemoryClientStorage;
//! use keygate_auth::storage::ClientStorage;
//!
//! let clients = MemoryClientStorage::new();
//! clients.create(&client).await?;
//! ```

mod access_token;
mod auth_code;
mod client;
mod jti;
mod refresh_token;
mod user;

pub use access_token::MemoryAccessTokenStorage;
pub use auth_code::MemoryAuthCodeStorage;
pub use client::MemoryClientStorage;
pub use jti::MemoryJtiStorage;
pub use refresh_token::MemoryRefreshTokenStorage;
pub use user::MemoryUserStorage;
