//! Key Service library.
//!
//! Generates short random redemption keys, allocates each one to exactly one
//! caller, and tracks cancellation. The lifecycle rules live in
//! [`service::KeyLifecycleService`]; atomicity of every state transition is
//! the contract of [`store::KeyStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod key;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod telemetry;

// Re-exports for convenience
pub use client::KeyClient;
pub use config::Config;
pub use error::{ErrorKind, KeyError, StoreError};
pub use key::{Key, KeyGenerator, KeyState};
pub use service::KeyLifecycleService;
pub use store::KeyStore;
