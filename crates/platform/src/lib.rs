//! # Retrossh Platform
//!
//! Core platform types shared by the retrossh crates.
//!
//! This crate provides the unified error type (`RetroError`, `RetroResult`)
//! used by every layer of the SSH-1.5 client.
//!
//! # Examples
//!
//! ```
//! use retrossh_platform::{RetroError, RetroResult};
//!
//! fn login(password_ok: bool) -> RetroResult<()> {
//!     if password_ok {
//!         Ok(())
//!     } else {
//!         Err(RetroError::AuthenticationFailed)
//!     }
//! }
//!
//! let err = login(false).unwrap_err();
//! assert!(err.is_retryable());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{RetroError, RetroResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
