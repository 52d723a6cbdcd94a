//! Core components for signing S3 requests.
//!
//! This crate provides the foundational types and traits shared by the s3sign
//! workspace. The signing algorithms themselves live in `s3sign-aws-v4`, the
//! S3 operations and XML handling in `s3sign-s3`.
//!
//! ## Overview
//!
//! - **Context**: holds the collaborators used outside the pure signing
//!   functions: file reading, HTTP sending and environment access.
//! - **Traits**: [`ProvideCredential`] loads credentials, [`SignRequest`]
//!   signs a request with them.
//! - **Signer**: caches a credential and drives a [`SignRequest`].
//!
//! ## Example
//!
//! ```no_run
//! use s3sign_core::{Context, StaticEnv};
//! use std::collections::HashMap;
//!
//! let ctx = Context::new().with_env(StaticEnv {
//!     home_dir: None,
//!     envs: HashMap::from([("AWS_DEFAULT_REGION".to_string(), "us-east-1".to_string())]),
//! });
//! assert_eq!(ctx.env_var("AWS_DEFAULT_REGION").as_deref(), Some("us-east-1"));
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: SHA-256 and HMAC-SHA256 helpers
//! - [`time`]: timestamp formatting and parsing
//! - [`utils`]: redaction of secrets in debug output

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::FileRead;
pub use context::HttpSend;
pub use context::NoopEnv;
pub use context::NoopFileRead;
pub use context::NoopHttpSend;
pub use context::OsEnv;
pub use context::StaticEnv;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod api;
pub use api::{ProvideCredential, SignRequest, SigningCredential};
mod signer;
pub use signer::Signer;
