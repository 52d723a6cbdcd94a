//! A small S3 client built on the s3sign SigV4 signer.
//!
//! Supported operations are ListBuckets, ListObjectsV2 (all pages),
//! GetObject and PutObject. Response XML is decoded by the transcoder in
//! [`xml`].
//!
//! ```no_run
//! use s3sign_core::{Context, OsEnv};
//! use s3sign_file_read_tokio::TokioFileRead;
//! use s3sign_http_send_reqwest::ReqwestHttpSend;
//! use s3sign_s3::S3;
//!
//! # async fn example() -> s3sign_core::Result<()> {
//! let ctx = Context::new()
//!     .with_file_read(TokioFileRead)
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//!
//! let s3 = S3::load(ctx).await?;
//! for bucket in s3.list_buckets().await?.buckets {
//!     println!("{} {}", bucket.name, bucket.creation_date);
//! }
//! # Ok(())
//! # }
//! ```

pub mod xml;

mod client;
pub use client::S3;

mod error;
pub use error::ServiceError;

mod types;
pub use types::{Bucket, GetObjectOutput, ListBucketsOutput, Object, Owner, PutObjectOutput};
