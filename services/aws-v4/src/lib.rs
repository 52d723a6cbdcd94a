//! AWS SigV4 signing for S3 requests.
//!
//! The signing pipeline is split into three pure steps:
//!
//! - [`canonical`]: HTTP request to canonical request.
//! - [`sign`]: canonical request to string to sign, signature and
//!   `Authorization` header value.
//! - [`RequestSigner`]: applies both to an [`http::Request`].
//!
//! Credentials come from [`Config`], which reads `AWS_*` environment
//! variables, `~/.aws/credentials` and `~/.aws/config` through the
//! [`s3sign_core::Context`].
//!
//! ## Example
//!
//! ```
//! use s3sign_aws_v4::canonical::canonical_request_from_raw;
//! use s3sign_aws_v4::sign::{make_authorization, make_string_to_sign};
//!
//! # fn main() -> s3sign_core::Result<()> {
//! let raw = b"GET / HTTP/1.1\r\nHost:example.amazonaws.com\r\nX-Amz-Date:20150830T123600Z\r\n\r\n";
//! let creq = canonical_request_from_raw(raw)?;
//! let sts = make_string_to_sign("us-east-1", "service", &creq)?;
//! let authorization = make_authorization(
//!     &sts,
//!     &creq,
//!     "AKIDEXAMPLE",
//!     "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
//! )?;
//! assert!(authorization.ends_with(
//!     "Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
//! ));
//! # Ok(())
//! # }
//! ```

pub mod canonical;
pub mod constants;
pub mod sign;

mod config;
pub use config::parse_config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::ConfigCredentialProvider;
pub use provide_credential::StaticCredentialProvider;

mod sign_request;
pub use sign_request::RequestSigner;
