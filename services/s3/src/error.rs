use http::StatusCode;

/// An error response returned by S3.
///
/// It's attached as the source of an [`s3sign_core::ErrorKind::Unexpected`]
/// error and can be recovered with [`s3sign_core::Error::source_as`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("s3 responded {status}: {code}: {message}")]
pub struct ServiceError {
    pub status: StatusCode,
    /// S3 error code such as `NoSuchBucket`. Empty if the body had none.
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}
