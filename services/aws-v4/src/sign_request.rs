use crate::canonical::{canonical_request, CanonicalInput};
use crate::constants::{X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN};
use crate::sign::{make_authorization, make_string_to_sign};
use crate::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue};
use s3sign_core::hash::hex_sha256;
use s3sign_core::time::{format_iso8601, now, DateTime};
use s3sign_core::{Context, Error, Result, SignRequest};

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,
    normalize_path: bool,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new builder for AWS V4 signer.
    ///
    /// The request path is normalized before signing for every service
    /// except `s3`, which signs object keys exactly as sent.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            normalize_path: service != "s3",

            time: None,
        }
    }

    /// Override whether `.`, `..` and empty path segments are resolved
    /// before signing.
    pub fn with_normalize_path(mut self, normalize_path: bool) -> Self {
        self.normalize_path = normalize_path;
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Sign the request in place with the given credential.
    ///
    /// `host`, `x-amz-date`, `x-amz-content-sha256` and, for temporary
    /// credentials, `x-amz-security-token` are set before the canonical
    /// request is built, so all of them are signed.
    pub fn sign(&self, req: &mut http::Request<Bytes>, cred: &Credential) -> Result<()> {
        if cred.access_key_id.is_empty() || cred.secret_access_key.is_empty() {
            return Err(Error::credential_invalid(
                "access key id and secret access key are required",
            ));
        }

        let now = self.time.unwrap_or_else(now);

        // Remove the signature of a previous attempt.
        req.headers_mut().remove(header::AUTHORIZATION);

        // Insert HOST header if not present.
        if !req.headers().contains_key(header::HOST) {
            let authority = req
                .uri()
                .authority()
                .ok_or_else(|| Error::request_invalid("request has neither host header nor authority"))?
                .as_str()
                .parse::<HeaderValue>()?;
            req.headers_mut().insert(header::HOST, authority);
        }

        let date = HeaderValue::try_from(format_iso8601(now))?;
        req.headers_mut().insert(X_AMZ_DATE, date);

        let payload_hash = HeaderValue::try_from(hex_sha256(req.body()))?;
        req.headers_mut().insert(X_AMZ_CONTENT_SHA_256, payload_hash);

        if let Some(token) = &cred.session_token {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to valid leaking.
            value.set_sensitive(true);
            req.headers_mut().insert(X_AMZ_SECURITY_TOKEN, value);
        }

        let input = CanonicalInput::from_http(req)?.with_normalize_path(self.normalize_path);
        let creq = canonical_request(&input);
        let string_to_sign = make_string_to_sign(&self.region, &self.service, &creq)?;
        let authorization = make_authorization(
            &string_to_sign,
            &creq,
            &cred.access_key_id,
            &cred.secret_access_key,
        )?;

        let mut authorization = HeaderValue::from_str(&authorization)?;
        authorization.set_sensitive(true);
        req.headers_mut()
            .insert(header::AUTHORIZATION, authorization);

        Ok(())
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut http::Request<Bytes>,
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Ok(());
        };

        self.sign(req, cred)
    }
}
