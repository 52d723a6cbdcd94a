//! String to sign, signature and authorization header value.
//!
//! - [Create a string to sign](https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html#create-string-to-sign)
//! - [Calculate the signature](https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html#calculate-signature)

use crate::constants::{ALGORITHM, SCOPE_TERMINATOR, X_AMZ_DATE};
use log::debug;
use s3sign_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use s3sign_core::time::{format_date, parse_iso8601, DateTime};
use s3sign_core::{Error, Result};
use std::fmt::{Display, Formatter};

/// Credential scope: `<date>/<region>/<service>/aws4_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    /// Signing date as `YYYYMMDD`.
    pub date: String,
    /// Region of the target endpoint.
    pub region: String,
    /// Service name, `s3` for object storage.
    pub service: String,
    /// Always `aws4_request` for scopes this crate builds.
    pub terminator: String,
}

impl CredentialScope {
    /// Build the scope for a signing time.
    pub fn new(time: DateTime, region: &str, service: &str) -> Self {
        Self {
            date: format_date(time),
            region: region.to_string(),
            service: service.to_string(),
            terminator: SCOPE_TERMINATOR.to_string(),
        }
    }

    /// Parse a scope line. Exactly four `/`-separated parts are required.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        let [date, region, service, terminator] = parts.as_slice() else {
            return Err(Error::request_invalid(format!(
                "credential scope must have 4 parts, got {}",
                parts.len()
            )));
        };

        Ok(Self {
            date: date.to_string(),
            region: region.to_string(),
            service: service.to_string(),
            terminator: terminator.to_string(),
        })
    }
}

impl Display for CredentialScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.date, self.region, self.service, self.terminator
        )
    }
}

/// Build the string to sign of a canonical request.
///
/// ```text
/// AWS4-HMAC-SHA256
/// 20220313T072004Z
/// 20220313/<region>/<service>/aws4_request
/// <hashed_canonical_request>
/// ```
///
/// The timestamp is taken from the `x-amz-date` header of the canonical
/// request, so no clock is read here.
pub fn make_string_to_sign(region: &str, service: &str, canonical_request: &str) -> Result<String> {
    let prefix = format!("{X_AMZ_DATE}:");
    let timestamp = canonical_request
        .split('\n')
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .ok_or_else(|| Error::request_invalid("canonical request has no x-amz-date header"))?;
    let time = parse_iso8601(timestamp).map_err(|e| {
        Error::request_invalid(format!("malformed x-amz-date: {timestamp}")).with_source(e)
    })?;

    let scope = CredentialScope::new(time, region, service);
    debug!("calculated scope: {scope}");

    let string_to_sign = format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );
    debug!("calculated string to sign: {string_to_sign}");

    Ok(string_to_sign)
}

/// Derive the signing key of a scope.
///
/// `"AWS4" + secret` keys an HMAC over the date, whose output keys the region,
/// then the service, then the terminator.
pub fn generate_signing_key(secret: &str, scope: &CredentialScope) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), scope.date.as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), scope.region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), scope.service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), scope.terminator.as_bytes())
}

/// Sign a string to sign with the secret access key.
///
/// Returns the lower-case hex signature.
pub fn make_signature(string_to_sign: &str, secret: &str) -> Result<String> {
    let scope = CredentialScope::parse(scope_line(string_to_sign)?)?;
    let signing_key = generate_signing_key(secret, &scope);
    Ok(hex_hmac_sha256(&signing_key, string_to_sign.as_bytes()))
}

/// Build the `Authorization` header value.
///
/// The signed headers are read from the second-to-last line of the canonical
/// request and the scope from the third line of the string to sign.
pub fn make_authorization(
    string_to_sign: &str,
    canonical_request: &str,
    access_key_id: &str,
    secret: &str,
) -> Result<String> {
    let signature = make_signature(string_to_sign, secret)?;
    let scope = scope_line(string_to_sign)?;

    let lines: Vec<&str> = canonical_request.split('\n').collect();
    if lines.len() < 2 {
        return Err(Error::request_invalid(
            "canonical request has no signed headers line",
        ));
    }
    let signed_headers = lines[lines.len() - 2];

    Ok(format_authorization(
        access_key_id,
        scope,
        signed_headers,
        &signature,
    ))
}

/// Assemble an `Authorization` header value from its parts.
pub fn format_authorization(
    access_key_id: &str,
    scope: &str,
    signed_headers: &str,
    signature: &str,
) -> String {
    format!(
        "{ALGORITHM} Credential={access_key_id}/{scope}, SignedHeaders={signed_headers}, Signature={signature}"
    )
}

fn scope_line(string_to_sign: &str) -> Result<&str> {
    string_to_sign
        .split('\n')
        .nth(2)
        .ok_or_else(|| Error::request_invalid("string to sign has no credential scope line"))
}
