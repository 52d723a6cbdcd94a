//! Results of the S3 operations.
//!
//! Response bodies are transcoded by [`crate::xml`] and then deserialized
//! through `serde_json`, so field names follow the S3 XML element names.

use bytes::Bytes;
use http::HeaderMap;
use s3sign_core::time::{parse_rfc3339, DateTime};
use serde::{Deserialize, Deserializer};

/// Owner of the buckets returned by ListBuckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "DisplayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    pub name: String,
    #[serde(deserialize_with = "de_datetime")]
    pub creation_date: DateTime,
}

/// An entry of ListObjectsV2.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Object {
    pub key: String,
    /// Entity tag as returned by S3, quotes included.
    #[serde(rename = "ETag", default)]
    pub e_tag: String,
    #[serde(deserialize_with = "de_datetime")]
    pub last_modified: DateTime,
    #[serde(deserialize_with = "de_u64", default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBucketsOutput {
    pub owner: Owner,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Default)]
pub struct GetObjectOutput {
    /// Response headers such as `content-type` and `etag`.
    pub headers: HeaderMap,
    pub content: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    pub e_tag: Option<String>,
}

/// `<ListAllMyBucketsResult>`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ListAllMyBucketsResult {
    pub owner: Owner,
    #[serde(deserialize_with = "de_list")]
    pub buckets: Vec<Bucket>,
}

/// `<ListBucketResult>` of ListObjectsV2.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ListBucketResult {
    #[serde(deserialize_with = "de_list")]
    pub contents: Vec<Object>,
    #[serde(deserialize_with = "de_bool")]
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// `<Error>`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

fn de_datetime<'de, D>(d: D) -> Result<DateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_rfc3339(&s).map_err(serde::de::Error::custom)
}

fn de_u64<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.trim().parse().map_err(serde::de::Error::custom)
}

fn de_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    Ok(s.trim().eq_ignore_ascii_case("true"))
}

/// A list element holding no array children transcodes to `""`.
fn de_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrText<T> {
        List(Vec<T>),
        Text(String),
    }

    match ListOrText::<T>::deserialize(d)? {
        ListOrText::List(v) => Ok(v),
        ListOrText::Text(s) if s.trim().is_empty() => Ok(Vec::new()),
        ListOrText::Text(s) => Err(serde::de::Error::custom(format!(
            "expected a list, got text: {s}"
        ))),
    }
}
