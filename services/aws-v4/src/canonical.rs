// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Canonical request construction.
//!
//! - [Create a canonical request](https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html#create-canonical-request)

use crate::constants::AWS_QUERY_ENCODE_SET;
use bytes::Bytes;
use percent_encoding::{percent_decode_str, percent_encode};
use s3sign_core::hash::hex_sha256;
use s3sign_core::{Error, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Max number of headers accepted when parsing a raw request.
const MAX_HEADERS: usize = 128;

/// The parts of an HTTP request that take part in SigV4 canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalInput {
    /// Request method, used verbatim.
    pub method: String,
    /// Request path as it appears on the wire, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Headers in the order they were received. Names are compared
    /// case-insensitively.
    pub headers: Vec<(String, String)>,
    /// Request payload.
    pub body: Bytes,
    /// Whether `.`, `..` and empty path segments are resolved before
    /// signing. S3 signs the path as sent and needs this off.
    pub normalize_path: bool,
}

impl Default for CanonicalInput {
    fn default() -> Self {
        Self {
            method: String::new(),
            path: String::new(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
            normalize_path: true,
        }
    }
}

impl CanonicalInput {
    /// Parse an HTTP/1.1 request message: request line, headers, blank
    /// line and an optional body.
    ///
    /// Folded header lines (a line starting with a space or tab) are joined
    /// to the previous header with a single space. Header values must be
    /// valid UTF-8. When a `Content-Length` header is present the body is
    /// truncated to it.
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let raw = unfold_headers(raw);
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let offset = match req.parse(&raw) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => {
                return Err(Error::request_invalid(
                    "raw request ends before the header section is complete",
                ))
            }
            Err(e) => {
                return Err(Error::request_invalid("failed to parse raw request").with_source(e))
            }
        };

        let (Some(method), Some(target)) = (req.method, req.path) else {
            return Err(Error::request_invalid("raw request has no request line"));
        };

        let headers = req
            .headers
            .iter()
            .map(|h| Ok((h.name.to_string(), header_value(h.name, h.value)?)))
            .collect::<Result<Vec<(String, String)>>>()?;

        let mut body = &raw[offset..];
        if let Some(length) = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        {
            body = &body[..length.min(body.len())];
        }

        let (path, query) = split_target(target);
        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            query: query.map(|v| v.to_string()),
            headers,
            body: Bytes::copy_from_slice(body),
            normalize_path: true,
        })
    }

    /// Collect the canonicalization input from an [`http::Request`].
    ///
    /// Fails if a header value is not valid UTF-8.
    pub fn from_http(req: &http::Request<Bytes>) -> Result<Self> {
        let headers = req
            .headers()
            .iter()
            .map(|(k, v)| Ok((k.as_str().to_string(), header_value(k.as_str(), v.as_bytes())?)))
            .collect::<Result<Vec<(String, String)>>>()?;

        Ok(Self {
            method: req.method().as_str().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(|v| v.to_string()),
            headers,
            body: req.body().clone(),
            normalize_path: true,
        })
    }

    /// Set whether the path is normalized before signing.
    pub fn with_normalize_path(mut self, normalize_path: bool) -> Self {
        self.normalize_path = normalize_path;
        self
    }
}

fn header_value(name: &str, value: &[u8]) -> Result<String> {
    std::str::from_utf8(value).map(str::to_string).map_err(|e| {
        Error::request_invalid(format!("value of header {name} is not valid utf-8")).with_source(e)
    })
}

/// Join obsolete folded header lines into the header they continue.
///
/// Only the head of the message is touched. The line break and the leading
/// whitespace of the continuation line become one space.
fn unfold_headers(raw: &[u8]) -> Cow<'_, [u8]> {
    let is_ws = |b: &u8| *b == b' ' || *b == b'\t';

    // The head ends at the first empty line.
    let head_end = raw
        .iter()
        .enumerate()
        .position(|(i, b)| {
            *b == b'\n' && (raw[i + 1..].starts_with(b"\r\n") || raw[i + 1..].starts_with(b"\n"))
        })
        .map(|i| i + 1)
        .unwrap_or(raw.len());
    let head = &raw[..head_end];

    let folded = head
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'\n' && head.get(i + 1).is_some_and(is_ws));
    if !folded {
        return Cow::Borrowed(raw);
    }

    let mut f = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < head.len() {
        let eol = match head[i] {
            b'\r' if head.get(i + 1) == Some(&b'\n') => 2,
            b'\n' => 1,
            _ => 0,
        };
        if eol > 0 && head.get(i + eol).is_some_and(is_ws) {
            f.push(b' ');
            i += eol;
            while head.get(i).is_some_and(is_ws) {
                i += 1;
            }
            continue;
        }
        f.push(head[i]);
        i += 1;
    }
    f.extend_from_slice(&raw[head_end..]);
    Cow::Owned(f)
}

/// Split a request target into path and query.
///
/// A target in absolute form (`http://host/path`) is reduced to its path.
/// A target starting with `//` is always a path.
fn split_target(target: &str) -> (&str, Option<&str>) {
    let mut target = target;
    if !target.starts_with('/') {
        if let Some((_, rest)) = target.split_once("://") {
            target = rest.find('/').map(|idx| &rest[idx..]).unwrap_or("/");
        }
    }

    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// Build the canonical request of a raw HTTP/1.1 request message.
pub fn canonical_request_from_raw(raw: &[u8]) -> Result<String> {
    let input = CanonicalInput::from_raw(raw)?;
    Ok(canonical_request(&input))
}

/// Build the canonical request.
///
/// ```text
/// <method>
/// <canonical path>
/// <canonical query>
/// <name>:<values>      (one line per header)
///
/// <signed headers>
/// <hex sha256 of body>
/// ```
pub fn canonical_request(input: &CanonicalInput) -> String {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    f.push_str(&input.method);
    f.push('\n');
    if input.normalize_path {
        f.push_str(&canonical_path(&input.path));
    } else {
        f.push_str(&encode_path(&input.path));
    }
    f.push('\n');
    f.push_str(&canonical_query(input.query.as_deref().unwrap_or_default()));
    f.push('\n');

    let headers = canonical_headers(&input.headers);
    for (name, values) in headers.iter() {
        f.push_str(name);
        f.push(':');
        f.push_str(&values.join(","));
        f.push('\n');
    }
    f.push('\n');
    f.push_str(&headers.keys().map(String::as_str).collect::<Vec<_>>().join(";"));
    f.push('\n');
    f.push_str(&hex_sha256(&input.body));
    f
}

/// Normalize and re-encode a request path.
///
/// Every segment is percent-decoded and encoded again with the strict
/// unreserved set. `.` segments are dropped, `..` removes the previous
/// segment and empty segments disappear, so duplicate slashes collapse. A
/// trailing slash survives. The result is never empty.
pub fn canonical_path(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            v => {
                let decoded: Vec<u8> = percent_decode_str(v).collect();
                segments.push(percent_encode(&decoded, &AWS_QUERY_ENCODE_SET).to_string());
            }
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut f = String::with_capacity(path.len() + 1);
    for segment in segments {
        f.push('/');
        f.push_str(&segment);
    }
    if path.ends_with('/') {
        f.push('/');
    }
    f
}

/// Re-encode a request path without normalizing it.
///
/// Segments are decoded and strictly re-encoded like in [`canonical_path`]
/// but `.`, `..` and empty segments are kept. An empty path becomes `/`.
pub fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    path.split('/')
        .map(strict_encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a raw query string.
///
/// Pairs are split on `&` and the first `=`, decoded, strictly re-encoded
/// and sorted by name then value. `+` is a literal plus sign.
pub fn canonical_query(query: &str) -> String {
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|v| !v.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (strict_encode(k), strict_encode(v))
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn strict_encode(v: &str) -> String {
    let decoded: Vec<u8> = percent_decode_str(v).collect();
    percent_encode(&decoded, &AWS_QUERY_ENCODE_SET).to_string()
}

/// Group headers by lower-cased name.
///
/// Values keep their insertion order and are normalized with
/// [`normalize_header_value`]. The map iterates in sorted name order.
pub fn canonical_headers(headers: &[(String, String)]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.trim().to_ascii_lowercase())
            .or_default()
            .push(normalize_header_value(value));
    }
    map
}

/// Trim a header value and collapse runs of spaces into one.
pub fn normalize_header_value(value: &str) -> String {
    let mut f = String::with_capacity(value.len());
    let mut last_space = false;
    for c in value.trim().chars() {
        if c == ' ' {
            if !last_space {
                f.push(c);
            }
            last_space = true;
        } else {
            f.push(c);
            last_space = false;
        }
    }
    f
}
