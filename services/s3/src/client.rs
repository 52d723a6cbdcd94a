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

use crate::error::ServiceError;
use crate::types::{
    ErrorResponse, GetObjectOutput, ListAllMyBucketsResult, ListBucketResult, ListBucketsOutput,
    Object, PutObjectOutput,
};
use crate::xml::{transcode, XmlValue};
use bytes::Bytes;
use http::{header, Method, Request, Response, Uri};
use log::debug;
use percent_encoding::utf8_percent_encode;
use s3sign_aws_v4::constants::{AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET};
use s3sign_aws_v4::{Config, ConfigCredentialProvider, Credential, RequestSigner};
use s3sign_core::{Context, Error, Result, Signer};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

/// A minimal S3 client on top of the SigV4 signer.
///
/// Requests use path style addressing: `{endpoint}/{bucket}/{key}`. Every
/// request goes out through [`Context::http_send`], so the transport is
/// whatever the context carries.
#[derive(Debug, Clone)]
pub struct S3 {
    ctx: Context,
    signer: Signer<Credential>,
    endpoint: String,
}

impl S3 {
    /// Create a client from a config that already has a region.
    ///
    /// Missing credentials are loaded lazily on the first request from the
    /// environment and profile files of `ctx`. A config without any
    /// credential sends anonymous requests.
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        let region = config.region()?.to_string();
        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{region}.amazonaws.com"),
        };

        let uri: Uri = endpoint
            .parse()
            .map_err(|e| Error::config_invalid(format!("invalid endpoint: {endpoint}")).with_source(e))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(Error::config_invalid(format!(
                "endpoint must be an absolute url: {endpoint}"
            )));
        }

        debug!("s3 client uses endpoint {endpoint} in region {region}");
        let signer = Signer::new(
            ctx.clone(),
            ConfigCredentialProvider::new(Arc::new(config)),
            RequestSigner::new("s3", &region),
        );

        Ok(Self {
            ctx,
            signer,
            endpoint,
        })
    }

    /// Create a client from the environment and profile files of `ctx`.
    pub async fn load(ctx: Context) -> Result<Self> {
        let config = Config::default().from_env(&ctx).from_profile(&ctx).await;
        Self::new(ctx, config)
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List all buckets owned by the caller.
    pub async fn list_buckets(&self) -> Result<ListBucketsOutput> {
        let req = self.request(Method::GET, "/", None, Bytes::new())?;
        let resp = self.send(req).await?;

        let result: ListAllMyBucketsResult =
            parse_xml(resp.body(), "ListAllMyBucketsResult", &["Bucket"])?;
        Ok(ListBucketsOutput {
            owner: result.owner,
            buckets: result.buckets,
        })
    }

    /// List every object of a bucket.
    ///
    /// Pages of ListObjectsV2 are followed until S3 stops returning a
    /// continuation token.
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<Object>> {
        let path = format!("/{}", encode_path(bucket));
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = "list-type=2".to_string();
            if let Some(token) = &token {
                query.push_str("&continuation-token=");
                query.push_str(&utf8_percent_encode(token, &AWS_QUERY_ENCODE_SET).to_string());
            }

            let req = self.request(Method::GET, &path, Some(&query), Bytes::new())?;
            let resp = self.send(req).await?;
            let page: ListBucketResult = parse_xml(resp.body(), "ListBucketResult", &["Contents"])?;

            debug!(
                "listed {} objects in bucket {bucket}, truncated: {}",
                page.contents.len(),
                page.is_truncated
            );
            objects.extend(page.contents);

            match page.next_continuation_token.filter(|v| !v.is_empty()) {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }

        Ok(objects)
    }

    /// Fetch an object.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let path = object_path(bucket, key)?;
        let req = self.request(Method::GET, &path, None, Bytes::new())?;
        let resp = self.send(req).await?;

        let (parts, content) = resp.into_parts();
        Ok(GetObjectOutput {
            headers: parts.headers,
            content,
        })
    }

    /// Upload an object in a single request.
    pub async fn put_object(&self, bucket: &str, key: &str, content: Bytes) -> Result<PutObjectOutput> {
        let path = object_path(bucket, key)?;
        let req = self.request(Method::PUT, &path, None, content)?;
        let resp = self.send(req).await?;

        let e_tag = resp
            .headers()
            .get(header::ETAG)
            .map(|v| v.to_str())
            .transpose()?
            .map(str::to_string);
        Ok(PutObjectOutput { e_tag })
    }

    fn request(&self, method: Method, path: &str, query: Option<&str>, body: Bytes) -> Result<Request<Bytes>> {
        let mut url = format!("{}{path}", self.endpoint);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }

        let mut builder = Request::builder().method(method).uri(url);
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_LENGTH, body.len());
        }
        Ok(builder.body(body)?)
    }

    async fn send(&self, mut req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.signer.sign(&mut req).await?;

        debug!("sending s3 request: {} {}", req.method(), req.uri());
        let resp = self.ctx.http_send(req).await?;
        debug!("s3 responded: {}", resp.status());

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(service_error(&resp))
    }
}

fn encode_path(s: &str) -> String {
    utf8_percent_encode(s, &AWS_URI_ENCODE_SET).to_string()
}

fn object_path(bucket: &str, key: &str) -> Result<String> {
    if bucket.is_empty() || key.is_empty() {
        return Err(Error::request_invalid("bucket and key must not be empty"));
    }
    Ok(format!("/{}/{}", encode_path(bucket), encode_path(key)))
}

/// Transcode `body` and deserialize the document element named `root`.
fn parse_xml<T: DeserializeOwned>(body: &[u8], root: &str, array_tags: &[&str]) -> Result<T> {
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::unexpected("s3 response is not valid utf-8").with_source(e))?;
    let tags: HashSet<&str> = array_tags.iter().copied().collect();

    let mut tree = transcode(text, &tags);
    let value = match &mut tree {
        XmlValue::Object(fields) => fields.remove(root),
        _ => None,
    }
    .ok_or_else(|| Error::unexpected(format!("s3 response has no {root} element")))?;

    serde_json::from_value(value.into()).map_err(|e| {
        Error::unexpected(format!("failed to deserialize {root}")).with_source(e)
    })
}

/// Build the error of a non-2xx response.
fn service_error(resp: &Response<Bytes>) -> Error {
    let status = resp.status();
    let body: ErrorResponse =
        parse_xml(resp.body(), "Error", &[]).unwrap_or_default();

    let request_id = body.request_id.or_else(|| {
        resp.headers()
            .get("x-amz-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let err = ServiceError {
        status,
        code: body.code,
        message: body.message,
        request_id,
    };
    Error::unexpected(err.to_string()).with_source(err)
}
