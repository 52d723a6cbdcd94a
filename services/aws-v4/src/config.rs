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

use crate::constants::*;
use crate::Credential;
use log::debug;
use s3sign_core::utils::Redact;
use s3sign_core::{Context, Error, Result};
use serde_json::{Map, Value};
use std::fmt::{Debug, Formatter};

/// Parse the text of an AWS config or shared credentials file.
///
/// - `[name]` starts a section, which becomes a top-level object.
/// - `key = value` sets a string inside the current object.
/// - `key =` with nothing after it opens a nested object; the lines that
///   follow and are indented deeper than `key` go into it, and a dedent
///   returns to the enclosing object.
///
/// CR, LF and CRLF all end a line. Blank lines, lines without `=`, and
/// lines before the first section are ignored.
pub fn parse_config(text: &str) -> Value {
    let mut root = Map::new();

    // (indentation, path from the root) of every open object.
    let mut stack: Vec<(usize, Vec<String>)> = Vec::new();
    // Path of the last key that opened an object, if any.
    let mut last_object: Option<Vec<String>> = None;

    for line in text.split(['\r', '\n']) {
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            if let Some(name) = line.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
                let name = name.trim().to_string();
                root.insert(name.clone(), Value::Object(Map::new()));
                stack = vec![(0, vec![name])];
                last_object = None;
            }
            continue;
        }

        let Some(indentation) = line.find(|c| c != ' ') else {
            continue;
        };

        while stack.last().is_some_and(|(i, _)| indentation < *i) {
            stack.pop();
        }
        let Some((current, _)) = stack.last() else {
            continue;
        };
        if indentation > *current {
            let Some(path) = last_object.take() else {
                continue;
            };
            stack.push((indentation, path));
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim().to_string(), value.trim());

        let Some((_, path)) = stack.last() else {
            continue;
        };
        let Some(target) = object_at(&mut root, path) else {
            continue;
        };
        if value.is_empty() {
            target.insert(key.clone(), Value::Object(Map::new()));
            let mut path = path.clone();
            path.push(key);
            last_object = Some(path);
        } else {
            target.insert(key, Value::String(value.to_string()));
            last_object = None;
        }
    }

    Value::Object(root)
}

fn object_at<'a>(root: &'a mut Map<String, Value>, path: &[String]) -> Option<&'a mut Map<String, Value>> {
    let mut current = root;
    for key in path {
        current = current.get_mut(key)?.as_object_mut()?;
    }
    Some(current)
}

/// Config for aws services.
#[derive(Clone)]
pub struct Config {
    /// `config_file` will be load from:
    ///
    /// - env value: [`AWS_CONFIG_FILE`]
    /// - default to: `~/.aws/config`
    pub config_file: String,
    /// `shared_credentials_file` will be loaded from:
    ///
    /// - env value: [`AWS_SHARED_CREDENTIALS_FILE`]
    /// - default to: `~/.aws/credentials`
    pub shared_credentials_file: String,
    /// `profile` will be loaded from:
    ///
    /// - env value: [`AWS_PROFILE`]
    /// - default to: `default`
    pub profile: String,

    /// `region` will be loaded from:
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_DEFAULT_REGION`], then [`AWS_REGION`]
    /// - profile config: `region`
    pub region: Option<String>,
    /// `endpoint` will be loaded from:
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_ENDPOINT_URL`]
    /// - profile config: `endpoint_url`, or `endpoint_url` nested under `s3`
    pub endpoint: Option<String>,
    /// `access_key_id` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_ACCESS_KEY_ID`]
    /// - shared credentials: `aws_access_key_id`
    /// - profile config: `aws_access_key_id`
    pub access_key_id: Option<String>,
    /// `secret_access_key` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_SECRET_ACCESS_KEY`]
    /// - shared credentials: `aws_secret_access_key`
    /// - profile config: `aws_secret_access_key`
    pub secret_access_key: Option<String>,
    /// `session_token` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`AWS_SESSION_TOKEN`]
    /// - shared credentials: `aws_session_token`
    /// - profile config: `aws_session_token`
    pub session_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            shared_credentials_file: DEFAULT_SHARED_CREDENTIALS_FILE.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("config_file", &self.config_file)
            .field("shared_credentials_file", &self.shared_credentials_file)
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .finish()
    }
}

impl Config {
    /// Load config from env.
    ///
    /// File locations and the profile name are replaced by their env values;
    /// everything else is only filled in when still unset.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        let envs = ctx.env_vars();

        if let Some(v) = envs.get(AWS_CONFIG_FILE) {
            self.config_file = v.to_string();
        }
        if let Some(v) = envs.get(AWS_SHARED_CREDENTIALS_FILE) {
            self.shared_credentials_file = v.to_string();
        }
        if let Some(v) = envs.get(AWS_PROFILE) {
            self.profile = v.to_string();
        }
        if self.region.is_none() {
            self.region = envs
                .get(AWS_DEFAULT_REGION)
                .or_else(|| envs.get(AWS_REGION))
                .cloned();
        }
        if self.endpoint.is_none() {
            self.endpoint = envs.get(AWS_ENDPOINT_URL).cloned();
        }
        if self.access_key_id.is_none() {
            self.access_key_id = envs.get(AWS_ACCESS_KEY_ID).cloned();
        }
        if self.secret_access_key.is_none() {
            self.secret_access_key = envs.get(AWS_SECRET_ACCESS_KEY).cloned();
        }
        if self.session_token.is_none() {
            self.session_token = envs.get(AWS_SESSION_TOKEN).cloned();
        }
        self
    }

    /// Load config from the shared credentials file and the config file.
    ///
    /// The credentials file section named after the profile is consulted
    /// first, then `[default]` or `[profile NAME]` of the config file. Only
    /// unset fields are filled. Missing or unreadable files are skipped.
    pub async fn from_profile(mut self, ctx: &Context) -> Self {
        // Ignore all errors happened internally.
        let _ = self
            .load_via_profile_shared_credentials_file(ctx)
            .await
            .map_err(|err| debug!("load_via_profile_shared_credentials_file failed: {err:?}"));

        let _ = self
            .load_via_profile_config_file(ctx)
            .await
            .map_err(|err| debug!("load_via_profile_config_file failed: {err:?}"));

        self
    }

    /// Only the following fields will exist in shared_credentials_file:
    ///
    /// - `aws_access_key_id`
    /// - `aws_secret_access_key`
    /// - `aws_session_token`
    async fn load_via_profile_shared_credentials_file(&mut self, ctx: &Context) -> Result<()> {
        let section = self.profile.clone();
        let props = load_section(ctx, &self.shared_credentials_file, &section).await?;

        fill(&mut self.access_key_id, &props, "aws_access_key_id");
        fill(&mut self.secret_access_key, &props, "aws_secret_access_key");
        fill(&mut self.session_token, &props, "aws_session_token");

        Ok(())
    }

    async fn load_via_profile_config_file(&mut self, ctx: &Context) -> Result<()> {
        let section = match self.profile.as_str() {
            DEFAULT_PROFILE => DEFAULT_PROFILE.to_string(),
            x => format!("profile {x}"),
        };
        let props = load_section(ctx, &self.config_file, &section).await?;

        fill(&mut self.access_key_id, &props, "aws_access_key_id");
        fill(&mut self.secret_access_key, &props, "aws_secret_access_key");
        fill(&mut self.session_token, &props, "aws_session_token");
        fill(&mut self.region, &props, "region");
        fill(&mut self.endpoint, &props, "endpoint_url");
        if let Some(s3) = props.get("s3").and_then(Value::as_object) {
            fill(&mut self.endpoint, s3, "endpoint_url");
        }

        Ok(())
    }

    /// Return the region, or a `ConfigInvalid` error if none was found.
    pub fn region(&self) -> Result<&str> {
        self.region
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("region is not configured"))
    }

    /// Build a credential from the loaded keys.
    ///
    /// Returns `None` unless both the access key id and the secret are set.
    pub fn credential(&self) -> Option<Credential> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(ak), Some(sk)) if !ak.is_empty() && !sk.is_empty() => Some(Credential {
                access_key_id: ak.clone(),
                secret_access_key: sk.clone(),
                session_token: self.session_token.clone(),
            }),
            _ => None,
        }
    }
}

async fn load_section(ctx: &Context, path: &str, section: &str) -> Result<Map<String, Value>> {
    let path = ctx
        .expand_home_dir(path)
        .ok_or_else(|| Error::config_invalid("expand homedir failed"))?;
    let content = ctx.file_read_as_string(&path).await?;
    debug!("loaded aws config file: {path}");

    match parse_config(&content) {
        Value::Object(mut sections) => match sections.remove(section) {
            Some(Value::Object(props)) => Ok(props),
            _ => Err(Error::config_invalid(format!(
                "section {section} is not found in {path}"
            ))),
        },
        _ => Err(Error::unexpected("parsed config must be an object")),
    }
}

fn fill(field: &mut Option<String>, props: &Map<String, Value>, key: &str) {
    if field.is_some() {
        return;
    }
    if let Some(v) = props.get(key).and_then(Value::as_str) {
        *field = Some(v.to_string());
    }
}
