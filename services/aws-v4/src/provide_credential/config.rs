use crate::{Config, Credential};
use async_trait::async_trait;
use log::debug;
use s3sign_core::{Context, ProvideCredential, Result};
use std::sync::Arc;

/// ConfigCredentialProvider loads credentials through [`Config`].
///
/// Keys already present in the config are used as is. Otherwise the config
/// is completed from the environment, the shared credentials file and the
/// config file of the context, in that order.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialProvider {
    config: Arc<Config>,
}

impl ConfigCredentialProvider {
    /// Create a new ConfigCredentialProvider.
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProvideCredential for ConfigCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if let Some(cred) = self.config.credential() {
            return Ok(Some(cred));
        }

        let config = Config::clone(&self.config)
            .from_env(ctx)
            .from_profile(ctx)
            .await;
        let cred = config.credential();
        if cred.is_none() {
            debug!("no credential found for profile {}", config.profile);
        }
        Ok(cred)
    }
}
