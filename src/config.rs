use std::env;

use crate::error::PartiqlDbError;

/// Settings needed to reach the remote service.
///
/// Building the network client from these values is left to the [`PartiqlClient`]
/// implementation; this type only gathers and validates them.
///
/// [`PartiqlClient`]: crate::backend::PartiqlClient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub disable_https: bool,
}

const ENV_REGION: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];
const ENV_ACCESS_KEY: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"];
const ENV_SECRET_KEY: [&str; 2] = ["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"];

impl ClientConfig {
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse `KEY=value;KEY=value`, falling back to the process environment for missing
    /// region and credentials.
    ///
    /// Recognised keys (case-insensitive): `region`, `access_key_id`, `secret_access_key`,
    /// `endpoint`.
    ///
    /// # Errors
    /// Returns `PartiqlDbError::ConfigError` if no region can be found.
    pub fn from_connection_string(dsn: &str) -> Result<Self, PartiqlDbError> {
        Self::from_connection_string_with(dsn, |key| env::var(key).ok())
    }

    /// Like [`from_connection_string`](Self::from_connection_string) with a custom lookup in
    /// place of the process environment.
    ///
    /// # Errors
    /// Returns `PartiqlDbError::ConfigError` if no region can be found.
    pub fn from_connection_string_with<F>(dsn: &str, lookup: F) -> Result<Self, PartiqlDbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ClientConfigBuilder::default();
        for pair in dsn.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            builder = match key.to_ascii_lowercase().as_str() {
                "region" => builder.region(value),
                "access_key_id" => builder.access_key_id(value),
                "secret_access_key" => builder.secret_access_key(value),
                "endpoint" => builder.endpoint(value),
                other => {
                    tracing::debug!(key = other, "ignoring unknown connection string key");
                    builder
                }
            };
        }

        let first_set = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(*key).filter(|value| !value.is_empty()))
        };
        if builder.config.region.is_none() {
            builder.config.region = first_set(&ENV_REGION);
        }
        if builder.config.access_key_id.is_none() {
            builder.config.access_key_id = first_set(&ENV_ACCESS_KEY);
        }
        if builder.config.secret_access_key.is_none() {
            builder.config.secret_access_key = first_set(&ENV_SECRET_KEY);
        }

        let config = builder.finish();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `PartiqlDbError::ConfigError` if the region is missing.
    pub fn validate(&self) -> Result<(), PartiqlDbError> {
        if self.region.as_deref().is_none_or(str::is_empty) {
            return Err(PartiqlDbError::ConfigError("region is required".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
        self.config.access_key_id = Some(access_key_id.into());
        self
    }

    #[must_use]
    pub fn secret_access_key(mut self, secret_access_key: impl Into<String>) -> Self {
        self.config.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Custom endpoint; a plain `http://` URL turns HTTPS off.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.config.disable_https = endpoint.starts_with("http://");
        self.config.endpoint = Some(endpoint);
        self
    }

    #[must_use]
    pub fn finish(self) -> ClientConfig {
        self.config
    }

    /// # Errors
    /// Returns `PartiqlDbError::ConfigError` if the region is missing.
    pub fn build(self) -> Result<ClientConfig, PartiqlDbError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
