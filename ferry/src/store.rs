use std::path::Path;

use clap::Args;
use ferry_store::{HttpSearchStore, HttpStoreOptions};
use ferry_writer::WriterConfig;
use snafu::ResultExt;

use crate::error::{ParseConfigSnafu, ReadConfigSnafu, Result, StoreSnafu};

/// Arguments overriding the store connection of the job configuration.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Address of the search store, e.g. http://localhost:9200
    #[arg(long, env = "FERRY_ENDPOINT")]
    pub endpoint: Option<String>,
    #[arg(long, env = "FERRY_USERNAME")]
    pub username: Option<String>,
    #[arg(long, env = "FERRY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl StoreArgs {
    pub fn apply(&self, config: &mut WriterConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
    }

    /// Create an HTTP store client for `config`, after applying the overrides.
    pub fn connect(&self, config: &mut WriterConfig) -> Result<HttpSearchStore> {
        self.apply(config);

        HttpSearchStore::new(HttpStoreOptions {
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.request_timeout(),
        })
        .context(StoreSnafu {
            operation: "connect",
        })
    }
}

/// Loads a job configuration file.
pub async fn load_config(path: &Path) -> Result<WriterConfig> {
    let text = tokio::fs::read_to_string(path)
        .await
        .context(ReadConfigSnafu { path })?;

    WriterConfig::from_json(&text).context(ParseConfigSnafu { path })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config: WriterConfig = serde_json::from_value(json!({
            "endpoint": "es:9200",
            "username": "elastic",
            "index": "people",
            "column": [{"name": "id", "type": "id"}]
        }))
        .unwrap();

        let args = StoreArgs {
            endpoint: Some("http://other:9200".to_string()),
            username: None,
            password: Some("secret".to_string()),
        };
        args.apply(&mut config);

        assert_eq!(config.endpoint, "http://other:9200");
        assert_eq!(config.username.as_deref(), Some("elastic"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }
}
