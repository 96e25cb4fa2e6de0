use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::ConnectionDefaults;

/// Client construction options.
///
/// Connection fields are optional here; whatever is left unset must then be
/// supplied through per-call overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,

    // Older gateway variants: the URL is derived from the app id and region
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_region: Option<String>,

    #[serde(default, alias = "cluster")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,

    /// Treat non-JSON error bodies containing `{` as JSON candidates.
    /// The gateway labels some JSON error bodies as `text/plain`.
    #[serde(default = "default_sniff_plaintext_errors")]
    pub sniff_plaintext_errors: bool,
}

fn default_sniff_plaintext_errors() -> bool {
    true
}

/// Immutable gateway credentials, fixed for the client's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_url: String,
    pub api_key: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_url: Some(api_url.into()),
            ..Self::default()
        }
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Read options from `MONGODB_*` environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: env_var("MONGODB_API_KEY"),
            api_url: env_var("MONGODB_API_URL"),
            api_id: env_var("MONGODB_API_ID"),
            api_region: env_var("MONGODB_API_REGION"),
            data_source: env_var("MONGODB_CLUSTER_NAME"),
            database: env_var("MONGODB_DATABASE_NAME"),
            collection: env_var("MONGODB_COLLECTION_NAME"),
            sniff_plaintext_errors: default_sniff_plaintext_errors(),
        }
    }

    /// Base URL of the gateway without a trailing slash
    pub fn resolved_api_url(&self) -> Option<String> {
        if let Some(url) = non_empty(&self.api_url) {
            return Some(url.trim_end_matches('/').to_string());
        }
        let api_id = non_empty(&self.api_id)?;
        Some(match non_empty(&self.api_region) {
            Some(region) => format!("https://{region}.mongodb-api.com/app/{api_id}/endpoint/data/beta"),
            None => format!("https://data.mongodb-api.com/app/{api_id}/endpoint/data/beta"),
        })
    }

    /// Check the construction-time requirements, reporting every missing field
    pub fn validate(&self) -> Result<Credentials, CoreError> {
        let api_url = self.resolved_api_url();
        let api_key = non_empty(&self.api_key);

        match (api_url, api_key) {
            (Some(api_url), Some(api_key)) => Ok(Credentials {
                api_url,
                api_key: api_key.to_string(),
            }),
            (api_url, api_key) => {
                let mut missing = Vec::new();
                if api_url.is_none() {
                    missing.push("apiUrl".to_string());
                }
                if api_key.is_none() {
                    missing.push("apiKey".to_string());
                }
                tracing::debug!(?missing, "Rejecting client configuration");
                Err(CoreError::Configuration { missing })
            }
        }
    }

    pub fn connection_defaults(&self) -> ConnectionDefaults {
        ConnectionDefaults {
            data_source: self.data_source.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            api_id: None,
            api_region: None,
            data_source: None,
            database: None,
            collection: None,
            sniff_plaintext_errors: default_sniff_plaintext_errors(),
        }
    }
}
