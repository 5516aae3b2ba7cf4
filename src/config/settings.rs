//! YAML settings file.
//!
//! ```yaml
//! environment: staging
//! environments:
//!   staging:
//!     aws:
//!       access_key_id: "..."
//!       secret_access_key: "..."
//!       region: ap-northeast-1
//!       bucket_name: my-bucket
//!     cloudfront:
//!       domain: cdn.example.com
//! files:
//!   inputs:
//!     delete_url_list: data/delete_url_list.txt
//!     upload_file_list: data/upload_file_list.txt
//!     resource: data/resource
//!   outputs:
//!     delete_results: data/delete_results.txt
//!     upload_results: data/upload_results.txt
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

use crate::key_mapper::PublicEndpoints;
use crate::types::error::S3batchError;
use crate::types::{AccessKeys, Operation};

const PRODUCTION_ENVIRONMENT: &str = "production";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSettings>,
    #[serde(default)]
    pub files: FileSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSettings {
    pub aws: AwsSettings,
    #[serde(default)]
    pub cloudfront: Option<CloudFrontSettings>,
}

#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AwsSettings {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket_name: String,
}

impl Debug for AwsSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let secret_access_key = self
            .secret_access_key
            .as_ref()
            .map_or("None", |_| "** redacted **");
        f.debug_struct("AwsSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &secret_access_key)
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

impl AwsSettings {
    /// Static keys, when both halves are present.
    pub fn access_keys(&self) -> Option<AccessKeys> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key), Some(secret_access_key)) => Some(AccessKeys {
                access_key: access_key.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudFrontSettings {
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileSettings {
    #[serde(default)]
    pub inputs: InputFileSettings,
    #[serde(default)]
    pub outputs: OutputFileSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct InputFileSettings {
    pub delete_url_list: Option<PathBuf>,
    pub upload_file_list: Option<PathBuf>,
    pub resource: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputFileSettings {
    pub delete_results: Option<PathBuf>,
    pub upload_results: Option<PathBuf>,
}

impl FileSettings {
    pub fn input_file(&self, operation: Operation) -> Option<&PathBuf> {
        match operation {
            Operation::Delete => self.inputs.delete_url_list.as_ref(),
            Operation::Upload => self.inputs.upload_file_list.as_ref(),
        }
    }

    pub fn output_file(&self, operation: Operation) -> Option<&PathBuf> {
        match operation {
            Operation::Delete => self.outputs.delete_results.as_ref(),
            Operation::Upload => self.outputs.upload_results.as_ref(),
        }
    }
}

/// The environment a run targets, resolved from the settings file.
#[derive(Debug, Clone)]
pub struct SelectedEnvironment {
    pub name: String,
    pub aws: AwsSettings,
    pub endpoints: PublicEndpoints,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, S3batchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            S3batchError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| S3batchError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Pick the active environment. `environment_override` wins over the
    /// file's own `environment` key.
    pub fn select_environment(
        &self,
        environment_override: Option<&str>,
    ) -> Result<SelectedEnvironment, S3batchError> {
        let name = environment_override
            .or(self.environment.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| S3batchError::InvalidConfig("environment is not set.".to_string()))?;

        let environment = self.environments.get(name).ok_or_else(|| {
            S3batchError::InvalidConfig(format!("environment '{name}' is not declared."))
        })?;

        let cdn_domain = environment
            .cloudfront
            .as_ref()
            .and_then(|cloudfront| cloudfront.domain.clone())
            .filter(|domain| !domain.is_empty());
        if name == PRODUCTION_ENVIRONMENT && cdn_domain.is_none() {
            return Err(S3batchError::InvalidConfig(format!(
                "environment '{name}' requires cloudfront.domain."
            )));
        }

        Ok(SelectedEnvironment {
            name: name.to_string(),
            aws: environment.aws.clone(),
            endpoints: PublicEndpoints::new(
                environment.aws.bucket_name.clone(),
                environment.aws.region.clone(),
                cdn_domain,
                name,
            ),
        })
    }
}
