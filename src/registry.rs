use async_trait::async_trait;
use log::{debug, error};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{Error, Result};

pub const REGISTRY: &str = "model-registry";

const LATEST_VERSIONS_PATH: &str = "/api/2.0/mlflow/registered-models/get-latest-versions";

/// One registered version of a logical model
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelVersion {
    pub version: String,
    /// Physical location of the artifact, e.g. `s3://mlflow/3/9a1c.../artifacts/model`
    pub source: String,
}

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Latest versions of `model_name`, optionally restricted to `stages`, in registry order.
    async fn latest_versions(&self, model_name: &str, stages: &[String]) -> Result<Vec<ModelVersion>>;
}

/// Storage URI of the last entry the registry returns, or `None` when the model has no versions.
pub async fn latest_version_uri(
    registry: &dyn ModelRegistry,
    model_name: &str,
    stage: Option<&str>,
) -> Result<Option<String>> {
    let stages = parse_stages(stage);
    let versions = registry.latest_versions(model_name, &stages).await?;
    debug!("Registry returned {} version(s) of '{}'", versions.len(), model_name);
    Ok(versions.into_iter().last().map(|version| version.source))
}

// Entries go to the registry as written; an empty filter means every stage
fn parse_stages(stage: Option<&str>) -> Vec<String> {
    match stage {
        Some(stage) if !stage.is_empty() => stage.split(',').map(str::to_owned).collect(),
        _ => Vec::new(),
    }
}

#[derive(Deserialize)]
struct LatestVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
}

/// `ModelRegistry` backed by the MLflow tracking server's REST API
pub struct MlflowRegistry {
    client: reqwest::Client,
    tracking_uri: String,
}

impl MlflowRegistry {
    pub fn new(client: reqwest::Client, tracking_uri: &str) -> Self {
        MlflowRegistry {
            client,
            tracking_uri: tracking_uri.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl ModelRegistry for MlflowRegistry {
    async fn latest_versions(&self, model_name: &str, stages: &[String]) -> Result<Vec<ModelVersion>> {
        let url = format!("{}{}", self.tracking_uri, LATEST_VERSIONS_PATH);
        let response = self
            .client
            .post(&url)
            .json(&json!({"name": model_name, "stages": stages}))
            .send()
            .await
            .map_err(|err| {
                error!("Model registry request for '{}' failed: {}", model_name, err);
                Error::upstream(REGISTRY, err.to_string())
            })?;

        let status = response.status();
        // An unknown model is a business outcome, not a registry failure
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Model registry answered {} for '{}': {}", status, model_name, body);
            return Err(Error::upstream(REGISTRY, format!("{}: {}", status, body)));
        }

        let parsed: LatestVersionsResponse = response
            .json()
            .await
            .map_err(|err| Error::upstream(REGISTRY, format!("unparsable response: {}", err)))?;
        Ok(parsed.model_versions)
    }
}
