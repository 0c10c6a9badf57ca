use std::convert::TryFrom;
use std::sync::Arc;

use kube::client::Client;
use log::{info, warn};
use serde_json::Value;

use crate::config::Config;
use crate::crd::inference_service::{DeployedServiceStatus, InferenceService};
use crate::errors::{Error, Result};
use crate::inference::InferenceClient;
use crate::metrics;
use crate::paging::{get_page, Page, PageQuery};
use crate::platform::{KubePlatform, ServingPlatform};
use crate::registry::{MlflowRegistry, ModelRegistry};
use crate::schemas::InferenceServiceInfo;
use crate::synthesis;

/// Configured clients shared by every request handler. Holds no per-request state.
#[derive(Clone)]
pub struct ServingContext {
    platform: Arc<dyn ServingPlatform>,
    registry: Arc<dyn ModelRegistry>,
    inference: InferenceClient,
}

impl ServingContext {
    pub fn new(
        platform: Arc<dyn ServingPlatform>,
        registry: Arc<dyn ModelRegistry>,
        inference: InferenceClient,
    ) -> Self {
        ServingContext {
            platform,
            registry,
            inference,
        }
    }

    /// Build the production context: kube for the platform, MLflow for the registry.
    pub fn from_config(client: Client, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {}", err)))?;

        Ok(ServingContext::new(
            Arc::new(KubePlatform::new(client, config.request_timeout)),
            Arc::new(MlflowRegistry::new(http.clone(), &config.mlflow_tracking_uri)),
            InferenceClient::new(http, &config.ingress_host),
        ))
    }

    /// Compose the resource, rejecting the request before any write if the model has no location.
    async fn synthesize(&self, info: &InferenceServiceInfo) -> Result<InferenceService> {
        match synthesis::compose(info, self.registry.as_ref()).await? {
            Some(isvc) => Ok(isvc),
            None => {
                metrics::synthesis_rejected(&info.namespace);
                warn!("Rejecting '{}/{}' before submission", info.namespace, info.name);
                Err(Error::InvalidSpec(format!(
                    "no model storage location could be determined for '{}'",
                    info.name
                )))
            }
        }
    }

    pub async fn create(&self, info: &InferenceServiceInfo) -> Result<InferenceService> {
        let isvc = self.synthesize(info).await?;
        let created = self.platform.create(&isvc).await?;
        info!("Created InferenceService '{}/{}'", info.namespace, info.name);
        Ok(created)
    }

    pub async fn patch(&self, info: &InferenceServiceInfo) -> Result<InferenceService> {
        let isvc = self.synthesize(info).await?;
        self.platform.patch(&info.name, &isvc).await
    }

    pub async fn replace(&self, info: &InferenceServiceInfo) -> Result<InferenceService> {
        let isvc = self.synthesize(info).await?;
        self.platform.replace(&info.name, &isvc).await
    }

    pub async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        self.platform.delete(name, namespace).await
    }

    pub async fn get(&self, name: &str, namespace: &str) -> Result<DeployedServiceStatus> {
        let isvc = self.platform.get(name, namespace).await?;
        DeployedServiceStatus::try_from(&isvc)
    }

    pub async fn list(&self, namespace: &str, query: &PageQuery) -> Result<Page> {
        let rows = self
            .platform
            .list(namespace)
            .await?
            .iter()
            .map(|isvc| {
                let status = DeployedServiceStatus::try_from(isvc)?;
                Ok(serde_json::to_value(status)?)
            })
            .collect::<Result<Vec<Value>>>()?;
        Ok(get_page(rows, query))
    }

    pub async fn infer(&self, name: &str, namespace: &str, payload: &Value, multi: bool) -> Result<Value> {
        self.inference
            .infer(self.platform.as_ref(), name, namespace, payload, multi)
            .await
    }
}
