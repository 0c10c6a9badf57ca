use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    client::Client,
    core::ApiResource,
};
use log::{error, info};

use crate::crd::inference_service::{inference_service_resource, InferenceService};
use crate::errors::{Error, Result};
use crate::metrics;

pub const PLATFORM: &str = "kubernetes";

/// The serving platform's resource API. The platform is the system of record; writes are single
/// atomic calls and conflicting writes are reported, never retried.
#[async_trait]
pub trait ServingPlatform: Send + Sync {
    async fn create(&self, isvc: &InferenceService) -> Result<InferenceService>;
    async fn patch(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService>;
    async fn replace(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService>;
    async fn delete(&self, name: &str, namespace: &str) -> Result<()>;
    async fn get(&self, name: &str, namespace: &str) -> Result<InferenceService>;
    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>>;
}

/// Map a `kube::Error` into the crate taxonomy, keeping the platform's code and reason.
pub fn map_kube_error(err: kube::Error) -> Error {
    match err {
        kube::Error::Api(response) if response.code == 409 => {
            Error::Conflict(format!("{} ({})", response.message, response.reason))
        }
        kube::Error::Api(response) if response.code == 404 => Error::NotFound(response.message),
        kube::Error::Api(response) => Error::upstream(
            PLATFORM,
            format!("{} {}: {}", response.code, response.reason, response.message),
        ),
        other => Error::upstream(PLATFORM, other.to_string()),
    }
}

fn namespace_of(isvc: &InferenceService) -> Result<&str> {
    isvc.metadata
        .namespace
        .as_deref()
        .ok_or(Error::MissingKey(".metadata.namespace"))
}

#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    resource: ApiResource,
    timeout: Duration,
}

impl KubePlatform {
    pub fn new(client: Client, timeout: Duration) -> Self {
        KubePlatform {
            client,
            resource: inference_service_resource(),
            timeout,
        }
    }

    fn api(&self, namespace: &str) -> Api<InferenceService> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }

    /// Run one platform call under the configured timeout and map its failure.
    async fn bounded<T, F>(&self, action: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(map_kube_error),
            Err(_) => Err(Error::upstream(
                PLATFORM,
                format!("{} timed out after {:?}", action, self.timeout),
            )),
        };
        if let Err(err) = &result {
            error!("Platform {} failed: {}", action, err);
            metrics::platform_error_happened(action, err);
        }
        result
    }
}

#[async_trait]
impl ServingPlatform for KubePlatform {
    async fn create(&self, isvc: &InferenceService) -> Result<InferenceService> {
        let api = self.api(namespace_of(isvc)?);
        info!("Creating InferenceService {:?}", isvc.metadata.name);
        self.bounded("create", api.create(&PostParams::default(), isvc)).await
    }

    async fn patch(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService> {
        let api = self.api(namespace_of(isvc)?);
        info!("Patching InferenceService '{}'", name);
        self.bounded("patch", api.patch(name, &PatchParams::default(), &Patch::Merge(isvc)))
            .await
    }

    async fn replace(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService> {
        let api = self.api(namespace_of(isvc)?);
        let mut isvc = isvc.clone();
        // Replacing needs the current resourceVersion; a concurrent write in between becomes a 409
        if isvc.metadata.resource_version.is_none() {
            let current = self.bounded("replace", api.get(name)).await?;
            isvc.metadata.resource_version = current.metadata.resource_version;
        }
        info!(
            "Replacing InferenceService '{}' at resourceVersion {:?}",
            name, isvc.metadata.resource_version
        );
        self.bounded("replace", api.replace(name, &PostParams::default(), &isvc))
            .await
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        info!("Deleting InferenceService '{}/{}'", namespace, name);
        self.bounded("delete", self.api(namespace).delete(name, &DeleteParams::default()))
            .await
            .map(|_| ())
    }

    async fn get(&self, name: &str, namespace: &str) -> Result<InferenceService> {
        self.bounded("get", self.api(namespace).get(name)).await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>> {
        self.bounded("list", self.api(namespace).list(&ListParams::default()))
            .await
            .map(|list| list.items)
    }
}
