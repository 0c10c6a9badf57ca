#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use kserve_controller::crd::inference_service::{InferenceService, InferenceServiceStatus};
use kserve_controller::errors::{Error, Result};
use kserve_controller::inference::InferenceClient;
use kserve_controller::platform::ServingPlatform;
use kserve_controller::registry::{ModelRegistry, ModelVersion};
use kserve_controller::ServingContext;

type Key = (String, String);

fn key_of(isvc: &InferenceService) -> Key {
    (
        isvc.metadata.namespace.clone().unwrap_or_default(),
        isvc.metadata.name.clone().unwrap_or_default(),
    )
}

/// In-memory serving platform keyed by (namespace, name)
#[derive(Default)]
pub struct FakePlatform {
    services: Mutex<BTreeMap<Key, InferenceService>>,
    writes: AtomicUsize,
}

impl FakePlatform {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, name: &str, namespace: &str) -> Option<InferenceService> {
        let services = self.services.lock().unwrap();
        services.get(&(namespace.to_owned(), name.to_owned())).cloned()
    }

    /// Pretend the platform reconciled the service and wrote `status`.
    pub fn set_status(&self, name: &str, namespace: &str, status: InferenceServiceStatus) {
        let mut services = self.services.lock().unwrap();
        let isvc = services
            .get_mut(&(namespace.to_owned(), name.to_owned()))
            .expect("service must be created before setting its status");
        isvc.status = Some(status);
    }

    fn write(&self, name: &str, isvc: &InferenceService, must_exist: bool) -> Result<InferenceService> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let key = (isvc.metadata.namespace.clone().unwrap_or_default(), name.to_owned());
        let mut services = self.services.lock().unwrap();
        match (services.contains_key(&key), must_exist) {
            (true, false) => Err(Error::Conflict(format!("inferenceservices \"{}\" already exists", name))),
            (false, true) => Err(Error::NotFound(format!("inferenceservices \"{}\" not found", name))),
            _ => {
                services.insert(key, isvc.clone());
                Ok(isvc.clone())
            }
        }
    }
}

#[async_trait]
impl ServingPlatform for FakePlatform {
    async fn create(&self, isvc: &InferenceService) -> Result<InferenceService> {
        let (_, name) = key_of(isvc);
        self.write(&name, isvc, false)
    }

    async fn patch(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService> {
        self.write(name, isvc, true)
    }

    async fn replace(&self, name: &str, isvc: &InferenceService) -> Result<InferenceService> {
        self.write(name, isvc, true)
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        let mut services = self.services.lock().unwrap();
        services
            .remove(&(namespace.to_owned(), name.to_owned()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("inferenceservices \"{}\" not found", name)))
    }

    async fn get(&self, name: &str, namespace: &str) -> Result<InferenceService> {
        self.stored(name, namespace)
            .ok_or_else(|| Error::NotFound(format!("inferenceservices \"{}\" not found", name)))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<InferenceService>> {
        let services = self.services.lock().unwrap();
        Ok(services
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, isvc)| isvc.clone())
            .collect())
    }
}

/// Registry answering the same versions for every model, recording the stages it was asked for
#[derive(Default)]
pub struct FakeRegistry {
    versions: Vec<ModelVersion>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRegistry {
    pub fn with_sources(sources: &[&str]) -> Self {
        FakeRegistry {
            versions: sources
                .iter()
                .enumerate()
                .map(|(i, source)| ModelVersion {
                    version: (i + 1).to_string(),
                    source: source.to_string(),
                })
                .collect(),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelRegistry for FakeRegistry {
    async fn latest_versions(&self, model_name: &str, stages: &[String]) -> Result<Vec<ModelVersion>> {
        self.calls
            .lock()
            .unwrap()
            .push((model_name.to_owned(), stages.to_vec()));
        Ok(self.versions.clone())
    }
}

pub fn context(platform: Arc<FakePlatform>, registry: Arc<FakeRegistry>, ingress_host: &str) -> ServingContext {
    ServingContext::new(
        platform,
        registry,
        InferenceClient::new(reqwest::Client::new(), ingress_host),
    )
}

// Get one of the repo's example documents under tests/fixtures
pub fn example_config(name: &str) -> Value {
    let config_str = std::fs::read_to_string(format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name))
        .expect("Failed to read config file");
    serde_yaml::from_str(&config_str).expect("Unable to parse config file into yaml")
}
