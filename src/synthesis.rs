//! Turns an `InferenceServiceInfo` request into the full InferenceService the platform expects.
//!
//! The only abort branch is a model without a storage location: `compose` then answers `Ok(None)`
//! and nothing may be submitted. Registry failures surface as errors.
use std::collections::BTreeMap;

use log::{debug, warn};

use crate::builders;
use crate::crd::inference_service::{self as wire, new_inference_service, InferenceService};
use crate::errors::Result;
use crate::registry::{latest_version_uri, ModelRegistry};
use crate::schemas::{self, InferenceServiceInfo, ProtocolVersion, MLFLOW_FORMAT};

pub const SIDECAR_INJECT_ANNOTATION: &str = "sidecar.istio.io/inject";
pub const PROMETHEUS_SCRAPING_ANNOTATION: &str = "serving.kserve.io/enable-prometheus-scraping";

/// Registered mlflow models served over v2 are located through the registry, even when a
/// `storage_uri` is given; everything else must name its storage location.
fn resolves_through_registry(spec: &schemas::ModelSpec) -> Option<&str> {
    match (&spec.model_name, spec.protocol_version) {
        (Some(name), Some(ProtocolVersion::V2)) if spec.model_format.name == MLFLOW_FORMAT => Some(name.as_str()),
        _ => None,
    }
}

fn explicit_storage_uri(spec: &schemas::ModelSpec) -> Option<String> {
    spec.storage_uri
        .as_deref()
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
        .map(str::to_owned)
}

/// Decide where the model lives and build the platform model spec, or `None` if no location is known.
pub async fn resolve_model_spec(
    spec: &schemas::ModelSpec,
    registry: &dyn ModelRegistry,
) -> Result<Option<wire::ModelSpec>> {
    let storage_uri = match resolves_through_registry(spec) {
        Some(model_name) => {
            let uri = latest_version_uri(registry, model_name, spec.model_stage.as_deref()).await?;
            debug!("Resolved registered model '{}' to {:?}", model_name, uri);
            uri
        }
        None => explicit_storage_uri(spec),
    };

    let storage_uri = match storage_uri {
        Some(uri) => uri,
        None => return Ok(None),
    };

    Ok(Some(wire::ModelSpec {
        model_format: Some(builders::model_format(&spec.model_format)),
        storage_uri: Some(storage_uri),
        protocol_version: spec.protocol_version,
        resources: builders::resource_requirements(spec.resources.as_ref()),
        runtime: spec.runtime.clone(),
        runtime_version: spec.runtime_version.clone(),
        ports: builders::container_ports(spec.ports.as_deref()),
        env: builders::env_vars(spec.envs.as_deref()),
    }))
}

pub async fn predictor_spec(
    predictor: &schemas::PredictorSpec,
    registry: &dyn ModelRegistry,
) -> Result<Option<wire::PredictorSpec>> {
    let model = match resolve_model_spec(&predictor.model_spec, registry).await? {
        Some(model) => model,
        None => return Ok(None),
    };
    Ok(Some(wire::PredictorSpec {
        model: Some(model),
        extension: wire::ComponentExtensionSpec {
            service_account_name: Some(predictor.service_account_name.clone()),
            node_selector: predictor.node_selector.clone(),
            tolerations: builders::tolerations(predictor.tolerations.as_deref()),
            timeout: predictor.timeout,
            min_replicas: predictor.min_replicas,
            max_replicas: predictor.max_replicas,
            scale_target: predictor.scale_target,
            scale_metric: predictor.scale_metric.clone(),
            canary_traffic_percent: predictor.canary_traffic_percent,
            batcher: builders::batcher(predictor.batcher.as_ref()),
            logger: builders::logger(predictor.logger.as_ref()),
        },
    }))
}

/// A transformer is only emitted when at least one of its containers survives filtering.
pub fn transformer_spec(transformer: Option<&schemas::TransformerSpec>) -> Option<wire::TransformerSpec> {
    let transformer = transformer?;
    let containers = builders::containers(Some(transformer.containers.as_slice()))?;
    Some(wire::TransformerSpec {
        containers,
        extension: wire::ComponentExtensionSpec {
            service_account_name: Some(transformer.service_account_name.clone()),
            node_selector: transformer.node_selector.clone(),
            tolerations: builders::tolerations(transformer.tolerations.as_deref()),
            timeout: transformer.timeout,
            min_replicas: transformer.min_replicas,
            max_replicas: transformer.max_replicas,
            scale_target: transformer.scale_target,
            scale_metric: transformer.scale_metric.clone(),
            canary_traffic_percent: transformer.canary_traffic_percent,
            batcher: builders::batcher(transformer.batcher.as_ref()),
            logger: None,
        },
    })
}

/// The mesh sidecar is opted out unless injection was asked for; metrics scraping is opt-in.
pub fn annotations(sidecar_inject: bool, enable_prometheus_scraping: bool) -> Option<BTreeMap<String, String>> {
    let mut annotations = BTreeMap::new();
    if !sidecar_inject {
        annotations.insert(SIDECAR_INJECT_ANNOTATION.to_owned(), "false".to_owned());
    }
    if enable_prometheus_scraping {
        annotations.insert(PROMETHEUS_SCRAPING_ANNOTATION.to_owned(), "true".to_owned());
    }
    if annotations.is_empty() {
        None
    } else {
        Some(annotations)
    }
}

pub async fn compose(info: &InferenceServiceInfo, registry: &dyn ModelRegistry) -> Result<Option<InferenceService>> {
    let spec = &info.inference_service_spec;
    let predictor = match predictor_spec(&spec.predictor, registry).await? {
        Some(predictor) => predictor,
        None => {
            warn!(
                "No storage location could be determined for the model of '{}/{}'",
                info.namespace, info.name
            );
            return Ok(None);
        }
    };

    let mut isvc = new_inference_service(
        &info.name,
        &info.namespace,
        wire::InferenceServiceSpec {
            predictor,
            transformer: transformer_spec(spec.transformer.as_ref()),
        },
    );
    isvc.metadata.annotations = annotations(info.sidecar_inject, info.enable_prometheus_scraping);
    Ok(Some(isvc))
}
