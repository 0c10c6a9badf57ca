//! The declarative request document callers submit to create, patch or replace an inference service.
//!
//! Every nested record is sparse: absent fields stay `None` and the builders decide what reaches the platform.
use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "kubeflow-user-example-com";
pub const DEFAULT_SERVICE_ACCOUNT: &str = "kserve-sa";
pub const MLFLOW_FORMAT: &str = "mlflow";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_service_account() -> String {
    DEFAULT_SERVICE_ACCOUNT.to_owned()
}

fn default_model_format_name() -> String {
    MLFLOW_FORMAT.to_owned()
}

/// Serving protocol a model speaks. A missing value means the runtime default.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "v1",
            ProtocolVersion::V2 => "v2",
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct Env {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct Batcher {
    pub max_batch_size: i32,
    pub max_latency: i32,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct Toleration {
    pub key: String,
    pub operator: String,
    pub value: String,
    pub effect: String,
    #[serde(default)]
    pub toleration_seconds: Option<i64>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct Logger {
    pub mode: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct ModelFormat {
    #[serde(default = "default_model_format_name")]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for ModelFormat {
    fn default() -> Self {
        ModelFormat {
            name: default_model_format_name(),
            version: None,
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Port {
    pub name: Option<String>,
    pub protocol: Option<String>,
    pub container_port: Option<i32>,
    pub host_ip: Option<String>,
    pub host_port: Option<i32>,
}

/// cpu in millicores (`500m`), memory in gibibytes (`2Gi`), and a GPU count
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Resource {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    #[serde(rename = "gpu", alias = "accelerator_count")]
    pub accelerator_count: Option<i64>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ResourceRequirements {
    pub limits: Option<Resource>,
    pub requests: Option<Resource>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Container {
    pub image: Option<String>,
    pub image_pull_policy: Option<String>,
    pub name: Option<String>,
    pub command: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub ports: Option<Vec<Port>>,
    pub resources: Option<ResourceRequirements>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
pub struct ModelSpec {
    /// Registered model name, resolved through the model registry for mlflow/v2 models
    #[serde(default)]
    pub model_name: Option<String>,
    /// Comma separated registry stages, e.g. `Production,Staging`
    #[serde(default)]
    pub model_stage: Option<String>,
    #[serde(default)]
    pub storage_uri: Option<String>,
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub model_format: ModelFormat,
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub runtime_version: Option<String>,
    #[serde(default)]
    pub ports: Option<Vec<Port>>,
    #[serde(default)]
    pub envs: Option<Vec<Env>>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct PredictorSpec {
    pub model_spec: ModelSpec,
    #[serde(default = "default_service_account")]
    pub service_account_name: String,
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub min_replicas: Option<i32>,
    #[serde(default)]
    pub max_replicas: Option<i32>,
    #[serde(default)]
    pub scale_target: Option<i32>,
    #[serde(default)]
    pub scale_metric: Option<String>,
    #[serde(default)]
    pub canary_traffic_percent: Option<i64>,
    #[serde(default)]
    pub batcher: Option<Batcher>,
    #[serde(default)]
    pub logger: Option<Logger>,
    #[serde(default)]
    pub tolerations: Option<Vec<Toleration>>,
}

impl PredictorSpec {
    pub fn for_model(model_spec: ModelSpec) -> Self {
        PredictorSpec {
            model_spec,
            service_account_name: default_service_account(),
            node_selector: None,
            timeout: None,
            min_replicas: None,
            max_replicas: None,
            scale_target: None,
            scale_metric: None,
            canary_traffic_percent: None,
            batcher: None,
            logger: None,
            tolerations: None,
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct TransformerSpec {
    pub containers: Vec<Container>,
    #[serde(default = "default_service_account")]
    pub service_account_name: String,
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub min_replicas: Option<i32>,
    #[serde(default)]
    pub max_replicas: Option<i32>,
    #[serde(default)]
    pub scale_target: Option<i32>,
    #[serde(default)]
    pub scale_metric: Option<String>,
    #[serde(default)]
    pub canary_traffic_percent: Option<i64>,
    #[serde(default)]
    pub batcher: Option<Batcher>,
    #[serde(default)]
    pub tolerations: Option<Vec<Toleration>>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct InferenceServiceSpec {
    pub predictor: PredictorSpec,
    #[serde(default)]
    pub transformer: Option<TransformerSpec>,
}

#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct InferenceServiceInfo {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub inference_service_spec: InferenceServiceSpec,
    #[serde(default)]
    pub sidecar_inject: bool,
    #[serde(default)]
    pub enable_prometheus_scraping: bool,
}

impl InferenceServiceInfo {
    /// Deployment request for an artifact uploaded to `bucket`.
    ///
    /// A `.zip` archive is unpacked at the bucket root, so the model lives under the archive's stem;
    /// any other file is stored under `<service_name>/`.
    ///
    /// Library entry point for upload tooling; the HTTP surface takes the full document instead.
    /// The result is submitted like any other request, e.g. through `ServingContext::create`.
    pub fn for_uploaded_artifact(service_name: &str, bucket: &str, model_format: &str, artifact: &str) -> Self {
        let model_path = match artifact.strip_suffix(".zip") {
            Some(stem) => stem,
            None => service_name,
        };
        let model_spec = ModelSpec {
            storage_uri: Some(format!("s3://{}/{}", bucket, model_path)),
            protocol_version: Some(ProtocolVersion::V2),
            model_format: ModelFormat {
                name: model_format.to_owned(),
                version: None,
            },
            ..ModelSpec::default()
        };
        InferenceServiceInfo {
            name: service_name.to_owned(),
            namespace: default_namespace(),
            inference_service_spec: InferenceServiceSpec {
                predictor: PredictorSpec::for_model(model_spec),
                transformer: None,
            },
            sidecar_inject: false,
            enable_prometheus_scraping: false,
        }
    }
}
