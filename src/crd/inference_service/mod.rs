pub mod inference_service;
pub mod status;

pub use inference_service::*;
pub use status::{DeployedServiceStatus, Readiness};

use kube::core::{ApiResource, GroupVersionKind};

pub const GROUP: &str = "serving.kserve.io";
pub const VERSION: &str = "v1beta1";
pub const KIND: &str = "InferenceService";
pub const PLURAL: &str = "inferenceservices";

/// The `ApiResource` used to address InferenceServices through a dynamic `Api`
pub fn inference_service_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(GROUP, VERSION, KIND), PLURAL)
}

/// A fresh, namespaced InferenceService carrying `apiVersion`/`kind`
pub fn new_inference_service(name: &str, namespace: &str, spec: InferenceServiceSpec) -> InferenceService {
    InferenceService::new(name, &inference_service_resource(), spec).within(namespace)
}
