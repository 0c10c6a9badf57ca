use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crd::inference_service::{Condition, InferenceService, ModelFormat};
use crate::errors::Error;
use crate::schemas::ProtocolVersion;

pub const READY_CONDITION: &str = "Ready";

/// Tri-state readiness as reported by the platform's `Ready` condition
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    True,
    False,
    Unknown,
}

impl Readiness {
    fn from_conditions(conditions: &[Condition]) -> Self {
        match conditions.iter().find(|condition| condition.type_ == READY_CONDITION) {
            Some(condition) if condition.status == "True" => Readiness::True,
            Some(condition) if condition.status == "False" => Readiness::False,
            _ => Readiness::Unknown,
        }
    }
}

/// Read-only view of a deployed InferenceService, reshaped from what the platform reports
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeployedServiceStatus {
    pub name: String,
    pub namespace: String,
    pub ready: Readiness,
    pub url: Option<String>,
    pub protocol_version: Option<ProtocolVersion>,
    pub model_format: Option<ModelFormat>,
    pub storage_uri: Option<String>,
    pub creation_timestamp: Option<String>,
    pub conditions: Vec<Condition>,
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

impl TryFrom<&InferenceService> for DeployedServiceStatus {
    type Error = Error;

    fn try_from(isvc: &InferenceService) -> Result<Self, Self::Error> {
        let name = isvc.metadata.name.clone().ok_or(Error::MissingKey(".metadata.name"))?;
        let namespace = isvc
            .metadata
            .namespace
            .clone()
            .ok_or(Error::MissingKey(".metadata.namespace"))?;
        let status = isvc.status.clone().unwrap_or_default();
        let model = isvc.spec.predictor.model.clone().unwrap_or_default();

        Ok(DeployedServiceStatus {
            name,
            namespace,
            ready: Readiness::from_conditions(&status.conditions),
            url: status.url.filter(|url| !url.is_empty()),
            protocol_version: model.protocol_version,
            model_format: model.model_format,
            storage_uri: model.storage_uri,
            creation_timestamp: isvc.metadata.creation_timestamp.as_ref().map(|time| format_timestamp(&time.0)),
            conditions: status.conditions,
        })
    }
}
