//! Calls a deployed model through the ingress gateway, speaking whichever protocol it advertises.
//!
//! v1 wraps input in `{"instances": ...}` and answers `{"predictions": ...}`; v2 sends typed tensor
//! descriptors under `inputs` and answers with `outputs[0].data`. Models without a protocol are v2.
use std::convert::TryFrom;

use log::{debug, error, info};
use serde::Serialize;
use serde_json::{json, Value};

use crate::crd::inference_service::DeployedServiceStatus;
use crate::errors::{Error, Result};
use crate::metrics;
use crate::platform::ServingPlatform;
use crate::schemas::ProtocolVersion;

pub const V2_DATATYPE: &str = "FP32";
/// Metric label for calls rejected before the service's protocol was known
pub const UNKNOWN_PROTOCOL: &str = "unknown";

/// One v2 input tensor
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TensorInput {
    pub name: String,
    pub shape: [usize; 2],
    pub datatype: &'static str,
    pub data: Value,
}

pub fn effective_protocol(protocol: Option<ProtocolVersion>) -> ProtocolVersion {
    protocol.unwrap_or(ProtocolVersion::V2)
}

/// Hostname the ingress routes on: the service URL without scheme or path.
pub fn service_host(url: &str) -> &str {
    let without_scheme = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    };
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

pub fn predict_path(protocol: ProtocolVersion, model_name: &str) -> String {
    match protocol {
        ProtocolVersion::V1 => format!("/v1/models/{}:predict", model_name),
        ProtocolVersion::V2 => format!("/v2/models/{}/infer", model_name),
    }
}

fn as_rows<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    match value.as_array() {
        Some(rows) if !rows.is_empty() => Ok(rows),
        Some(_) => Err(Error::InvalidInput(format!("{} is empty", what))),
        None => Err(Error::InvalidInput(format!("{} is not an array", what))),
    }
}

/// `[rows, columns]` of a 2-d array, taking the column count from the first row.
fn matrix_shape(rows: &[Value], what: &str) -> Result<[usize; 2]> {
    let columns = rows
        .first()
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or_else(|| Error::InvalidInput(format!("{} must be an array of arrays", what)))?;
    Ok([rows.len(), columns])
}

fn tensor(name: String, rows: &[Value], what: &str) -> Result<TensorInput> {
    Ok(TensorInput {
        name,
        shape: matrix_shape(rows, what)?,
        datatype: V2_DATATYPE,
        data: Value::Array(rows.to_vec()),
    })
}

/// Build the request body for `protocol`.
///
/// With `multi` the payload is already a list: of instances for v1, of separate 2-d inputs for v2,
/// each of which gets its own shape. A single v2 input must be rectangular.
pub fn request_envelope(protocol: ProtocolVersion, payload: &Value, multi: bool) -> Result<Value> {
    let rows = as_rows(payload, "input payload")?;
    match (protocol, multi) {
        (ProtocolVersion::V1, false) => Ok(json!({ "instances": [payload] })),
        (ProtocolVersion::V1, true) => Ok(json!({ "instances": payload })),
        (ProtocolVersion::V2, false) => {
            let input = tensor("input".to_owned(), rows, "input payload")?;
            let columns = input.shape[1];
            if rows.iter().any(|row| row.as_array().map(Vec::len) != Some(columns)) {
                return Err(Error::InvalidInput(
                    "rows of a single v2 input must all have the same length".to_owned(),
                ));
            }
            Ok(json!({ "inputs": [input] }))
        }
        (ProtocolVersion::V2, true) => {
            let inputs = rows
                .iter()
                .enumerate()
                .map(|(index, element)| {
                    let what = format!("input {}", index);
                    tensor(format!("input_{}", index), as_rows(element, &what)?, &what)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(json!({ "inputs": inputs }))
        }
    }
}

/// Pull the prediction out of a response body of either protocol.
pub fn extract_predictions(protocol: ProtocolVersion, body: &Value) -> Option<Value> {
    match protocol {
        ProtocolVersion::V1 => body.get("predictions").cloned(),
        ProtocolVersion::V2 => body.pointer("/outputs/0/data").cloned(),
    }
}

/// Client for model endpoints behind the ingress gateway
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    ingress_host: String,
}

impl InferenceClient {
    /// `http` should carry the outbound timeout; `ingress_host` is a base URL with scheme.
    pub fn new(http: reqwest::Client, ingress_host: &str) -> Self {
        InferenceClient {
            http,
            ingress_host: ingress_host.trim_end_matches('/').to_owned(),
        }
    }

    pub async fn infer(
        &self,
        platform: &dyn ServingPlatform,
        name: &str,
        namespace: &str,
        payload: &Value,
        multi: bool,
    ) -> Result<Value> {
        let (protocol, result) = self.locate_and_predict(platform, name, namespace, payload, multi).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        metrics::inference_happened(protocol.map_or(UNKNOWN_PROTOCOL, |protocol| protocol.as_str()), outcome);
        result
    }

    /// The protocol is `None` when the call failed before the service's protocol was known.
    async fn locate_and_predict(
        &self,
        platform: &dyn ServingPlatform,
        name: &str,
        namespace: &str,
        payload: &Value,
        multi: bool,
    ) -> (Option<ProtocolVersion>, Result<Value>) {
        if let Err(err) = as_rows(payload, "input payload") {
            return (None, Err(err));
        }
        let status = match platform.get(name, namespace).await {
            Ok(isvc) => DeployedServiceStatus::try_from(&isvc),
            Err(err) => Err(err),
        };
        let status = match status {
            Ok(status) => status,
            Err(err) => return (None, Err(err)),
        };
        let protocol = effective_protocol(status.protocol_version);
        (Some(protocol), self.predict(&status, protocol, payload, multi).await)
    }

    async fn predict(
        &self,
        status: &DeployedServiceStatus,
        protocol: ProtocolVersion,
        payload: &Value,
        multi: bool,
    ) -> Result<Value> {
        let url = status
            .url
            .as_deref()
            .ok_or_else(|| Error::ServiceNotReady(format!("{}/{}", status.namespace, status.name)))?;
        let host = service_host(url);
        let envelope = request_envelope(protocol, payload, multi)?;

        let endpoint = format!("{}{}", self.ingress_host, predict_path(protocol, &status.name));
        info!("Sending {} inference request for {} to {}", protocol.as_str(), host, endpoint);
        let response = self
            .http
            .post(&endpoint)
            .header(reqwest::header::HOST, host)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| {
                error!("Inference request to {} failed: {}", host, err);
                Error::InferenceTransport {
                    status: err.status().map(|status| status.as_u16()),
                    body: err.to_string(),
                }
            })?;

        let code = response.status();
        let body = response.text().await.map_err(|err| Error::InferenceTransport {
            status: Some(code.as_u16()),
            body: err.to_string(),
        })?;
        if !code.is_success() {
            error!("Model {} answered {}: {}", host, code, body);
            return Err(Error::InferenceTransport {
                status: Some(code.as_u16()),
                body,
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|_| Error::InferenceTransport {
            status: Some(code.as_u16()),
            body: body.clone(),
        })?;
        debug!("Model {} answered {}", host, code);
        extract_predictions(protocol, &parsed).ok_or(Error::InferenceTransport {
            status: Some(code.as_u16()),
            body,
        })
    }
}
