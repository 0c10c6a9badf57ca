use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Error, Result};

fn default_server_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_server_port() -> u16 {
    8000
}

fn default_ingress_host() -> String {
    "http://istio-ingressgateway.istio-system".to_owned()
}

fn default_mlflow_tracking_uri() -> String {
    "http://mlflow-server.kubeflow".to_owned()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Raw values as read from the environment by `envy`
#[derive(Deserialize, Debug, Clone)]
pub struct EnvironmentConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_ingress_host")]
    pub ingress_host: String,
    #[serde(default = "default_mlflow_tracking_uri")]
    pub mlflow_tracking_uri: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            server_host: default_server_host(),
            server_port: default_server_port(),
            ingress_host: default_ingress_host(),
            mlflow_tracking_uri: default_mlflow_tracking_uri(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Base URL of the mesh ingress gateway, always with a scheme and without a trailing slash
    pub ingress_host: String,
    pub mlflow_tracking_uri: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env_config(env_config: EnvironmentConfig) -> Result<Self> {
        if env_config.request_timeout_seconds == 0 {
            return Err(Error::Config("REQUEST_TIMEOUT_SECONDS must be greater than zero".to_owned()));
        }
        let ingress_host = normalize_base_url("INGRESS_HOST", &env_config.ingress_host)?;
        let mlflow_tracking_uri = normalize_base_url("MLFLOW_TRACKING_URI", &env_config.mlflow_tracking_uri)?;

        Ok(Config {
            server_host: env_config.server_host,
            server_port: env_config.server_port,
            ingress_host,
            mlflow_tracking_uri,
            request_timeout: Duration::from_secs(env_config.request_timeout_seconds),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

// Hosts without a scheme are taken as plain http
fn normalize_base_url(key: &str, value: &str) -> Result<String> {
    let value = value.trim().trim_end_matches('/');
    if value.is_empty() {
        return Err(Error::Config(format!("{} is empty", key)));
    }
    match value.split_once("://") {
        Some(("http", rest)) | Some(("https", rest)) if !rest.is_empty() => Ok(value.to_owned()),
        Some((scheme, _)) => Err(Error::Config(format!("{} has unsupported scheme '{}'", key, scheme))),
        None => Ok(format!("http://{}", value)),
    }
}
