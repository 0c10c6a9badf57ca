use prometheus::{IntCounterVec, Opts, Registry};

use lazy_static::lazy_static;

use crate::errors::Error;

pub const METRICS_NAMESPACE: &str = "kserve_controller";

lazy_static! {
    pub static ref PLATFORM_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("platform_errors", "kserve-controller serving platform errors").namespace(METRICS_NAMESPACE),
        &["action", "kind"]
    )
    .expect("platform_errors metric definition");
    pub static ref SYNTHESIS_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "synthesis_rejections",
            "kserve-controller requests rejected for a missing model location"
        )
        .namespace(METRICS_NAMESPACE),
        &["namespace"]
    )
    .expect("synthesis_rejections metric definition");
    pub static ref INFERENCE_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("inference_requests", "kserve-controller proxied inference requests").namespace(METRICS_NAMESPACE),
        &["protocol", "outcome"]
    )
    .expect("inference_requests metric definition");
}

pub fn custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(PLATFORM_ERRORS.clone()))?;
    registry.register(Box::new(SYNTHESIS_REJECTIONS.clone()))?;
    registry.register(Box::new(INFERENCE_REQUESTS.clone()))?;
    Ok(())
}

pub fn platform_error_happened(action: &str, err: &Error) {
    PLATFORM_ERRORS.with_label_values(&[action, err.kind()]).inc();
}

pub fn synthesis_rejected(namespace: &str) {
    SYNTHESIS_REJECTIONS.with_label_values(&[namespace]).inc();
}

pub fn inference_happened(protocol: &str, outcome: &str) {
    INFERENCE_REQUESTS.with_label_values(&[protocol, outcome]).inc();
}
