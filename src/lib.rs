pub mod builders;
pub mod config;
pub mod crd;
pub mod errors;
pub mod inference;
pub mod metrics;
pub mod paging;
pub mod platform;
pub mod registry;
pub mod schemas;
pub mod service;
pub mod synthesis;
pub mod views;

pub use crate::config::{Config, EnvironmentConfig};
pub use crate::crd::InferenceService;
pub use crate::errors::{Error, Result};
pub use crate::service::ServingContext;
