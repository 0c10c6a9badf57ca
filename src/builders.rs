//! Leaf converters from request records to the platform's wire records.
//!
//! Every converter answers `None` when there is nothing worth sending. Parents use that to leave
//! the whole field out, since the platform defaults an absent field but keeps a present-but-empty one.
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::crd::inference_service as wire;
use crate::schemas;

pub const CPU_KEY: &str = "cpu";
pub const MEMORY_KEY: &str = "memory";
pub const GPU_KEY: &str = "nvidia.com/gpu";

const MILLICORE_SUFFIX: &str = "m";
const GIBIBYTE_SUFFIX: &str = "Gi";

/// Keep only well-formed quantities: millicore cpu, gibibyte memory and a positive GPU count.
pub fn resource_map(resource: Option<&schemas::Resource>) -> Option<BTreeMap<String, Quantity>> {
    let resource = resource?;
    let mut map = BTreeMap::new();

    if let Some(cpu) = resource.cpu.as_deref().map(str::trim) {
        if cpu.ends_with(MILLICORE_SUFFIX) {
            map.insert(CPU_KEY.to_owned(), Quantity(cpu.to_owned()));
        }
    }
    if let Some(memory) = resource.memory.as_deref().map(str::trim) {
        if memory.ends_with(GIBIBYTE_SUFFIX) {
            map.insert(MEMORY_KEY.to_owned(), Quantity(memory.to_owned()));
        }
    }
    if let Some(gpu) = resource.accelerator_count.filter(|count| *count > 0) {
        map.insert(GPU_KEY.to_owned(), Quantity(gpu.to_string()));
    }

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

pub fn resource_requirements(requirements: Option<&schemas::ResourceRequirements>) -> Option<ResourceRequirements> {
    let requirements = requirements?;
    let limits = resource_map(requirements.limits.as_ref());
    let requests = resource_map(requirements.requests.as_ref());
    if limits.is_none() && requests.is_none() {
        return None;
    }
    Some(ResourceRequirements { limits, requests })
}

pub fn container_port(port: &schemas::Port) -> Option<wire::ContainerPort> {
    if *port == schemas::Port::default() {
        return None;
    }
    Some(wire::ContainerPort {
        name: port.name.clone(),
        protocol: port.protocol.clone(),
        container_port: port.container_port,
        host_ip: port.host_ip.clone(),
        host_port: port.host_port,
    })
}

pub fn container_ports(ports: Option<&[schemas::Port]>) -> Option<Vec<wire::ContainerPort>> {
    non_empty(ports?.iter().filter_map(container_port).collect())
}

/// A container with every field absent contributes nothing.
pub fn container(container: &schemas::Container) -> Option<wire::Container> {
    if *container == schemas::Container::default() {
        return None;
    }
    Some(wire::Container {
        name: container.name.clone(),
        image: container.image.clone(),
        image_pull_policy: container.image_pull_policy.clone(),
        command: container.command.clone(),
        args: container.args.clone(),
        ports: container_ports(container.ports.as_deref()),
        resources: resource_requirements(container.resources.as_ref()),
    })
}

pub fn containers(containers: Option<&[schemas::Container]>) -> Option<Vec<wire::Container>> {
    non_empty(containers?.iter().filter_map(container).collect())
}

pub fn env_var(env: &schemas::Env) -> EnvVar {
    EnvVar {
        name: env.name.clone(),
        value: Some(env.value.clone()),
        value_from: None,
    }
}

pub fn env_vars(envs: Option<&[schemas::Env]>) -> Option<Vec<EnvVar>> {
    non_empty(envs?.iter().map(env_var).collect())
}

pub fn toleration(toleration: &schemas::Toleration) -> Toleration {
    Toleration {
        key: Some(toleration.key.clone()),
        operator: Some(toleration.operator.clone()),
        value: Some(toleration.value.clone()),
        effect: Some(toleration.effect.clone()),
        toleration_seconds: toleration.toleration_seconds,
    }
}

pub fn tolerations(tolerations: Option<&[schemas::Toleration]>) -> Option<Vec<Toleration>> {
    non_empty(tolerations?.iter().map(toleration).collect())
}

pub fn batcher(batcher: Option<&schemas::Batcher>) -> Option<wire::Batcher> {
    batcher.map(|batcher| wire::Batcher {
        max_batch_size: batcher.max_batch_size,
        max_latency: batcher.max_latency,
    })
}

pub fn logger(logger: Option<&schemas::Logger>) -> Option<wire::LoggerSpec> {
    logger.map(|logger| wire::LoggerSpec {
        mode: logger.mode.clone(),
        url: logger.url.clone(),
    })
}

pub fn model_format(format: &schemas::ModelFormat) -> wire::ModelFormat {
    wire::ModelFormat {
        name: format.name.clone(),
        version: format.version.clone(),
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
