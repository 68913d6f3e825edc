//! Desired-state types delivered by the configuration distribution side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-endpoint service configuration, handed to templates untouched.
pub type ServiceConfiguration = serde_json::Map<String, serde_json::Value>;

/// One live endpoint of a service.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointInfo {
    /// Revision of the service deployed on this endpoint.
    pub revision: String,

    /// Availability zone the endpoint runs in.
    pub availability_zone: String,

    pub service_configuration: ServiceConfiguration,
}

/// `host:port` -> endpoint.
pub type ServiceEndpoints = BTreeMap<String, EndpointInfo>;

/// Service name -> endpoints.
pub type DesiredState = BTreeMap<String, ServiceEndpoints>;

/// HAProxy payload: the template plus files to materialize next to it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfiguration {
    pub template: String,

    /// File name -> contents, written into `certs.d/`.
    pub certs: BTreeMap<String, String>,

    /// File name -> contents, written into the config directory.
    pub files: BTreeMap<String, String>,
}

/// Snapshot consumed by one convergence.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfiguration {
    /// Absent until the distribution side has published a template.
    pub haproxy: Option<ProxyConfiguration>,

    pub service_backends: DesiredState,
}

/// Facts about the machine running the converger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalInstance {
    pub availability_zone: String,
}

impl LocalInstance {
    pub fn new(availability_zone: impl Into<String>) -> Self {
        Self {
            availability_zone: availability_zone.into(),
        }
    }
}
