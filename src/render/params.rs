//! Values surfaced to templates and the services a render required.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::source::{EndpointInfo, ServiceConfiguration, ServiceEndpoints};

/// Nickname of one endpoint inside its backend section.
///
/// This is the join key between desired state and the stats socket.
pub fn nickname(service: &str, host_port: &str) -> String {
    format!("{service}-{host_port}")
}

/// One endpoint as seen by a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendParameters {
    pub nickname: String,
    pub host: String,
    pub host_port: String,
    pub revision: String,
    pub service_configuration: ServiceConfiguration,
}

impl BackendParameters {
    pub fn new(service: &str, host_port: &str, endpoint: &EndpointInfo) -> Self {
        let host = host_port.split(':').next().unwrap_or(host_port);
        Self {
            nickname: nickname(service, host_port),
            host: host.to_string(),
            host_port: host_port.to_string(),
            revision: endpoint.revision.clone(),
            service_configuration: endpoint.service_configuration.clone(),
        }
    }
}

/// Build parameters for the endpoints accepted by `filter`, sorted by nickname.
pub fn select<F>(service: &str, endpoints: &ServiceEndpoints, filter: F) -> Vec<BackendParameters>
where
    F: Fn(&EndpointInfo) -> bool,
{
    let mut backends: Vec<BackendParameters> = endpoints
        .iter()
        .filter(|(_, endpoint)| filter(endpoint))
        .map(|(host_port, endpoint)| BackendParameters::new(service, host_port, endpoint))
        .collect();
    backends.sort_by(|a, b| a.nickname.cmp(&b.nickname));
    backends
}

/// Services a template asked for, with their full desired endpoint sets.
///
/// A service the template referenced but that has no endpoints is present with
/// an empty set, which is different from a service never referenced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequiredServices {
    services: BTreeMap<String, ServiceEndpoints>,
}

impl RequiredServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the unfiltered endpoint set of `service`, replacing any earlier one.
    pub fn record(&mut self, service: &str, endpoints: ServiceEndpoints) {
        self.services.insert(service.to_string(), endpoints);
    }

    pub fn get(&self, service: &str) -> Option<&ServiceEndpoints> {
        self.services.get(service)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ServiceEndpoints)> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl FromIterator<(String, ServiceEndpoints)> for RequiredServices {
    fn from_iter<I: IntoIterator<Item = (String, ServiceEndpoints)>>(iter: I) -> Self {
        Self {
            services: iter.into_iter().collect(),
        }
    }
}
