//! Template execution.

use minijinja::{context, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::render::params::{select, RequiredServices};
use crate::source::{DesiredState, LocalInstance, ServiceEndpoints};

/// Errors produced while turning a template into configuration text.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template text does not parse.
    #[error("failed to parse template: {0}")]
    Template(#[source] Error),

    /// The template parsed but failed while executing.
    #[error("failed to render template: {0}")]
    Render(#[source] Error),
}

/// Output of one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedConfig {
    /// Full configuration text.
    pub text: String,

    /// Every service a selector was called with, with its unfiltered endpoints.
    pub required: RequiredServices,
}

/// Render `template` against the desired state.
///
/// Two functions are available to the template:
/// - `Endpoints(service)`: every endpoint of `service`
/// - `LocalEndpoints(service)`: endpoints in the local availability zone
///
/// Both return backends sorted by nickname and both record the full endpoint
/// set of `service` in [`RenderedConfig::required`], whatever they return.
pub fn render(
    template: &str,
    desired: &DesiredState,
    local: &LocalInstance,
) -> Result<RenderedConfig, RenderError> {
    let desired = Arc::new(desired.clone());
    let recorder = Arc::new(Mutex::new(RequiredServices::new()));

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    {
        let desired = desired.clone();
        let recorder = recorder.clone();
        env.add_function("Endpoints", move |service: Value| -> Result<Value, Error> {
            let service = service_name(&service)?;
            let endpoints = lookup(&desired, &recorder, service);
            Ok(Value::from_serialize(select(service, &endpoints, |_| true)))
        });
    }

    {
        let desired = desired.clone();
        let recorder = recorder.clone();
        let zone = local.availability_zone.clone();
        env.add_function("LocalEndpoints", move |service: Value| -> Result<Value, Error> {
            let service = service_name(&service)?;
            let endpoints = lookup(&desired, &recorder, service);
            Ok(Value::from_serialize(select(service, &endpoints, |e| {
                e.availability_zone == zone
            })))
        });
    }

    let tmpl = env.template_from_str(template).map_err(|e| {
        tracing::error!(error = %e, "Template parsing failed");
        RenderError::Template(e)
    })?;

    let text = tmpl
        .render(context! { availability_zone => local.availability_zone })
        .map_err(|e| {
            tracing::error!(error = %e, "Template execution failed");
            RenderError::Render(e)
        })?;

    let required = recorder
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    Ok(RenderedConfig { text, required })
}

fn service_name(value: &Value) -> Result<&str, Error> {
    value.as_str().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("service name must be a string, got {}", value.kind()),
        )
    })
}

/// Fetch the endpoints of `service` and record them as required.
fn lookup(
    desired: &DesiredState,
    recorder: &Mutex<RequiredServices>,
    service: &str,
) -> ServiceEndpoints {
    let endpoints = desired.get(service).cloned().unwrap_or_default();
    recorder
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(service, endpoints.clone());
    endpoints
}
