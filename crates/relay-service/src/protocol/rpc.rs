//! JSON-RPC dialect (Gen2 and later)

use std::sync::Arc;

use async_trait::async_trait;
use relay_client::{rpc, DeviceTransport, TransportError};
use relay_core::{path, RelayError, RelayResult};
use relay_discovery::component_id;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{
    verify, DeviceProtocol, ListingSource, ReadTarget, Source, SwitchCommand, WriteAction,
    WritePlan,
};
use crate::config::VerificationConfig;
use crate::outcome::{StrategyAttempt, Verification, WriteOutcome, WritePhase};

/// RPC devices; configuration goes through `Shelly.SetConfig`
pub struct RpcProtocol {
    transport: Arc<dyn DeviceTransport>,
    verification: VerificationConfig,
}

/// Getter for a recorded API and whether its result is keyed by component
///
/// `Sys.SetConfig` reads back through `Sys.GetConfig`; `Shelly.*` methods
/// answer for every component at once.
fn read_method(api: &str) -> (String, bool) {
    let method = match api.strip_suffix(".SetConfig") {
        Some(namespace) => format!("{}.GetConfig", namespace),
        None => api.to_string(),
    };
    let namespaced = method.starts_with("Shelly.");
    (method, namespaced)
}

impl RpcProtocol {
    pub fn new(transport: Arc<dyn DeviceTransport>, verification: VerificationConfig) -> Self {
        Self {
            transport,
            verification,
        }
    }

    fn request_for(plan: &WritePlan) -> (&'static str, Value) {
        match &plan.action {
            WriteAction::Switch {
                id,
                command: SwitchCommand::Toggle,
            } => ("Switch.Toggle", json!({ "id": id })),
            WriteAction::Switch { id, command } => (
                "Switch.Set",
                json!({ "id": id, "on": *command == SwitchCommand::On }),
            ),
            WriteAction::Setting(write) => (
                "Shelly.SetConfig",
                json!({ "config": path::nest(&write.config_path, write.value.clone()) }),
            ),
        }
    }
}

#[async_trait]
impl DeviceProtocol for RpcProtocol {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn default_sources(&self, component: Option<&str>) -> Vec<Source> {
        let component = component.map(str::to_string);
        vec![
            Source::new("Shelly.GetConfig").with_component(component.clone()),
            Source::new("Shelly.GetStatus").with_component(component),
        ]
    }

    fn listing_sources(&self) -> Vec<ListingSource> {
        vec![
            ListingSource {
                source: Source::new("Shelly.GetConfig"),
                status: false,
                namespaced: true,
            },
            ListingSource {
                source: Source::new("Shelly.GetStatus"),
                status: true,
                namespaced: true,
            },
        ]
    }

    fn switch_target(&self, id: u32) -> ReadTarget {
        ReadTarget::explicit(
            Source::new("Switch.GetStatus").with_component(Some(format!("switch:{}", id))),
            "output",
        )
    }

    async fn fetch(&self, host: &str, source: &Source) -> Result<Option<Value>, TransportError> {
        let (method, namespaced) = read_method(&source.api);
        let component = source.component.as_deref();
        let params = match component.and_then(component_id) {
            Some(id) if !namespaced => json!({ "id": id }),
            _ => json!({}),
        };

        match rpc::call(self.transport.as_ref(), host, &method, params).await {
            Ok(result) if namespaced => Ok(match component {
                Some(c) => result.get(c).cloned(),
                None => Some(result),
            }),
            Ok(result) => Ok(Some(result)),
            Err(e) if e.is_unreachable() => Err(e),
            Err(e) => {
                debug!(host, method = %method, error = %e, "RPC read failed");
                Ok(None)
            }
        }
    }

    async fn write(&self, host: &str, plan: &WritePlan) -> RelayResult<WriteOutcome> {
        let (method, params) = Self::request_for(plan);
        debug!(
            phase = %WritePhase::Dispatching,
            parameter = %plan.parameter,
            method,
            params = %params,
            "Sending RPC write"
        );

        let mut attempt = StrategyAttempt::new(method, format!("{} {}", method, params));
        let result = match rpc::call(self.transport.as_ref(), host, method, params).await {
            Ok(result) => result,
            Err(e) if e.is_unreachable() => {
                return Err(RelayError::unreachable(&plan.device_id, e.to_string()))
            }
            Err(e) => return Err(RelayError::write_failed(&plan.parameter, e.to_string())),
        };
        attempt.status = Some(200);
        attempt.verification = verify(self, host, plan, &self.verification).await;

        let mut outcome = WriteOutcome::new(&plan.parameter, plan.expected.clone(), method);
        if let Verification::Mismatch { observed } = &attempt.verification {
            warn!(
                parameter = %plan.parameter,
                expected = %plan.expected,
                observed = %observed,
                "Device accepted write but reads back a different value"
            );
            outcome.warnings.push(RelayError::VerificationMismatch {
                parameter: plan.parameter.clone(),
                expected: plan.expected.clone(),
                observed: observed.clone(),
            });
        }
        outcome.restart_required = result
            .get("restart_required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        outcome.response = Some(result);
        outcome.attempts.push(attempt);
        Ok(outcome)
    }

    async fn reboot(&self, host: &str) -> Result<(), TransportError> {
        rpc::call(self.transport.as_ref(), host, "Shelly.Reboot", json!({})).await?;
        info!(host, "RPC reboot requested");
        Ok(())
    }
}
