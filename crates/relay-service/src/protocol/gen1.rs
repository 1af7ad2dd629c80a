//! Gen1 HTTP settings dialect

use std::sync::Arc;

use async_trait::async_trait;
use relay_client::{DeviceTransport, HttpRequest, TransportError};
use relay_core::{RelayError, RelayResult};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    verify, DeviceProtocol, ListingSource, ReadTarget, SettingWrite, Source, SwitchCommand,
    WriteAction, WritePlan,
};
use crate::config::VerificationConfig;
use crate::outcome::{exhausted, StrategyAttempt, WriteOutcome, WritePhase};
use crate::strategy::{same_wire, ComponentRoute, Gen1Strategy};

/// Flat `GET /settings?key=value` devices
pub struct Gen1Protocol {
    transport: Arc<dyn DeviceTransport>,
    strategies: Vec<Gen1Strategy>,
    routes: Vec<ComponentRoute>,
    verification: VerificationConfig,
}

impl Gen1Protocol {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        strategies: Vec<Gen1Strategy>,
        routes: Vec<ComponentRoute>,
        verification: VerificationConfig,
    ) -> Self {
        Self {
            transport,
            strategies,
            routes,
            verification,
        }
    }

    fn unreachable(plan: &WritePlan, error: &TransportError) -> RelayError {
        RelayError::unreachable(&plan.device_id, error.to_string())
    }

    async fn write_setting(
        &self,
        host: &str,
        plan: &WritePlan,
        write: &SettingWrite,
    ) -> RelayResult<WriteOutcome> {
        let mut attempts: Vec<StrategyAttempt> = Vec::new();
        let mut sent: Vec<HttpRequest> = Vec::new();

        for strategy in &self.strategies {
            let Some(request) = strategy.request(write, &self.routes) else {
                continue;
            };
            if sent.iter().any(|r| same_wire(r, &request)) {
                continue;
            }
            debug!(
                phase = %WritePhase::Dispatching,
                parameter = %plan.parameter,
                strategy = %strategy,
                request = %request,
                "Trying Gen1 write"
            );

            let mut attempt = StrategyAttempt::new(strategy.as_str(), &request);
            let reply = self.transport.send(host, &request).await;
            sent.push(request);
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) if e.is_unreachable() => return Err(Self::unreachable(plan, &e)),
                Err(e) => {
                    attempt.error = Some(e.to_string());
                    attempts.push(attempt);
                    continue;
                }
            };

            attempt.status = Some(reply.status);
            if !reply.is_ok() {
                attempts.push(attempt);
                continue;
            }

            attempt.verification = verify(self, host, plan, &self.verification).await;
            let accepted = attempt.verification.is_accepted();
            attempts.push(attempt);
            if accepted {
                let mut outcome =
                    WriteOutcome::new(&plan.parameter, write.value.clone(), strategy.as_str());
                outcome.response = reply.body_json();
                outcome.attempts = attempts;
                return Ok(outcome);
            }
        }

        Err(RelayError::write_failed(&plan.parameter, exhausted(&attempts)))
    }

    async fn actuate(
        &self,
        host: &str,
        plan: &WritePlan,
        id: u32,
        command: SwitchCommand,
    ) -> RelayResult<WriteOutcome> {
        let request = HttpRequest::get(format!("/relay/{}", id)).with_query("turn", command.as_str());
        debug!(phase = %WritePhase::Dispatching, request = %request, "Switching relay");

        let mut attempt = StrategyAttempt::new("relay_turn", &request);
        let reply = match self.transport.send(host, &request).await {
            Ok(reply) => reply,
            Err(e) if e.is_unreachable() => return Err(Self::unreachable(plan, &e)),
            Err(e) => return Err(RelayError::write_failed(&plan.parameter, e.to_string())),
        };
        attempt.status = Some(reply.status);
        if reply.is_ok() {
            attempt.verification = verify(self, host, plan, &self.verification).await;
        }
        let accepted = reply.is_ok() && attempt.verification.is_accepted();
        let attempts = vec![attempt];
        if !accepted {
            return Err(RelayError::write_failed(&plan.parameter, exhausted(&attempts)));
        }

        let mut outcome = WriteOutcome::new(&plan.parameter, plan.expected.clone(), "relay_turn");
        outcome.response = reply.body_json();
        outcome.attempts = attempts;
        Ok(outcome)
    }
}

#[async_trait]
impl DeviceProtocol for Gen1Protocol {
    fn name(&self) -> &'static str {
        "gen1"
    }

    fn default_sources(&self, _component: Option<&str>) -> Vec<Source> {
        vec![Source::new("settings"), Source::new("status")]
    }

    fn listing_sources(&self) -> Vec<ListingSource> {
        [("settings", false), ("status", true), ("shelly", true)]
            .into_iter()
            .map(|(api, status)| ListingSource {
                source: Source::new(api),
                status,
                namespaced: false,
            })
            .collect()
    }

    fn switch_target(&self, id: u32) -> ReadTarget {
        ReadTarget::explicit(Source::new(format!("relay/{}", id)), "ison")
    }

    async fn fetch(&self, host: &str, source: &Source) -> Result<Option<Value>, TransportError> {
        let request = HttpRequest::get(format!("/{}", source.api.trim_start_matches('/')));
        match self.transport.send(host, &request).await {
            Ok(reply) if reply.is_ok() => Ok(reply.body_json()),
            Ok(reply) => {
                debug!(host, request = %request, status = reply.status, "Gen1 read refused");
                Ok(None)
            }
            Err(e) if e.is_unreachable() => Err(e),
            Err(e) => {
                debug!(host, request = %request, error = %e, "Gen1 read failed");
                Ok(None)
            }
        }
    }

    async fn write(&self, host: &str, plan: &WritePlan) -> RelayResult<WriteOutcome> {
        match &plan.action {
            WriteAction::Setting(write) => self.write_setting(host, plan, write).await,
            WriteAction::Switch { id, command } => self.actuate(host, plan, *id, *command).await,
        }
    }

    async fn reboot(&self, host: &str) -> Result<(), TransportError> {
        let reply = self.transport.send(host, &HttpRequest::get("/reboot")).await?;
        if !reply.is_ok() {
            return Err(TransportError::Http {
                status: reply.status,
                message: reply.body,
            });
        }
        info!(host, "Gen1 reboot requested");
        Ok(())
    }
}
