//! The agent context: everything a job run depends on, built once and
//! passed explicitly.

use std::sync::Arc;

use crate::config::DeliverySettings;
use crate::delivery::TelemetryClient;
use crate::secrets::SecretMasker;

/// Shared services of one agent process.
///
/// Cloning is cheap; the masker and the client are shared.
#[derive(Clone)]
pub struct AgentContext {
    secrets: Arc<SecretMasker>,
    client: Arc<dyn TelemetryClient>,
    delivery: DeliverySettings,
}

impl AgentContext {
    pub fn new(secrets: Arc<SecretMasker>, client: Arc<dyn TelemetryClient>) -> Self {
        Self {
            secrets,
            client,
            delivery: DeliverySettings::default(),
        }
    }

    pub fn with_delivery_settings(mut self, delivery: DeliverySettings) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn secrets(&self) -> &Arc<SecretMasker> {
        &self.secrets
    }

    pub fn client(&self) -> &Arc<dyn TelemetryClient> {
        &self.client
    }

    pub fn delivery_settings(&self) -> &DeliverySettings {
        &self.delivery
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("secrets", &self.secrets.matcher_count())
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}
