use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::LlmProvider;

/// Holds instantiated providers and the role -> "provider_id/model" mapping
/// a preset assigns (spec.md §6, "every node names a role, not a raw
/// provider id").
///
/// Unlike a gateway-style registry, this one never constructs adapters
/// itself — callers build `Arc<dyn LlmProvider>` instances (talking to
/// whatever backend they like) and [`Self::register`] them. That keeps
/// this crate free of any concrete HTTP client dependency.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    roles: HashMap<String, String>,
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that a preset named but that failed to resolve,
/// surfaced for readiness checks rather than aborting the whole registry.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        let id = provider.provider_id().to_string();
        tracing::info!(provider_id = %id, "registered LLM provider");
        self.providers.insert(id, provider);
    }

    pub fn record_init_error(&mut self, provider_id: impl Into<String>, error: impl Into<String>) {
        let provider_id = provider_id.into();
        let error = error.into();
        tracing::warn!(provider_id = %provider_id, %error, "provider failed to initialize, skipping");
        self.init_errors.push(ProviderInitError { provider_id, error });
    }

    /// Assigns a role (e.g. "planner", "critic") to a `provider_id/model`
    /// spec, the form preset configs use to name the model for a node.
    pub fn assign_role(&mut self, role: impl Into<String>, model_spec: impl Into<String>) {
        self.roles.insert(role.into(), model_spec.into());
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Resolves the provider assigned to `role`. The role's model spec is
    /// `provider_id/model_name`; everything after the first `/` is the
    /// model name passed through in [`Self::model_for_role`].
    pub fn for_role(&self, role: &str) -> Option<Arc<dyn LlmProvider>> {
        let model_spec = self.roles.get(role)?;
        let provider_id = model_spec.split('/').next().unwrap_or(model_spec);
        self.providers.get(provider_id).cloned()
    }

    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        self.roles.get(role).and_then(|spec| spec.split('/').nth(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn list_roles(&self) -> HashMap<String, String> {
        self.roles.clone()
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}
