//! Pluggable policy chain run after signature and balance checks.
//!
//! Modifiers run one at a time in ascending priority order. Each sees the
//! metadata produced by the modifiers before it. The first denial stops the
//! chain; a modifier that errors or panics counts as a denial.

use crate::error::Result;
use crate::payment::types::{Metadata, PaymentAuthorization, PaymentRequirements};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State threaded through the chain for one payment.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    /// Payer address, if the authorization named one.
    pub payer: Option<String>,
    /// The authorization under verification.
    pub authorization: PaymentAuthorization,
    /// Merchant terms.
    pub requirements: PaymentRequirements,
    /// Accumulated metadata. Keys are only ever added or overwritten.
    pub metadata: Metadata,
}

impl VerificationContext {
    /// Fresh context with empty metadata.
    #[must_use]
    pub fn new(
        payer: Option<String>,
        authorization: PaymentAuthorization,
        requirements: PaymentRequirements,
    ) -> Self {
        Self {
            payer,
            authorization,
            requirements,
            metadata: Metadata::new(),
        }
    }

    /// Merge `metadata` into the context. Later keys win.
    pub fn merge(&mut self, metadata: Metadata) {
        for (key, value) in metadata {
            self.metadata.insert(key, value);
        }
    }
}

/// A modifier's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierVerdict {
    /// Whether the payment may proceed.
    pub allowed: bool,
    /// Why it was denied (or a note on why it was allowed).
    pub reason: Option<String>,
    /// Metadata to merge into the context.
    pub metadata: Metadata,
}

impl ModifierVerdict {
    /// Allow with no metadata.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            metadata: Metadata::new(),
        }
    }

    /// Deny with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A policy unit in the verification chain.
#[async_trait]
pub trait Modifier: Send + Sync {
    /// Lower runs first.
    fn priority(&self) -> i32;

    /// Name used in logs and fault reasons.
    fn name(&self) -> &str;

    /// Decide on the payment described by `context`.
    async fn execute(&self, context: &VerificationContext) -> Result<ModifierVerdict>;
}

/// Ordered list of modifiers.
#[derive(Clone, Default)]
pub struct ModifierChain {
    modifiers: Vec<Arc<dyn Modifier>>,
}

impl ModifierChain {
    /// Build a chain, sorting by ascending priority. Equal priorities keep
    /// their registration order.
    #[must_use]
    pub fn new(mut modifiers: Vec<Arc<dyn Modifier>>) -> Self {
        modifiers.sort_by_key(|m| m.priority());
        Self { modifiers }
    }

    /// Add a modifier, keeping the chain sorted.
    pub fn register(&mut self, modifier: Arc<dyn Modifier>) {
        let priority = modifier.priority();
        let index = self
            .modifiers
            .partition_point(|m| m.priority() <= priority);
        self.modifiers.insert(index, modifier);
    }

    /// Modifier names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.modifiers.iter().map(|m| m.name().to_string()).collect()
    }

    /// Number of registered modifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    /// Whether no modifiers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Run every modifier in order against `context`.
    ///
    /// Metadata from allowing verdicts is merged into the context before the
    /// next modifier runs. The first denial is returned as-is, with its own
    /// metadata left for the caller to merge.
    pub async fn execute(&self, context: &mut VerificationContext) -> ModifierVerdict {
        for modifier in &self.modifiers {
            let name = modifier.name().to_string();
            debug!("Running modifier '{}' (priority {})", name, modifier.priority());

            let outcome = AssertUnwindSafe(modifier.execute(context))
                .catch_unwind()
                .await;

            let verdict = match outcome {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(e)) => {
                    warn!("Modifier '{}' failed: {}", name, e);
                    ModifierVerdict::deny(format!("Modifier '{name}' failed: {e}"))
                }
                Err(_) => {
                    warn!("Modifier '{}' panicked", name);
                    ModifierVerdict::deny(format!("Modifier '{name}' failed unexpectedly"))
                }
            };

            if !verdict.allowed {
                info!(
                    "Modifier '{}' denied payment: {}",
                    name,
                    verdict.reason.as_deref().unwrap_or("no reason given")
                );
                return verdict;
            }

            context.merge(verdict.metadata);
        }

        ModifierVerdict::allow()
    }
}
