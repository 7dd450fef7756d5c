//! Optional modifier enforcing an authorization's validity window.

use crate::error::Result;
use crate::payment::modifier::{Modifier, ModifierVerdict, VerificationContext};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

/// Runs after compliance.
pub const VALIDITY_WINDOW_PRIORITY: i32 = 20;

/// Denies authorizations used outside `[validAfter, validBefore)`.
///
/// A `validBefore` of zero means the authorization does not expire.
pub struct ValidityWindowModifier {
    clock: fn() -> u64,
}

impl ValidityWindowModifier {
    /// Check against the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self { clock: unix_now }
    }

    /// Check against a custom clock.
    #[must_use]
    pub fn with_clock(clock: fn() -> u64) -> Self {
        Self { clock }
    }
}

impl Default for ValidityWindowModifier {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

#[async_trait]
impl Modifier for ValidityWindowModifier {
    fn priority(&self) -> i32 {
        VALIDITY_WINDOW_PRIORITY
    }

    fn name(&self) -> &str {
        "validity-window"
    }

    async fn execute(&self, context: &VerificationContext) -> Result<ModifierVerdict> {
        let now = (self.clock)();
        let auth = &context.authorization;

        if now < auth.valid_after {
            return Ok(ModifierVerdict::deny(format!(
                "Authorization not valid until {} (now {now})",
                auth.valid_after
            )));
        }

        if auth.valid_before != 0 && now >= auth.valid_before {
            return Ok(ModifierVerdict::deny(format!(
                "Authorization expired at {} (now {now})",
                auth.valid_before
            )));
        }

        Ok(ModifierVerdict::allow().with("validityWindow", json!({"checkedAt": now})))
    }
}
