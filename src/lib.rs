//! # compliance-gate
//!
//! AML screening, payment verification and settlement for x402-style token
//! payments.
//!
//! A submitted payment authorization passes through a fixed pipeline:
//!
//! 1. **Signature**: the payer's EIP-191 signature must recover to the payer
//! 2. **Balance**: the payer must hold at least the required amount
//! 3. **Modifiers**: pluggable policy checks in priority order, led by the
//!    compliance modifier (sanctions oracle + local list + on-chain
//!    behaviour scoring)
//!
//! Admitted payments are settled with a `transferFrom` from the merchant
//! account.
//!
//! ## Example
//!
//! ```rust,ignore
//! use compliance_gate::{GateBuilder, GateConfig};
//!
//! let gate = GateBuilder::new(GateConfig::default()).build()?;
//! let result = gate.verify(&authorization, &requirements).await;
//! if result.is_valid {
//!     let settled = gate.verify_and_settle(&authorization, &requirements).await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod chain;
pub mod compliance;
pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod payment;

pub use config::GateConfig;
pub use error::{Error, FaultPolicy, Result};
pub use event::{GateEvent, GateEventsChannel};
pub use gate::{Gate, GateBuilder};
