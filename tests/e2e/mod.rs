//! End-to-end tests for the compliance gate.
//!
//! These drive a fully assembled [`compliance_gate::Gate`] against in-memory
//! chain, oracle and transfer backends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod harness;
mod scenarios;
mod settlement;
