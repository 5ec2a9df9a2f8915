//! # Consensus Node Library
//!
//! The `consensus-node` binary's HTTP API, CLI definitions, configuration
//! layering, logging setup, Prometheus metrics, round-loop runtime, and
//! in-process simulated quorum, factored into a library so both `main.rs`
//! and `examples/demo.rs` can drive the same types.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod sim;
