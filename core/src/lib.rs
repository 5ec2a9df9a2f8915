// Copyright (c) 2026 Consensus Core Contributors. MIT License.
// See LICENSE for details.

//! # Consensus Core
//!
//! This is the decision engine of a Snow-family Byzantine-fault-tolerant
//! consensus protocol: repeated, weighted, random sampling of peer
//! preferences drives every contested choice toward an irrevocable
//! accepted/rejected verdict, subject to quorum thresholds, confidence
//! accumulation, and consecutive-round termination conditions.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual layers of the
//! protocol:
//!
//! - **id** — the 32-byte opaque content-hash identifier shared by every
//!   other module.
//! - **crypto** — the single hashing primitive the rest of the crate needs.
//! - **consensus::params** — tunables and their validation.
//! - **consensus::sampler** — seeded, weighted, without-replacement voter
//!   selection.
//! - **consensus::bag** — the multiset tally fed into the voting machines.
//! - **consensus::machines** — monadic, dyadic, and polyadic confidence
//!   state machines.
//! - **consensus::chain** — the block-tree topology driver that turns
//!   machine-level decisions into chain finalization.
//! - **consensus::bootstrap** — the two-phase frontier resolver used on
//!   first start.
//! - **consensus::engine** — the driver that ties sampling, polling, and
//!   the chain together into a runnable lifecycle.
//! - **consensus::interfaces** — the capability traits (VM, sender,
//!   validator set, clock, metrics) the engine is built against, never
//!   against concrete implementations.
//!
//! ## Design philosophy
//!
//! 1. The decision core never suspends mid-mutation — every voting-machine
//!    and chain operation is synchronous and runs to completion. Only the
//!    driver (`consensus::engine`) awaits.
//! 2. Once `finalized()` is true, nothing about a machine's preference or
//!    confidence may change again. This is checked, not assumed.
//! 3. No module outside `consensus::interfaces` ever names a concrete VM,
//!    sender, or validator-set implementation — those are always injected.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod id;
