//! # Capability Interfaces
//!
//! The engine driver never names a concrete VM, sender, validator set, or
//! clock implementation — it is built generically against these traits,
//! supplied at construction by whatever binary embeds the core. Metrics is
//! the one exception worth calling out: it is synchronous by design, since
//! recording a counter increment must never itself become a suspension
//! point inside the driver's critical section.
//!
//! `Vm`, `Sender`, and `ValidatorSet` use [`async_trait`] because their
//! real implementations cross an I/O boundary (storage, the network). Per
//! the concurrency model, only the potentially long calls are async —
//! `Vm::set_preference` and `Vm::last_accepted` stay synchronous
//! notification-style calls the driver can invoke from inside its
//! critical section.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::consensus::chain::Block;
use crate::consensus::bootstrap::NodeId;
use crate::id::Id;

/// A subnet identifier. Distinct type alias from [`NodeId`] purely for
/// readability at call sites; both are [`Id`]s under the hood.
pub type SubnetId = Id;

/// An outstanding request's correlation id, chosen by the driver.
pub type RequestId = u64;

/// Errors surfaced by a [`Vm`] implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
    /// The VM rejected a block during verification.
    #[error("block verification failed: {0}")]
    VerificationFailed(String),
    /// The VM could not parse the given bytes into a block.
    #[error("block parse failed: {0}")]
    ParseFailed(String),
    /// The named block is not known to the VM.
    #[error("unknown block")]
    UnknownBlock,
    /// The VM's `accept`/`reject` callback failed. Per the governing error
    /// model this is fatal to the engine lifecycle.
    #[error("vm callback failed: {0}")]
    CallbackFailed(String),
}

/// The block/vertex application collaborator. Block storage, execution,
/// and payload semantics all live behind this trait.
#[async_trait]
pub trait Vm: Send + Sync {
    /// Build a new block extending the VM's current preference.
    fn build_block(&self) -> Result<Block, VmError>;

    /// Parse wire bytes into a block the chain driver can place in the
    /// forest.
    fn parse_block(&self, bytes: &[u8]) -> Result<Block, VmError>;

    /// Fetch a previously seen block by id.
    fn get_block(&self, id: Id) -> Result<Block, VmError>;

    /// Notify the VM of the chain driver's current preferred tip. A
    /// notification-style call, always invoked synchronously.
    fn set_preference(&self, id: Id);

    /// The VM's last accepted block id, consulted on engine startup.
    fn last_accepted(&self) -> Id;

    /// Irrevocably apply `block`. Invoked outside the driver's critical
    /// section, strictly in ascending height order.
    async fn accept(&self, block: &Block) -> Result<(), VmError>;

    /// Irrevocably discard `block` and its subtree.
    async fn reject(&self, block: &Block) -> Result<(), VmError>;

    /// Validate `block` before it is admitted to the forest.
    async fn verify(&self, block: &Block) -> Result<(), VmError>;
}

/// Errors surfaced by a [`Sender`] implementation. Per the governing
/// error model these are downgraded by the driver to an unsuccessful
/// poll rather than propagated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

/// The outbound networking collaborator.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Ask `to` which block they prefer, by id.
    async fn send_pull_query(&self, to: &[NodeId], request_id: RequestId, block_id: Id) -> Result<(), SendError>;

    /// Push a full block to `to` and ask for their resulting preference.
    async fn send_push_query(&self, to: &[NodeId], request_id: RequestId, bytes: Vec<u8>) -> Result<(), SendError>;

    /// Ask `to` for their accepted frontier (bootstrap phase 1).
    async fn send_get_accepted_frontier(&self, to: &[NodeId], request_id: RequestId) -> Result<(), SendError>;

    /// Ask `to` to confirm which of `ids` they consider accepted
    /// (bootstrap phase 2).
    async fn send_get_accepted(&self, to: &[NodeId], request_id: RequestId, ids: Vec<Id>) -> Result<(), SendError>;
}

/// Errors surfaced by a [`ValidatorSet`] implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("validator set query failed: {0}")]
pub struct ValidatorSetError(pub String);

/// The validator membership and stake-weight collaborator.
#[async_trait]
pub trait ValidatorSet: Send + Sync {
    /// The validator set (and their weights) for `subnet_id` as of
    /// `at_height`.
    async fn get_validators(
        &self,
        at_height: u64,
        subnet_id: SubnetId,
    ) -> Result<HashMap<NodeId, u64>, ValidatorSetError>;

    /// The total stake weight backing `subnet_id`.
    async fn total_weight(&self, subnet_id: SubnetId) -> Result<u64, ValidatorSetError>;

    /// Draw `k` validators for `subnet_id`, weighted by stake.
    async fn sample(&self, subnet_id: SubnetId, k: usize) -> Result<Vec<NodeId>, ValidatorSetError>;
}

/// The time collaborator. Abstracted so the driver's timeout and
/// round-seed logic can be driven deterministically in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;

    /// Resolve once `duration` has elapsed.
    async fn after(&self, duration: Duration);
}

/// The metrics collaborator. Always synchronous — recording an
/// observation must never be a suspension point.
pub trait Metrics: Send + Sync {
    /// A poll round was issued.
    fn record_poll_started(&self);
    /// A poll round collected enough chits to update the chain.
    fn record_poll_successful(&self);
    /// A poll round failed (network error, timeout, or empty quorum).
    fn record_poll_failed(&self);
    /// Observe the duration of a named pipeline stage (`"sample"`,
    /// `"send"`, `"tally"`, `"record_poll"`, ...).
    fn observe_stage_duration(&self, stage: &str, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time object-safety checks: every capability trait must be
    // usable as `dyn Trait` behind the driver's injected references.
    fn _assert_vm_object_safe(_: &dyn Vm) {}
    fn _assert_sender_object_safe(_: &dyn Sender) {}
    fn _assert_validator_set_object_safe(_: &dyn ValidatorSet) {}
    fn _assert_clock_object_safe(_: &dyn Clock) {}
    fn _assert_metrics_object_safe(_: &dyn Metrics) {}
}
