//! The voting engine proper: parameters, sampling, tallying, the three
//! confidence machines, the chain topology driver, the bootstrap frontier
//! resolver, the engine driver, and the capability interfaces it is built
//! against.
//!
//! Dependency order roughly follows module declaration order below —
//! [`params`] and [`sampler`] and [`bag`] are leaves; [`machines`] builds on
//! `params`; [`chain`] builds on `bag` and `machines`; [`bootstrap`] and
//! [`engine`] build on everything above plus [`interfaces`].

pub mod bag;
pub mod bootstrap;
pub mod chain;
pub mod engine;
pub mod interfaces;
pub mod machines;
pub mod params;
pub mod sampler;

pub use bag::Bag;
pub use chain::{Block, Chain, ChainError, PollOutcome, Status};
pub use machines::{Dyadic, Finalizable, Monadic, Polyadic, Preference};
pub use params::{ParamsError, Parameters, TerminationCondition};
pub use sampler::{sample, SampleError};
