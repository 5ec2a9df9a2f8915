//! # Confidence State Machines
//!
//! Three nested voting instances compose the decision engine: a monadic
//! machine drives confidence over a single fixed choice, a dyadic machine
//! adds a two-choice preference on top, and a polyadic machine generalizes
//! the choice to an arbitrary [`crate::id::Id`] while tracking which choice
//! is currently leading.
//!
//! The source material expresses these as an inheritance chain (monadic
//! embedded in dyadic embedded in polyadic). We keep the *shared
//! confidence-vector bookkeeping* as one private helper
//! ([`confidence::ConfidenceVector`]) used by all three, but give each
//! arity its own concrete type with the `record_poll` signature its arity
//! actually needs — a monadic poll has no choice to report, a dyadic poll
//! reports `0|1`, a polyadic poll reports an `Id`. Forcing all three
//! through one generic `record_poll` trait method would paper over that
//! real difference in shape, so instead [`Finalizable`] captures only what
//! is genuinely uniform across all three: once finalized, always finalized.

mod confidence;
pub mod dyadic;
pub mod monadic;
pub mod polyadic;

pub use dyadic::Dyadic;
pub use monadic::Monadic;
pub use polyadic::Polyadic;

/// Uniform across every arity: once a machine finalizes, that is terminal.
pub trait Finalizable {
    /// `true` once the machine has reached an irrevocable decision.
    fn finalized(&self) -> bool;
}

/// Implemented by the two- and many-choice machines, which — unlike the
/// monadic machine — track a current preference distinct from the
/// finalized verdict.
pub trait Preference {
    /// The machine's choice type (`u8` for dyadic, [`crate::id::Id`] for
    /// polyadic).
    type Choice;

    /// The machine's current preference. Before finalization this may
    /// still change; after finalization it is fixed.
    fn preference(&self) -> Self::Choice;
}
