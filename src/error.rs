//! Crate-wide error type.
//!
//! Every fallible entry point in this crate returns [`Result`], never panics
//! on caller-supplied input. Compile-time mistakes (malformed expression
//! trees, dangling pattern references) and runtime mistakes (events fed out
//! of order, a program exceeding its structural limits) share one enum so
//! callers can match on `kind()`-like variants without juggling two error
//! types across the compiler/state-machine boundary.

use thiserror::Error;

/// Errors produced while compiling or running a pattern program.
#[derive(Debug, Error)]
pub enum Error {
    /// `set_current_pos`/`do_transition` received an ordinal position
    /// smaller than one already processed.
    #[error("event position {requested} precedes current position {current}")]
    NonMonotonicPosition { current: u32, requested: u32 },

    /// `install_program` computed `start_ordpos + position_range` and it
    /// overflowed `u32`.
    #[error("rule expiry overflows: start {start} + range {range}")]
    RangeOverflow { start: u32, range: u32 },

    /// A `Within`/`WithinStruct` expression has more arguments than fit in
    /// the `u32` bitmask an action slot uses to track them.
    #[error("argument count {count} overflows the within-bitmask's 31-bit capacity")]
    CountOverflow { count: u32 },

    /// `push_expression` was called with fewer operands on the stack than
    /// its `argc` requires.
    #[error("expression requires {expected} arguments, found {found} on the stack")]
    MissingArguments { expected: usize, found: usize },

    /// `define_pattern`/`compile` referenced a pattern name that was never
    /// pushed.
    #[error("unresolved pattern reference '{name}'")]
    UnresolvedReference { name: String },

    /// `push_expression`'s `range` is smaller than the operator's structural
    /// minimum for its argument count.
    #[error("range {range} is below the structural minimum {min_range} for this expression")]
    RangeBelowMinimum { range: u32, min_range: u32 },

    /// A pattern's expression tree references itself, directly or
    /// transitively, before it can be closed.
    #[error("pattern '{name}' depends on itself")]
    CyclicPatternReference { name: String },

    /// `attach_variable` was called twice for the same stack position
    /// without an intervening push.
    #[error("variable already bound for this expression term")]
    DoubleVariableAssignment { name: String },

    /// A compiled program would need more than the fixed number of
    /// distinct key-event triggers a single installation supports.
    #[error("program {program} exceeds the maximum of {max} key-event triggers")]
    TooManyKeyTriggers { program: u32, max: usize },

    /// Past-event replay produced a follow-event; the replay path is meant
    /// to be a pure re-fire with no cascading effects, so this indicates a
    /// miscompiled program.
    #[error("replaying a past event produced a follow-event, which is not allowed")]
    ReplayProducedFollowEvent,

    /// Debug-only arena guard: an index was read or written after being
    /// freed.
    #[error("use of table element {index} after it was freed")]
    UseAfterFree { index: u32 },

    /// Debug-only arena guard: an index was freed twice.
    #[error("table element {index} freed twice")]
    DoubleFree { index: u32 },
}

/// Crate-local result alias, mirroring the rest of the ecosystem's
/// `Result<T, E = CrateError>` convention.
pub type Result<T, E = Error> = std::result::Result<T, E>;
