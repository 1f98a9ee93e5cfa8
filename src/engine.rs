//! Token-pattern matching engine.
//!
//! This module is the public entry point for the matching core. It is split
//! into focused submodules under `src/engine/`, one per component of the
//! original design, while keeping public paths stable (`crate::engine::StateMachine`,
//! `crate::engine::ProgramTable`, ...).
//!
//! ## How the parts work together
//!
//! ```text
//! Compiler (compiler.rs, one level up)
//!    │  push_term / push_pattern / push_expression / define_pattern
//!    v
//! ProgramTable (program_table.rs)        <- C3: compiled catalogue + optimiser
//!    │  immutable after compile, shared read-only across machines
//!    v
//! StateMachine (state_machine.rs)        <- C4: per-document runtime
//!    │  do_transition(event) ───┬── EventTriggerTable::scan   (trigger_index.rs, C1)
//!    │                          └── ProgramTable::event_program_list
//!    v
//! Vec<MatchResult>
//! ```
//!
//! `Arena`/`StackPool` (arena.rs, C2) back every table above: action slots,
//! rules, trigger defs, program triggers, and event items are all records in
//! an arena with free-list reuse, never individually heap-allocated.
//!
//! ## Responsibilities by module
//!
//! - `arena.rs`: pod-style record tables with O(1) add/remove and stable
//!   indices (C2), plus the `StackPool` chain-of-values pool built on it.
//! - `trigger_index.rs`: the event-id -> waiting-triggers hash index (C1).
//! - `program_table.rs`: the compiled program catalogue, its event-id ->
//!   installable-programs index, and the frequency-driven optimiser (C3).
//! - `state_machine.rs`: the per-document runtime automaton: trigger firing,
//!   program installation, rule disposal, past-event replay (C4).
//! - `metrics.rs`: optional timing/debug data for compile and match runs.
//!
//! ## Public surface
//!
//! Most code interacts with the engine via:
//!
//! - [`ProgramTable`] and [`OptimizeOptions`] (build once, via
//!   [`crate::compiler::Compiler`])
//! - [`StateMachine`] (one per document/thread, sharing a `ProgramTable`)
//! - [`RunMetrics`] (optional; for profiling a compile or a match run)
//!
//! ## Debugging
//!
//! Set `PATTERNCORE_DEBUG=1` to print installation and firing traces to
//! stderr (see [`crate::debug_report`]).

#[path = "engine/arena.rs"]
mod arena;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/program_table.rs"]
mod program_table;
#[path = "engine/state_machine.rs"]
mod state_machine;
#[path = "engine/trigger_index.rs"]
mod trigger_index;

pub use arena::{Arena, StackPool};
pub use metrics::{CompileMetrics, MatchingMetrics, RunMetrics};
pub use program_table::{OptimizeOptions, ProgramTable, Statistics};
pub use state_machine::{RuntimeStatistics, StateMachine};
pub use trigger_index::EventTriggerTable;
