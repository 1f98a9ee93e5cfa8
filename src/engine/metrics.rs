//! Run metrics: optional timing/debug data for compiling and matching.
//!
//! Intentionally simple and opt-in, matching the rest of this crate's
//! ambient-stack style: the hot path (trigger firing) never touches these
//! structs, they're populated by the thin wrappers in [`crate::api`] that
//! time a compile or a `do_transition` sweep around the core calls.

use std::time::Duration;

use crate::engine::state_machine::RuntimeStatistics;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    pub total: Duration,
    pub compile: CompileMetrics,
    pub matching: MatchingMetrics,
}

#[derive(Debug, Default, Clone)]
pub struct CompileMetrics {
    pub total: Duration,
    pub programs_compiled: usize,
    pub programs_relinked: u32,
    pub stopwords: usize,
}

#[derive(Debug, Default, Clone)]
pub struct MatchingMetrics {
    pub total: Duration,
    pub events_processed: usize,
    pub results_produced: usize,
    pub runtime: RuntimeStatistics,
}
