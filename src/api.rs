//! Public façade gluing the compiler, program table, and state machine
//! together, plus timing wrappers around each phase.
//!
//! Most callers only need [`PatternCatalogue::build`] once per ruleset and
//! one [`MatchEngine`] per document (or per thread, since a catalogue is
//! shared read-only across engines).

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::compiler::Compiler;
use crate::engine::{CompileMetrics, MatchingMetrics, OptimizeOptions, ProgramTable, RunMetrics, StateMachine};
use crate::error::Result;
use crate::model::{EventData, EventId, MatchResult, ResultItem, VariableId};
use crate::symbol::SymbolTable;

/// An immutable, compiled catalogue of programs plus the per-variable
/// weights recorded while building it. Build once with
/// [`PatternCatalogue::build`], then share read-only across many
/// [`MatchEngine`]s (one per document, typically one per thread).
pub struct PatternCatalogue {
    table: ProgramTable,
    variable_weights: FxHashMap<VariableId, f32>,
    metrics: CompileMetrics,
}

impl PatternCatalogue {
    /// Runs `build` against a fresh [`Compiler`] over a fresh
    /// [`ProgramTable`], then runs the optimiser. `build` should push and
    /// define every pattern, propagating compile errors with `?`.
    pub fn build<F>(options: &OptimizeOptions, build: F) -> Result<Self>
    where
        F: FnOnce(&mut Compiler) -> Result<()>,
    {
        let start = Instant::now();
        let mut table = ProgramTable::new();
        let mut compiler = Compiler::new(&mut table);
        build(&mut compiler)?;
        let variable_weights = compiler.variable_weights().clone();
        let stats = compiler.compile(options)?;

        let metrics = CompileMetrics {
            total: start.elapsed(),
            programs_compiled: table.total_programs() as usize,
            programs_relinked: stats.programs_relinked,
            stopwords: stats.stopword_set.len(),
        };
        Ok(PatternCatalogue { table, variable_weights, metrics })
    }

    pub fn table(&self) -> &ProgramTable {
        &self.table
    }

    pub fn metrics(&self) -> &CompileMetrics {
        &self.metrics
    }

    pub fn variable_weights(&self) -> &FxHashMap<VariableId, f32> {
        &self.variable_weights
    }
}

/// Per-document runtime: a [`StateMachine`] borrowing a shared
/// [`PatternCatalogue`], with timing folded into [`MatchingMetrics`].
pub struct MatchEngine<'c> {
    machine: StateMachine<'c>,
    catalogue: &'c PatternCatalogue,
    metrics: MatchingMetrics,
}

impl<'c> MatchEngine<'c> {
    pub fn new(catalogue: &'c PatternCatalogue) -> Self {
        MatchEngine { machine: StateMachine::new(catalogue.table()), catalogue, metrics: MatchingMetrics::default() }
    }

    pub fn set_current_pos(&mut self, pos: u32) -> Result<()> {
        self.machine.set_current_pos(pos)
    }

    /// Feeds one lexem event through the machine, including every
    /// follow-event it transitively produces, and folds the elapsed time
    /// into this engine's [`MatchingMetrics`].
    pub fn feed(&mut self, event_id: EventId, data: EventData) -> Result<()> {
        let start = Instant::now();
        self.machine.do_transition(event_id, data)?;
        self.metrics.total += start.elapsed();
        self.metrics.events_processed += 1;
        self.metrics.results_produced = self.machine.results().len();
        Ok(())
    }

    pub fn results(&self) -> &[MatchResult] {
        self.machine.results()
    }

    pub fn result_items(&self, result: &MatchResult, variables: &SymbolTable) -> Result<Vec<ResultItem>> {
        self.machine.result_items(result, variables, self.catalogue.variable_weights())
    }

    pub fn metrics(&self) -> MatchingMetrics {
        let mut m = self.metrics.clone();
        m.runtime = self.machine.statistics();
        m
    }

    pub fn clear(&mut self) {
        self.machine.clear();
        self.metrics = MatchingMetrics::default();
    }
}

/// Bundles a catalogue's compile metrics with an engine's matching metrics
/// into one report, for callers that want a single number for "total cost
/// of handling this document".
pub fn run_metrics(catalogue: &PatternCatalogue, engine: &MatchEngine) -> RunMetrics {
    let compile = catalogue.metrics().clone();
    let matching = engine.metrics();
    RunMetrics { total: compile.total + matching.total, compile, matching }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Operator;
    use crate::model::EventId;

    fn catalogue() -> PatternCatalogue {
        PatternCatalogue::build(&OptimizeOptions::default(), |c| {
            c.push_term(1);
            c.push_term(2);
            c.push_expression(Operator::Sequence, 2, 2, 0)?;
            c.define_pattern(100, true)?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn builds_and_matches_a_sequence() {
        let cat = catalogue();
        let mut engine = MatchEngine::new(&cat);

        engine.set_current_pos(1).unwrap();
        engine.feed(EventId::term(1), EventData::at(0, 0, 1, 1)).unwrap();
        engine.set_current_pos(2).unwrap();
        engine.feed(EventId::term(2), EventData::at(0, 1, 1, 2)).unwrap();

        assert_eq!(engine.results().len(), 1);
        assert_eq!(engine.metrics().events_processed, 2);
    }

    #[test]
    fn result_items_resolve_variable_names() {
        let cat = PatternCatalogue::build(&OptimizeOptions::default(), |c| {
            c.push_term(1);
            c.attach_variable(1, 2.0)?;
            c.push_term(2);
            c.push_expression(Operator::Sequence, 2, 2, 0)?;
            c.define_pattern(100, true)?;
            Ok(())
        })
        .unwrap();
        let mut engine = MatchEngine::new(&cat);
        let mut symbols = SymbolTable::new();
        let var_id = symbols.get_or_create("unit");
        assert_eq!(var_id, 1);

        engine.set_current_pos(1).unwrap();
        engine.feed(EventId::term(1), EventData::at(0, 0, 1, 1)).unwrap();
        engine.set_current_pos(2).unwrap();
        engine.feed(EventId::term(2), EventData::at(0, 1, 1, 2)).unwrap();

        let items = engine.result_items(&engine.results()[0], &symbols).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variable_name, "unit");
        assert_eq!(items[0].weight, 2.0);
    }

    #[test]
    fn clear_resets_metrics() {
        let cat = catalogue();
        let mut engine = MatchEngine::new(&cat);
        engine.set_current_pos(1).unwrap();
        engine.feed(EventId::term(1), EventData::at(0, 0, 1, 1)).unwrap();
        engine.clear();
        assert_eq!(engine.metrics().events_processed, 0);
        assert!(engine.results().is_empty());
    }
}
