//! Event-driven token-pattern matching engine.
//!
//! A document is a stream of ordered lexem events; a compiled catalogue of
//! programs reacts to that stream and produces [`model::MatchResult`]s. See
//! [`api`] for the façade most callers want:
//!
//! ```no_run
//! use patterncore::{Compiler, Operator, OptimizeOptions, ProgramTable, StateMachine};
//! use patterncore::model::EventData;
//!
//! let mut table = ProgramTable::new();
//! let mut compiler = Compiler::new(&mut table);
//! compiler.push_term(1);
//! compiler.push_term(2);
//! compiler.push_expression(Operator::Sequence, 2, 2, 0).unwrap();
//! compiler.define_pattern(100, true).unwrap();
//! compiler.compile(&OptimizeOptions::default()).unwrap();
//!
//! let mut machine = StateMachine::new(&table);
//! machine.set_current_pos(1).unwrap();
//! machine.do_transition(patterncore::model::EventId::term(1), EventData::at(0, 0, 1, 1)).unwrap();
//! machine.set_current_pos(2).unwrap();
//! machine.do_transition(patterncore::model::EventId::term(2), EventData::at(0, 1, 1, 2)).unwrap();
//! assert_eq!(machine.results().len(), 1);
//! ```

mod api;
mod compiler;
mod engine;
pub mod error;
pub mod model;
mod symbol;

pub use api::{MatchEngine, PatternCatalogue};
pub use compiler::{Compiler, Operator};
pub use engine::{CompileMetrics, MatchingMetrics, OptimizeOptions, ProgramTable, RunMetrics, RuntimeStatistics, StateMachine, Statistics};
pub use error::{Error, Result};
pub use symbol::SymbolTable;
