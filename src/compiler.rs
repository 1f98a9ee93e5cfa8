//! Program compiler (C5): a stack-based builder that turns a compositional
//! expression tree into programs and triggers in [`ProgramTable`].
//!
//! This is the programmatic API only — the textual program-loader grammar
//! (`Name = expr ;`, lexer-pattern declarations, `%Option = value;`) is an
//! external concern layered on top, not part of this crate. Grounded in
//! `original_source/src/patternMatcher.cpp`'s reduction functions
//! (`pushTerm`/`pushExpression`/`pushPattern`/`attachVariable`/
//! `definePattern`, lines 170-354), minus the parser itself.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::{OptimizeOptions, ProgramTable, Statistics};
use crate::error::{Error, Result};
use crate::model::{EventId, Index, ResultHandle, SigType, SlotTemplate, VariableId};

/// Join operators recognised by `push_expression`, matching the program
/// language's `sequence`/`sequence_imm`/`sequence_struct`/`within`/
/// `within_struct`/`any`/`and` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Sequence,
    SequenceImm,
    SequenceStruct,
    Within,
    WithinStruct,
    Any,
    And,
}

impl Operator {
    fn min_range(self, argc: u32) -> u32 {
        match self {
            Operator::Sequence | Operator::SequenceImm | Operator::Within => argc.saturating_sub(1),
            Operator::SequenceStruct | Operator::WithinStruct => argc.saturating_sub(2),
            Operator::Any | Operator::And => 0,
        }
    }

    fn slot_template_init(self, argc: u32, cardinality: u32) -> (u32, u32) {
        let default_card = |default: u32| if cardinality == 0 { default } else { cardinality };
        match self {
            Operator::Sequence | Operator::SequenceImm => (default_card(argc), argc),
            Operator::SequenceStruct => (default_card(argc).saturating_sub(1), argc.saturating_sub(1)),
            Operator::Within => (default_card(argc), (1u32 << argc).wrapping_sub(1)),
            Operator::WithinStruct => (default_card(argc).saturating_sub(1), (1u32 << argc).wrapping_sub(1)),
            Operator::Any => (if cardinality == 0 { 1 } else { cardinality }, 0),
            Operator::And => (default_card(argc), 0),
        }
    }

    /// `(sig_type, sig_val, is_key)` for argument index `i` of `argc`,
    /// per the key-event marking table.
    fn trigger_spec(self, argc: u32, i: u32) -> (SigType, u32, bool) {
        match self {
            Operator::Sequence => (SigType::Sequence, argc - i, i == 0),
            Operator::SequenceImm => {
                if i == 0 {
                    (SigType::Sequence, argc - i, true)
                } else {
                    (SigType::SequenceImm, argc - i, false)
                }
            }
            Operator::SequenceStruct => {
                if i == 0 {
                    (SigType::Del, argc - i, false)
                } else {
                    (SigType::Sequence, argc - i, i == 1)
                }
            }
            Operator::Within => (SigType::Within, 1u32 << (argc - i - 1), true),
            Operator::WithinStruct => {
                if i == 0 {
                    (SigType::Del, 1u32 << (argc - i), false)
                } else {
                    (SigType::Within, 1u32 << (argc - i), true)
                }
            }
            Operator::Any => (SigType::Any, 0, true),
            Operator::And => (SigType::And, 0, true),
        }
    }
}

#[derive(Debug, Clone)]
struct PatternNode {
    event_id: EventId,
    /// The program whose completion produces this node's event, or `None`
    /// for a leaf (`push_term`/`push_pattern`) not yet reduced into a
    /// program by `push_expression` or wrapped by `define_pattern`.
    program: Option<Index>,
    variable_id: VariableId,
    /// Pattern names this node transitively depends on, used to reject
    /// self-referential definitions (§9 "Cyclic graphs").
    deps: FxHashSet<u32>,
}

/// Stack-based program builder. One `Compiler` is used to build an entire
/// catalogue of patterns into a shared [`ProgramTable`], then consumed by
/// [`Compiler::compile`].
pub struct Compiler<'t> {
    table: &'t mut ProgramTable,
    stack: Vec<PatternNode>,
    next_expression_id: u32,
    defined: FxHashMap<u32, ()>,
    referenced: FxHashSet<u32>,
    variable_weights: FxHashMap<VariableId, f32>,
}

impl<'t> Compiler<'t> {
    pub fn new(table: &'t mut ProgramTable) -> Self {
        Compiler {
            table,
            stack: Vec::new(),
            next_expression_id: 0,
            defined: FxHashMap::default(),
            referenced: FxHashSet::default(),
            variable_weights: FxHashMap::default(),
        }
    }

    /// Per-variable weight recorded by `attach_variable`, consulted when
    /// resolving result items. Variables never attached default to `1.0`.
    pub fn variable_weights(&self) -> &FxHashMap<VariableId, f32> {
        &self.variable_weights
    }

    pub fn push_term(&mut self, token_id: u32) -> EventId {
        let event_id = EventId::term(token_id);
        self.stack.push(PatternNode { event_id, program: None, variable_id: 0, deps: FxHashSet::default() });
        event_id
    }

    /// Pushes a leaf referring to another pattern by its dense name id.
    /// The name need not be defined yet; `compile` checks closure.
    pub fn push_pattern(&mut self, name: u32) -> EventId {
        self.referenced.insert(name);
        let event_id = EventId::reference(name);
        let mut deps = FxHashSet::default();
        deps.insert(name);
        self.stack.push(PatternNode { event_id, program: None, variable_id: 0, deps });
        event_id
    }

    /// Binds a variable to the top-of-stack node. At most one variable per
    /// node; `weight` feeds into published result items.
    pub fn attach_variable(&mut self, variable_id: VariableId, weight: f32) -> Result<()> {
        let node = self.stack.last_mut().ok_or(Error::MissingArguments { expected: 1, found: 0 })?;
        if node.variable_id != 0 {
            return Err(Error::DoubleVariableAssignment { name: variable_id.to_string() });
        }
        node.variable_id = variable_id;
        self.variable_weights.insert(variable_id, weight);
        Ok(())
    }

    /// Pops `argc` nodes, builds a program implementing `op`'s semantics
    /// over them, and pushes the resulting node.
    pub fn push_expression(&mut self, op: Operator, argc: usize, range: u32, cardinality: u32) -> Result<EventId> {
        if self.stack.len() < argc {
            return Err(Error::MissingArguments { expected: argc, found: self.stack.len() });
        }
        let min_range = op.min_range(argc as u32);
        if range < min_range {
            return Err(Error::RangeBelowMinimum { range, min_range });
        }
        if matches!(op, Operator::Within | Operator::WithinStruct) && argc > 31 {
            return Err(Error::CountOverflow { count: argc as u32 });
        }

        let args = self.stack.split_off(self.stack.len() - argc);
        let (count, value) = op.slot_template_init(argc as u32, cardinality);

        let event_id = EventId::expression(self.next_expression_id);
        self.next_expression_id += 1;

        let program = self.table.create_program(range, SlotTemplate { value, count, follow_event: None, result_handle: 0 });
        let mut deps = FxHashSet::default();
        for (i, arg) in args.iter().enumerate() {
            let (sig_type, sig_val, is_key) = op.trigger_spec(argc as u32, i as u32);
            self.table.create_trigger(program, arg.event_id, is_key, sig_type, sig_val, arg.variable_id)?;
            deps.extend(arg.deps.iter().copied());
        }
        self.table.done_program(program)?;

        self.stack.push(PatternNode { event_id, program: Some(program), variable_id: 0, deps });
        Ok(event_id)
    }

    /// Publishes the top-of-stack node under `name`: other `push_pattern`
    /// leaves referring to `name` fire when this node's program completes.
    /// `visible` additionally publishes a [`MatchResult`](crate::model::MatchResult)
    /// under result handle `name` on every completion.
    pub fn define_pattern(&mut self, name: u32, visible: bool) -> Result<()> {
        let node = self.stack.pop().ok_or(Error::MissingArguments { expected: 1, found: 0 })?;
        if node.deps.contains(&name) {
            return Err(Error::CyclicPatternReference { name: name.to_string() });
        }

        let program = match node.program {
            Some(p) => p,
            None => {
                let wrapper = self.table.create_program(0, SlotTemplate { value: 0, count: 1, follow_event: None, result_handle: 0 });
                self.table.create_trigger(wrapper, node.event_id, true, SigType::Any, 0, node.variable_id)?;
                self.table.done_program(wrapper)?;
                wrapper
            }
        };

        let result_handle: ResultHandle = if visible { name } else { 0 };
        self.table.define_program_result(program, Some(EventId::reference(name)), result_handle)?;
        self.defined.insert(name, ());
        Ok(())
    }

    /// Verifies every referenced pattern was defined, then runs the
    /// optimiser (§4.3) and finalises the table.
    pub fn compile(self, options: &OptimizeOptions) -> Result<Statistics> {
        for name in &self.referenced {
            if !self.defined.contains_key(name) {
                return Err(Error::UnresolvedReference { name: name.to_string() });
            }
        }
        self.table.optimize(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_expression_wires_key_and_followers() {
        let mut table = ProgramTable::new();
        let mut c = Compiler::new(&mut table);
        c.push_term(1);
        c.push_term(2);
        c.push_term(3);
        let event = c.push_expression(Operator::Sequence, 3, 3, 0).unwrap();
        c.define_pattern(100, true).unwrap();
        assert_eq!(event.tag(), crate::model::EventTag::Expression);
        c.compile(&OptimizeOptions::default()).unwrap();

        let installs = table.event_program_list(EventId::term(1)).unwrap();
        assert_eq!(installs.len(), 1);
    }

    #[test]
    fn range_below_structural_minimum_is_rejected() {
        let mut table = ProgramTable::new();
        let mut c = Compiler::new(&mut table);
        c.push_term(1);
        c.push_term(2);
        let err = c.push_expression(Operator::Sequence, 2, 0, 0).unwrap_err();
        assert!(matches!(err, Error::RangeBelowMinimum { .. }));
    }

    #[test]
    fn unresolved_reference_fails_compile() {
        let mut table = ProgramTable::new();
        let mut c = Compiler::new(&mut table);
        c.push_pattern(42);
        c.define_pattern(1, true).unwrap();
        let err = c.compile(&OptimizeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn self_referential_pattern_is_rejected() {
        let mut table = ProgramTable::new();
        let mut c = Compiler::new(&mut table);
        c.push_pattern(7);
        c.push_term(1);
        c.push_expression(Operator::Within, 2, 1, 0).unwrap();
        let err = c.define_pattern(7, true).unwrap_err();
        assert!(matches!(err, Error::CyclicPatternReference { .. }));
    }

    #[test]
    fn bare_leaf_definition_is_wrapped() {
        let mut table = ProgramTable::new();
        let mut c = Compiler::new(&mut table);
        c.push_term(9);
        c.define_pattern(200, true).unwrap();
        c.compile(&OptimizeOptions::default()).unwrap();
        let installs = table.event_program_list(EventId::term(9)).unwrap();
        assert_eq!(installs.len(), 1);
    }
}
