//! State machine (C4): consumes lexem events in ordinal order, fires
//! triggers, installs programs, disposes expired rules, and produces
//! results.
//!
//! Grounded in `original_source/src/ruleMatcherAutomaton.cpp`'s
//! `StateMachine` (`doTransition`/`fireSignal`/`setCurrentPos`/
//! `installProgram`/`installEventPrograms`/`replayPastEvent`/
//! `createEventData`/`referenceEventData`/`disposeEventDataReference`/
//! `joinEventData`/`deactivateRule`).
//!
//! **Ordinal position convention.** Lexer ordinal positions are 1-based (as
//! in every scenario in the testable-properties section), which lets action
//! slots use `0` as an "unset" sentinel for `start_ordpos`/`end_ordpos`
//! without a separate flag: `0 < data.ordpos` always holds for the first
//! firing, and "first assignment wins" capture is just "only set if still
//! zero".

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::engine::arena::{Arena, StackPool};
use crate::engine::program_table::ProgramTable;
use crate::engine::trigger_index::EventTriggerTable;
use crate::error::{Error, Result};
use crate::model::{
    ActionSlot, EventData, EventDataRef, EventId, EventItem, Index, MatchResult, Rule, ResultItem, SigType, Trigger, NIL,
};
use crate::symbol::SymbolTable;

const DISPOSE_WINDOW: usize = 64;

/// Snapshot of the runtime counters the source keeps for diagnostics
/// (`m_nofProgramsInstalled`, `m_nofAltKeyProgramsInstalled`,
/// `m_nofSignalsFired`, `m_nofOpenPatterns`). Purely observational; nothing
/// in the matching algorithm reads these back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeStatistics {
    pub programs_installed: u64,
    pub alt_key_programs_installed: u64,
    pub signals_fired: u64,
    pub open_patterns: u64,
}

/// Runtime automaton driven by lexem events against one immutable,
/// pre-compiled [`ProgramTable`].
pub struct StateMachine<'p> {
    programs: &'p ProgramTable,

    action_slots: Arena<ActionSlot>,
    rules: Arena<Rule>,
    /// Per-rule chain of trigger_refs registered in `trigger_index`, so
    /// deactivation can unlink them all.
    rule_trigger_refs: StackPool<Index>,
    event_data_refs: Arena<EventDataRef>,
    event_items: StackPool<EventItem>,
    trigger_index: EventTriggerTable,

    current_pos: u32,
    window: [Index; DISPOSE_WINDOW],
    window_pool: StackPool<Index>,
    heap: BinaryHeap<Reverse<(u32, Index)>>,

    results: Vec<MatchResult>,
    stopword_log: rustc_hash::FxHashMap<EventId, (EventData, u64)>,
    timestamp_counter: u64,

    stats: RuntimeStatistics,
}

impl<'p> StateMachine<'p> {
    pub fn new(programs: &'p ProgramTable) -> Self {
        StateMachine {
            programs,
            action_slots: Arena::new(),
            rules: Arena::new(),
            rule_trigger_refs: StackPool::new(),
            event_data_refs: Arena::new(),
            event_items: StackPool::new(),
            trigger_index: EventTriggerTable::new(),
            current_pos: 0,
            window: [NIL; DISPOSE_WINDOW],
            window_pool: StackPool::new(),
            heap: BinaryHeap::new(),
            results: Vec::new(),
            stopword_log: rustc_hash::FxHashMap::default(),
            timestamp_counter: 0,
            stats: RuntimeStatistics::default(),
        }
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    pub fn statistics(&self) -> RuntimeStatistics {
        let mut stats = self.stats;
        stats.open_patterns = self.rules.used_size() as u64;
        stats
    }

    pub fn clear(&mut self) {
        self.action_slots.clear();
        self.rules.clear();
        self.rule_trigger_refs.clear();
        self.event_data_refs.clear();
        self.event_items.clear();
        self.trigger_index.clear();
        self.window = [NIL; DISPOSE_WINDOW];
        self.window_pool.clear();
        self.heap.clear();
        self.current_pos = 0;
        self.results.clear();
        self.stopword_log.clear();
        self.timestamp_counter = 0;
        self.stats = RuntimeStatistics::default();
    }

    /// Resolves a [`MatchResult`]'s items, recursing into nested
    /// sub-references, with variable ids resolved against `variables` and
    /// weights resolved against `weights` (from
    /// [`crate::compiler::Compiler::variable_weights`]; unlisted variables
    /// default to `1.0`).
    pub fn result_items(
        &self,
        result: &MatchResult,
        variables: &SymbolTable,
        weights: &rustc_hash::FxHashMap<crate::model::VariableId, f32>,
    ) -> Result<Vec<ResultItem>> {
        let mut out = Vec::new();
        self.collect_items(result.event_data_ref, variables, weights, &mut out)?;
        Ok(out)
    }

    fn collect_items(
        &self,
        data_ref: Index,
        variables: &SymbolTable,
        weights: &rustc_hash::FxHashMap<crate::model::VariableId, f32>,
        out: &mut Vec<ResultItem>,
    ) -> Result<()> {
        if data_ref == NIL {
            return Ok(());
        }
        let head = self.event_data_refs.get(data_ref)?.item_list_head;
        for item in self.event_items.to_vec(head)? {
            out.push(ResultItem {
                variable_name: variables.name_of(item.variable_id).unwrap_or("").to_string(),
                ordpos: item.data.start_ordpos,
                origseg: item.data.start_origseg,
                origpos: item.data.start_origpos,
                origsize: item.data.end_origpos.saturating_sub(item.data.start_origpos),
                weight: weights.get(&item.variable_id).copied().unwrap_or(1.0),
            });
            if item.data.subdataref != NIL {
                self.collect_items(item.data.subdataref, variables, weights, out)?;
            }
        }
        Ok(())
    }

    // ---- ordinal clock / dispose scheme ---------------------------------

    /// Advances the ordinal clock, sweeping expired rules out of the
    /// dispose window (and, for large jumps, directly out of the overflow
    /// heap). Fails if `new_pos` moves backwards.
    pub fn set_current_pos(&mut self, new_pos: u32) -> Result<()> {
        if new_pos < self.current_pos {
            return Err(Error::NonMonotonicPosition { current: self.current_pos, requested: new_pos });
        }
        let span = new_pos - self.current_pos;
        let iterations = span.min(DISPOSE_WINDOW as u32);
        let base = self.current_pos;
        let mut p = base;
        for _ in 0..iterations {
            if p % DISPOSE_WINDOW as u32 == 0 {
                self.drain_heap_into_window(base + DISPOSE_WINDOW as u32)?;
            }
            self.sweep_bucket(p)?;
            p += 1;
        }
        if span > DISPOSE_WINDOW as u32 {
            self.drain_and_dispose_heap(new_pos)?;
        }
        self.current_pos = new_pos;
        Ok(())
    }

    fn define_dispose_rule(&mut self, rule: Index, expiry_ordpos: u32) {
        if expiry_ordpos >= self.current_pos + DISPOSE_WINDOW as u32 {
            self.heap.push(Reverse((expiry_ordpos, rule)));
        } else {
            let w = (expiry_ordpos as usize) % DISPOSE_WINDOW;
            self.window[w] = self.window_pool.push(self.window[w], rule);
        }
    }

    fn drain_heap_into_window(&mut self, threshold: u32) -> Result<()> {
        while let Some(&Reverse((pos, _))) = self.heap.peek() {
            if pos >= threshold {
                break;
            }
            let Reverse((pos, rule)) = self.heap.pop().unwrap();
            let w = (pos as usize) % DISPOSE_WINDOW;
            self.window[w] = self.window_pool.push(self.window[w], rule);
        }
        Ok(())
    }

    fn drain_and_dispose_heap(&mut self, threshold: u32) -> Result<()> {
        let mut due = Vec::new();
        while let Some(&Reverse((pos, _))) = self.heap.peek() {
            if pos >= threshold {
                break;
            }
            let Reverse((_, rule)) = self.heap.pop().unwrap();
            due.push(rule);
        }
        for rule in due {
            if self.rules.exists(rule) {
                self.deactivate_rule(rule)?;
            }
        }
        Ok(())
    }

    fn sweep_bucket(&mut self, p: u32) -> Result<()> {
        let w = (p as usize) % DISPOSE_WINDOW;
        let head = self.window[w];
        self.window[w] = NIL;
        let rules = self.window_pool.to_vec(head)?;
        self.window_pool.drain(head)?;
        for rule in rules {
            if self.rules.exists(rule) {
                self.deactivate_rule(rule)?;
            }
        }
        Ok(())
    }

    // ---- event-data reference bookkeeping -------------------------------

    fn reference_event_data(&mut self, data_ref: Index) -> Result<()> {
        self.event_data_refs.get_mut(data_ref)?.refcount += 1;
        Ok(())
    }

    fn dispose_event_data_reference(&mut self, data_ref: Index) -> Result<()> {
        let rc = {
            let r = self.event_data_refs.get_mut(data_ref)?;
            r.refcount -= 1;
            r.refcount
        };
        if rc == 0 {
            let head = self.event_data_refs.get(data_ref)?.item_list_head;
            self.event_items.drain(head)?;
            self.event_data_refs.remove(data_ref)?;
        }
        Ok(())
    }

    fn append_item_to_rule(&mut self, rule: Index, item: EventItem) -> Result<()> {
        let existing = self.rules.get(rule)?.event_data_ref;
        let data_ref = if existing == NIL {
            let idx = self.event_data_refs.add(EventDataRef { item_list_head: NIL, refcount: 1 });
            self.rules.get_mut(rule)?.event_data_ref = idx;
            idx
        } else {
            existing
        };
        let head = self.event_data_refs.get(data_ref)?.item_list_head;
        let new_head = self.event_items.push(head, item);
        self.event_data_refs.get_mut(data_ref)?.item_list_head = new_head;
        Ok(())
    }

    /// Variable binding (§4.4.4): a named trigger appends one item; an
    /// unnamed trigger whose data carries sub-evidence splices that
    /// evidence's items into the rule's list instead.
    fn bind(&mut self, rule: Index, trigger: Trigger, data: EventData) -> Result<()> {
        if trigger.variable_id != 0 {
            self.append_item_to_rule(rule, EventItem { variable_id: trigger.variable_id, data })?;
        } else if data.subdataref != NIL {
            let items = {
                let head = self.event_data_refs.get(data.subdataref)?.item_list_head;
                self.event_items.to_vec(head)?
            };
            for item in items {
                self.append_item_to_rule(rule, item)?;
            }
            self.dispose_event_data_reference(data.subdataref)?;
        }
        Ok(())
    }

    fn capture_start(&mut self, slot: Index, data: EventData) -> Result<()> {
        let s = self.action_slots.get_mut(slot)?;
        if s.start_ordpos == 0 {
            s.start_ordpos = data.start_ordpos;
            s.start_origseg = data.start_origseg;
            s.start_origpos = data.start_origpos;
        }
        Ok(())
    }

    fn complete_slot(&mut self, slot: Index, completing_data: EventData, queue: &mut VecDeque<(EventId, EventData)>) -> Result<()> {
        let s = *self.action_slots.get(slot)?;
        let rule = s.rule_ref;
        self.rules.get_mut(rule)?.done = true;
        let rule_data_ref = self.rules.get(rule)?.event_data_ref;

        if let Some(follow_event) = s.follow_event {
            if rule_data_ref != NIL {
                self.reference_event_data(rule_data_ref)?;
            }
            let follow_data = EventData {
                start_origseg: s.start_origseg,
                start_origpos: s.start_origpos,
                end_origseg: completing_data.end_origseg,
                end_origpos: completing_data.end_origpos,
                start_ordpos: s.start_ordpos,
                end_ordpos: completing_data.end_ordpos,
                subdataref: rule_data_ref,
            };
            queue.push_back((follow_event, follow_data));
        }
        if s.result_handle != 0 {
            if rule_data_ref != NIL {
                self.reference_event_data(rule_data_ref)?;
            }
            self.results.push(MatchResult {
                result_handle: s.result_handle,
                event_data_ref: rule_data_ref,
                start_ordpos: s.start_ordpos,
                end_ordpos: completing_data.end_ordpos,
                start_origseg: s.start_origseg,
                start_origpos: s.start_origpos,
                end_origseg: completing_data.end_origseg,
                end_origpos: completing_data.end_origpos,
            });
        }
        Ok(())
    }

    fn deactivate_rule(&mut self, rule: Index) -> Result<()> {
        let r = *self.rules.get(rule)?;
        let refs = self.rule_trigger_refs.to_vec(r.event_trigger_list_head)?;
        for trigger_ref in refs {
            self.trigger_index.remove(trigger_ref)?;
        }
        self.rule_trigger_refs.drain(r.event_trigger_list_head)?;
        if r.event_data_ref != NIL {
            self.dispose_event_data_reference(r.event_data_ref)?;
        }
        self.action_slots.remove(r.action_slot_ref)?;
        self.rules.remove(rule)?;
        Ok(())
    }

    // ---- trigger firing (§4.4.4) -----------------------------------------

    fn fire_signal(&mut self, trigger: Trigger, data: EventData, queue: &mut VecDeque<(EventId, EventData)>, dispose: &mut Vec<Index>) -> Result<()> {
        self.stats.signals_fired += 1;
        let slot = trigger.slot_ref;
        if !self.action_slots.exists(slot) {
            return Ok(());
        }
        let rule = self.action_slots.get(slot)?.rule_ref;

        match trigger.sig_type {
            SigType::Del => {
                dispose.push(rule);
            }
            SigType::Any => {
                let count = self.action_slots.get(slot)?.count;
                if count == 0 {
                    return Ok(());
                }
                self.capture_start(slot, data)?;
                self.bind(rule, trigger, data)?;
                {
                    let s = self.action_slots.get_mut(slot)?;
                    s.count -= 1;
                    s.end_ordpos = data.end_ordpos;
                }
                if self.action_slots.get(slot)?.is_complete() {
                    self.complete_slot(slot, data, queue)?;
                    dispose.push(rule);
                }
            }
            SigType::Sequence | SigType::SequenceImm => {
                let (value, end_ordpos) = {
                    let s = self.action_slots.get(slot)?;
                    (s.value, s.end_ordpos)
                };
                if trigger.sig_val != value || end_ordpos >= data.start_ordpos {
                    return Ok(());
                }
                self.capture_start(slot, data)?;
                self.bind(rule, trigger, data)?;
                {
                    let s = self.action_slots.get_mut(slot)?;
                    s.end_ordpos = data.end_ordpos;
                    s.value -= 1;
                    s.count = s.count.saturating_sub(1);
                }
                if self.action_slots.get(slot)?.is_complete() {
                    self.complete_slot(slot, data, queue)?;
                    dispose.push(rule);
                }
            }
            SigType::Within => {
                let (value, end_ordpos) = {
                    let s = self.action_slots.get(slot)?;
                    (s.value, s.end_ordpos)
                };
                if (trigger.sig_val & value) == 0 || end_ordpos >= data.start_ordpos {
                    return Ok(());
                }
                self.capture_start(slot, data)?;
                self.bind(rule, trigger, data)?;
                {
                    let s = self.action_slots.get_mut(slot)?;
                    s.value &= !trigger.sig_val;
                    s.end_ordpos = data.end_ordpos;
                    s.count = s.count.saturating_sub(1);
                }
                if self.action_slots.get(slot)?.is_complete() {
                    self.complete_slot(slot, data, queue)?;
                    dispose.push(rule);
                }
            }
            SigType::And => {
                let anchor = self.action_slots.get(slot)?.end_ordpos;
                if anchor != 0 && anchor != data.start_ordpos {
                    return Ok(());
                }
                self.capture_start(slot, data)?;
                self.bind(rule, trigger, data)?;
                {
                    let s = self.action_slots.get_mut(slot)?;
                    s.end_ordpos = data.start_ordpos;
                    s.count = s.count.saturating_sub(1);
                }
                if self.action_slots.get(slot)?.is_complete() {
                    self.complete_slot(slot, data, queue)?;
                    dispose.push(rule);
                }
            }
        }
        Ok(())
    }

    // ---- program installation (§4.4.5) -----------------------------------

    fn install_program(
        &mut self,
        program_ref: Index,
        past_event_id: Option<EventId>,
        key_event: EventId,
        data: EventData,
        queue: &mut VecDeque<(EventId, EventData)>,
        dispose: &mut Vec<Index>,
    ) -> Result<()> {
        let program = *self.programs.get(program_ref)?;
        let expiry = data
            .start_ordpos
            .checked_add(program.position_range)
            .ok_or(Error::RangeOverflow { start: data.start_ordpos, range: program.position_range })?;

        let slot_ref = self.action_slots.add(ActionSlot {
            value: program.slot_template.value,
            count: program.slot_template.count,
            follow_event: program.slot_template.follow_event,
            rule_ref: NIL,
            result_handle: program.slot_template.result_handle,
            start_ordpos: 0,
            end_ordpos: 0,
            start_origseg: 0,
            start_origpos: 0,
        });
        let rule_ref = self.rules.add(Rule {
            action_slot_ref: slot_ref,
            event_trigger_list_head: NIL,
            event_data_ref: NIL,
            done: false,
            expiry_ordpos: expiry,
        });
        self.action_slots.get_mut(slot_ref)?.rule_ref = rule_ref;
        self.define_dispose_rule(rule_ref, expiry);

        let defs = self.programs.trigger_defs_of(program_ref)?;
        let mut key_trigger_defs = Vec::new();
        for def in defs {
            if def.event_id == key_event && def.is_key {
                if key_trigger_defs.len() >= 32 {
                    return Err(Error::TooManyKeyTriggers { program: program_ref, max: 32 });
                }
                key_trigger_defs.push(def);
                if def.sig_type == SigType::Any && program.slot_template.count > 1 {
                    self.install_waiting_trigger(rule_ref, slot_ref, def.event_id, def.sig_type, def.sig_val, def.variable_id);
                }
            } else {
                self.install_waiting_trigger(rule_ref, slot_ref, def.event_id, def.sig_type, def.sig_val, def.variable_id);
            }
        }

        if let Some(past_event) = past_event_id {
            self.replay_past_event(rule_ref, slot_ref, program_ref, past_event, queue, dispose)?;
            self.stats.alt_key_programs_installed += 1;
        }

        for def in key_trigger_defs {
            let trigger = Trigger { slot_ref, sig_type: def.sig_type, sig_val: def.sig_val, variable_id: def.variable_id };
            self.fire_signal(trigger, data, queue, dispose)?;
        }

        self.stats.programs_installed += 1;
        Ok(())
    }

    fn install_waiting_trigger(&mut self, rule: Index, slot_ref: Index, event_id: EventId, sig_type: SigType, sig_val: u32, variable_id: u32) {
        let trigger = Trigger { slot_ref, sig_type, sig_val, variable_id };
        let trigger_ref = self.trigger_index.add(event_id, trigger);
        // `rules`/`rule_trigger_refs` were just allocated for this rule by
        // the caller, so these lookups cannot fail.
        let head = self.rules.get(rule).map(|r| r.event_trigger_list_head).unwrap_or(NIL);
        let new_head = self.rule_trigger_refs.push(head, trigger_ref);
        if let Ok(r) = self.rules.get_mut(rule) {
            r.event_trigger_list_head = new_head;
        }
    }

    // ---- past-event replay (§4.5) ----------------------------------------

    fn replay_past_event(
        &mut self,
        rule_ref: Index,
        slot_ref: Index,
        program_ref: Index,
        past_event_id: EventId,
        queue: &mut VecDeque<(EventId, EventData)>,
        dispose: &mut Vec<Index>,
    ) -> Result<()> {
        let Some(&(logged_data, logged_ts)) = self.stopword_log.get(&past_event_id) else {
            return Ok(());
        };
        let program = *self.programs.get(program_ref)?;
        if logged_data.start_ordpos + program.position_range < self.current_pos {
            return Ok(());
        }

        let defs = self.programs.trigger_defs_of(program_ref)?;
        let queue_len_before = queue.len();
        for def in &defs {
            if def.event_id == past_event_id {
                let trigger = Trigger { slot_ref, sig_type: def.sig_type, sig_val: def.sig_val, variable_id: def.variable_id };
                self.fire_signal(trigger, logged_data, queue, dispose)?;
            }
        }
        if queue.len() != queue_len_before {
            return Err(Error::ReplayProducedFollowEvent);
        }

        for def in &defs {
            if def.sig_type == SigType::Del {
                if let Some(&(_, ts)) = self.stopword_log.get(&def.event_id) {
                    if ts > logged_ts {
                        dispose.push(rule_ref);
                    }
                }
            }
        }
        Ok(())
    }

    fn store_stopword_log(&mut self, event_id: EventId, data: EventData) -> Result<()> {
        self.timestamp_counter += 1;
        if let Some((old_data, _)) = self.stopword_log.insert(event_id, (data, self.timestamp_counter)) {
            if old_data.subdataref != NIL {
                self.dispose_event_data_reference(old_data.subdataref)?;
            }
        }
        Ok(())
    }

    // ---- event processing (§4.4.2) ---------------------------------------

    /// Processes one externally fed event, including every follow-event it
    /// transitively produces, before returning.
    pub fn do_transition(&mut self, event_id: EventId, data: EventData) -> Result<()> {
        let mut queue = VecDeque::new();
        queue.push_back((event_id, data));
        while let Some((event_id, data)) = queue.pop_front() {
            self.process_one_event(event_id, data, &mut queue)?;
        }
        Ok(())
    }

    fn process_one_event(&mut self, event_id: EventId, data: EventData, queue: &mut VecDeque<(EventId, EventData)>) -> Result<()> {
        let mut dispose: Vec<Index> = Vec::new();

        let triggers = self.trigger_index.scan(event_id)?;
        for trigger in triggers {
            self.fire_signal(trigger, data, queue, &mut dispose)?;
        }

        let installs = self.programs.event_program_list(event_id)?;
        for program_trigger in installs {
            self.install_program(program_trigger.program, program_trigger.past_event_id, event_id, data, queue, &mut dispose)?;
        }

        for rule in dispose {
            if self.rules.exists(rule) {
                self.deactivate_rule(rule)?;
            }
        }

        if self.programs.is_stopword(event_id) {
            if data.subdataref != NIL {
                self.reference_event_data(data.subdataref)?;
            }
            self.store_stopword_log(event_id, data)?;
        }
        if data.subdataref != NIL {
            self.dispose_event_data_reference(data.subdataref)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotTemplate;

    fn program_table_for(
        op: SigType,
        key_tokens: &[(EventId, u32, bool)],
        range: u32,
        cardinality: u32,
        argc: u32,
    ) -> (ProgramTable, Index) {
        let mut table = ProgramTable::new();
        let (value, count) = match op {
            SigType::Sequence | SigType::SequenceImm => (argc, if cardinality == 0 { argc } else { cardinality }),
            SigType::Within => ((1u32 << argc) - 1, if cardinality == 0 { argc } else { cardinality }),
            SigType::Any => (0, if cardinality == 0 { 1 } else { cardinality }),
            SigType::And => (0, if cardinality == 0 { argc } else { cardinality }),
            SigType::Del => (0, 0),
        };
        let program = table.create_program(range, SlotTemplate { value, count, follow_event: None, result_handle: 0 });
        for &(event, sig_val, is_key) in key_tokens {
            table.create_trigger(program, event, is_key, op, sig_val, 0).unwrap();
        }
        table.define_program_result(program, None, 7).unwrap();
        table.done_program(program).unwrap();
        (table, program)
    }

    #[test]
    fn sequence_completes_within_range() {
        let t1 = EventId::term(1);
        let t2 = EventId::term(2);
        let t3 = EventId::term(3);
        let (table, _) = program_table_for(SigType::Sequence, &[(t1, 3, true), (t2, 2, false), (t3, 1, false)], 3, 0, 3);
        let mut sm = StateMachine::new(&table);

        sm.set_current_pos(1).unwrap();
        sm.do_transition(t1, EventData::at(0, 0, 1, 1)).unwrap();
        sm.set_current_pos(2).unwrap();
        sm.do_transition(t2, EventData::at(0, 1, 1, 2)).unwrap();
        sm.set_current_pos(3).unwrap();
        sm.do_transition(t3, EventData::at(0, 2, 1, 3)).unwrap();

        assert_eq!(sm.results().len(), 1);
        let r = &sm.results()[0];
        assert_eq!((r.start_ordpos, r.end_ordpos), (1, 3));
    }

    #[test]
    fn sequence_expires_out_of_range() {
        let t1 = EventId::term(1);
        let t2 = EventId::term(2);
        let t3 = EventId::term(3);
        let (table, _) = program_table_for(SigType::Sequence, &[(t1, 3, true), (t2, 2, false), (t3, 1, false)], 3, 0, 3);
        let mut sm = StateMachine::new(&table);

        sm.set_current_pos(1).unwrap();
        sm.do_transition(t1, EventData::at(0, 0, 1, 1)).unwrap();
        sm.set_current_pos(2).unwrap();
        sm.do_transition(t2, EventData::at(0, 1, 1, 2)).unwrap();
        sm.set_current_pos(5).unwrap();
        sm.do_transition(t3, EventData::at(0, 2, 1, 5)).unwrap();

        assert!(sm.results().is_empty());
    }

    #[test]
    fn within_is_order_independent() {
        let t1 = EventId::term(1);
        let t2 = EventId::term(2);
        let (table, _) = program_table_for(SigType::Within, &[(t1, 0b01, true), (t2, 0b10, true)], 2, 0, 2);
        let mut sm = StateMachine::new(&table);

        sm.set_current_pos(2).unwrap();
        sm.do_transition(t2, EventData::at(0, 0, 1, 2)).unwrap();
        sm.set_current_pos(3).unwrap();
        sm.do_transition(t1, EventData::at(0, 1, 1, 3)).unwrap();

        assert_eq!(sm.results().len(), 1);
        let r = &sm.results()[0];
        assert_eq!((r.start_ordpos, r.end_ordpos), (2, 3));
    }

    #[test]
    fn within_struct_interrupted_by_delimiter() {
        let delim = EventId::term(1);
        let t1 = EventId::term(2);
        let t2 = EventId::term(3);
        let mut table = ProgramTable::new();
        let program = table.create_program(5, SlotTemplate { value: 0b11, count: 2, follow_event: None, result_handle: 7 });
        table.create_trigger(program, t1, true, SigType::Within, 0b01, 0).unwrap();
        table.create_trigger(program, t2, true, SigType::Within, 0b10, 0).unwrap();
        table.create_trigger(program, delim, false, SigType::Del, 0, 0).unwrap();
        table.done_program(program).unwrap();

        let mut sm = StateMachine::new(&table);
        sm.set_current_pos(1).unwrap();
        sm.do_transition(t1, EventData::at(0, 0, 1, 1)).unwrap();
        sm.set_current_pos(2).unwrap();
        sm.do_transition(delim, EventData::at(0, 1, 1, 2)).unwrap();
        sm.set_current_pos(3).unwrap();
        sm.do_transition(t2, EventData::at(0, 2, 1, 3)).unwrap();

        assert!(sm.results().is_empty());
    }

    #[test]
    fn any_with_cardinality_completes_early() {
        let a = EventId::term(1);
        let b = EventId::term(2);
        let c = EventId::term(3);
        let (table, _) = program_table_for(SigType::Any, &[(a, 0, true), (b, 0, true), (c, 0, true)], 4, 2, 3);
        let mut sm = StateMachine::new(&table);

        sm.set_current_pos(1).unwrap();
        sm.do_transition(a, EventData::at(0, 0, 1, 1)).unwrap();
        sm.set_current_pos(2).unwrap();
        sm.do_transition(c, EventData::at(0, 1, 1, 2)).unwrap();

        assert_eq!(sm.results().len(), 1);
        let r = &sm.results()[0];
        assert_eq!((r.start_ordpos, r.end_ordpos), (1, 2));
    }

    #[test]
    fn optimizer_relink_replays_remembered_stopword() {
        use crate::engine::program_table::OptimizeOptions;

        let stopword = EventId::term(1);
        let rareword = EventId::term(2);

        let mut table = ProgramTable::new();
        table.define_event_frequency(stopword, 1000.0);
        table.define_event_frequency(rareword, 1.0);
        let program = table.create_program(3, SlotTemplate { value: 2, count: 2, follow_event: None, result_handle: 7 });
        table.create_trigger(program, stopword, true, SigType::Sequence, 2, 0).unwrap();
        table.create_trigger(program, rareword, false, SigType::Sequence, 1, 0).unwrap();
        table.done_program(program).unwrap();
        table.optimize(&OptimizeOptions::default()).unwrap();
        assert!(table.is_stopword(stopword));

        // With a remembered stopword occurrence still in reach, installing
        // on the rare alternative key replays it and produces a result.
        let mut sm = StateMachine::new(&table);
        sm.set_current_pos(4).unwrap();
        sm.do_transition(stopword, EventData::at(0, 0, 1, 4)).unwrap();
        sm.set_current_pos(5).unwrap();
        sm.do_transition(rareword, EventData::at(0, 1, 1, 5)).unwrap();
        assert_eq!(sm.results().len(), 1);

        // Without a remembered occurrence, no replay and no result.
        let mut sm2 = StateMachine::new(&table);
        sm2.set_current_pos(1).unwrap();
        sm2.do_transition(rareword, EventData::at(0, 0, 1, 1)).unwrap();
        assert!(sm2.results().is_empty());
    }

    #[test]
    fn clear_resets_every_table() {
        let t1 = EventId::term(1);
        let (table, _) = program_table_for(SigType::Any, &[(t1, 0, true)], 4, 1, 1);
        let mut sm = StateMachine::new(&table);
        sm.set_current_pos(1).unwrap();
        sm.do_transition(t1, EventData::at(0, 0, 1, 1)).unwrap();
        assert_eq!(sm.results().len(), 1);
        sm.clear();
        assert!(sm.results().is_empty());
        assert_eq!(sm.statistics().open_patterns, 0);
    }

    #[test]
    fn rejects_non_monotonic_position() {
        let t1 = EventId::term(1);
        let (table, _) = program_table_for(SigType::Any, &[(t1, 0, true)], 4, 1, 1);
        let mut sm = StateMachine::new(&table);
        sm.set_current_pos(5).unwrap();
        assert!(sm.set_current_pos(3).is_err());
    }
}
