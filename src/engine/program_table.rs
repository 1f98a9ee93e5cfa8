//! Program table (C3): the compiled catalogue of programs plus the
//! event-id -> installable-programs index, and the optimiser that rewrites
//! a program's key event when the current one is too frequent.
//!
//! Grounded in `original_source/src/ruleMatcherAutomaton.cpp`'s
//! `ProgramTable` (`createProgram`/`createTrigger`/`doneProgram`/
//! `defineProgramResult`/`defineEventFrequency`/`defineEventProgramAlt`/
//! `optimize`/`getAltEventId`/`calcEventWeight`/`eliminateUnusedEvents`/
//! `getDelimTokenStopWordSet`/`getProgramStatistics`).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::arena::{Arena, StackPool};
use crate::error::Result;
use crate::model::{EventId, Index, Program, ProgramTrigger, ResultHandle, SigType, SlotTemplate, TriggerDef, NIL};

/// Optimiser knobs, matching the compiler-recognised configuration options
/// (§6): `stopwordOccurrenceFactor`, `weightFactor`, `maxRange`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeOptions {
    pub stopword_occurrence_factor: f64,
    pub weight_factor: f64,
    pub max_range: u32,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions { stopword_occurrence_factor: 0.01, weight_factor: 10.0, max_range: 5 }
    }
}

/// Post-optimisation report, mirroring `ProgramTable::Statistics`: the
/// distribution of key-occurrence counts (largest first) and the final
/// stopword set. Purely diagnostic.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub key_event_dist: Vec<i64>,
    pub stopword_set: Vec<EventId>,
    pub programs_relinked: u32,
}

#[derive(Debug, Default)]
pub struct ProgramTable {
    programs: Arena<Program>,
    trigger_defs: StackPool<TriggerDef>,
    program_triggers: StackPool<ProgramTrigger>,
    install_index: FxHashMap<EventId, Index>,
    event_frequency: FxHashMap<EventId, f64>,
    /// How many programs currently treat this event as (one of) their key
    /// event(s). Signed because relinking decrements the event being
    /// abandoned, mirroring `m_keyOccurrenceMap`.
    key_occurrence: FxHashMap<EventId, i64>,
    /// Write-only in the original (`m_eventOccurrenceMap`); kept here as a
    /// diagnostic counter of how often each event appears across all
    /// trigger defs, key or not.
    event_occurrence: FxHashMap<EventId, u32>,
    stopwords: FxHashSet<EventId>,
    total_programs: u32,
}

impl ProgramTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction API (used by the compiler) -----------------------

    pub fn create_program(&mut self, position_range: u32, slot_template: SlotTemplate) -> Index {
        self.programs.add(Program {
            slot_template,
            trigger_def_list_head: NIL,
            position_range,
            done: false,
        })
    }

    pub fn create_trigger(
        &mut self,
        program: Index,
        event_id: EventId,
        is_key: bool,
        sig_type: SigType,
        sig_val: u32,
        variable_id: u32,
    ) -> Result<()> {
        let head = self.programs.get(program)?.trigger_def_list_head;
        let new_head = self.trigger_defs.push(head, TriggerDef { event_id, sig_type, sig_val, variable_id, is_key });
        self.programs.get_mut(program)?.trigger_def_list_head = new_head;
        *self.event_occurrence.entry(event_id).or_insert(0) += 1;
        Ok(())
    }

    pub fn done_program(&mut self, program: Index) -> Result<()> {
        let defs = self.trigger_defs_of(program)?;
        for def in &defs {
            if def.is_key {
                self.define_event_program(def.event_id, program);
            }
        }
        self.programs.get_mut(program)?.done = true;
        Ok(())
    }

    pub fn define_program_result(&mut self, program: Index, follow_event: Option<EventId>, result_handle: ResultHandle) -> Result<()> {
        let slot = &mut self.programs.get_mut(program)?.slot_template;
        slot.follow_event = follow_event;
        slot.result_handle = result_handle;
        Ok(())
    }

    /// Records an externally supplied document-frequency estimate for
    /// `event_id`, used by the optimiser's weight formula. `df` must be
    /// positive.
    pub fn define_event_frequency(&mut self, event_id: EventId, df: f64) {
        debug_assert!(df > 0.0, "document frequency must be positive");
        self.event_frequency.insert(event_id, df);
    }

    // ---- query API (used by the state machine) --------------------------

    pub fn event_program_list(&self, event_id: EventId) -> Result<Vec<ProgramTrigger>> {
        let head = self.install_index.get(&event_id).copied().unwrap_or(NIL);
        self.program_triggers.to_vec(head)
    }

    pub fn is_stopword(&self, event_id: EventId) -> bool {
        self.stopwords.contains(&event_id)
    }

    pub fn get(&self, program: Index) -> Result<&Program> {
        self.programs.get(program)
    }

    pub fn trigger_defs_of(&self, program: Index) -> Result<Vec<TriggerDef>> {
        let head = self.programs.get(program)?.trigger_def_list_head;
        self.trigger_defs.to_vec(head)
    }

    pub fn event_occurrence(&self, event_id: EventId) -> u32 {
        self.event_occurrence.get(&event_id).copied().unwrap_or(0)
    }

    /// Number of key-event installations recorded by `done_program`/
    /// `optimize` so far. Purely diagnostic.
    pub fn total_programs(&self) -> u32 {
        self.total_programs
    }

    // ---- optimiser --------------------------------------------------

    fn define_event_program_alt(&mut self, event_id: EventId, program: Index, past_event_id: Option<EventId>) {
        let head = self.install_index.get(&event_id).copied().unwrap_or(NIL);
        let new_head = self.program_triggers.push(head, ProgramTrigger { program, past_event_id });
        self.install_index.insert(event_id, new_head);
        *self.key_occurrence.entry(event_id).or_insert(0) += 1;
        if let Some(past) = past_event_id {
            *self.key_occurrence.entry(past).or_insert(0) -= 1;
            self.stopwords.insert(past);
        }
    }

    fn define_event_program(&mut self, event_id: EventId, program: Index) {
        self.define_event_program_alt(event_id, program, None);
        self.total_programs += 1;
    }

    /// Clears a program's follow-event if no other program's trigger
    /// actually waits on it; mirrors `eliminateUnusedEvents`.
    fn eliminate_unused_events(&mut self) -> Result<()> {
        let mut used_events: FxHashSet<EventId> = FxHashSet::default();
        let mut programs: FxHashSet<Index> = FxHashSet::default();
        for &head in self.install_index.values() {
            for trigger in self.program_triggers.to_vec(head)? {
                programs.insert(trigger.program);
                for def in self.trigger_defs_of(trigger.program)? {
                    used_events.insert(def.event_id);
                }
            }
        }
        for program in programs {
            let follow = self.programs.get(program)?.slot_template.follow_event;
            if let Some(follow_event) = follow {
                if !used_events.contains(&follow_event) {
                    self.programs.get_mut(program)?.slot_template.follow_event = None;
                }
            }
        }
        Ok(())
    }

    /// Among `program`'s trigger defs, picks a single alternative key
    /// candidate: a `Sequence`/`Within` trigger whose event differs from
    /// `key_event`, disqualified entirely if any `Any` trigger is present
    /// or if surviving candidates mix `Sequence` and `Within`; otherwise the
    /// highest `sig_val` among them wins.
    fn get_alt_event_id(&self, key_event: EventId, program: Index) -> Result<Option<EventId>> {
        let defs = self.trigger_defs_of(program)?;
        if defs.iter().any(|d| d.sig_type == SigType::Any) {
            return Ok(None);
        }
        let mut best: Option<(SigType, u32, EventId)> = None;
        for def in &defs {
            if def.event_id == key_event {
                continue;
            }
            if !matches!(def.sig_type, SigType::Sequence | SigType::Within) {
                continue;
            }
            match best {
                None => best = Some((def.sig_type, def.sig_val, def.event_id)),
                Some((ty, _, _)) if ty != def.sig_type => return Ok(None),
                Some((ty, sigval, _)) if def.sig_val > sigval => best = Some((ty, def.sig_val, def.event_id)),
                Some(_) => {}
            }
        }
        Ok(best.map(|(_, _, event)| event))
    }

    fn calc_event_weight(&self, event_id: EventId) -> f64 {
        let freq = self.event_frequency.get(&event_id).copied().unwrap_or(1.0).max(1.0);
        let key_occ = self.key_occurrence.get(&event_id).copied().unwrap_or(0).max(0) as f64;
        freq * key_occ.max(1.0)
    }

    fn mark_delim_stopwords(&mut self, program: Index) -> Result<()> {
        for def in self.trigger_defs_of(program)? {
            if def.sig_type == SigType::Del {
                self.stopwords.insert(def.event_id);
            }
        }
        Ok(())
    }

    /// Rewrites key events that are too frequent to a rarer alternative,
    /// recording the abandoned event as `past_event_id` so the state
    /// machine can replay it (§4.5).
    pub fn optimize(&mut self, options: &OptimizeOptions) -> Result<Statistics> {
        self.eliminate_unused_events()?;

        let total = self.total_programs as f64;
        let events_to_move: Vec<EventId> = self
            .install_index
            .keys()
            .copied()
            .filter(|e| self.key_occurrence.get(e).copied().unwrap_or(0) as f64 >= total * options.stopword_occurrence_factor)
            .collect();

        let mut relinked = 0u32;
        for event_id in events_to_move {
            let head = match self.install_index.get(&event_id).copied() {
                Some(h) => h,
                None => continue,
            };
            let entries = self.program_triggers.to_vec(head)?;
            self.program_triggers.drain(head)?;
            self.install_index.remove(&event_id);

            let weight = self.calc_event_weight(event_id);
            let mut kept_head = NIL;
            for entry in entries {
                let position_range = self.programs.get(entry.program)?.position_range;
                let relink_target = if entry.past_event_id.is_none() && position_range <= options.max_range {
                    match self.get_alt_event_id(event_id, entry.program)? {
                        Some(alt) if weight > self.calc_event_weight(alt) * options.weight_factor => Some(alt),
                        _ => None,
                    }
                } else {
                    None
                };

                match relink_target {
                    Some(alt) => {
                        self.define_event_program_alt(alt, entry.program, Some(event_id));
                        self.mark_delim_stopwords(entry.program)?;
                        relinked += 1;
                    }
                    None => kept_head = self.program_triggers.push(kept_head, entry),
                }
            }
            if kept_head != NIL {
                self.install_index.insert(event_id, kept_head);
            }
        }

        Ok(Statistics {
            key_event_dist: {
                let mut dist: Vec<i64> = self.install_index.keys().filter_map(|e| self.key_occurrence.get(e).copied()).collect();
                dist.sort_unstable_by(|a, b| b.cmp(a));
                dist
            },
            stopword_set: self.stopwords.iter().copied().collect(),
            programs_relinked: relinked,
        })
    }

    pub fn clear(&mut self) {
        self.programs.clear();
        self.trigger_defs.clear();
        self.program_triggers.clear();
        self.install_index.clear();
        self.event_frequency.clear();
        self.key_occurrence.clear();
        self.event_occurrence.clear();
        self.stopwords.clear();
        self.total_programs = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> SlotTemplate {
        SlotTemplate { value: 2, count: 2, follow_event: None, result_handle: 0 }
    }

    #[test]
    fn relinks_frequent_key_to_rarer_alternative() {
        let mut table = ProgramTable::new();
        let stopword = EventId::term(1);
        let rareword = EventId::term(2);

        table.define_event_frequency(stopword, 1000.0);
        table.define_event_frequency(rareword, 1.0);

        let program = table.create_program(3, template());
        table.create_trigger(program, stopword, true, SigType::Sequence, 2, 0).unwrap();
        table.create_trigger(program, rareword, false, SigType::Sequence, 1, 0).unwrap();
        table.done_program(program).unwrap();

        let stats = table.optimize(&OptimizeOptions::default()).unwrap();
        assert_eq!(stats.programs_relinked, 1);
        assert!(table.is_stopword(stopword));

        let rare_installs = table.event_program_list(rareword).unwrap();
        assert_eq!(rare_installs.len(), 1);
        assert_eq!(rare_installs[0].past_event_id, Some(stopword));

        assert!(table.event_program_list(stopword).unwrap().is_empty());
    }

    #[test]
    fn does_not_relink_when_not_frequent() {
        let mut table = ProgramTable::new();
        let a = EventId::term(1);
        let b = EventId::term(2);
        table.define_event_frequency(a, 2.0);
        table.define_event_frequency(b, 1.0);

        let program = table.create_program(3, template());
        table.create_trigger(program, a, true, SigType::Sequence, 2, 0).unwrap();
        table.create_trigger(program, b, false, SigType::Sequence, 1, 0).unwrap();
        table.done_program(program).unwrap();

        // stopword_occurrence_factor so small only one program exists => 1 >= 1*factor is
        // true for nearly any factor, so raise weight_factor instead to block the relink.
        let opts = OptimizeOptions { weight_factor: 1_000_000.0, ..Default::default() };
        let stats = table.optimize(&opts).unwrap();
        assert_eq!(stats.programs_relinked, 0);
        assert_eq!(table.event_program_list(a).unwrap().len(), 1);
    }
}
