//! Event-trigger index (C1): given an event id, return every trigger
//! waiting on it in one pass.
//!
//! A two-level hash. `event_id mod 16` selects one of 16 buckets; each
//! bucket holds two parallel, densely packed arrays — the event ids waiting
//! in that bucket, and the index into a shared `linked_trigger` pool holding
//! the actual trigger payload plus a reverse link back to
//! `{bucket, position_in_bucket}`, which is what makes `remove` O(1):
//! swap the removed entry with the bucket's tail and patch the displaced
//! entry's reverse link.
//!
//! The event-id arrays are plain `Vec<u32>`, contiguous and packed, so a
//! SIMD-widened equality scan stays a valid refinement of `scan` without
//! changing the layout; this implementation keeps the scalar loop.

use crate::engine::arena::Arena;
use crate::error::Result;
use crate::model::{EventId, Index, Trigger};

const BUCKET_COUNT: usize = 16;

fn bucket_of(event_id: EventId) -> usize {
    (event_id.bits() % BUCKET_COUNT as u32) as usize
}

struct Bucket {
    event_ids: Vec<u32>,
    pool_refs: Vec<Index>,
}

impl Bucket {
    fn new() -> Self {
        Bucket { event_ids: Vec::new(), pool_refs: Vec::new() }
    }
}

/// Pool entry: the trigger payload plus the reverse link used for O(1)
/// swap-remove.
struct LinkedTrigger {
    trigger: Trigger,
    bucket: u16,
    position_in_bucket: u32,
}

/// C1's public type. Owns the bucket arrays and the linked-trigger pool.
pub struct EventTriggerTable {
    buckets: [Bucket; BUCKET_COUNT],
    pool: Arena<LinkedTrigger>,
}

impl Default for EventTriggerTable {
    fn default() -> Self {
        EventTriggerTable {
            buckets: std::array::from_fn(|_| Bucket::new()),
            pool: Arena::new(),
        }
    }
}

impl EventTriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `trigger` as waiting on `event_id`. Returns a stable
    /// `trigger_ref` usable with [`Self::remove`].
    pub fn add(&mut self, event_id: EventId, trigger: Trigger) -> Index {
        let b = bucket_of(event_id);
        let position_in_bucket = self.buckets[b].event_ids.len() as u32;
        let pool_ref = self.pool.add(LinkedTrigger {
            trigger,
            bucket: b as u16,
            position_in_bucket,
        });
        debug_assert!(self.pool.used_size() <= (1 << 30), "trigger table exceeds 2^30 entries");
        self.buckets[b].event_ids.push(event_id.bits());
        self.buckets[b].pool_refs.push(pool_ref);
        pool_ref
    }

    /// Removes the trigger previously returned by [`Self::add`].
    pub fn remove(&mut self, trigger_ref: Index) -> Result<()> {
        let (bucket, position) = {
            let entry = self.pool.get(trigger_ref)?;
            (entry.bucket as usize, entry.position_in_bucket as usize)
        };
        let b = &mut self.buckets[bucket];
        let last = b.event_ids.len() - 1;
        b.event_ids.swap_remove(position);
        b.pool_refs.swap_remove(position);
        if position != last {
            // The entry that used to sit at `last` now sits at `position`;
            // patch its reverse link.
            let moved_ref = b.pool_refs[position];
            self.pool.get_mut(moved_ref)?.position_in_bucket = position as u32;
        }
        self.pool.remove(trigger_ref)
    }

    /// Returns every trigger currently waiting on `event_id`.
    pub fn scan(&self, event_id: EventId) -> Result<Vec<Trigger>> {
        let b = &self.buckets[bucket_of(event_id)];
        let needle = event_id.bits();
        let mut out = Vec::new();
        for (i, &id) in b.event_ids.iter().enumerate() {
            if id == needle {
                out.push(self.pool.get(b.pool_refs[i])?.trigger);
            }
        }
        Ok(out)
    }

    pub fn used_size(&self) -> usize {
        self.pool.used_size()
    }

    pub fn clear(&mut self) {
        for b in &mut self.buckets {
            b.event_ids.clear();
            b.pool_refs.clear();
        }
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SigType;

    fn trig(slot: Index) -> Trigger {
        Trigger { slot_ref: slot, sig_type: SigType::Any, sig_val: 0, variable_id: 0 }
    }

    #[test]
    fn add_scan_remove_round_trip() {
        let mut table = EventTriggerTable::new();
        let e1 = EventId::term(1);
        let e2 = EventId::term(17); // same bucket as e1 (1 mod 16 == 17 mod 16)

        let r1 = table.add(e1, trig(100));
        let r2 = table.add(e2, trig(200));
        let r3 = table.add(e1, trig(300));

        let hits = table.scan(e1).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|t| t.slot_ref == 100));
        assert!(hits.iter().any(|t| t.slot_ref == 300));

        table.remove(r1).unwrap();
        let hits = table.scan(e1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].slot_ref, 300);

        // e2's entry must survive the swap-remove unaffected.
        let hits2 = table.scan(e2).unwrap();
        assert_eq!(hits2.len(), 1);
        assert_eq!(hits2[0].slot_ref, 200);

        table.remove(r2).unwrap();
        table.remove(r3).unwrap();
        assert_eq!(table.used_size(), 0);
    }
}
