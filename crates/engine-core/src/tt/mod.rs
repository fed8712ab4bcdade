//! Shared transposition table.
//!
//! Entries are published as three `AtomicU64` words where the first word is
//! `key ^ data1 ^ data2`. A probe recomputes the XOR, so an entry torn by a
//! concurrent writer can never validate against the probed key: lost
//! updates are possible, misidentified keys are not. No locks anywhere.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::types::{Bound, Depth, Move, Value, DEPTH_NONE};

const CLUSTER_SIZE: usize = 2;

/// Depth is stored biased so that a zeroed entry reads as vacant.
const DEPTH_BIAS: i32 = 1 - DEPTH_NONE;

/// Decoded entry contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtData {
    pub mv: Move,
    pub value: Value,
    pub eval: Value,
    pub margin: Value,
    pub depth: Depth,
    pub bound: Bound,
}

struct Entry {
    check: AtomicU64,
    data1: AtomicU64,
    data2: AtomicU64,
}

impl Entry {
    const fn new() -> Entry {
        Entry {
            check: AtomicU64::new(0),
            data1: AtomicU64::new(0),
            data2: AtomicU64::new(0),
        }
    }

    /// (data1, data2, generation-and-occupancy) snapshot.
    fn load(&self) -> (u64, u64) {
        (self.data1.load(Ordering::Relaxed), self.data2.load(Ordering::Relaxed))
    }

    fn matches(&self, key: u64) -> Option<(u64, u64)> {
        let (d1, d2) = self.load();
        if d2 != 0 && self.check.load(Ordering::Relaxed) == key ^ d1 ^ d2 {
            Some((d1, d2))
        } else {
            None
        }
    }

    fn store(&self, key: u64, d1: u64, d2: u64) {
        self.check.store(key ^ d1 ^ d2, Ordering::Relaxed);
        self.data1.store(d1, Ordering::Relaxed);
        self.data2.store(d2, Ordering::Relaxed);
    }

    fn is_vacant(&self) -> bool {
        self.data2.load(Ordering::Relaxed) == 0
    }

    fn depth8(&self) -> i32 {
        decode2(self.data2.load(Ordering::Relaxed)).0
    }

    fn generation(&self) -> u8 {
        decode2(self.data2.load(Ordering::Relaxed)).2
    }
}

fn encode1(mv: Move, value: Value, eval: Value, margin: Value) -> u64 {
    (mv.raw() as u64)
        | ((value.raw() as i16 as u16 as u64) << 16)
        | ((eval.raw() as i16 as u16 as u64) << 32)
        | ((margin.raw() as i16 as u16 as u64) << 48)
}

fn decode1(d1: u64) -> (Move, Value, Value, Value) {
    (
        Move::from_raw(d1 as u16),
        Value::new((d1 >> 16) as u16 as i16 as i32),
        Value::new((d1 >> 32) as u16 as i16 as i32),
        Value::new((d1 >> 48) as u16 as i16 as i32),
    )
}

fn encode2(depth: Depth, bound: Bound, generation: u8) -> u64 {
    debug_assert!(depth >= DEPTH_NONE);
    ((depth + DEPTH_BIAS) as u16 as u64) | ((bound.bits() as u64) << 16) | ((generation as u64) << 24)
}

fn decode2(d2: u64) -> (Depth, Bound, u8) {
    ((d2 as u16 as i32) - DEPTH_BIAS, Bound::from_bits((d2 >> 16) as u8), (d2 >> 24) as u8)
}

#[repr(align(64))]
struct Cluster {
    entries: [Entry; CLUSTER_SIZE],
}

impl Cluster {
    const fn new() -> Cluster {
        Cluster {
            entries: [Entry::new(), Entry::new()],
        }
    }
}

/// Fixed-size associative cache keyed by Zobrist keys.
pub struct TranspositionTable {
    clusters: Vec<Cluster>,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocate a table of roughly `mb` mebibytes.
    pub fn new(mb: usize) -> TranspositionTable {
        let bytes = mb.max(1) * 1024 * 1024;
        let count = (bytes / std::mem::size_of::<Cluster>()).max(1);
        let mut clusters = Vec::with_capacity(count);
        clusters.resize_with(count, Cluster::new);
        log::debug!("transposition table: {count} clusters, {} entries", count * CLUSTER_SIZE);
        TranspositionTable {
            clusters,
            generation: AtomicU8::new(0),
        }
    }

    pub fn resize(&mut self, mb: usize) {
        *self = TranspositionTable::new(mb);
    }

    pub fn clear(&mut self) {
        for cluster in &mut self.clusters {
            *cluster = Cluster::new();
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Bump the generation; called once per `go`.
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    fn cluster_for(&self, key: u64) -> &Cluster {
        let index = ((key as u128 * self.clusters.len() as u128) >> 64) as usize;
        &self.clusters[index]
    }

    pub fn probe(&self, key: u64) -> Option<TtData> {
        let cluster = self.cluster_for(key);
        for entry in &cluster.entries {
            if let Some((d1, d2)) = entry.matches(key) {
                let (mv, value, eval, margin) = decode1(d1);
                let (depth, bound, _) = decode2(d2);
                return Some(TtData {
                    mv,
                    value,
                    eval,
                    margin,
                    depth,
                    bound,
                });
            }
        }
        None
    }

    /// Refresh the generation of an existing entry so it survives aging.
    pub fn refresh(&self, key: u64) {
        let generation = self.generation();
        let cluster = self.cluster_for(key);
        for entry in &cluster.entries {
            if let Some((d1, d2)) = entry.matches(key) {
                let (depth, bound, _) = decode2(d2);
                entry.store(key, d1, encode2(depth, bound, generation));
                return;
            }
        }
    }

    pub fn store(
        &self,
        key: u64,
        value: Value,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        margin: Value,
    ) {
        let generation = self.generation();
        let cluster = self.cluster_for(key);

        // Same-key slot wins; otherwise evict the shallowest, oldest entry.
        let mut victim = &cluster.entries[0];
        let mut victim_score = i32::MAX;
        for entry in &cluster.entries {
            if entry.is_vacant() {
                victim = entry;
                victim_score = i32::MIN;
                continue;
            }
            if let Some((d1, _)) = entry.matches(key) {
                // Keep the known best move when the new search found none.
                let mv = if mv.is_none() { decode1(d1).0 } else { mv };
                entry.store(
                    key,
                    encode1(mv, value, eval, margin),
                    encode2(depth, bound, generation),
                );
                return;
            }
            let age = generation.wrapping_sub(entry.generation()) as i32;
            let score = entry.depth8() - 8 * age;
            if score < victim_score {
                victim = entry;
                victim_score = score;
            }
        }

        victim.store(key, encode1(mv, value, eval, margin), encode2(depth, bound, generation));
    }

    /// Permille of sampled entries belonging to the current generation.
    pub fn hashfull(&self) -> u32 {
        let generation = self.generation();
        let sample = self.clusters.len().min(500);
        let mut filled = 0;
        for cluster in self.clusters.iter().take(sample) {
            for entry in &cluster.entries {
                if !entry.is_vacant() && entry.generation() == generation {
                    filled += 1;
                }
            }
        }
        (filled * 1000 / (sample * CLUSTER_SIZE)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ONE_PLY;

    fn data(tt: &TranspositionTable, key: u64) -> TtData {
        tt.probe(key).expect("entry should be present")
    }

    #[test]
    fn store_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let mv = Move::from_raw(0x1234);
        tt.store(42, Value::new(17), Bound::Exact, 6 * ONE_PLY, mv, Value::new(3), Value::ZERO);

        let e = data(&tt, 42);
        assert_eq!(e.mv, mv);
        assert_eq!(e.value, Value::new(17));
        assert_eq!(e.eval, Value::new(3));
        assert_eq!(e.margin, Value::ZERO);
        assert_eq!(e.depth, 6 * ONE_PLY);
        assert_eq!(e.bound, Bound::Exact);
        assert!(tt.probe(43).is_none());
    }

    #[test]
    fn negative_values_roundtrip() {
        let tt = TranspositionTable::new(1);
        tt.store(
            7,
            Value::new(-31990),
            Bound::Upper,
            DEPTH_NONE,
            Move::NONE,
            Value::new(-250),
            Value::new(-1),
        );
        let e = data(&tt, 7);
        assert_eq!(e.value, Value::new(-31990));
        assert_eq!(e.eval, Value::new(-250));
        assert_eq!(e.margin, Value::new(-1));
        assert_eq!(e.depth, DEPTH_NONE);
        assert_eq!(e.bound, Bound::Upper);
    }

    #[test]
    fn same_key_store_keeps_old_move_when_none() {
        let tt = TranspositionTable::new(1);
        let mv = Move::from_raw(0x0842);
        tt.store(9, Value::new(5), Bound::Lower, 4, mv, Value::ZERO, Value::ZERO);
        tt.store(9, Value::new(8), Bound::Exact, 6, Move::NONE, Value::ZERO, Value::ZERO);
        let e = data(&tt, 9);
        assert_eq!(e.mv, mv);
        assert_eq!(e.value, Value::new(8));
        assert_eq!(e.depth, 6);
    }

    #[test]
    fn torn_entry_never_validates() {
        let tt = TranspositionTable::new(1);
        tt.store(0xABCD, Value::new(1), Bound::Exact, 4, Move::from_raw(1), Value::ZERO, Value::ZERO);

        // Corrupt one word of the matching cluster, simulating a half
        // finished concurrent write.
        let cluster = tt.cluster_for(0xABCD);
        for entry in &cluster.entries {
            if !entry.is_vacant() {
                entry.data1.fetch_add(1, Ordering::Relaxed);
            }
        }
        assert!(tt.probe(0xABCD).is_none());
    }

    #[test]
    fn eviction_prefers_shallow_and_old() {
        let tt = TranspositionTable::new(1);
        // Two keys mapping to the same cluster; with multiply-high
        // indexing, keys close together map to the same cluster.
        let base = 1u64 << 32;
        tt.store(base, Value::new(1), Bound::Exact, 20, Move::from_raw(1), Value::ZERO, Value::ZERO);
        tt.store(base + 1, Value::new(2), Bound::Exact, 2, Move::from_raw(2), Value::ZERO, Value::ZERO);
        // A third key in the same cluster should evict the shallow entry.
        tt.store(base + 2, Value::new(3), Bound::Exact, 10, Move::from_raw(3), Value::ZERO, Value::ZERO);
        assert!(tt.probe(base).is_some(), "deep entry survived");
        assert!(tt.probe(base + 1).is_none(), "shallow entry evicted");
        assert!(tt.probe(base + 2).is_some());
    }

    #[test]
    fn clear_and_new_search() {
        let mut tt = TranspositionTable::new(1);
        tt.store(5, Value::new(1), Bound::Exact, 2, Move::from_raw(7), Value::ZERO, Value::ZERO);
        assert!(tt.hashfull() <= 1000);
        tt.new_search();
        tt.clear();
        assert!(tt.probe(5).is_none());
        assert_eq!(tt.hashfull(), 0);
    }
}
