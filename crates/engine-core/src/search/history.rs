//! Quiet-move ordering statistics, shared by all workers.
//!
//! Updates race across threads; the tables are atomics with relaxed
//! ordering, so a lost increment costs a little ordering quality and
//! nothing else.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::types::{Color, Move, PieceKind, Square, Value};

/// Cap so repeated cutoffs cannot run away.
const HISTORY_MAX: i32 = 2000;

/// Per (colored piece, destination square) statistics: cutoff history for
/// move ordering and static-eval gains for futility pruning.
pub struct History {
    table: Vec<AtomicI32>,
    gains: Vec<AtomicI32>,
}

#[inline]
fn index(color: Color, kind: PieceKind, to: Square) -> usize {
    (color.index() * 6 + kind.index()) * 64 + to.index()
}

impl History {
    pub fn new() -> History {
        let mut table = Vec::with_capacity(12 * 64);
        let mut gains = Vec::with_capacity(12 * 64);
        table.resize_with(12 * 64, || AtomicI32::new(0));
        gains.resize_with(12 * 64, || AtomicI32::new(0));
        History { table, gains }
    }

    pub fn clear(&self) {
        for slot in self.table.iter().chain(self.gains.iter()) {
            slot.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn value(&self, color: Color, kind: PieceKind, to: Square) -> i32 {
        self.table[index(color, kind, to)].load(Ordering::Relaxed)
    }

    /// Add `bonus` (possibly negative), saturating at `HISTORY_MAX`.
    pub fn update(&self, color: Color, kind: PieceKind, to: Square, bonus: i32) {
        let slot = &self.table[index(color, kind, to)];
        let current = slot.load(Ordering::Relaxed);
        if (current + bonus).abs() < HISTORY_MAX {
            slot.store(current + bonus, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn gain(&self, color: Color, kind: PieceKind, to: Square) -> Value {
        Value::new(self.gains[index(color, kind, to)].load(Ordering::Relaxed))
    }

    /// Record the static-eval swing of a quiet move, decaying slowly.
    pub fn update_gain(&self, color: Color, kind: PieceKind, to: Square, gain: Value) {
        let slot = &self.gains[index(color, kind, to)];
        let current = slot.load(Ordering::Relaxed);
        slot.store(gain.raw().max(current - 1), Ordering::Relaxed);
    }

    /// History bonus for a cutoff at `depth`, and the malus applied to the
    /// quiets searched before it.
    #[inline]
    pub fn cutoff_bonus(depth: crate::types::Depth) -> i32 {
        depth * depth
    }

    /// Register `best` as the cutoff move and demote the other searched
    /// quiets.
    pub fn update_after_cutoff(
        &self,
        board: &crate::board::Board,
        best: Move,
        depth: crate::types::Depth,
        searched_quiets: &[Move],
    ) {
        let us = board.side_to_move();
        let bonus = Self::cutoff_bonus(depth);

        if let Some(kind) = board.piece_on(best.source()) {
            self.update(us, kind, best.dest(), bonus);
        }
        for &mv in searched_quiets {
            if mv == best {
                continue;
            }
            if let Some(kind) = board.piece_on(mv.source()) {
                self.update(us, kind, mv.dest(), -bonus);
            }
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_and_read() {
        let h = History::new();
        h.update(Color::White, PieceKind::Knight, Square::E1, 25);
        assert_eq!(h.value(Color::White, PieceKind::Knight, Square::E1), 25);
        assert_eq!(h.value(Color::Black, PieceKind::Knight, Square::E1), 0);

        h.update(Color::White, PieceKind::Knight, Square::E1, -40);
        assert_eq!(h.value(Color::White, PieceKind::Knight, Square::E1), -15);
    }

    #[test]
    fn saturates_at_cap() {
        let h = History::new();
        for _ in 0..100 {
            h.update(Color::White, PieceKind::Queen, Square::A1, 100);
        }
        assert!(h.value(Color::White, PieceKind::Queen, Square::A1) < HISTORY_MAX);
    }

    #[test]
    fn gain_decays_toward_new_values() {
        let h = History::new();
        h.update_gain(Color::White, PieceKind::Rook, Square::D1, Value::new(50));
        assert_eq!(h.gain(Color::White, PieceKind::Rook, Square::D1), Value::new(50));
        // A worse gain only lowers the stored value by one step.
        h.update_gain(Color::White, PieceKind::Rook, Square::D1, Value::new(-100));
        assert_eq!(h.gain(Color::White, PieceKind::Rook, Square::D1), Value::new(49));
    }

    #[test]
    fn clear_resets_everything() {
        let h = History::new();
        h.update(Color::White, PieceKind::Pawn, Square::E2, 10);
        h.update_gain(Color::White, PieceKind::Pawn, Square::E2, Value::new(9));
        h.clear();
        assert_eq!(h.value(Color::White, PieceKind::Pawn, Square::E2), 0);
        assert_eq!(h.gain(Color::White, PieceKind::Pawn, Square::E2), Value::ZERO);
    }
}
