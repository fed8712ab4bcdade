//! Skill-level handicap: pick a plausible sub-optimal move from the
//! multi-PV set.

use rand::Rng;

use super::params::EASY_MOVE_MARGIN;
use super::root::RootMoves;
use crate::types::{Move, Value, PAWN_VALUE_MIDGAME};

/// Levels run 0..20; 20 disables the handicap.
#[derive(Debug, Clone, Copy)]
pub struct Skill {
    pub level: i32,
}

impl Skill {
    pub fn new(level: i32) -> Skill {
        Skill {
            level: level.clamp(0, 20),
        }
    }

    pub fn enabled(self) -> bool {
        self.level < 20
    }

    /// The iteration after which the handicapped move is chosen.
    pub fn time_to_pick(self, depth: i32) -> bool {
        depth == 1 + self.level
    }

    /// Choose among the top `multi_pv` root moves. Weaker moves get a
    /// deterministic push plus a random one, both scaled by the handicap;
    /// the best adjusted score wins. Moves more than a clear margin behind
    /// the previous candidate are never picked.
    ///
    /// Returns the chosen move and its ponder reply, when the PV has one.
    pub fn pick<R: Rng + ?Sized>(
        self,
        root_moves: &RootMoves,
        multi_pv: usize,
        rng: &mut R,
    ) -> (Move, Move) {
        if root_moves.is_empty() || multi_pv == 0 {
            return (Move::NONE, Move::NONE);
        }

        let size = multi_pv.min(root_moves.len());
        let best_score = root_moves[0].score;
        let variance = (best_score - root_moves[size - 1].score).raw().min(PAWN_VALUE_MIDGAME.raw());
        let weakness = (120 - 2 * self.level).max(1) as u32;

        let mut max_adjusted = -Value::INFINITE.raw();
        let mut choice = &root_moves[0];

        for i in 0..size {
            let rm = &root_moves[i];

            // No outright blunders at any level.
            if i > 0 && root_moves[i - 1].score > rm.score + EASY_MOVE_MARGIN {
                break;
            }

            let s = rm.score.raw();
            let push = ((best_score.raw() - s) * weakness as i32
                + variance * (rng.random::<u32>() % weakness) as i32)
                / 128;
            let adjusted = s + push;

            if adjusted > max_adjusted {
                max_adjusted = adjusted;
                choice = rm;
            }
        }

        let ponder = choice.pv.get(1).copied().unwrap_or(Move::NONE);
        (choice.mv, ponder)
    }
}
