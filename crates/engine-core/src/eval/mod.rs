//! Static evaluation: material and piece-square tables with game-phase
//! interpolation.
//!
//! The score is exactly antisymmetric under color flip, which the search
//! relies on for negamax.

mod pst;

use crate::board::Board;
use crate::types::{
    Color, PieceKind, Square, Value, PIECE_VALUE_ENDGAME, PIECE_VALUE_MIDGAME,
};

/// Phase weights per piece kind; the total for the starting position
/// defines the midgame end of the interpolation.
const PHASE_WEIGHT: [i32; 6] = [0, 1, 1, 2, 4, 0];
const PHASE_TOTAL: i32 = 24;

/// Side-to-move bonus, applied before interpolation.
const TEMPO: i32 = 10;

/// Evaluate from the side to move's point of view.
///
/// The second element is the evaluation uncertainty margin; this evaluator
/// is deterministic material counting, so the margin is zero. It still
/// travels with the score through the transposition table and the futility
/// margins of the search.
pub fn evaluate(board: &Board) -> (Value, Value) {
    let mut mg = 0i32;
    let mut eg = 0i32;
    let mut phase = 0i32;

    for color in Color::ALL {
        let sign = if color == Color::White { 1 } else { -1 };
        for kind in PieceKind::ALL {
            for sq in board.pieces_of(color, kind) {
                let idx = pst_index(color, sq);
                let (pst_mg, pst_eg) = pst_for(kind)[idx];
                mg += sign * (PIECE_VALUE_MIDGAME[kind.index()].raw() + pst_mg);
                eg += sign * (PIECE_VALUE_ENDGAME[kind.index()].raw() + pst_eg);
                phase += PHASE_WEIGHT[kind.index()];
            }
        }
    }

    // White's point of view so far; flip to the mover's.
    if board.side_to_move() == Color::Black {
        mg = -mg;
        eg = -eg;
    }
    mg += TEMPO;
    eg += TEMPO;

    let phase = phase.min(PHASE_TOTAL);
    let score = (mg * phase + eg * (PHASE_TOTAL - phase)) / PHASE_TOTAL;

    (Value::new(score), Value::ZERO)
}

#[inline]
fn pst_for(kind: PieceKind) -> &'static [pst::PstPair; 64] {
    match kind {
        PieceKind::Pawn => &pst::PAWN,
        PieceKind::Knight => &pst::KNIGHT,
        PieceKind::Bishop => &pst::BISHOP,
        PieceKind::Rook => &pst::ROOK,
        PieceKind::Queen => &pst::QUEEN,
        PieceKind::King => &pst::KING,
    }
}

/// Table index for a piece of `color` on `sq`; Black mirrors the ranks.
#[inline]
fn pst_index(color: Color, sq: Square) -> usize {
    match color {
        Color::White => sq.index(),
        Color::Black => sq.index() ^ 56,
    }
}
