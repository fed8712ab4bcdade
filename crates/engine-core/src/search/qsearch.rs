//! Quiescence search: resolve captures and checks so the leaf evaluation
//! is quiet. No null move, no internal iterative deepening, no reductions
//! and no split points down here.

use std::sync::Arc;

use super::alpha_beta::{can_return_tt, idx, value_from_tt, value_to_tt, Worker};
use super::movepicker::MovePicker;
use super::params::FUTILITY_MARGIN_QS;
use crate::board::attacks;
use crate::board::Board;
use crate::position::Position;
use crate::types::{
    Bitboard, Bound, CastleRights, Color, Depth, Move, PieceKind, Square, Value, DEPTH_NONE,
    DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, MAX_PLY, ONE_PLY, PAWN_VALUE_ENDGAME,
    PAWN_VALUE_MIDGAME, ROOK_VALUE_MIDGAME,
};

impl Worker {
    /// Quiescence search; `depth` is zero or negative.
    pub fn qsearch(
        &mut self,
        pos: &mut Position,
        pv_node: bool,
        mut alpha: Value,
        beta: Value,
        depth: Depth,
        ply: i32,
    ) -> Value {
        debug_assert!(alpha >= -Value::INFINITE && alpha < beta && beta <= Value::INFINITE);
        debug_assert!(pv_node || alpha == beta - 1);
        debug_assert!(depth <= 0);

        let ctx = Arc::clone(&self.ctx);
        let old_alpha = alpha;

        self.stack[idx(ply)].ply = ply;
        self.stack[idx(ply)].current_move = Move::NONE;
        self.stack[idx(ply)].best_move = Move::NONE;
        self.count_node();
        if pv_node {
            ctx.observe_ply(self.id, ply);
        }

        // Draws and the ply ceiling. Repetitions are left to the main
        // search; the tactical tail is too short to cycle.
        if pos.is_draw(false) || ply > MAX_PLY {
            return Value::DRAW;
        }

        // Checks are generated only at the entry distance; the choice also
        // fixes which table depth class this node belongs to.
        let in_check = pos.in_check();
        let tt_depth =
            if in_check || depth >= DEPTH_QS_CHECKS { DEPTH_QS_CHECKS } else { DEPTH_QS_NO_CHECKS };

        let pos_key = pos.key();
        let tte = ctx.tt.probe(pos_key);
        let tt_move = tte.map_or(Move::NONE, |t| t.mv);

        if !pv_node {
            if let Some(t) = tte {
                if can_return_tt(&t, tt_depth, beta, ply) {
                    self.stack[idx(ply)].best_move = tt_move;
                    return value_from_tt(t.value, ply);
                }
            }
        }

        // Stand pat.
        let mut best_value;
        let futility_base;
        let enough_material;
        let eval_margin;

        if in_check {
            best_value = -Value::INFINITE;
            futility_base = -Value::INFINITE;
            eval_margin = Value::NONE;
            enough_material = false;
            self.stack[idx(ply)].eval = Value::NONE;
            self.stack[idx(ply)].eval_margin = Value::NONE;
        } else {
            let (eval, margin) = match tte.filter(|t| t.eval != Value::NONE) {
                Some(t) => (t.eval, t.margin),
                None => crate::eval::evaluate(pos.board()),
            };
            self.stack[idx(ply)].eval = eval;
            self.stack[idx(ply)].eval_margin = margin;
            best_value = eval;
            eval_margin = margin;

            if best_value >= beta {
                if tte.is_none() {
                    ctx.tt.store(
                        pos_key,
                        value_to_tt(best_value, ply),
                        Bound::Lower,
                        DEPTH_NONE,
                        Move::NONE,
                        eval,
                        margin,
                    );
                }
                return best_value;
            }

            if pv_node && best_value > alpha {
                alpha = best_value;
            }

            futility_base = eval + eval_margin + FUTILITY_MARGIN_QS;
            enough_material = pos.non_pawn_material(pos.side_to_move()) > ROOK_VALUE_MIDGAME;
        }

        let mut picker = MovePicker::new_qsearch(pos.board(), tt_move, depth, &ctx.history);

        loop {
            if best_value >= beta {
                break;
            }
            let mv = picker.next_move();
            if mv.is_none() {
                break;
            }

            let gives_check = pos.gives_check(mv);

            // Futility: the capture plus margin still cannot reach beta.
            if !pv_node
                && !in_check
                && !gives_check
                && mv != tt_move
                && enough_material
                && !mv.is_promotion()
                && !pos.board().is_passed_pawn_push(mv)
            {
                let victim = pos
                    .board()
                    .piece_on(mv.dest())
                    .map_or(Value::ZERO, |k| k.endgame_value());
                let ep_bonus =
                    if mv.is_en_passant() { PAWN_VALUE_ENDGAME } else { Value::ZERO };
                let futility_value = futility_base + victim + ep_bonus;

                if futility_value < beta {
                    best_value = best_value.max(futility_value);
                    continue;
                }

                // Break-even exchanges cannot beat beta either once the
                // stand pat is below it.
                if futility_base < beta && depth < 0 && pos.see(mv) <= 0 {
                    continue;
                }
            }

            // Prunable evasions: quiet responses to a check that lose
            // material cannot rescue a position already above mate-level.
            let evasion_prunable = !pv_node
                && in_check
                && best_value > Value::MATED_IN_MAX_PLY
                && !pos.is_capture(mv)
                && !can_castle(pos.board());

            if !pv_node
                && (!in_check || evasion_prunable)
                && mv != tt_move
                && !mv.is_promotion()
                && pos.see_sign(mv) < 0
            {
                continue;
            }

            // Checks with no tactical bite are skipped wholesale.
            if !pv_node
                && !in_check
                && gives_check
                && mv != tt_move
                && !pos.is_capture_or_promotion(mv)
                && self.stack[idx(ply)].eval + PAWN_VALUE_MIDGAME / 4 < beta
                && !check_is_dangerous(pos.board(), mv, futility_base, beta, &mut best_value)
            {
                let bound = self.stack[idx(ply)].eval + PAWN_VALUE_MIDGAME / 4;
                if bound > best_value {
                    best_value = bound;
                }
                continue;
            }

            self.stack[idx(ply)].current_move = mv;
            pos.do_move(mv);
            let value = -self.qsearch(pos, pv_node, -beta, -alpha, depth - ONE_PLY, ply + 1);
            pos.undo_move();

            debug_assert!(value > -Value::INFINITE && value < Value::INFINITE);

            if value > best_value {
                best_value = value;
                self.stack[idx(ply)].best_move = mv;

                if pv_node && value > alpha && value < beta {
                    alpha = value;
                }
            }
        }

        // A checkmate: no evasion raised the initial -INFINITE.
        if in_check && best_value == -Value::INFINITE {
            return Value::mated_in(ply);
        }

        let best_move = self.stack[idx(ply)].best_move;
        let stored_move = if best_value <= old_alpha { Move::NONE } else { best_move };
        let bound = if best_value <= old_alpha {
            Bound::Upper
        } else if best_value >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        ctx.tt.store(
            pos_key,
            value_to_tt(best_value, ply),
            bound,
            tt_depth,
            stored_move,
            self.stack[idx(ply)].eval,
            eval_margin,
        );

        debug_assert!(best_value > -Value::INFINITE && best_value < Value::INFINITE);
        best_value
    }
}

fn can_castle(board: &Board) -> bool {
    let rights = match board.side_to_move() {
        Color::White => CastleRights::WHITE_BOTH,
        Color::Black => CastleRights::BLACK_BOTH,
    };
    board.castling().intersects(rights)
}

fn piece_attacks(kind: PieceKind, color: Color, sq: Square, occ: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Pawn => attacks::pawn_attacks(color, sq),
        PieceKind::Knight => attacks::knight_attacks(sq),
        PieceKind::Bishop => attacks::bishop_attacks(sq, occ),
        PieceKind::Rook => attacks::rook_attacks(sq, occ),
        PieceKind::Queen => attacks::bishop_attacks(sq, occ) | attacks::rook_attacks(sq, occ),
        PieceKind::King => attacks::king_attacks(sq),
    }
}

/// Three-rule filter for checking moves in quiescence. A check passes when
/// it nearly smothers the king, is a queen contact check, or newly attacks
/// a victim worth enough to beat beta. When the check is pruned instead,
/// the best futility estimate seen is folded into `best_value`.
pub fn check_is_dangerous(
    board: &Board,
    mv: Move,
    futility_base: Value,
    beta: Value,
    best_value: &mut Value,
) -> bool {
    let from = mv.source();
    let to = mv.dest();
    let them = board.side_to_move().flip();
    let ksq = board.king_square(them);
    let king_zone = attacks::king_attacks(ksq);
    let Some(kind) = board.piece_on(from) else {
        return false;
    };
    let us = board.side_to_move();

    let occ = board.occupied().without(from).without(ksq);
    let old_attacks = piece_attacks(kind, us, from, occ);
    let new_attacks = piece_attacks(kind, us, to, occ);

    // Rule 1: the king has at most one flight square left.
    let escapes = king_zone & !board.side(them) & !new_attacks & !to.bitboard();
    if escapes.at_most_one() {
        return true;
    }

    // Rule 2: queen contact check.
    if kind == PieceKind::Queen && king_zone.contains(to) {
        return true;
    }

    // Rule 3: the checking move forks a new victim worth enough.
    let mut bv = *best_value;
    let victims = board.side(them) & new_attacks & !old_attacks & !ksq.bitboard();
    for victim_sq in victims {
        let victim_value = board
            .piece_on(victim_sq)
            .map_or(Value::ZERO, |k| k.endgame_value());
        let futility_value = futility_base + victim_value;

        if futility_value >= beta
            && crate::board::see_sign(board, Move::new(from, victim_sq)) >= 0
        {
            return true;
        }
        if futility_value > bv {
            bv = futility_value;
        }
    }

    *best_value = bv;
    false
}
