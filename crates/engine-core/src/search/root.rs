//! Iterative deepening driver: aspiration windows, multi-PV bookkeeping,
//! easy-move detection and time-based stop decisions.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::Rng;
use smallvec::{smallvec, SmallVec};

use super::alpha_beta::Worker;
use super::params::EASY_MOVE_MARGIN;
use super::skill::Skill;
use super::{NodeKind, SearchContext};
use crate::board::generate_legal_moves;
use crate::position::Position;
use crate::tt::TranspositionTable;
use crate::types::{Bound, Depth, Move, Value, DEPTH_NONE, MAX_PLY, ONE_PLY};

/// Which side of the aspiration window a reported score sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Exact,
    Lower,
    Upper,
}

/// Search progress reported to the front-end.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Iteration {
        depth: i32,
        seldepth: u32,
        multipv: u32,
        score: Value,
        bound: ScoreBound,
        nodes: u64,
        nps: u64,
        time_ms: u64,
        pv: Vec<Move>,
    },
    CurrMove {
        depth: i32,
        mv: Move,
        number: u32,
    },
}

pub type InfoSink = Arc<dyn Fn(InfoEvent) + Send + Sync>;

/// Outcome of a completed `think`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: Move,
    pub ponder_move: Move,
}

/// One root move with its running score and principal variation.
#[derive(Debug, Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Value,
    pub prev_score: Value,
    /// Nodes spent below this move in the current iteration.
    pub nodes: u64,
    pub pv: SmallVec<[Move; 8]>,
}

impl RootMove {
    pub fn new(mv: Move) -> RootMove {
        RootMove {
            mv,
            score: -Value::INFINITE,
            prev_score: -Value::INFINITE,
            nodes: 0,
            pv: smallvec![mv],
        }
    }

    /// Rebuild the PV by walking transposition entries from this move.
    /// Fail-high entries count too, so there is usually a ponder move
    /// even right after an aspiration fail.
    pub fn extract_pv_from_tt(&mut self, pos: &mut Position, tt: &TranspositionTable) {
        self.pv.clear();
        self.pv.push(self.mv);
        pos.do_move(self.mv);
        let mut made = 1;

        while let Some(t) = tt.probe(pos.key()) {
            let mv = t.mv;
            if !mv.is_some()
                || !pos.is_legal(mv)
                || made >= MAX_PLY
                || (pos.is_draw(true) && made >= 2)
            {
                break;
            }
            self.pv.push(mv);
            pos.do_move(mv);
            made += 1;
        }

        for _ in 0..made {
            pos.undo_move();
        }
    }

    /// Reinsert the PV into the table so it is searched first next
    /// iteration even if its entries were overwritten.
    pub fn insert_pv_in_tt(&self, pos: &mut Position, tt: &TranspositionTable) {
        let mut made = 0;

        for &mv in &self.pv {
            let key = pos.key();
            let stale = tt.probe(key).map_or(true, |t| t.mv != mv);
            if stale {
                let (eval, margin) = if pos.in_check() {
                    (Value::NONE, Value::NONE)
                } else {
                    crate::eval::evaluate(pos.board())
                };
                tt.store(key, Value::NONE, Bound::None, DEPTH_NONE, mv, eval, margin);
            }
            pos.do_move(mv);
            made += 1;
        }

        for _ in 0..made {
            pos.undo_move();
        }
    }
}

/// The ordered root move list.
#[derive(Debug, Clone, Default)]
pub struct RootMoves {
    moves: Vec<RootMove>,
}

impl RootMoves {
    /// All legal moves, optionally restricted by `searchmoves`.
    pub fn init(pos: &Position, search_moves: &[Move]) -> RootMoves {
        let mut moves = Vec::new();
        for &mv in &generate_legal_moves(pos.board()) {
            if search_moves.is_empty() || search_moves.contains(&mv) {
                moves.push(RootMove::new(mv));
            }
        }
        RootMoves { moves }
    }

    pub fn push(&mut self, rm: RootMove) {
        self.moves.push(rm);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RootMove> {
        self.moves.iter()
    }

    pub fn find_mut(&mut self, mv: Move) -> Option<&mut RootMove> {
        self.moves.iter_mut().find(|rm| rm.mv == mv)
    }

    /// Index of `mv` at or after `start`, the multi-PV skip rule.
    pub fn find_from(&self, mv: Move, start: usize) -> Option<usize> {
        self.moves[start..].iter().position(|rm| rm.mv == mv).map(|i| i + start)
    }

    /// Stable sort by score, descending, from `start` on. Stability keeps
    /// unimproved moves in their previous relative order.
    pub fn sort_descending_from(&mut self, start: usize) {
        self.moves[start..].sort_by(|a, b| b.score.cmp(&a.score));
    }

    /// Stable sort of the first `end` entries (settled multi-PV lines).
    pub fn sort_descending_until(&mut self, end: usize) {
        self.moves[..end].sort_by(|a, b| b.score.cmp(&a.score));
    }

    pub fn save_prev_scores(&mut self) {
        for rm in &mut self.moves {
            rm.prev_score = rm.score;
            rm.nodes = 0;
        }
    }
}

impl std::ops::Index<usize> for RootMoves {
    type Output = RootMove;
    fn index(&self, i: usize) -> &RootMove {
        &self.moves[i]
    }
}

impl std::ops::IndexMut<usize> for RootMoves {
    fn index_mut(&mut self, i: usize) -> &mut RootMove {
        &mut self.moves[i]
    }
}

/// Run the iterative deepening loop on the calling thread (worker 0).
///
/// The skill RNG is injected so handicapped runs can be reproduced.
pub fn think<R: Rng + ?Sized>(
    ctx: &Arc<SearchContext>,
    pos: &mut Position,
    skill: Skill,
    skill_rng: &mut R,
) -> SearchResult {
    ctx.tt.new_search();
    ctx.history.clear();

    *ctx.root_moves.lock().unwrap() = RootMoves::init(pos, &ctx.limits.search_moves);
    let root_count = ctx.root_moves.lock().unwrap().len();

    log::debug!(
        "searching {} with {} root moves on {} workers",
        pos.board().to_fen(),
        root_count,
        ctx.pool.num_workers()
    );

    // Mate or stalemate at the root: report and bail out.
    if root_count == 0 {
        let score = if pos.in_check() { -Value::MATE } else { Value::DRAW };
        (ctx.info)(InfoEvent::Iteration {
            depth: 0,
            seldepth: 0,
            multipv: 1,
            score,
            bound: ScoreBound::Exact,
            nodes: 0,
            nps: 0,
            time_ms: ctx.time.elapsed_ms(),
            pv: Vec::new(),
        });
        return SearchResult {
            best_move: Move::NONE,
            ponder_move: Move::NONE,
        };
    }

    let mut worker = Worker::new(Arc::clone(ctx), 0);

    let mut best_values = [Value::ZERO; MAX_PLY as usize + 2];
    let mut change_counts = [0u32; MAX_PLY as usize + 2];
    let mut best_move = Move::NONE;
    let mut ponder_move = Move::NONE;
    let mut easy_move = Move::NONE;
    let mut skill_best = Move::NONE;
    let mut skill_ponder = Move::NONE;
    let mut value = -Value::INFINITE;
    let mut aspiration_delta = Value::ZERO;

    let mut depth = 0;
    while !ctx.flags.stop_requested() && depth < MAX_PLY {
        depth += 1;
        if ctx.limits.max_depth.is_some_and(|d| depth > d) {
            break;
        }

        ctx.root_moves.lock().unwrap().save_prev_scores();
        ctx.best_move_changes.store(0, Ordering::Relaxed);

        let lines = ctx.multi_pv.min(root_count);
        for multi_pv_idx in 0..lines {
            ctx.multi_pv_idx.store(multi_pv_idx, Ordering::Relaxed);

            // Aspiration window sized from the score swings of the two
            // previous iterations.
            let prev_score = ctx.root_moves.lock().unwrap()[multi_pv_idx].prev_score;
            let mut alpha;
            let mut beta;
            if depth >= 5 && prev_score.abs() < Value::KNOWN_WIN {
                let d1 = (best_values[depth as usize - 1] - best_values[depth as usize - 2])
                    .abs()
                    .raw();
                let d2 = (best_values[depth as usize - 2] - best_values[depth as usize - 3])
                    .abs()
                    .raw();
                let delta = (d1 + d2 / 2).clamp(16, 24);
                let delta = (delta + 7) / 8 * 8;
                aspiration_delta = Value::new(delta);

                alpha = (prev_score - aspiration_delta).max(-Value::INFINITE);
                beta = (prev_score + aspiration_delta).min(Value::INFINITE);
            } else {
                alpha = -Value::INFINITE;
                beta = Value::INFINITE;
            }

            // Fail high/low loop: re-search with a wider window until the
            // score is inside.
            loop {
                value = worker.search(pos, NodeKind::Root, alpha, beta, depth * ONE_PLY, 0);

                {
                    let mut rml = ctx.root_moves.lock().unwrap();
                    rml.sort_descending_from(multi_pv_idx);

                    // With an exact score the settled lines get reordered
                    // too; on a fail the last line keeps its slot to be
                    // searched again.
                    if multi_pv_idx > 0 && value > alpha && value < beta {
                        rml.sort_descending_until(multi_pv_idx);
                    }

                    for i in 0..=multi_pv_idx {
                        rml[i].insert_pv_in_tt(pos, &ctx.tt);
                    }
                }

                if ctx.flags.stop_requested() {
                    break;
                }

                let exact = value > alpha && value < beta;
                if exact || ctx.time.elapsed_ms() > 2000 {
                    emit_lines(ctx, depth, multi_pv_idx, value, alpha, beta);
                }

                if value >= beta {
                    beta = (beta + aspiration_delta).min(Value::INFINITE);
                    aspiration_delta += aspiration_delta / 2;
                } else if value <= alpha {
                    ctx.flags.aspiration_fail_low.store(true, Ordering::SeqCst);
                    ctx.flags.stop_on_ponderhit.store(false, Ordering::SeqCst);

                    alpha = (alpha - aspiration_delta).max(-Value::INFINITE);
                    aspiration_delta += aspiration_delta / 2;
                } else {
                    break;
                }

                if value.abs() >= Value::KNOWN_WIN {
                    break;
                }
            }
        }

        {
            let rml = ctx.root_moves.lock().unwrap();
            best_move = rml[0].mv;
            ponder_move = rml[0].pv.get(1).copied().unwrap_or(Move::NONE);
        }
        best_values[depth as usize] = value;
        change_counts[depth as usize] = ctx.best_move_changes.load(Ordering::Relaxed);

        if skill.enabled() && skill.time_to_pick(depth) {
            let rml = ctx.root_moves.lock().unwrap();
            let (b, p) = skill.pick(&rml, ctx.multi_pv, skill_rng);
            skill_best = b;
            skill_ponder = p;
        }

        // An easy move is set at depth one when it towers over the rest,
        // and dropped the moment it stops being best.
        {
            let rml = ctx.root_moves.lock().unwrap();
            if depth == 1
                && (rml.len() == 1 || rml[0].score > rml[1].score + EASY_MOVE_MARGIN)
            {
                easy_move = best_move;
            } else if best_move != easy_move {
                easy_move = Move::NONE;
            }
        }

        if !ctx.flags.stop_requested() && ctx.limits.use_time_management() {
            // Confirmed easy move with a lopsided node count: stop early.
            let elapsed = ctx.time.elapsed_ms();
            {
                let rml = ctx.root_moves.lock().unwrap();
                let total_nodes = ctx.nodes_searched();
                if depth >= 7
                    && easy_move == best_move
                    && (rml.len() == 1
                        || (rml[0].nodes > total_nodes * 85 / 100
                            && elapsed > ctx.time.available_time_ms() / 16)
                        || (rml[0].nodes > total_nodes * 98 / 100
                            && elapsed > ctx.time.available_time_ms() / 32))
                {
                    ctx.flags.request_stop();
                }
            }

            // A flapping best move buys extra time.
            if depth > 4 && depth < 50 {
                ctx.time.pv_instability(
                    change_counts[depth as usize],
                    change_counts[depth as usize - 1],
                );
            }

            // Most of the budget gone: the next iteration would not
            // finish its first move anyway.
            if ctx.time.elapsed_ms() > ctx.time.available_time_ms() * 62 / 100 {
                ctx.flags.request_stop();
            }

            // While pondering, convert the stop into stop-on-ponderhit.
            if ctx.flags.stop_requested() && ctx.flags.ponder.load(Ordering::SeqCst) {
                ctx.flags.stop.store(false, Ordering::SeqCst);
                ctx.flags.stop_on_ponderhit.store(true, Ordering::SeqCst);
            }
        }
    }

    if skill.enabled() {
        if skill_best.is_none() {
            let rml = ctx.root_moves.lock().unwrap();
            let (b, p) = skill.pick(&rml, ctx.multi_pv, skill_rng);
            skill_best = b;
            skill_ponder = p;
        }
        best_move = skill_best;
        ponder_move = skill_ponder;
    }

    SearchResult {
        best_move,
        ponder_move,
    }
}

/// Emit `info` lines for the settled multi-PV set. Lines not yet searched
/// at this depth report their previous iteration's score.
fn emit_lines(
    ctx: &Arc<SearchContext>,
    depth: Depth,
    multi_pv_idx: usize,
    value: Value,
    alpha: Value,
    beta: Value,
) {
    let rml = ctx.root_moves.lock().unwrap();
    let nodes = ctx.nodes_searched();
    let time_ms = ctx.time.elapsed_ms();
    let nps = if time_ms > 0 { nodes * 1000 / time_ms } else { 0 };

    for i in 0..ctx.uci_multi_pv.min(rml.len()) {
        let updated = i <= multi_pv_idx;
        if depth == 1 && !updated {
            continue;
        }

        let line_depth = if updated { depth } else { depth - 1 };
        let score = if updated { rml[i].score } else { rml[i].prev_score };
        let bound = if i == multi_pv_idx {
            if value >= beta {
                ScoreBound::Lower
            } else if value <= alpha {
                ScoreBound::Upper
            } else {
                ScoreBound::Exact
            }
        } else {
            ScoreBound::Exact
        };

        (ctx.info)(InfoEvent::Iteration {
            depth: line_depth,
            seldepth: ctx.seldepth(),
            multipv: i as u32 + 1,
            score,
            bound,
            nodes,
            nps,
            time_ms,
            pv: rml[i].pv.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_moves_init_respects_searchmoves() {
        let pos = Position::startpos();
        let all = RootMoves::init(&pos, &[]);
        assert_eq!(all.len(), 20);

        let only = pos.move_from_uci("e2e4").unwrap();
        let restricted = RootMoves::init(&pos, &[only]);
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].mv, only);
    }

    #[test]
    fn stable_sort_keeps_tied_order() {
        let mut rml = RootMoves::default();
        for (raw, score) in [(1u16, 10), (2, -Value::INFINITE.raw()), (3, -Value::INFINITE.raw()), (4, 30)] {
            let mut rm = RootMove::new(Move::from_raw(raw));
            rm.score = Value::new(score);
            rml.push(rm);
        }
        rml.sort_descending_from(0);
        // 4 floats to the front, 1 second; the two -INF moves keep their
        // original relative order.
        assert_eq!(rml[0].mv, Move::from_raw(4));
        assert_eq!(rml[1].mv, Move::from_raw(1));
        assert_eq!(rml[2].mv, Move::from_raw(2));
        assert_eq!(rml[3].mv, Move::from_raw(3));
    }

    #[test]
    fn find_from_skips_settled_lines() {
        let mut rml = RootMoves::default();
        for raw in 1u16..=4 {
            rml.push(RootMove::new(Move::from_raw(raw)));
        }
        assert_eq!(rml.find_from(Move::from_raw(2), 0), Some(1));
        assert_eq!(rml.find_from(Move::from_raw(2), 2), None);
        assert_eq!(rml.find_from(Move::from_raw(4), 2), Some(3));
    }
}
