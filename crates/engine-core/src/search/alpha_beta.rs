//! The recursive negamax search with principal-variation windows, pruning,
//! extensions and split-point continuations.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::movepicker::MovePicker;
use super::params;
use super::stack::{new_stack, Frame};
use super::threads::SplitPoint;
use super::{NodeKind, SearchContext};
use crate::board::attacks::{
    between, bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use crate::board::see::piece_see_value;
use crate::board::Board;
use crate::position::Position;
use crate::types::{
    Bitboard, Bound, Color, Depth, Move, PieceKind, Square, Value, DEPTH_ZERO, MAX_MOVES, MAX_PLY,
    ONE_PLY, PAWN_VALUE_MIDGAME,
};

/// One search thread's private state. Worker 0 runs the root driver and
/// the input/time poller; helpers run split-point continuations.
pub struct Worker {
    pub ctx: Arc<SearchContext>,
    pub id: usize,
    pub(super) stack: Vec<Frame>,
    nodes_since_poll: u64,
    current_sp: Option<Arc<SplitPoint>>,
}

/// Stack slot for `ply`; slot 0 is the frame below the root.
#[inline]
pub(super) fn idx(ply: i32) -> usize {
    (ply + 1) as usize
}

impl Worker {
    pub fn new(ctx: Arc<SearchContext>, id: usize) -> Worker {
        Worker {
            ctx,
            id,
            stack: new_stack(),
            nodes_since_poll: 0,
            current_sp: None,
        }
    }

    #[inline]
    pub(super) fn current_split_point(&self) -> Option<&Arc<SplitPoint>> {
        self.current_sp.as_ref()
    }

    /// Frames `ply-1 ..= ply+2`, copied for publication at a split point.
    pub(super) fn snapshot_frames(&self, ply: i32) -> [Frame; 4] {
        [
            self.stack[idx(ply) - 1],
            self.stack[idx(ply)],
            self.stack[idx(ply) + 1],
            self.stack[idx(ply) + 2],
        ]
    }

    /// A beta cutoff at this or any enclosing split point aborts us.
    pub(super) fn cutoff_occurred(&self) -> bool {
        self.current_sp.as_ref().is_some_and(|sp| sp.cutoff_occurred())
    }

    #[inline]
    pub(super) fn count_node(&mut self) {
        self.ctx.node_counters[self.id].fetch_add(1, Ordering::Relaxed);
        if self.id == 0 {
            self.nodes_since_poll += 1;
            if self.nodes_since_poll > self.ctx.nodes_between_polls {
                self.nodes_since_poll = 0;
                self.poll();
            }
        }
    }

    /// Time and node caps, checked by the primary worker between node
    /// batches. `stop`/`ponderhit` arrive through the shared flags.
    fn poll(&self) {
        let ctx = &self.ctx;
        if ctx.flags.ponder.load(Ordering::Relaxed) {
            return;
        }

        let elapsed = ctx.time.elapsed_ms();

        let still_first_move = ctx.flags.first_root_move.load(Ordering::Relaxed)
            && !ctx.flags.aspiration_fail_low.load(Ordering::Relaxed)
            && elapsed > ctx.time.available_time_ms();
        let no_more_time = elapsed > ctx.time.maximum_time_ms() || still_first_move;

        if (ctx.limits.use_time_management() && no_more_time)
            || ctx.limits.max_time.is_some_and(|t| elapsed >= t)
            || ctx.limits.max_nodes.is_some_and(|n| ctx.nodes_searched() >= n)
        {
            ctx.flags.request_stop();
        }
    }

    /// Main search. `alpha < beta` always; non-PV nodes have a unit
    /// window. Returns a value strictly inside `(-INFINITE, INFINITE)`.
    pub fn search(
        &mut self,
        pos: &mut Position,
        kind: NodeKind,
        mut alpha: Value,
        mut beta: Value,
        depth: Depth,
        ply: i32,
    ) -> Value {
        debug_assert!(alpha >= -Value::INFINITE && alpha < beta && beta <= Value::INFINITE);
        debug_assert!(kind.is_pv() || alpha == beta - 1);
        debug_assert!(depth > DEPTH_ZERO);

        let ctx = Arc::clone(&self.ctx);
        let root = kind.is_root();
        let pv_node = kind.is_pv();
        let old_alpha = alpha;
        let in_check = pos.in_check();

        self.stack[idx(ply)].ply = ply;
        if pv_node {
            ctx.observe_ply(self.id, ply);
        }

        // Step 1. Initialize the node; poll on the primary worker.
        self.stack[idx(ply)].current_move = Move::NONE;
        self.stack[idx(ply)].best_move = Move::NONE;
        self.stack[idx(ply) + 1].excluded_move = Move::NONE;
        self.stack[idx(ply) + 1].skip_null_move = false;
        self.stack[idx(ply) + 1].reduction = DEPTH_ZERO;
        self.stack[idx(ply) + 2].killers = [Move::NONE; 2];
        let mut threat_move = Move::NONE;
        self.count_node();

        // Step 2. Aborted search and immediate draws.
        if !root && (ctx.flags.stop_requested() || pos.is_draw(true) || ply > MAX_PLY) {
            return Value::DRAW;
        }

        // Step 3. Mate distance pruning.
        if !root {
            alpha = alpha.max(Value::mated_in(ply));
            beta = beta.min(Value::mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        // Step 4. Transposition table lookup. An excluded move switches to
        // the exclusion key so partial results stay out of the real slot.
        let excluded = self.stack[idx(ply)].excluded_move;
        let pos_key = if excluded.is_some() { pos.exclusion_key() } else { pos.key() };
        let mut tte = ctx.tt.probe(pos_key);
        let mut tt_move = if root {
            ctx.root_moves.lock().unwrap()[ctx.multi_pv_idx.load(Ordering::Relaxed)].mv
        } else {
            tte.map_or(Move::NONE, |t| t.mv)
        };

        if !root {
            if let Some(t) = tte {
                let returnable = if pv_node {
                    t.depth >= depth && t.bound == Bound::Exact
                } else {
                    can_return_tt(&t, depth, beta, ply)
                };
                if returnable {
                    ctx.tt.refresh(pos_key);
                    self.stack[idx(ply)].best_move = tt_move;
                    let value = value_from_tt(t.value, ply);

                    if value >= beta
                        && tt_move.is_some()
                        && !pos.is_capture_or_promotion(tt_move)
                        && tt_move != self.stack[idx(ply)].killers[0]
                    {
                        self.stack[idx(ply)].update_killers(tt_move);
                    }
                    return value;
                }
            }
        }

        // Step 5. Static evaluation, and the parent quiet move's gain.
        let mut refined_value = -Value::INFINITE;
        if in_check {
            self.stack[idx(ply)].eval = Value::NONE;
            self.stack[idx(ply)].eval_margin = Value::NONE;
        } else if let Some(t) = tte.filter(|t| t.eval != Value::NONE) {
            self.stack[idx(ply)].eval = t.eval;
            self.stack[idx(ply)].eval_margin = t.margin;
            refined_value = refine_eval(&t, t.eval, ply);
        } else {
            let (eval, margin) = crate::eval::evaluate(pos.board());
            self.stack[idx(ply)].eval = eval;
            self.stack[idx(ply)].eval_margin = margin;
            refined_value = eval;
            ctx.tt.store(
                pos_key,
                Value::NONE,
                Bound::None,
                crate::types::DEPTH_NONE,
                Move::NONE,
                eval,
                margin,
            );
        }

        let parent_move = self.stack[idx(ply) - 1].current_move;
        let parent_eval = self.stack[idx(ply) - 1].eval;
        if parent_move.is_some()
            && parent_move != Move::NULL
            && parent_eval != Value::NONE
            && self.stack[idx(ply)].eval != Value::NONE
            && pos.last_captured().is_none()
            && !parent_move.is_special()
        {
            let to = parent_move.dest();
            if let Some(kind) = pos.piece_on(to) {
                let mover = pos.side_to_move().flip();
                ctx.history.update_gain(
                    mover,
                    kind,
                    to,
                    -(parent_eval + self.stack[idx(ply)].eval),
                );
            }
        }

        let us = pos.side_to_move();

        // Step 6. Razoring.
        if !pv_node
            && depth < params::RAZOR_DEPTH
            && !in_check
            && refined_value + params::razor_margin(depth) < beta
            && tt_move.is_none()
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && !pos.board().has_pawn_on_7th(us)
        {
            let rbeta = beta - params::razor_margin(depth);
            let v = self.qsearch(pos, false, rbeta - 1, rbeta, DEPTH_ZERO, ply);
            if v < rbeta {
                // Returning v rather than v + margin tests out stronger.
                return v;
            }
        }

        // Step 7. Static null-move pruning.
        if !pv_node
            && !self.stack[idx(ply)].skip_null_move
            && depth < params::RAZOR_DEPTH
            && !in_check
            && refined_value - params::futility_margin(depth, 0) >= beta
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && pos.non_pawn_material(us) > Value::ZERO
        {
            return refined_value - params::futility_margin(depth, 0);
        }

        // Step 8. Null-move search with verification.
        if !pv_node
            && !self.stack[idx(ply)].skip_null_move
            && depth > ONE_PLY
            && !in_check
            && refined_value >= beta
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && pos.non_pawn_material(us) > Value::ZERO
        {
            self.stack[idx(ply)].current_move = Move::NULL;

            let mut r = 3 + if depth >= 5 * ONE_PLY { depth / 8 } else { 0 };
            if refined_value - PAWN_VALUE_MIDGAME > beta {
                r += 1;
            }

            pos.do_null_move();
            self.stack[idx(ply) + 1].skip_null_move = true;
            let null_value = if depth - r * ONE_PLY < ONE_PLY {
                -self.qsearch(pos, false, -beta, -alpha, DEPTH_ZERO, ply + 1)
            } else {
                -self.search(pos, NodeKind::NonPv, -beta, -alpha, depth - r * ONE_PLY, ply + 1)
            };
            self.stack[idx(ply) + 1].skip_null_move = false;
            pos.undo_null_move();

            if null_value >= beta {
                // Never return unproven mate scores from a null search.
                let null_value =
                    if null_value >= Value::MATE_IN_MAX_PLY { beta } else { null_value };

                if depth < 6 * ONE_PLY {
                    return null_value;
                }

                // Verify at high depth with the null move disabled.
                self.stack[idx(ply)].skip_null_move = true;
                let v = self.search(pos, NodeKind::NonPv, alpha, beta, depth - r * ONE_PLY, ply);
                self.stack[idx(ply)].skip_null_move = false;

                if v >= beta {
                    return null_value;
                }
            } else {
                // The refutation of the null move threatens us. If the
                // parent move was reduced and is connected to that threat,
                // fail low to force a full re-search one ply up.
                threat_move = self.stack[idx(ply) + 1].best_move;

                if depth < params::THREAT_DEPTH
                    && self.stack[idx(ply) - 1].reduction != DEPTH_ZERO
                    && threat_move.is_some()
                    && connected_moves(pos.board(), parent_move, threat_move)
                {
                    return beta - 1;
                }
            }
        }

        // Step 9. ProbCut: a very good capture that beats beta by a margin
        // at reduced depth cuts immediately.
        if !pv_node
            && depth >= params::RAZOR_DEPTH + ONE_PLY
            && !in_check
            && !self.stack[idx(ply)].skip_null_move
            && excluded.is_none()
            && beta.abs() < Value::MATE_IN_MAX_PLY
        {
            let rbeta = beta + 200;
            let rdepth = depth - ONE_PLY - 3 * ONE_PLY;
            let threshold =
                Value::new(pos.last_captured().map_or(0, piece_see_value));

            let mut picker = MovePicker::new_probcut(pos.board(), tt_move, threshold);
            loop {
                let mv = picker.next_move();
                if mv.is_none() {
                    break;
                }
                self.stack[idx(ply)].current_move = mv;
                pos.do_move(mv);
                let value =
                    -self.search(pos, NodeKind::NonPv, -rbeta, -rbeta + 1, rdepth, ply + 1);
                pos.undo_move();
                if value >= rbeta {
                    return value;
                }
            }
        }

        // Step 10. Internal iterative deepening.
        if depth >= params::IID_DEPTH[pv_node as usize]
            && tt_move.is_none()
            && (pv_node
                || (!in_check && self.stack[idx(ply)].eval + params::IID_MARGIN >= beta))
        {
            let d = if pv_node { depth - 2 * ONE_PLY } else { depth / 2 };

            self.stack[idx(ply)].skip_null_move = true;
            let iid_kind = if pv_node { NodeKind::Pv } else { NodeKind::NonPv };
            self.search(pos, iid_kind, alpha, beta, d, ply);
            self.stack[idx(ply)].skip_null_move = false;

            tte = ctx.tt.probe(pos_key);
            tt_move = tte.map_or(Move::NONE, |t| t.mv);
        }

        // Step 11. The move loop.
        let mut picker =
            MovePicker::new(pos.board(), tt_move, depth, &ctx.history, self.stack[idx(ply)].killers);
        self.stack[idx(ply)].best_move = Move::NONE;
        let futility_base = if in_check {
            -Value::INFINITE
        } else {
            self.stack[idx(ply)].eval + self.stack[idx(ply)].eval_margin
        };
        let singular_node = !root
            && depth >= params::SINGULAR_EXTENSION_DEPTH[pv_node as usize]
            && tt_move.is_some()
            && excluded.is_none()
            && tte.is_some_and(|t| t.bound.is_lower() && t.depth >= depth - 3 * ONE_PLY);

        let mut best_value = -Value::INFINITE;
        let mut move_count: u32 = 0;
        let mut searched_quiets: Vec<Move> = Vec::new();

        loop {
            if best_value >= beta || ctx.flags.stop_requested() || self.cutoff_occurred() {
                break;
            }
            let mv = picker.next_move();
            if mv.is_none() {
                break;
            }

            if mv == excluded {
                continue;
            }

            // At the root obey `searchmoves` and skip the PV lines already
            // settled in earlier multi-PV passes.
            if root {
                let start = ctx.multi_pv_idx.load(Ordering::Relaxed);
                if ctx.root_moves.lock().unwrap().find_from(mv, start).is_none() {
                    continue;
                }
            }

            move_count += 1;

            let nodes_before = if root {
                ctx.flags.first_root_move.store(move_count == 1, Ordering::Relaxed);
                if self.id == 0 && ctx.time.elapsed_ms() > 2000 {
                    (ctx.info)(super::root::InfoEvent::CurrMove {
                        depth: depth / ONE_PLY,
                        mv,
                        number: move_count + ctx.multi_pv_idx.load(Ordering::Relaxed) as u32,
                    });
                }
                ctx.nodes_searched()
            } else {
                0
            };

            // The first move of a PV node is searched with the full
            // window; at the root's first iteration, all of them are.
            let is_pv_move = pv_node
                && move_count
                    <= if root && depth <= ONE_PLY { MAX_MOVES as u32 } else { 1 };

            let gives_check = pos.gives_check(mv);
            let capture_or_promotion = pos.is_capture_or_promotion(mv);

            // Step 12. Extensions.
            let (mut ext, dangerous) =
                extension(pos, mv, capture_or_promotion, gives_check, pv_node);

            // Singular extension: if every alternative fails well below the
            // table value, the table move is the only one and deserves a
            // full ply.
            if singular_node && mv == tt_move && ext < ONE_PLY {
                let tt_value = value_from_tt(tte.expect("singular requires a tt entry").value, ply);
                if tt_value.abs() < Value::KNOWN_WIN {
                    let rbeta = tt_value - depth;
                    self.stack[idx(ply)].excluded_move = mv;
                    self.stack[idx(ply)].skip_null_move = true;
                    let v = self.search(pos, NodeKind::NonPv, rbeta - 1, rbeta, depth / 2, ply);
                    self.stack[idx(ply)].skip_null_move = false;
                    self.stack[idx(ply)].excluded_move = Move::NONE;
                    self.stack[idx(ply)].best_move = Move::NONE;
                    if v < rbeta {
                        ext = ONE_PLY;
                    }
                }
            }

            let new_depth = depth - ONE_PLY + ext;

            // Step 13. Futility pruning for late quiet moves.
            if !pv_node
                && !capture_or_promotion
                && !in_check
                && !dangerous
                && mv != tt_move
                && !mv.is_castle()
            {
                // Move-count based pruning.
                if move_count as i32 >= params::futility_move_count(depth)
                    && (threat_move.is_none()
                        || !connected_threat(pos.board(), mv, threat_move))
                    && best_value > Value::MATED_IN_MAX_PLY
                {
                    continue;
                }

                // Value based pruning on the predicted depth after LMR.
                let predicted = new_depth - params::reduction(pv_node, depth, move_count);
                let gain = pos
                    .piece_on(mv.source())
                    .map_or(Value::ZERO, |k| ctx.history.gain(us, k, mv.dest()));
                let futility_value =
                    futility_base + params::futility_margin(predicted, move_count) + gain;

                if futility_value < beta {
                    best_value = best_value.max(futility_value);
                    continue;
                }

                // Losing captures can't save a bad position at low depth;
                // neither can quiets that lose material on the spot.
                if predicted < 2 * ONE_PLY
                    && best_value > Value::MATED_IN_MAX_PLY
                    && pos.see_sign(mv) < 0
                {
                    continue;
                }
            }

            self.stack[idx(ply)].current_move = mv;
            if !capture_or_promotion && searched_quiets.len() < MAX_MOVES {
                searched_quiets.push(mv);
            }

            // Step 14. Make the move.
            pos.do_move(mv);

            let value = if is_pv_move {
                if new_depth < ONE_PLY {
                    -self.qsearch(pos, true, -beta, -alpha, DEPTH_ZERO, ply + 1)
                } else {
                    -self.search(pos, NodeKind::Pv, -beta, -alpha, new_depth, ply + 1)
                }
            } else {
                // Step 15. Late-move reduction for quiet, safe moves; a
                // fail high promotes to full depth.
                let mut value = Value::ZERO;
                let mut do_full_depth = true;

                if depth > 3 * ONE_PLY
                    && !capture_or_promotion
                    && !dangerous
                    && !mv.is_castle()
                    && !picker.is_killer(mv)
                {
                    let r = params::reduction(pv_node, depth, move_count);
                    if r != DEPTH_ZERO {
                        self.stack[idx(ply)].reduction = r;
                        let d = new_depth - r;
                        value = if d < ONE_PLY {
                            -self.qsearch(pos, false, -(alpha + 1), -alpha, DEPTH_ZERO, ply + 1)
                        } else {
                            -self.search(pos, NodeKind::NonPv, -(alpha + 1), -alpha, d, ply + 1)
                        };
                        self.stack[idx(ply)].reduction = DEPTH_ZERO;
                        do_full_depth = value > alpha;
                    }
                }

                // Step 16. Full-depth zero-window search, then the PV
                // re-search when the score lands inside the window.
                if do_full_depth {
                    value = if new_depth < ONE_PLY {
                        -self.qsearch(pos, false, -(alpha + 1), -alpha, DEPTH_ZERO, ply + 1)
                    } else {
                        -self.search(pos, NodeKind::NonPv, -(alpha + 1), -alpha, new_depth, ply + 1)
                    };

                    if pv_node && value > alpha && (root || value < beta) {
                        value = if new_depth < ONE_PLY {
                            -self.qsearch(pos, true, -beta, -alpha, DEPTH_ZERO, ply + 1)
                        } else {
                            -self.search(pos, NodeKind::Pv, -beta, -alpha, new_depth, ply + 1)
                        };
                    }
                }
                value
            };

            // Step 17. Undo.
            pos.undo_move();

            debug_assert!(value > -Value::INFINITE && value < Value::INFINITE);

            // Step 18. New best move. Root scores feed the root list; an
            // aborted search leaves it untouched.
            if root && !ctx.flags.stop_requested() {
                let nodes_spent = ctx.nodes_searched() - nodes_before;
                let mut rml = ctx.root_moves.lock().unwrap();
                if let Some(rm) = rml.find_mut(mv) {
                    rm.nodes += nodes_spent;

                    if is_pv_move || value > alpha {
                        rm.score = value;
                        rm.extract_pv_from_tt(pos, &ctx.tt);
                        if !is_pv_move && ctx.multi_pv == 1 {
                            ctx.best_move_changes.fetch_add(1, Ordering::Relaxed);
                        }
                    } else {
                        // Stable sorting keeps non-improving moves in
                        // their old order below the PV.
                        rm.score = -Value::INFINITE;
                    }
                }
            }

            if value > best_value {
                best_value = value;
                self.stack[idx(ply)].best_move = mv;

                if pv_node && value > alpha && value < beta {
                    alpha = value;
                }
            }

            // Step 19. Split: hand the remaining moves to idle workers.
            if depth >= ctx.min_split_depth
                && best_value < beta
                && ctx.pool.available_slave_exists()
                && !ctx.flags.stop_requested()
                && !self.cutoff_occurred()
            {
                let pool = Arc::clone(&ctx.pool);
                let best_move = self.stack[idx(ply)].best_move;
                match pool.split(
                    &ctx,
                    self,
                    pos,
                    kind,
                    ply,
                    alpha,
                    beta,
                    best_value,
                    best_move,
                    depth,
                    threat_move,
                    move_count,
                    picker,
                ) {
                    Ok(outcome) => {
                        best_value = outcome.best_value;
                        move_count = outcome.move_count;
                        self.stack[idx(ply)].best_move = outcome.best_move;
                        break;
                    }
                    Err(returned) => picker = returned,
                }
            }
        }

        // Step 20. Mate and stalemate.
        if move_count == 0 {
            return if excluded.is_some() {
                old_alpha
            } else if in_check {
                Value::mated_in(ply)
            } else {
                Value::DRAW
            };
        }

        // Step 21. Store the result; aborted searches must leave the
        // table, killers and history untouched.
        if !ctx.flags.stop_requested() && !self.cutoff_occurred() {
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
                depth,
                stored_move,
                self.stack[idx(ply)].eval,
                self.stack[idx(ply)].eval_margin,
            );

            if best_value >= beta
                && stored_move.is_some()
                && !pos.is_capture_or_promotion(stored_move)
            {
                self.stack[idx(ply)].update_killers(stored_move);
                ctx.history.update_after_cutoff(
                    pos.board(),
                    stored_move,
                    depth,
                    &searched_quiets,
                );
            }
        }

        debug_assert!(best_value > -Value::INFINITE && best_value < Value::INFINITE);
        best_value
    }

    /// Split-point continuation: pick up the shared move source at the
    /// published position and run the remainder of the move loop. The
    /// node preamble (steps 1-10) already happened on the master.
    pub fn search_split(&mut self, sp: &Arc<SplitPoint>, pos: &mut Position) {
        let ctx = Arc::clone(&self.ctx);
        let ply = sp.ply;
        let root = sp.node_kind.is_root();
        let pv_node = sp.node_kind.is_pv();
        let beta = sp.beta;
        let depth = sp.depth;
        let threat_move = sp.threat_move;
        let in_check = pos.in_check();
        let us = pos.side_to_move();

        for (i, frame) in sp.frames.iter().enumerate() {
            self.stack[idx(ply) - 1 + i] = *frame;
        }
        let saved_sp = self.current_sp.replace(Arc::clone(sp));
        let nodes_at_entry = ctx.node_counters[self.id].load(Ordering::Relaxed);

        let futility_base = if in_check {
            -Value::INFINITE
        } else {
            self.stack[idx(ply)].eval + self.stack[idx(ply)].eval_margin
        };

        loop {
            let mut shared = sp.shared.lock().unwrap();
            if shared.best_value >= beta
                || ctx.flags.stop_requested()
                || sp.cutoff_occurred()
            {
                break;
            }
            let mv = shared.picker.next_move();
            if mv.is_none() {
                break;
            }
            shared.move_count += 1;
            let move_count = shared.move_count;
            let mut alpha = shared.alpha;
            let best_value = shared.best_value;
            let is_killer = self.stack[idx(ply)].killers.contains(&mv);
            drop(shared);

            if root {
                let start = ctx.multi_pv_idx.load(Ordering::Relaxed);
                if ctx.root_moves.lock().unwrap().find_from(mv, start).is_none() {
                    continue;
                }
            }

            let nodes_before = if root { ctx.nodes_searched() } else { 0 };

            let gives_check = pos.gives_check(mv);
            let capture_or_promotion = pos.is_capture_or_promotion(mv);
            let (ext, dangerous) =
                extension(pos, mv, capture_or_promotion, gives_check, pv_node);
            let new_depth = depth - ONE_PLY + ext;

            // Futility pruning, against the shared best value. The
            // unlocked read above may be stale; the final max() under the
            // lock keeps the update safe.
            if !pv_node && !capture_or_promotion && !in_check && !dangerous && !mv.is_castle() {
                if move_count as i32 >= params::futility_move_count(depth)
                    && (threat_move.is_none()
                        || !connected_threat(pos.board(), mv, threat_move))
                    && best_value > Value::MATED_IN_MAX_PLY
                {
                    continue;
                }

                let predicted = new_depth - params::reduction(pv_node, depth, move_count);
                let gain = pos
                    .piece_on(mv.source())
                    .map_or(Value::ZERO, |k| ctx.history.gain(us, k, mv.dest()));
                let futility_value =
                    futility_base + params::futility_margin(predicted, move_count) + gain;

                if futility_value < beta {
                    let mut shared = sp.shared.lock().unwrap();
                    if futility_value > shared.best_value {
                        shared.best_value = futility_value;
                    }
                    continue;
                }

                if predicted < 2 * ONE_PLY
                    && best_value > Value::MATED_IN_MAX_PLY
                    && pos.see_sign(mv) < 0
                {
                    continue;
                }
            }

            self.stack[idx(ply)].current_move = mv;
            pos.do_move(mv);

            let mut value;
            let mut do_full_depth = true;

            if depth > 3 * ONE_PLY
                && !capture_or_promotion
                && !dangerous
                && !mv.is_castle()
                && !is_killer
            {
                let r = params::reduction(pv_node, depth, move_count);
                if r != DEPTH_ZERO {
                    self.stack[idx(ply)].reduction = r;
                    let d = new_depth - r;
                    alpha = sp.shared.lock().unwrap().alpha;
                    value = if d < ONE_PLY {
                        -self.qsearch(pos, false, -(alpha + 1), -alpha, DEPTH_ZERO, ply + 1)
                    } else {
                        -self.search(pos, NodeKind::NonPv, -(alpha + 1), -alpha, d, ply + 1)
                    };
                    self.stack[idx(ply)].reduction = DEPTH_ZERO;
                    do_full_depth = value > alpha;
                } else {
                    value = Value::ZERO;
                }
            } else {
                value = Value::ZERO;
            }

            if do_full_depth {
                alpha = sp.shared.lock().unwrap().alpha;
                value = if new_depth < ONE_PLY {
                    -self.qsearch(pos, false, -(alpha + 1), -alpha, DEPTH_ZERO, ply + 1)
                } else {
                    -self.search(pos, NodeKind::NonPv, -(alpha + 1), -alpha, new_depth, ply + 1)
                };

                if pv_node && value > alpha && (root || value < beta) {
                    value = if new_depth < ONE_PLY {
                        -self.qsearch(pos, true, -beta, -alpha, DEPTH_ZERO, ply + 1)
                    } else {
                        -self.search(pos, NodeKind::Pv, -beta, -alpha, new_depth, ply + 1)
                    };
                }
            }

            pos.undo_move();

            let aborted = ctx.flags.stop_requested() || sp.cutoff_occurred();

            if root && !aborted {
                let nodes_spent = ctx.nodes_searched() - nodes_before;
                let mut rml = ctx.root_moves.lock().unwrap();
                if let Some(rm) = rml.find_mut(mv) {
                    rm.nodes += nodes_spent;
                    if value > alpha {
                        rm.score = value;
                        rm.extract_pv_from_tt(pos, &ctx.tt);
                        if ctx.multi_pv == 1 {
                            ctx.best_move_changes.fetch_add(1, Ordering::Relaxed);
                        }
                    } else {
                        rm.score = -Value::INFINITE;
                    }
                }
            }

            let mut shared = sp.shared.lock().unwrap();
            if !aborted && value > shared.best_value {
                shared.best_value = value;
                shared.best_move = mv;
                if pv_node && value > shared.alpha && value < beta {
                    shared.alpha = value;
                }
                if value >= beta {
                    sp.cutoff.store(true, Ordering::Relaxed);
                }
            }
        }

        // Leave the split point: clear our slave bit and wake the master.
        let mut shared = sp.shared.lock().unwrap();
        shared.slaves[self.id] = false;
        shared.nodes += ctx.node_counters[self.id].load(Ordering::Relaxed) - nodes_at_entry;
        sp.finished.notify_all();
        drop(shared);

        self.current_sp = saved_sp;
    }
}

// =========================================================================
// Value adjustment across the transposition table
// =========================================================================

/// Mate scores are stored relative to the current node so they stay valid
/// wherever the entry is found.
pub fn value_to_tt(v: Value, ply: i32) -> Value {
    if v >= Value::MATE_IN_MAX_PLY {
        v + ply
    } else if v <= Value::MATED_IN_MAX_PLY {
        v - ply
    } else {
        v
    }
}

/// Inverse of [`value_to_tt`].
pub fn value_from_tt(v: Value, ply: i32) -> Value {
    if v >= Value::MATE_IN_MAX_PLY {
        v - ply
    } else if v <= Value::MATED_IN_MAX_PLY {
        v + ply
    } else {
        v
    }
}

/// May a table entry cut off this node?
pub fn can_return_tt(t: &crate::tt::TtData, depth: Depth, beta: Value, ply: i32) -> bool {
    let v = value_from_tt(t.value, ply);

    (t.depth >= depth || v >= Value::MATE_IN_MAX_PLY.max(beta) || v < Value::MATED_IN_MAX_PLY.min(beta))
        && ((t.bound.is_lower() && v >= beta) || (t.bound.is_upper() && v < beta))
}

/// Use the table value instead of the static eval when its bound points
/// the same way.
pub fn refine_eval(t: &crate::tt::TtData, default_eval: Value, ply: i32) -> Value {
    let v = value_from_tt(t.value, ply);

    if (t.bound.is_lower() && v >= default_eval) || (t.bound.is_upper() && v < default_eval) {
        v
    } else {
        default_eval
    }
}

// =========================================================================
// Extension and threat predicates
// =========================================================================

/// Extra depth for forcing moves; `dangerous` additionally protects the
/// move from futility pruning.
pub fn extension(
    pos: &Position,
    mv: Move,
    capture_or_promotion: bool,
    gives_check: bool,
    pv_node: bool,
) -> (Depth, bool) {
    let board = pos.board();
    let pvi = pv_node as usize;
    let mut result = DEPTH_ZERO;
    let mut dangerous = gives_check;

    if gives_check && pos.see_sign(mv) >= 0 {
        result += params::CHECK_EXTENSION[pvi];
    }

    if board.piece_on(mv.source()) == Some(PieceKind::Pawn) {
        let us = board.side_to_move();
        if mv.dest().relative_rank(us) == crate::types::Rank::R7 {
            result += params::PAWN_PUSH_TO_7TH_EXTENSION[pvi];
            dangerous = true;
        }
        if board.pawn_is_passed(us, mv.dest()) {
            result += params::PASSED_PAWN_EXTENSION[pvi];
            dangerous = true;
        }
    }

    // Trading into a pawn endgame gets a full look.
    if capture_or_promotion
        && !mv.is_special()
        && board.piece_on(mv.dest()).is_some_and(|victim| {
            victim != PieceKind::Pawn
                && board.non_pawn_material(Color::White) + board.non_pawn_material(Color::Black)
                    - victim.midgame_value()
                    == Value::ZERO
        })
    {
        result += params::PAWN_ENDGAME_EXTENSION[pvi];
        dangerous = true;
    }

    (result.min(ONE_PLY), dangerous)
}

/// Attack set of a `kind` piece of `color` standing on `sq`.
fn attacks_from(kind: PieceKind, color: Color, sq: Square, occ: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Pawn => pawn_attacks(color, sq),
        PieceKind::Knight => knight_attacks(sq),
        PieceKind::Bishop => bishop_attacks(sq, occ),
        PieceKind::Rook => rook_attacks(sq, occ),
        PieceKind::Queen => bishop_attacks(sq, occ) | rook_attacks(sq, occ),
        PieceKind::King => king_attacks(sq),
    }
}

/// Did `first` (the move just played) make `second` (a reply) possible?
/// Used for threat detection when a null search fails low.
pub fn connected_moves(board: &Board, first: Move, second: Move) -> bool {
    debug_assert!(first.is_some() && first != Move::NULL);
    debug_assert!(second.is_some() && second != Move::NULL);

    let f1 = first.source();
    let t1 = first.dest();
    let f2 = second.source();
    let t2 = second.dest();

    // Same piece moves again, or the reply occupies the vacated square.
    if t1 == f2 || t2 == f1 {
        return true;
    }

    // The reply slides through the square the first move vacated.
    if let Some(p2) = board.piece_on(f2) {
        if p2.is_slider() && between(f2, t2).contains(f1) {
            return true;
        }
    }

    // The piece that just arrived defends the reply's destination.
    if let (Some(p1), Some(c1)) = (board.piece_on(t1), board.color_on(t1)) {
        if attacks_from(p1, c1, t1, board.occupied()).contains(t2) {
            return true;
        }
        // Discovered check: the arrived slider eyes our king once the
        // reply's piece steps out of the way.
        let ksq = board.king_square(board.side_to_move());
        if p1.is_slider() && between(t1, ksq).contains(f2) {
            let occ = board.occupied().without(f2);
            if attacks_from(p1, c1, t1, occ).contains(ksq) {
                return true;
            }
        }
    }

    false
}

/// Would pruning `mv` walk into `threat` (found by a failed null search)?
pub fn connected_threat(board: &Board, mv: Move, threat: Move) -> bool {
    debug_assert!(mv.is_some() && threat.is_some());

    let mfrom = mv.source();
    let mto = mv.dest();
    let tfrom = threat.source();
    let tto = threat.dest();

    // Moving the threatened piece out of danger.
    if mfrom == tto {
        return true;
    }

    // Defending the threatened piece, when the exchange favors them.
    let threat_is_capture = board.piece_on(tto).is_some() || threat.is_en_passant();
    if threat_is_capture {
        let attacker_value = board.piece_on(tfrom).map_or(0, piece_see_value);
        let victim_value = board.piece_on(tto).map_or(0, piece_see_value);
        let attacker_is_king = board.piece_on(tfrom) == Some(PieceKind::King);
        if (attacker_value >= victim_value || attacker_is_king)
            && move_attacks_square(board, mv, tto)
        {
            return true;
        }
    }

    // Blocking a sliding threat with a safe interposition.
    if board.piece_on(tfrom).is_some_and(PieceKind::is_slider)
        && between(tfrom, tto).contains(mto)
        && crate::board::see_sign(board, mv) >= 0
    {
        return true;
    }

    false
}

/// After making `mv`, does the moved piece attack `sq`?
fn move_attacks_square(board: &Board, mv: Move, sq: Square) -> bool {
    let from = mv.source();
    let to = mv.dest();
    let Some(kind) = board.piece_on(from) else {
        return false;
    };
    let color = board.side_to_move();
    let occ = board.occupied().without(from).with(to);
    attacks_from(kind, color, to, occ).contains(sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tt_value_adjustment_roundtrip() {
        for ply in [0, 1, 7, 42, MAX_PLY] {
            for v in [
                Value::mate_in(3),
                Value::mated_in(5),
                Value::new(120),
                Value::new(-75),
                Value::ZERO,
            ] {
                assert_eq!(value_from_tt(value_to_tt(v, ply), ply), v, "ply {ply}");
            }
        }
    }

    #[test]
    fn can_return_tt_bounds() {
        use crate::tt::TtData;
        let lower = TtData {
            mv: Move::NONE,
            value: Value::new(50),
            eval: Value::ZERO,
            margin: Value::ZERO,
            depth: 10,
            bound: Bound::Lower,
        };
        // Deep enough and value above beta: cutoff allowed.
        assert!(can_return_tt(&lower, 8, Value::new(40), 0));
        // Value below beta: a lower bound proves nothing.
        assert!(!can_return_tt(&lower, 8, Value::new(60), 0));
        // Too shallow.
        assert!(!can_return_tt(&lower, 12, Value::new(40), 0));

        let upper = TtData {
            bound: Bound::Upper,
            ..lower
        };
        assert!(can_return_tt(&upper, 8, Value::new(60), 0));
        assert!(!can_return_tt(&upper, 8, Value::new(40), 0));
    }

    #[test]
    fn refine_eval_respects_bound_direction() {
        use crate::tt::TtData;
        let t = TtData {
            mv: Move::NONE,
            value: Value::new(100),
            eval: Value::ZERO,
            margin: Value::ZERO,
            depth: 4,
            bound: Bound::Lower,
        };
        assert_eq!(refine_eval(&t, Value::new(50), 0), Value::new(100));
        assert_eq!(refine_eval(&t, Value::new(150), 0), Value::new(150));

        let t = TtData {
            bound: Bound::Upper,
            value: Value::new(-20),
            ..t
        };
        assert_eq!(refine_eval(&t, Value::new(30), 0), Value::new(-20));
        assert_eq!(refine_eval(&t, Value::new(-50), 0), Value::new(-50));
    }

    #[test]
    fn connected_moves_cases() {
        // After ...Nb8-c6, the threat Nc6-d4 moves the same piece: connected.
        let board: Board = "r1bqkbnr/pppppppp/2n5/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();
        let first = Move::new(
            Square::from_algebraic("b8").unwrap(),
            Square::from_algebraic("c6").unwrap(),
        );
        let second = Move::new(
            Square::from_algebraic("c6").unwrap(),
            Square::from_algebraic("d4").unwrap(),
        );
        assert!(connected_moves(&board, first, second));

        let unrelated = Move::new(
            Square::from_algebraic("g1").unwrap(),
            Square::from_algebraic("f3").unwrap(),
        );
        assert!(!connected_moves(&board, first, unrelated));
    }

    #[test]
    fn connected_threat_moves_threatened_piece() {
        // Black rook on a5 threatens the white knight on e5 along the
        // rank; moving the knight away is connected to the threat.
        let board: Board = "4k3/8/8/r3N3/8/8/8/4K3 w - - 0 1".parse().unwrap();
        let threat = Move::new(
            Square::from_algebraic("a5").unwrap(),
            Square::from_algebraic("e5").unwrap(),
        );
        let escape = Move::new(
            Square::from_algebraic("e5").unwrap(),
            Square::from_algebraic("c4").unwrap(),
        );
        assert!(connected_threat(&board, escape, threat));

        let unrelated = Move::new(Square::E1, Square::D1);
        assert!(!connected_threat(&board, unrelated, threat));
    }
}
