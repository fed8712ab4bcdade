//! Iterative-deepening parallel alpha-beta search.

mod alpha_beta;
pub mod history;
pub mod limits;
pub mod movepicker;
pub mod params;
mod qsearch;
pub mod root;
pub mod skill;
pub mod stack;
pub mod threads;
pub mod time_manager;

pub use alpha_beta::{
    can_return_tt, connected_moves, connected_threat, refine_eval, value_from_tt, value_to_tt,
    Worker,
};
pub use history::History;
pub use limits::SearchLimits;
pub use root::{think, InfoEvent, InfoSink, RootMove, RootMoves, ScoreBound, SearchResult};
pub use skill::Skill;
pub use threads::ThreadPool;
pub use time_manager::TimeManager;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::tt::TranspositionTable;

/// The three node flavors of the search tree. Split-point continuations
/// carry the same kind plus a shared split point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Pv,
    NonPv,
}

impl NodeKind {
    #[inline]
    pub fn is_pv(self) -> bool {
        self != NodeKind::NonPv
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self == NodeKind::Root
    }

    /// The kind a full-window child search runs at.
    #[inline]
    pub fn child(self) -> NodeKind {
        match self {
            NodeKind::NonPv => NodeKind::NonPv,
            _ => NodeKind::Pv,
        }
    }
}

/// Cooperative control flags shared between the front-end and all workers.
#[derive(Default)]
pub struct SearchFlags {
    /// Terminate the search as soon as observed.
    pub stop: AtomicBool,
    /// Currently pondering; time caps are suspended.
    pub ponder: AtomicBool,
    /// A stop arrived while pondering; fire it on ponderhit.
    pub stop_on_ponderhit: AtomicBool,
    /// The current aspiration iteration failed low.
    pub aspiration_fail_low: AtomicBool,
    /// The first root move of the iteration is still being searched.
    pub first_root_move: AtomicBool,
}

impl SearchFlags {
    pub fn new() -> SearchFlags {
        SearchFlags::default()
    }

    /// Arm for a fresh `go`.
    pub fn reset(&self, ponder: bool) {
        self.stop.store(false, Ordering::SeqCst);
        self.ponder.store(ponder, Ordering::SeqCst);
        self.stop_on_ponderhit.store(false, Ordering::SeqCst);
        self.aspiration_fail_low.store(false, Ordering::SeqCst);
        self.first_root_move.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// `ponderhit` while a stop is pending converts into an actual stop.
    pub fn ponderhit(&self) {
        self.ponder.store(false, Ordering::SeqCst);
        if self.stop_on_ponderhit.load(Ordering::SeqCst) {
            self.request_stop();
        }
    }
}

/// Everything a search shares between its workers. Built per `go`.
pub struct SearchContext {
    pub tt: Arc<TranspositionTable>,
    pub history: Arc<History>,
    pub flags: Arc<SearchFlags>,
    pub limits: SearchLimits,
    pub time: TimeManager,
    pub pool: Arc<threads::PoolInner>,
    pub info: InfoSink,

    /// Root move bookkeeping, shared because split points at the root
    /// update it from helper threads.
    pub root_moves: Mutex<RootMoves>,
    pub multi_pv_idx: AtomicUsize,
    pub best_move_changes: AtomicU32,
    /// Lines actually searched (raised to at least 4 under skill levels).
    pub multi_pv: usize,
    /// Lines reported to the GUI.
    pub uci_multi_pv: usize,

    pub nodes_between_polls: u64,
    pub min_split_depth: crate::types::Depth,

    /// Per-worker node counters, index 0 is the primary worker.
    pub node_counters: Vec<AtomicU64>,
    /// Per-worker selective depth.
    pub max_ply: Vec<AtomicU32>,
}

impl SearchContext {
    /// Assemble the per-`go` context. `multi_pv` is the internal line
    /// count (already raised for skill levels); `uci_multi_pv` the number
    /// reported.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tt: Arc<TranspositionTable>,
        history: Arc<History>,
        flags: Arc<SearchFlags>,
        limits: SearchLimits,
        pool: Arc<threads::PoolInner>,
        info: InfoSink,
        multi_pv: usize,
        uci_multi_pv: usize,
        min_split_depth: crate::types::Depth,
    ) -> SearchContext {
        let time = TimeManager::new(&limits);
        let nodes_between_polls = params::nodes_between_polls(limits.max_nodes, limits.time.or(limits.max_time));
        let workers = pool.num_workers();

        let mut node_counters = Vec::with_capacity(workers);
        node_counters.resize_with(workers, AtomicU64::default);
        let mut max_ply = Vec::with_capacity(workers);
        max_ply.resize_with(workers, AtomicU32::default);

        SearchContext {
            tt,
            history,
            flags,
            limits,
            time,
            pool,
            info,
            root_moves: Mutex::new(RootMoves::default()),
            multi_pv_idx: AtomicUsize::new(0),
            best_move_changes: AtomicU32::new(0),
            multi_pv: multi_pv.max(1),
            uci_multi_pv: uci_multi_pv.max(1),
            nodes_between_polls,
            min_split_depth,
            node_counters,
            max_ply,
        }
    }

    pub fn nodes_searched(&self) -> u64 {
        self.node_counters.iter().map(|n| n.load(Ordering::Relaxed)).sum()
    }

    pub fn seldepth(&self) -> u32 {
        self.max_ply.iter().map(|n| n.load(Ordering::Relaxed)).max().unwrap_or(0)
    }

    pub fn observe_ply(&self, worker: usize, ply: i32) {
        let slot = &self.max_ply[worker];
        if (ply as u32) > slot.load(Ordering::Relaxed) {
            slot.store(ply as u32, Ordering::Relaxed);
        }
    }
}
