//! High-level engine handle: owns the table, history, worker pool and
//! options, and runs one search at a time on the caller's thread.

use std::sync::Arc;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::position::Position;
use crate::search::threads::DEFAULT_MIN_SPLIT_DEPTH;
use crate::search::{
    think, History, InfoEvent, InfoSink, SearchContext, SearchFlags, SearchLimits, SearchResult,
    Skill, ThreadPool,
};
use crate::tt::TranspositionTable;
use crate::types::{Depth, ONE_PLY};

/// Tunables mapped from UCI options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub multi_pv: usize,
    pub skill_level: i32,
    pub min_split_depth: Depth,
    pub use_sleeping_threads: bool,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            hash_mb: 32,
            threads: 1,
            multi_pv: 1,
            skill_level: 20,
            min_split_depth: DEFAULT_MIN_SPLIT_DEPTH,
            use_sleeping_threads: true,
        }
    }
}

/// One engine instance. Searches run on the calling thread; helper workers
/// join through split points.
pub struct Engine {
    tt: Arc<TranspositionTable>,
    history: Arc<History>,
    flags: Arc<SearchFlags>,
    pool: ThreadPool,
    options: EngineOptions,
    /// Fixed RNG seed for the skill mixer, for reproducible runs.
    skill_seed: Option<u64>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Engine {
        let mut pool = ThreadPool::new(1);
        pool.set_use_sleeping(options.use_sleeping_threads);
        pool.set_num_threads(options.threads);
        Engine {
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            history: Arc::new(History::new()),
            flags: Arc::new(SearchFlags::new()),
            pool,
            options,
            skill_seed: None,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn flags(&self) -> Arc<SearchFlags> {
        Arc::clone(&self.flags)
    }

    pub fn set_hash_mb(&mut self, mb: usize) {
        if mb != self.options.hash_mb {
            self.options.hash_mb = mb;
            self.tt = Arc::new(TranspositionTable::new(mb));
        }
    }

    pub fn clear_hash(&mut self) {
        self.tt = Arc::new(TranspositionTable::new(self.options.hash_mb));
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.options.threads = threads;
        self.pool.set_num_threads(threads);
    }

    pub fn set_multi_pv(&mut self, multi_pv: usize) {
        self.options.multi_pv = multi_pv.max(1);
    }

    pub fn set_skill_level(&mut self, level: i32) {
        self.options.skill_level = level.clamp(0, 20);
    }

    pub fn set_min_split_depth(&mut self, plies: i32) {
        self.options.min_split_depth = plies.clamp(1, 16) * ONE_PLY;
    }

    pub fn set_use_sleeping_threads(&mut self, sleeping: bool) {
        self.options.use_sleeping_threads = sleeping;
        self.pool.set_use_sleeping(sleeping);
    }

    /// Pin the skill RNG seed; tests use this for determinism.
    pub fn set_skill_seed(&mut self, seed: Option<u64>) {
        self.skill_seed = seed;
    }

    /// Forget game history: wipe the table and the move statistics.
    pub fn new_game(&mut self) {
        self.clear_hash();
        self.history.clear();
    }

    /// Run a search to completion on the calling thread. `stop` and
    /// `ponderhit` arrive through [`Engine::flags`] while this runs.
    pub fn search(
        &self,
        pos: &mut Position,
        limits: SearchLimits,
        info: InfoSink,
    ) -> SearchResult {
        let skill = Skill::new(self.options.skill_level);
        // Skill picks from a pool of lines, so force a wide enough
        // multi-PV behind the scenes.
        let multi_pv = if skill.enabled() {
            self.options.multi_pv.max(4)
        } else {
            self.options.multi_pv
        };

        self.flags.reset(limits.ponder);

        let ctx = Arc::new(SearchContext::new(
            Arc::clone(&self.tt),
            Arc::clone(&self.history),
            Arc::clone(&self.flags),
            limits,
            self.pool.inner(),
            info,
            multi_pv,
            self.options.multi_pv,
            self.options.min_split_depth,
        ));

        // Wall-clock seeding keeps games varied; tests inject a seed.
        let seed = self.skill_seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x9E3779B97F4A7C15)
        });
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        think(&ctx, pos, skill, &mut rng)
    }

    /// Convenience for tests and tools: silent info sink.
    pub fn null_info() -> InfoSink {
        Arc::new(|_: InfoEvent| {})
    }
}
