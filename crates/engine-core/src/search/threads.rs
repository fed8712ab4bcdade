//! Worker pool: split-point publication, slave allocation, cutoff
//! propagation.
//!
//! Workers are symmetric. The thread that runs the root driver is worker 0;
//! helpers park on a condition variable until a master publishes a split
//! point and assigns them to it. A master that splits keeps iterating the
//! shared move source itself, then waits until every slave bit clears.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use super::alpha_beta::Worker;
use super::movepicker::MovePicker;
use super::stack::Frame;
use super::{NodeKind, SearchContext};
use crate::position::Position;
use crate::types::{Depth, Move, Value, ONE_PLY};

pub const MAX_WORKERS: usize = 64;

pub const DEFAULT_MIN_SPLIT_DEPTH: Depth = 4 * ONE_PLY;

/// State shared by the master and slaves of one split point, updated under
/// the mutex.
pub struct SplitShared {
    pub picker: MovePicker,
    pub alpha: Value,
    pub best_value: Value,
    pub best_move: Move,
    pub move_count: u32,
    pub nodes: u64,
    pub slaves: [bool; MAX_WORKERS],
}

impl SplitShared {
    pub fn any_slave(&self) -> bool {
        self.slaves.iter().any(|&s| s)
    }
}

/// A node whose remaining moves are iterated cooperatively.
pub struct SplitPoint {
    pub ctx: Arc<SearchContext>,
    /// The split point the master was already working under, if any.
    pub parent: Option<Arc<SplitPoint>>,
    pub master: usize,
    /// Canonical position at the split node; every slave clones it.
    pub pos: Position,
    pub node_kind: NodeKind,
    pub beta: Value,
    pub depth: Depth,
    pub threat_move: Move,
    pub ply: i32,
    /// Stack frames for plies `ply-1 ..= ply+2` at publication time.
    pub frames: [Frame; 4],

    pub shared: Mutex<SplitShared>,
    pub finished: Condvar,
    /// A beta cutoff happened here; descendants stop promptly.
    pub cutoff: AtomicBool,
}

impl SplitPoint {
    /// Has a cutoff been signaled here or at any enclosing split point?
    pub fn cutoff_occurred(&self) -> bool {
        if self.cutoff.load(Ordering::Relaxed) {
            return true;
        }
        let mut sp = self.parent.as_deref();
        while let Some(p) = sp {
            if p.cutoff.load(Ordering::Relaxed) {
                return true;
            }
            sp = p.parent.as_deref();
        }
        false
    }
}

struct HelperState {
    task: Option<Arc<SplitPoint>>,
    searching: bool,
    exit: bool,
}

struct HelperSlot {
    state: Mutex<HelperState>,
    cv: Condvar,
}

/// Pool internals shared with the search so nodes can ask for slaves.
pub struct PoolInner {
    helpers: Vec<Arc<HelperSlot>>,
    /// Serializes slave allocation across concurrent would-be masters.
    split_mutex: Mutex<()>,
}

impl PoolInner {
    /// Total workers including the primary.
    pub fn num_workers(&self) -> usize {
        self.helpers.len() + 1
    }

    /// Is some helper idle right now? Racy by nature; `split` re-checks
    /// under the allocation lock.
    pub fn available_slave_exists(&self) -> bool {
        self.helpers.iter().any(|slot| {
            let state = slot.state.lock().unwrap();
            !state.searching && state.task.is_none() && !state.exit
        })
    }

    /// Publish a split point for the remaining moves of the master's node
    /// and wake idle helpers to join it. The master iterates too, then
    /// blocks until every slave bit is cleared.
    ///
    /// Returns the shared outcome, or the picker back when no helper was
    /// actually free.
    #[allow(clippy::too_many_arguments)]
    pub fn split(
        &self,
        ctx: &Arc<SearchContext>,
        master: &mut Worker,
        pos: &Position,
        node_kind: NodeKind,
        ply: i32,
        alpha: Value,
        beta: Value,
        best_value: Value,
        best_move: Move,
        depth: Depth,
        threat_move: Move,
        move_count: u32,
        picker: MovePicker,
    ) -> Result<SplitOutcome, MovePicker> {
        let master_id = master.id;

        let allocation = self.split_mutex.lock().unwrap();

        let mut chosen = Vec::new();
        for slot in &self.helpers {
            let state = slot.state.lock().unwrap();
            if !state.searching && state.task.is_none() && !state.exit {
                chosen.push(Arc::clone(slot));
            }
            if chosen.len() + 1 >= MAX_WORKERS {
                break;
            }
        }
        if chosen.is_empty() {
            drop(allocation);
            return Err(picker);
        }

        let mut slaves = [false; MAX_WORKERS];
        slaves[master_id] = true;

        let frames = master.snapshot_frames(ply);
        let sp = Arc::new(SplitPoint {
            ctx: Arc::clone(ctx),
            parent: master.current_split_point().cloned(),
            master: master_id,
            pos: pos.clone(),
            node_kind,
            beta,
            depth,
            threat_move,
            ply,
            frames,
            shared: Mutex::new(SplitShared {
                picker,
                alpha,
                best_value,
                best_move,
                move_count,
                nodes: 0,
                slaves,
            }),
            finished: Condvar::new(),
            cutoff: AtomicBool::new(false),
        });

        for slot in &chosen {
            let mut state = slot.state.lock().unwrap();
            // Re-check: the helper may have been grabbed after our scan.
            if !state.searching && state.task.is_none() && !state.exit {
                let helper_id = helper_worker_id(self, slot);
                sp.shared.lock().unwrap().slaves[helper_id] = true;
                state.task = Some(Arc::clone(&sp));
                state.searching = true;
                slot.cv.notify_one();
            }
        }
        drop(allocation);

        // The master helps with its own split point.
        let mut master_pos = sp.pos.clone();
        master.search_split(&sp, &mut master_pos);

        // Wait for the remaining slaves, then read the result once more
        // under the lock so every update is visible.
        let mut shared = sp.shared.lock().unwrap();
        while shared.any_slave() {
            shared = sp.finished.wait(shared).unwrap();
        }
        let outcome = SplitOutcome {
            best_value: shared.best_value,
            best_move: shared.best_move,
            move_count: shared.move_count,
        };
        drop(shared);

        Ok(outcome)
    }
}

fn helper_worker_id(pool: &PoolInner, slot: &Arc<HelperSlot>) -> usize {
    pool.helpers
        .iter()
        .position(|s| Arc::ptr_eq(s, slot))
        .map(|i| i + 1)
        .expect("slot belongs to this pool")
}

/// Result of a completed split.
#[derive(Debug, Clone, Copy)]
pub struct SplitOutcome {
    pub best_value: Value,
    pub best_move: Move,
    pub move_count: u32,
}

/// Owns the helper threads. The primary worker is the caller of
/// [`crate::search::think`], not a member.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    handles: Vec<JoinHandle<()>>,
    use_sleeping: bool,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> ThreadPool {
        let mut pool = ThreadPool {
            inner: Arc::new(PoolInner {
                helpers: Vec::new(),
                split_mutex: Mutex::new(()),
            }),
            handles: Vec::new(),
            use_sleeping: true,
        };
        pool.set_num_threads(num_threads);
        pool
    }

    pub fn inner(&self) -> Arc<PoolInner> {
        Arc::clone(&self.inner)
    }

    /// Idle helpers park on a condition variable when set (the default);
    /// otherwise they poll with a short timeout.
    pub fn set_use_sleeping(&mut self, sleeping: bool) {
        self.use_sleeping = sleeping;
    }

    /// Resize to `num_threads` total workers (one is the caller).
    pub fn set_num_threads(&mut self, num_threads: usize) {
        let helper_count = num_threads.clamp(1, MAX_WORKERS) - 1;
        if helper_count == self.inner.helpers.len() {
            return;
        }

        self.shutdown();

        let mut helpers = Vec::new();
        let mut handles = Vec::new();
        for id in 1..=helper_count {
            let slot = Arc::new(HelperSlot {
                state: Mutex::new(HelperState {
                    task: None,
                    searching: false,
                    exit: false,
                }),
                cv: Condvar::new(),
            });
            helpers.push(Arc::clone(&slot));
            let sleeping = self.use_sleeping;
            handles.push(
                std::thread::Builder::new()
                    .name(format!("search-{id}"))
                    .stack_size(32 * 1024 * 1024)
                    .spawn(move || idle_loop(slot, id, sleeping))
                    .expect("failed to spawn search helper"),
            );
        }

        self.inner = Arc::new(PoolInner {
            helpers,
            split_mutex: Mutex::new(()),
        });
        self.handles = handles;
    }

    fn shutdown(&mut self) {
        for slot in &self.inner.helpers {
            let mut state = slot.state.lock().unwrap();
            state.exit = true;
            slot.cv.notify_one();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn idle_loop(slot: Arc<HelperSlot>, id: usize, use_sleeping: bool) {
    loop {
        let sp = {
            let mut state = slot.state.lock().unwrap();
            loop {
                if state.exit {
                    return;
                }
                if let Some(task) = state.task.take() {
                    break task;
                }
                state.searching = false;
                if use_sleeping {
                    state = slot.cv.wait(state).unwrap();
                } else {
                    let (next, _) = slot
                        .cv
                        .wait_timeout(state, std::time::Duration::from_micros(100))
                        .unwrap();
                    state = next;
                }
            }
        };

        // Join the split point with a private copy of the canonical
        // position and the published stack snapshot.
        let mut worker = Worker::new(Arc::clone(&sp.ctx), id);
        let mut pos = sp.pos.clone();
        worker.search_split(&sp, &mut pos);

        let mut state = slot.state.lock().unwrap();
        state.searching = false;
        drop(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reports_worker_counts() {
        let pool = ThreadPool::new(1);
        assert_eq!(pool.inner().num_workers(), 1);
        assert!(!pool.inner().available_slave_exists());

        let pool = ThreadPool::new(3);
        assert_eq!(pool.inner().num_workers(), 3);
        assert!(pool.inner().available_slave_exists());
    }

    #[test]
    fn resize_reuses_when_count_unchanged() {
        let mut pool = ThreadPool::new(2);
        let before = Arc::as_ptr(&pool.inner());
        pool.set_num_threads(2);
        assert_eq!(before, Arc::as_ptr(&pool.inner()));
        pool.set_num_threads(4);
        assert_eq!(pool.inner().num_workers(), 4);
    }
}
