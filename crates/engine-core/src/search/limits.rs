//! What bounds a search: clocks, depth, nodes, or nothing.

use crate::types::Move;

/// Limits handed over by the `go` command. Times are milliseconds.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    /// Remaining clock time for the side to move.
    pub time: Option<u64>,
    /// Increment per move for the side to move.
    pub increment: Option<u64>,
    pub moves_to_go: Option<u32>,
    pub max_depth: Option<i32>,
    pub max_nodes: Option<u64>,
    /// Fixed time per move (`movetime`).
    pub max_time: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    /// Restrict the root to these moves when non-empty (`searchmoves`).
    pub search_moves: Vec<Move>,
}

impl SearchLimits {
    /// Clock-driven searches manage their own time; fixed-depth, fixed
    /// nodes, fixed movetime and infinite searches do not.
    pub fn use_time_management(&self) -> bool {
        self.max_time.is_none()
            && self.max_depth.is_none()
            && self.max_nodes.is_none()
            && !self.infinite
    }

    pub fn infinite() -> SearchLimits {
        SearchLimits {
            infinite: true,
            ..Default::default()
        }
    }

    pub fn depth(depth: i32) -> SearchLimits {
        SearchLimits {
            max_depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn movetime(ms: u64) -> SearchLimits {
        SearchLimits {
            max_time: Some(ms),
            ..Default::default()
        }
    }

    pub fn nodes(nodes: u64) -> SearchLimits {
        SearchLimits {
            max_nodes: Some(nodes),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_management_detection() {
        assert!(!SearchLimits::infinite().use_time_management());
        assert!(!SearchLimits::depth(10).use_time_management());
        assert!(!SearchLimits::movetime(1000).use_time_management());
        assert!(!SearchLimits::nodes(5000).use_time_management());

        let clock = SearchLimits {
            time: Some(60_000),
            increment: Some(1000),
            ..Default::default()
        };
        assert!(clock.use_time_management());
    }
}
