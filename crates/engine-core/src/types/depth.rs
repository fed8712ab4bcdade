//! Search depth with half-ply granularity.

/// Search depth in `ONE_PLY` units.
pub type Depth = i32;

/// One full ply. Two units, so extensions can add half a ply.
pub const ONE_PLY: Depth = 2;

/// Maximum search depth in plies.
pub const MAX_PLY: i32 = 100;

pub const DEPTH_ZERO: Depth = 0;
/// Quiescence entry depth at which checking moves are still generated.
pub const DEPTH_QS_CHECKS: Depth = 0;
/// Quiescence depth below which only captures are generated.
pub const DEPTH_QS_NO_CHECKS: Depth = -ONE_PLY;
/// Sentinel for eval-only transposition entries.
pub const DEPTH_NONE: Depth = -127 * ONE_PLY;

const _: () = {
    assert!(ONE_PLY % 2 == 0);
    assert!(DEPTH_QS_CHECKS > DEPTH_QS_NO_CHECKS);
    assert!(DEPTH_QS_NO_CHECKS > DEPTH_NONE);
};
