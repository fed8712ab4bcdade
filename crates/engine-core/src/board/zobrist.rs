//! Zobrist hashing keys.

use super::Board;
use crate::types::{Color, Piece};

const SEED: u64 = 0x5a4f_4252_4953_5421;

/// Xorshift64 step. Returns (value, next state).
const fn xorshift64(mut state: u64) -> (u64, u64) {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state, state)
}

const fn advance(n: usize) -> u64 {
    let mut state = SEED;
    let mut i = 0;
    while i < n {
        let (_, next) = xorshift64(state);
        state = next;
        i += 1;
    }
    state
}

/// Key per (piece, square), indexed `[Piece::index()][Square::index()]`.
pub(crate) static PIECE_SQUARE: [[u64; 64]; 12] = {
    let mut table = [[0u64; 64]; 12];
    let mut state = SEED;
    let mut piece = 0;
    while piece < 12 {
        let mut sq = 0;
        while sq < 64 {
            let (val, next) = xorshift64(state);
            table[piece][sq] = val;
            state = next;
            sq += 1;
        }
        piece += 1;
    }
    table
};

/// XORed in when Black is to move.
pub(crate) static SIDE_TO_MOVE: u64 = {
    let (val, _) = xorshift64(advance(768));
    val
};

/// Keys per castling-rights configuration, indexed by `CastleRights::bits()`.
pub(crate) static CASTLING: [u64; 16] = {
    let mut table = [0u64; 16];
    let mut state = advance(769);
    let mut idx = 0;
    while idx < 16 {
        let (val, next) = xorshift64(state);
        table[idx] = val;
        state = next;
        idx += 1;
    }
    table
};

/// Keys per en-passant file, indexed by `File::index()`.
pub(crate) static EN_PASSANT_FILE: [u64; 8] = {
    let mut table = [0u64; 8];
    let mut state = advance(785);
    let mut idx = 0;
    while idx < 8 {
        let (val, next) = xorshift64(state);
        table[idx] = val;
        state = next;
        idx += 1;
    }
    table
};

/// Deterministic perturbation applied to the position key when searching
/// with an excluded move, so partial singular-extension results never land
/// in the real transposition slot.
pub(crate) static EXCLUSION: u64 = {
    let (val, _) = xorshift64(advance(793));
    val
};

/// Compute the hash of a board from scratch. The incremental hash kept by
/// `make_move` must always agree with this.
pub(crate) fn hash_from_scratch(board: &Board) -> u64 {
    let mut hash = 0u64;

    for piece in Piece::all() {
        let bb = board.pieces(piece.kind()) & board.side(piece.color());
        for sq in bb {
            hash ^= PIECE_SQUARE[piece.index()][sq.index()];
        }
    }

    if board.side_to_move() == Color::Black {
        hash ^= SIDE_TO_MOVE;
    }

    hash ^= CASTLING[board.castling().bits() as usize];

    if let Some(ep_sq) = board.en_passant() {
        hash ^= EN_PASSANT_FILE[ep_sq.file().index()];
    }

    hash
}
