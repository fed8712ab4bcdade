//! A board plus the history needed for draw detection and undo.

use crate::board::{generate_legal_moves, Board};
use crate::types::{Color, Move, PieceKind, Square, Value};

/// Search-facing position. Move execution is copy-make: the previous board
/// is pushed on an internal stack, so undo is a pop.
#[derive(Clone)]
pub struct Position {
    board: Board,
    /// Boards before each executed move, oldest first.
    history: Vec<Board>,
    /// Piece captured by each executed move (None for null moves).
    captures: Vec<Option<PieceKind>>,
    /// Game ply at the root position (plies played before the search).
    start_ply: u32,
}

impl Position {
    pub fn new(board: Board) -> Position {
        Position {
            board,
            history: Vec::with_capacity(256),
            captures: Vec::with_capacity(256),
            start_ply: 0,
        }
    }

    pub fn startpos() -> Position {
        Position::new(Board::starting_position())
    }

    /// Build from a root board and the moves played to reach the current
    /// position, as the `position` UCI command supplies them.
    pub fn from_moves(root: Board, moves: &[Move]) -> Position {
        let mut pos = Position::new(root);
        for &mv in moves {
            pos.do_move(mv);
        }
        pos.start_ply = moves.len() as u32;
        pos
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.board.key()
    }

    #[inline]
    pub fn exclusion_key(&self) -> u64 {
        self.board.exclusion_key()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.board.in_check()
    }

    /// Plies played in the game before the search root.
    #[inline]
    pub fn game_ply(&self) -> u32 {
        self.start_ply
    }

    #[inline]
    pub fn do_move(&mut self, mv: Move) {
        self.captures.push(self.board.captured_kind(mv));
        self.history.push(self.board);
        self.board = self.board.make_move(mv);
    }

    #[inline]
    pub fn undo_move(&mut self) {
        self.board = self.history.pop().expect("undo without a prior move");
        self.captures.pop();
    }

    #[inline]
    pub fn do_null_move(&mut self) {
        self.captures.push(None);
        self.history.push(self.board);
        self.board = self.board.make_null_move();
    }

    #[inline]
    pub fn undo_null_move(&mut self) {
        self.undo_move();
    }

    /// What the most recently executed move captured, if anything.
    #[inline]
    pub fn last_captured(&self) -> Option<PieceKind> {
        self.captures.last().copied().flatten()
    }

    /// Draw by fifty-move rule, insufficient material, or (optionally)
    /// repetition of the current position anywhere in the reversible tail
    /// of the history.
    pub fn is_draw(&self, check_repetition: bool) -> bool {
        if self.board.halfmove_clock() >= 100 {
            return true;
        }
        if self.board.insufficient_material() {
            return true;
        }
        if check_repetition {
            let reversible = self.board.halfmove_clock() as usize;
            let key = self.board.key();
            // Positions with the other side to move can't repeat ours;
            // step back two plies at a time.
            let mut remaining = reversible;
            for prev in self.history.iter().rev().skip(1).step_by(2) {
                if remaining < 2 {
                    break;
                }
                remaining -= 2;
                if prev.key() == key {
                    return true;
                }
            }
        }
        false
    }

    /// Find the legal move matching a coordinate string like "e2e4".
    pub fn move_from_uci(&self, s: &str) -> Option<Move> {
        let moves = generate_legal_moves(&self.board);
        moves.as_slice().iter().copied().find(|m| m.to_uci() == s)
    }

    /// Is `mv` legal in the current position?
    pub fn is_legal(&self, mv: Move) -> bool {
        mv.is_some() && generate_legal_moves(&self.board).contains(mv)
    }

    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<PieceKind> {
        self.board.piece_on(sq)
    }

    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        self.board.is_capture(mv)
    }

    #[inline]
    pub fn is_capture_or_promotion(&self, mv: Move) -> bool {
        self.board.is_capture_or_promotion(mv)
    }

    #[inline]
    pub fn gives_check(&self, mv: Move) -> bool {
        self.board.gives_check(mv)
    }

    #[inline]
    pub fn see(&self, mv: Move) -> i32 {
        crate::board::see(&self.board, mv)
    }

    #[inline]
    pub fn see_sign(&self, mv: Move) -> i32 {
        crate::board::see_sign(&self.board, mv)
    }

    #[inline]
    pub fn non_pawn_material(&self, color: Color) -> Value {
        self.board.non_pawn_material(color)
    }
}
