//! Board state and move execution.

pub mod attacks;
mod fen;
pub mod movegen;
mod perft;
pub(crate) mod see;
pub(crate) mod zobrist;

pub use fen::FenError;
pub use movegen::{generate_legal_moves, MoveList};
pub use perft::perft;
pub use see::{see, see_sign};

use std::fmt;

use crate::types::{
    Bitboard, CastleRights, Color, Move, MoveKind, Piece, PieceKind, Square, Value,
    PIECE_VALUE_MIDGAME,
};

use attacks::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};

/// Castling rights revoked when a square is the source or destination of a
/// move. Covers king moves, rook moves and rook captures.
const CASTLE_RIGHTS_REVOKE: [CastleRights; 64] = {
    let mut table = [CastleRights::NONE; 64];
    table[Square::E1.index()] = CastleRights::WHITE_BOTH;
    table[Square::A1.index()] = CastleRights::WHITE_QUEEN;
    table[Square::H1.index()] = CastleRights::WHITE_KING;
    table[Square::E8.index()] = CastleRights::BLACK_BOTH;
    table[Square::A8.index()] = CastleRights::BLACK_QUEEN;
    table[Square::H8.index()] = CastleRights::BLACK_KING;
    table
};

/// Complete position state. `Copy` so move execution is copy-make: the
/// search keeps the previous board on its stack instead of undoing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Board {
    /// Per piece kind, both colors merged. Indexed by `PieceKind::index()`.
    pieces: [Bitboard; PieceKind::COUNT],
    /// Per side. Indexed by `Color::index()`.
    sides: [Bitboard; Color::COUNT],
    occupied: Bitboard,
    side_to_move: Color,
    castling: CastleRights,
    en_passant: Option<Square>,
    halfmove_clock: u16,
    fullmove_number: u16,
    key: u64,
}

impl Board {
    pub fn starting_position() -> Board {
        fen::parse(fen::STARTPOS).expect("startpos FEN is valid")
    }

    pub fn from_fen(s: &str) -> Result<Board, FenError> {
        fen::parse(s)
    }

    pub(crate) fn from_raw(
        pieces: [Bitboard; PieceKind::COUNT],
        sides: [Bitboard; Color::COUNT],
        side_to_move: Color,
        castling: CastleRights,
        en_passant: Option<Square>,
        halfmove_clock: u16,
        fullmove_number: u16,
    ) -> Board {
        let occupied = sides[0] | sides[1];
        // Keep the en-passant square only when a capturer exists, so keys
        // stay comparable between FEN-built and move-built positions.
        let en_passant = en_passant.filter(|&ep| {
            (pawn_attacks(side_to_move.flip(), ep)
                & pieces[PieceKind::Pawn.index()]
                & sides[side_to_move.index()])
            .is_nonempty()
        });
        let mut board = Board {
            pieces,
            sides,
            occupied,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            key: 0,
        };
        board.key = zobrist::hash_from_scratch(&board);
        board
    }

    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<PieceKind> {
        if !self.occupied.contains(sq) {
            return None;
        }
        PieceKind::ALL.into_iter().find(|&kind| self.pieces[kind.index()].contains(sq))
    }

    #[inline]
    pub fn color_on(&self, sq: Square) -> Option<Color> {
        Color::ALL.into_iter().find(|&color| self.sides[color.index()].contains(sq))
    }

    pub fn colored_piece_on(&self, sq: Square) -> Option<Piece> {
        Some(Piece::new(self.piece_on(sq)?, self.color_on(sq)?))
    }

    #[inline]
    pub fn pieces(&self, kind: PieceKind) -> Bitboard {
        self.pieces[kind.index()]
    }

    #[inline]
    pub fn pieces_of(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.pieces[kind.index()] & self.sides[color.index()]
    }

    #[inline]
    pub fn side(&self, color: Color) -> Bitboard {
        self.sides[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    /// King square of `color`. The board always carries both kings.
    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        let bb = self.pieces_of(color, PieceKind::King);
        debug_assert!(bb.is_single());
        bb.lsb().expect("one king per side")
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastleRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    /// Zobrist key of the position.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Key variant used when searching with an excluded move.
    #[inline]
    pub fn exclusion_key(&self) -> u64 {
        self.key ^ zobrist::EXCLUSION
    }

    #[inline]
    fn toggle_piece(&mut self, sq: Square, kind: PieceKind, color: Color) {
        let mask = sq.bitboard();
        self.pieces[kind.index()] ^= mask;
        self.sides[color.index()] ^= mask;
        self.occupied = self.sides[0] | self.sides[1];
        self.key ^= zobrist::PIECE_SQUARE[Piece::new(kind, color).index()][sq.index()];
    }

    /// All pieces of `by_color` attacking `sq`, given `occupied` for the
    /// slider rays. Attack patterns are cast from the target square.
    pub fn attackers_to(&self, sq: Square, by_color: Color, occupied: Bitboard) -> Bitboard {
        let them = self.side(by_color);
        let rook_like = self.pieces(PieceKind::Rook) | self.pieces(PieceKind::Queen);
        let bishop_like = self.pieces(PieceKind::Bishop) | self.pieces(PieceKind::Queen);
        // A pawn of `by_color` attacks `sq` iff a pawn of the other color
        // standing on `sq` would attack it.
        let pawns = pawn_attacks(by_color.flip(), sq) & self.pieces(PieceKind::Pawn);

        ((knight_attacks(sq) & self.pieces(PieceKind::Knight))
            | (king_attacks(sq) & self.pieces(PieceKind::King))
            | (rook_attacks(sq, occupied) & rook_like)
            | (bishop_attacks(sq, occupied) & bishop_like)
            | pawns)
            & them
    }

    #[inline]
    pub fn is_attacked(&self, sq: Square, by_color: Color, occupied: Bitboard) -> bool {
        self.attackers_to(sq, by_color, occupied).is_nonempty()
    }

    /// Is the side to move in check?
    #[inline]
    pub fn in_check(&self) -> bool {
        let us = self.side_to_move;
        self.is_attacked(self.king_square(us), us.flip(), self.occupied)
    }

    /// The piece captured by `mv`, if any.
    #[inline]
    pub fn captured_kind(&self, mv: Move) -> Option<PieceKind> {
        if mv.is_en_passant() {
            Some(PieceKind::Pawn)
        } else if mv.is_castle() {
            None
        } else {
            self.piece_on(mv.dest())
        }
    }

    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        self.captured_kind(mv).is_some()
    }

    #[inline]
    pub fn is_capture_or_promotion(&self, mv: Move) -> bool {
        mv.is_promotion() || self.is_capture(mv)
    }

    /// Total non-pawn, non-king material of `color` in midgame values.
    pub fn non_pawn_material(&self, color: Color) -> Value {
        let mut total = Value::ZERO;
        for kind in [PieceKind::Knight, PieceKind::Bishop, PieceKind::Rook, PieceKind::Queen] {
            let count = self.pieces_of(color, kind).count() as i32;
            total += PIECE_VALUE_MIDGAME[kind.index()] * count;
        }
        total
    }

    /// Does `color` have a pawn on its 7th rank?
    pub fn has_pawn_on_7th(&self, color: Color) -> bool {
        let rank7 = match color {
            Color::White => Bitboard::RANK_7,
            Color::Black => Bitboard::RANK_2,
        };
        (self.pieces_of(color, PieceKind::Pawn) & rank7).is_nonempty()
    }

    /// Is a pawn of `color` on `sq` passed (no enemy pawn ahead on its own
    /// or either adjacent file)?
    pub fn pawn_is_passed(&self, color: Color, sq: Square) -> bool {
        let their_pawns = self.pieces_of(color.flip(), PieceKind::Pawn);
        let file = sq.file().index() as i32;
        let rank = sq.rank().index() as i32;

        let mut span = Bitboard::EMPTY;
        for f in (file - 1).max(0)..=(file + 1).min(7) {
            let ahead = match color {
                Color::White => (rank + 1)..8,
                Color::Black => 0..rank,
            };
            for r in ahead {
                span |= Square::from_index_unchecked((r * 8 + f) as u8).bitboard();
            }
        }
        (span & their_pawns).is_empty()
    }

    /// Does `mv` push a pawn that will be passed on its destination?
    pub fn is_passed_pawn_push(&self, mv: Move) -> bool {
        self.piece_on(mv.source()) == Some(PieceKind::Pawn)
            && !self.is_capture(mv)
            && self.pawn_is_passed(self.side_to_move, mv.dest())
    }

    /// Neither side can possibly mate: bare kings, or king + single minor
    /// against bare king.
    pub fn insufficient_material(&self) -> bool {
        if (self.pieces(PieceKind::Pawn)
            | self.pieces(PieceKind::Rook)
            | self.pieces(PieceKind::Queen))
        .is_nonempty()
        {
            return false;
        }
        let minors = self.pieces(PieceKind::Knight) | self.pieces(PieceKind::Bishop);
        minors.at_most_one()
    }

    /// Does `mv` give check? Answered on a scratch copy so discovered
    /// checks, promotions, castling and en passant all fall out of the
    /// ordinary attack test.
    pub fn gives_check(&self, mv: Move) -> bool {
        let next = self.make_move(mv);
        next.in_check()
    }

    /// Apply a move, returning the resulting board. The move must be legal.
    pub fn make_move(&self, mv: Move) -> Board {
        debug_assert!(mv.is_some());

        let mut b = *self;
        let us = b.side_to_move;
        let them = us.flip();
        let src = mv.source();
        let dst = mv.dest();

        let moving = b.piece_on(src).expect("move source must be occupied");

        if let Some(old_ep) = b.en_passant {
            b.key ^= zobrist::EN_PASSANT_FILE[old_ep.file().index()];
        }
        b.key ^= zobrist::CASTLING[b.castling.bits() as usize];
        b.en_passant = None;

        let captured = match mv.kind() {
            MoveKind::Castling => None,
            MoveKind::EnPassant => Some(PieceKind::Pawn),
            _ => b.piece_on(dst),
        };

        match mv.kind() {
            MoveKind::Normal => {
                if let Some(victim) = captured {
                    b.toggle_piece(dst, victim, them);
                }
                b.toggle_piece(src, moving, us);
                b.toggle_piece(dst, moving, us);

                // A double pawn push sets the en-passant target, but only
                // when an enemy pawn can actually take it; otherwise the
                // square would poison repetition detection through the key.
                if moving == PieceKind::Pawn && dst.index().abs_diff(src.index()) == 16 {
                    let ep_idx = (src.index() + dst.index()) / 2;
                    let ep_sq = Square::from_index_unchecked(ep_idx as u8);
                    if (pawn_attacks(us, ep_sq) & b.pieces_of(them, PieceKind::Pawn))
                        .is_nonempty()
                    {
                        b.en_passant = Some(ep_sq);
                        b.key ^= zobrist::EN_PASSANT_FILE[ep_sq.file().index()];
                    }
                }
            }
            MoveKind::Promotion => {
                if let Some(victim) = captured {
                    b.toggle_piece(dst, victim, them);
                }
                b.toggle_piece(src, PieceKind::Pawn, us);
                b.toggle_piece(dst, mv.promotion_piece().piece_kind(), us);
            }
            MoveKind::EnPassant => {
                b.toggle_piece(src, PieceKind::Pawn, us);
                b.toggle_piece(dst, PieceKind::Pawn, us);
                // The captured pawn stands one rank behind the target.
                let captured_idx = match us {
                    Color::White => dst.index() - 8,
                    Color::Black => dst.index() + 8,
                };
                b.toggle_piece(
                    Square::from_index_unchecked(captured_idx as u8),
                    PieceKind::Pawn,
                    them,
                );
            }
            MoveKind::Castling => {
                b.toggle_piece(src, PieceKind::King, us);
                b.toggle_piece(dst, PieceKind::King, us);
                let (rook_src, rook_dst) = match dst {
                    Square::G1 => (Square::H1, Square::F1),
                    Square::C1 => (Square::A1, Square::D1),
                    Square::G8 => (Square::H8, Square::F8),
                    Square::C8 => (Square::A8, Square::D8),
                    _ => unreachable!("castling destination"),
                };
                b.toggle_piece(rook_src, PieceKind::Rook, us);
                b.toggle_piece(rook_dst, PieceKind::Rook, us);
            }
        }

        b.castling = b
            .castling
            .remove(CASTLE_RIGHTS_REVOKE[src.index()])
            .remove(CASTLE_RIGHTS_REVOKE[dst.index()]);
        b.key ^= zobrist::CASTLING[b.castling.bits() as usize];

        if moving == PieceKind::Pawn || captured.is_some() {
            b.halfmove_clock = 0;
        } else {
            b.halfmove_clock += 1;
        }

        b.side_to_move = them;
        b.key ^= zobrist::SIDE_TO_MOVE;

        if us == Color::Black {
            b.fullmove_number += 1;
        }

        b
    }

    /// Pass the turn. The caller must not be in check.
    pub fn make_null_move(&self) -> Board {
        debug_assert!(!self.in_check());

        let mut b = *self;
        if let Some(old_ep) = b.en_passant {
            b.key ^= zobrist::EN_PASSANT_FILE[old_ep.file().index()];
            b.en_passant = None;
        }
        b.side_to_move = b.side_to_move.flip();
        b.key ^= zobrist::SIDE_TO_MOVE;
        b.halfmove_clock += 1;
        b
    }

    pub fn to_fen(&self) -> String {
        fen::format(self)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board(\"{}\")", self.to_fen())
    }
}

impl std::str::FromStr for Board {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Board, FenError> {
        fen::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn starting_position_basics() {
        let b = Board::starting_position();
        assert_eq!(b.occupied().count(), 32);
        assert_eq!(b.piece_on(Square::E1), Some(PieceKind::King));
        assert_eq!(b.color_on(Square::E8), Some(Color::Black));
        assert_eq!(b.king_square(Color::White), Square::E1);
        assert_eq!(b.castling(), CastleRights::ALL);
        assert!(!b.in_check());
    }

    #[test]
    fn make_move_pawn_push() {
        let b = Board::starting_position();
        let after = b.make_move(Move::new(Square::E2, sq("e4")));
        assert_eq!(after.piece_on(sq("e4")), Some(PieceKind::Pawn));
        assert_eq!(after.piece_on(Square::E2), None);
        // No black pawn can capture on e3, so no en-passant square is kept.
        assert_eq!(after.en_passant(), None);
        assert_eq!(after.side_to_move(), Color::Black);
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));
    }

    #[test]
    fn capturable_double_push_keeps_ep_square() {
        let b: Board = "4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1".parse().unwrap();
        let after = b.make_move(Move::new(Square::E2, sq("e4")));
        assert_eq!(after.en_passant(), Some(sq("e3")));
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));
    }

    #[test]
    fn make_move_capture_resets_clock() {
        let b = Board::starting_position()
            .make_move(Move::new(Square::E2, sq("e4")))
            .make_move(Move::new(sq("d7"), sq("d5")));
        let after = b.make_move(Move::new(sq("e4"), sq("d5")));
        assert_eq!(after.piece_on(sq("d5")), Some(PieceKind::Pawn));
        assert_eq!(after.color_on(sq("d5")), Some(Color::White));
        assert_eq!(after.halfmove_clock(), 0);
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));
    }

    #[test]
    fn make_move_en_passant() {
        let b = Board::starting_position()
            .make_move(Move::new(Square::E2, sq("e4")))
            .make_move(Move::new(sq("a7"), sq("a6")))
            .make_move(Move::new(sq("e4"), sq("e5")))
            .make_move(Move::new(sq("d7"), sq("d5")));
        assert_eq!(b.en_passant(), Some(sq("d6")));

        let after = b.make_move(Move::new_en_passant(sq("e5"), sq("d6")));
        assert_eq!(after.piece_on(sq("d6")), Some(PieceKind::Pawn));
        assert_eq!(after.piece_on(sq("d5")), None);
        assert_eq!(after.piece_on(sq("e5")), None);
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));
    }

    #[test]
    fn make_move_castling() {
        let b: Board = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1".parse().unwrap();
        let after = b.make_move(Move::new_castle(Square::E1, Square::G1));
        assert_eq!(after.piece_on(Square::G1), Some(PieceKind::King));
        assert_eq!(after.piece_on(Square::F1), Some(PieceKind::Rook));
        assert!(!after.castling().intersects(CastleRights::WHITE_BOTH));
        assert!(after.castling().contains(CastleRights::BLACK_BOTH));
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));

        let qside = b.make_move(Move::new_castle(Square::E1, Square::C1));
        assert_eq!(qside.piece_on(Square::C1), Some(PieceKind::King));
        assert_eq!(qside.piece_on(Square::D1), Some(PieceKind::Rook));
        assert_eq!(qside.key(), zobrist::hash_from_scratch(&qside));
    }

    #[test]
    fn make_move_promotion() {
        let b: Board = "4k3/4P3/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        for promo in crate::types::PromotionPiece::ALL {
            let after = b.make_move(Move::new_promotion(Square::E7, Square::E8, promo));
            assert_eq!(after.piece_on(Square::E8), Some(promo.piece_kind()));
            assert_eq!(after.key(), zobrist::hash_from_scratch(&after), "promo {promo:?}");
        }
    }

    #[test]
    fn rook_capture_revokes_castling() {
        let b: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let after = b.make_move(Move::new(Square::A1, Square::A8));
        assert!(!after.castling().contains(CastleRights::BLACK_QUEEN));
        assert!(!after.castling().contains(CastleRights::WHITE_QUEEN));
        assert!(after.castling().contains(CastleRights::BLACK_KING));
        assert_eq!(after.key(), zobrist::hash_from_scratch(&after));
    }

    #[test]
    fn transposition_same_key() {
        let path_a = Board::starting_position()
            .make_move(Move::new(Square::G1, sq("f3")))
            .make_move(Move::new(sq("g8"), sq("f6")))
            .make_move(Move::new(Square::B1, sq("c3")))
            .make_move(Move::new(sq("b8"), sq("c6")));
        let path_b = Board::starting_position()
            .make_move(Move::new(Square::B1, sq("c3")))
            .make_move(Move::new(sq("b8"), sq("c6")))
            .make_move(Move::new(Square::G1, sq("f3")))
            .make_move(Move::new(sq("g8"), sq("f6")));
        assert_eq!(path_a.key(), path_b.key());
    }

    #[test]
    fn null_move_flips_side_only() {
        let b = Board::starting_position().make_move(Move::new(Square::E2, sq("e4")));
        let n = b.make_null_move();
        assert_eq!(n.side_to_move(), Color::White);
        assert_eq!(n.en_passant(), None);
        assert_eq!(n.occupied(), b.occupied());
        assert_eq!(n.key(), zobrist::hash_from_scratch(&n));
    }

    #[test]
    fn gives_check_direct_and_discovered() {
        // Rook slides to e-file: direct check.
        let b: Board = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1".parse().unwrap();
        assert!(b.gives_check(Move::new(Square::A1, sq("a8"))));
        assert!(!b.gives_check(Move::new(Square::A1, sq("b1"))));

        // Bishop steps off the e-file, discovering the rook behind it.
        let d: Board = "4k3/8/8/8/4B3/8/8/4RK2 w - - 0 1".parse().unwrap();
        assert!(d.gives_check(Move::new(sq("e4"), sq("d5"))));
    }

    #[test]
    fn material_predicates() {
        let b = Board::starting_position();
        assert!(b.non_pawn_material(Color::White) > Value::ZERO);
        assert!(!b.has_pawn_on_7th(Color::White));

        let promo: Board = "4k3/4P3/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(promo.has_pawn_on_7th(Color::White));
        assert_eq!(promo.non_pawn_material(Color::White), Value::ZERO);
    }

    #[test]
    fn passed_pawn_detection() {
        let b: Board = "4k3/8/8/3pP3/8/8/8/4K3 w - - 0 1".parse().unwrap();
        // e5 is passed: no black pawn on d/e/f ahead of it... except d5 is
        // beside, not ahead.
        assert!(b.pawn_is_passed(Color::White, sq("e5")));
        assert!(b.is_passed_pawn_push(Move::new(sq("e5"), sq("e6"))));

        let blocked: Board = "4k3/4p3/8/4P3/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(!blocked.pawn_is_passed(Color::White, sq("e5")));
    }

    #[test]
    fn insufficient_material_cases() {
        let kk: Board = "4k3/8/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(kk.insufficient_material());

        let kbk: Board = "4k3/8/8/8/8/8/8/2B1K3 w - - 0 1".parse().unwrap();
        assert!(kbk.insufficient_material());

        let knnk: Board = "4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1".parse().unwrap();
        assert!(!knnk.insufficient_material());

        let kpk: Board = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1".parse().unwrap();
        assert!(!kpk.insufficient_material());
    }
}
