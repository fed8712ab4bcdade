//! Piece kinds and colored pieces.

use super::Color;
use crate::types::Value;

/// Uncolored piece kind, ordered by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 0,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// Midgame piece values, indexed by [`PieceKind::index()`].
pub const PIECE_VALUE_MIDGAME: [Value; 6] = [
    Value::new(198),
    Value::new(817),
    Value::new(836),
    Value::new(1270),
    Value::new(2521),
    Value::new(0),
];

/// Endgame piece values, indexed by [`PieceKind::index()`].
pub const PIECE_VALUE_ENDGAME: [Value; 6] = [
    Value::new(258),
    Value::new(846),
    Value::new(857),
    Value::new(1278),
    Value::new(2558),
    Value::new(0),
];

/// The midgame pawn value, used to scale scores to centipawns.
pub const PAWN_VALUE_MIDGAME: Value = PIECE_VALUE_MIDGAME[0];
pub const PAWN_VALUE_ENDGAME: Value = PIECE_VALUE_ENDGAME[0];
pub const ROOK_VALUE_MIDGAME: Value = PIECE_VALUE_MIDGAME[3];

impl PieceKind {
    pub const COUNT: usize = 6;
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(idx: u8) -> Option<PieceKind> {
        if idx < 6 {
            Some(Self::ALL[idx as usize])
        } else {
            None
        }
    }

    #[inline]
    pub const fn is_slider(self) -> bool {
        matches!(self, PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen)
    }

    #[inline]
    pub const fn midgame_value(self) -> Value {
        PIECE_VALUE_MIDGAME[self.index()]
    }

    #[inline]
    pub const fn endgame_value(self) -> Value {
        PIECE_VALUE_ENDGAME[self.index()]
    }

    /// Lowercase FEN character.
    pub const fn fen_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub const fn from_fen_char(c: char) -> Option<PieceKind> {
        match c {
            'p' | 'P' => Some(PieceKind::Pawn),
            'n' | 'N' => Some(PieceKind::Knight),
            'b' | 'B' => Some(PieceKind::Bishop),
            'r' | 'R' => Some(PieceKind::Rook),
            'q' | 'Q' => Some(PieceKind::Queen),
            'k' | 'K' => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// A colored piece, indexed 0..12: white P,N,B,R,Q,K then black P,N,B,R,Q,K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    kind: PieceKind,
    color: Color,
}

impl Piece {
    pub const COUNT: usize = 12;

    #[inline]
    pub const fn new(kind: PieceKind, color: Color) -> Piece {
        Piece { kind, color }
    }

    #[inline]
    pub const fn kind(self) -> PieceKind {
        self.kind
    }

    #[inline]
    pub const fn color(self) -> Color {
        self.color
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.color.index() * 6 + self.kind.index()
    }

    pub fn all() -> impl Iterator<Item = Piece> {
        Color::ALL
            .into_iter()
            .flat_map(|c| PieceKind::ALL.into_iter().map(move |k| Piece::new(k, c)))
    }

    pub const fn fen_char(self) -> char {
        let c = self.kind.fen_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}
