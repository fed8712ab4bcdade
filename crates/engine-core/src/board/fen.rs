//! FEN parsing and formatting.

use std::fmt;

use super::Board;
use crate::types::{Bitboard, CastleRights, Color, PieceKind, Square};

pub(crate) const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Why a FEN string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    MissingField(&'static str),
    BadPlacement(String),
    BadSideToMove(String),
    BadCastling(String),
    BadEnPassant(String),
    BadCounter(String),
    MissingKing(Color),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingField(name) => write!(f, "missing FEN field: {name}"),
            FenError::BadPlacement(s) => write!(f, "bad piece placement: {s}"),
            FenError::BadSideToMove(s) => write!(f, "bad side to move: {s}"),
            FenError::BadCastling(s) => write!(f, "bad castling rights: {s}"),
            FenError::BadEnPassant(s) => write!(f, "bad en passant square: {s}"),
            FenError::BadCounter(s) => write!(f, "bad move counter: {s}"),
            FenError::MissingKing(c) => write!(f, "side {c} has no king"),
        }
    }
}

impl std::error::Error for FenError {}

pub(crate) fn parse(s: &str) -> Result<Board, FenError> {
    let mut fields = s.split_whitespace();

    let placement = fields.next().ok_or(FenError::MissingField("placement"))?;
    let stm = fields.next().ok_or(FenError::MissingField("side to move"))?;
    let castling = fields.next().unwrap_or("-");
    let en_passant = fields.next().unwrap_or("-");
    let halfmove = fields.next().unwrap_or("0");
    let fullmove = fields.next().unwrap_or("1");

    let mut pieces = [Bitboard::EMPTY; PieceKind::COUNT];
    let mut sides = [Bitboard::EMPTY; Color::COUNT];

    let mut rank: i32 = 7;
    let mut file: i32 = 0;
    for c in placement.chars() {
        match c {
            '/' => {
                if file != 8 {
                    return Err(FenError::BadPlacement(placement.into()));
                }
                rank -= 1;
                file = 0;
            }
            '1'..='8' => file += c as i32 - '0' as i32,
            _ => {
                let kind = PieceKind::from_fen_char(c)
                    .ok_or_else(|| FenError::BadPlacement(placement.into()))?;
                let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                    return Err(FenError::BadPlacement(placement.into()));
                }
                let sq = Square::from_index_unchecked((rank * 8 + file) as u8);
                pieces[kind.index()] |= sq.bitboard();
                sides[color.index()] |= sq.bitboard();
                file += 1;
            }
        }
        if file > 8 {
            return Err(FenError::BadPlacement(placement.into()));
        }
    }
    if rank != 0 || file != 8 {
        return Err(FenError::BadPlacement(placement.into()));
    }

    let side_to_move = match stm {
        "w" => Color::White,
        "b" => Color::Black,
        other => return Err(FenError::BadSideToMove(other.into())),
    };

    let mut rights = CastleRights::NONE;
    if castling != "-" {
        for c in castling.chars() {
            rights = rights.add(match c {
                'K' => CastleRights::WHITE_KING,
                'Q' => CastleRights::WHITE_QUEEN,
                'k' => CastleRights::BLACK_KING,
                'q' => CastleRights::BLACK_QUEEN,
                _ => return Err(FenError::BadCastling(castling.into())),
            });
        }
    }

    let ep = if en_passant == "-" {
        None
    } else {
        Some(
            Square::from_algebraic(en_passant)
                .ok_or_else(|| FenError::BadEnPassant(en_passant.into()))?,
        )
    };

    let halfmove_clock: u16 =
        halfmove.parse().map_err(|_| FenError::BadCounter(halfmove.into()))?;
    let fullmove_number: u16 =
        fullmove.parse().map_err(|_| FenError::BadCounter(fullmove.into()))?;

    for color in Color::ALL {
        if (pieces[PieceKind::King.index()] & sides[color.index()]).count() != 1 {
            return Err(FenError::MissingKing(color));
        }
    }

    Ok(Board::from_raw(
        pieces,
        sides,
        side_to_move,
        rights,
        ep,
        halfmove_clock,
        fullmove_number.max(1),
    ))
}

pub(crate) fn format(board: &Board) -> String {
    let mut out = String::new();

    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            let sq = Square::from_index_unchecked(rank * 8 + file);
            match board.colored_piece_on(sq) {
                Some(piece) => {
                    if empty > 0 {
                        out.push((b'0' + empty) as char);
                        empty = 0;
                    }
                    out.push(piece.fen_char());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push((b'0' + empty) as char);
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push_str(&board.side_to_move().to_string());
    out.push(' ');
    out.push_str(&board.castling().to_string());
    out.push(' ');
    match board.en_passant() {
        Some(sq) => out.push_str(&sq.to_string()),
        None => out.push('-'),
    }
    out.push_str(&format!(" {} {}", board.halfmove_clock(), board.fullmove_number()));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_roundtrip() {
        let board = parse(STARTPOS).unwrap();
        assert_eq!(format(&board), STARTPOS);
    }

    #[test]
    fn arbitrary_roundtrip() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2",
            "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1",
        ];
        for fen in fens {
            let board = parse(fen).unwrap();
            assert_eq!(format(&board), fen, "roundtrip of {fen}");
        }
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse("").is_err());
        assert!(parse("rnbqkbnr/pppppppp w KQkq - 0 1").is_err());
        assert!(parse("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
        // No kings.
        assert!(parse("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn parses_partial_fen() {
        // Trailing fields are optional.
        let board = parse("4k3/8/8/8/8/8/8/4K3 w").unwrap();
        assert_eq!(board.castling(), CastleRights::NONE);
        assert_eq!(board.en_passant(), None);
        assert_eq!(board.halfmove_clock(), 0);
    }
}
