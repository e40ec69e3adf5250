//! FEN (Forsyth-Edwards Notation) parsing and serialization.

use crate::{CastlingRights, Color, Piece, Rank, Square};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),

    #[error("{0} must have exactly one king, found {1}")]
    KingCount(Color, usize),
}

/// The six FEN fields, decoded into typed values.
///
/// The engine maps these onto its own board representation; this type does no
/// legality checking beyond requiring one king per side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenParser {
    /// Occupant of each square, indexed a1 = 0 .. h8 = 63.
    pub board: [Option<(Piece, Color)>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl FenParser {
    /// The standard starting position FEN.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string. The two clock fields may be omitted and default to `0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let board = Self::parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = Self::parse_castling(parts[2])?;
        let en_passant = Self::parse_en_passant(parts[3])?;
        if let Some(target) = en_passant {
            Self::check_en_passant(&board, side_to_move, target)
                .map_err(|reason| FenError::InvalidEnPassantSquare(format!("{target}: {reason}")))?;
        }

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let fullmove = parts[5]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        Ok(FenParser {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    fn parse_placement(placement: &str) -> Result<[Option<(Piece, Color)>; 64], FenError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut board = [None; 64];
        let mut kings = [0usize; 2];

        // FEN lists rank 8 first.
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "bad empty-square count '{}' in rank {}",
                            c,
                            rank + 1
                        )));
                    }
                    file += skip as u8;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    let sq = Square::from_coords(file, rank).ok_or_else(|| {
                        FenError::InvalidPiecePlacement(format!("rank {} overflows", rank + 1))
                    })?;
                    if piece == Piece::Pawn && matches!(sq.rank(), Rank::R1 | Rank::R8) {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "pawn on back rank at {sq}"
                        )));
                    }
                    board[sq.index()] = Some((piece, color));
                    if piece == Piece::King {
                        kings[color.index()] += 1;
                    }
                    file += 1;
                } else {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "invalid character '{}' in rank {}",
                        c,
                        rank + 1
                    )));
                }
                if file > 8 {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "rank {} has more than 8 squares",
                        rank + 1
                    )));
                }
            }
            if file != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has {} squares, expected 8",
                    rank + 1,
                    file
                )));
            }
        }

        for color in Color::BOTH {
            if kings[color.index()] != 1 {
                return Err(FenError::KingCount(color, kings[color.index()]));
            }
        }

        Ok(board)
    }

    fn parse_castling(castling: &str) -> Result<CastlingRights, FenError> {
        let mut rights = CastlingRights::NONE;
        if castling == "-" {
            return Ok(rights);
        }
        for c in castling.chars() {
            let bit = match c {
                'K' => CastlingRights::WHITE_SHORT,
                'Q' => CastlingRights::WHITE_LONG,
                'k' => CastlingRights::BLACK_SHORT,
                'q' => CastlingRights::BLACK_LONG,
                _ => {
                    return Err(FenError::InvalidCastlingRights(format!(
                        "invalid character '{}'",
                        c
                    )))
                }
            };
            rights.set(bit);
        }
        Ok(rights)
    }

    fn parse_en_passant(ep: &str) -> Result<Option<Square>, FenError> {
        if ep == "-" {
            return Ok(None);
        }
        Square::from_algebraic(ep)
            .map(Some)
            .ok_or_else(|| FenError::InvalidEnPassantSquare(ep.to_string()))
    }

    /// The target must be the empty square an enemy pawn just skipped over.
    fn check_en_passant(
        board: &[Option<(Piece, Color)>; 64],
        side_to_move: Color,
        target: Square,
    ) -> Result<(), &'static str> {
        let them = side_to_move.opposite();
        let expected_rank = match side_to_move {
            Color::White => Rank::R6,
            Color::Black => Rank::R3,
        };
        if target.rank() != expected_rank {
            return Err("wrong rank for the side to move");
        }
        if board[target.index()].is_some() {
            return Err("target square is occupied");
        }
        if board[target.offset(them.forward()).index()] != Some((Piece::Pawn, them)) {
            return Err("no pawn to capture");
        }
        Ok(())
    }

    /// Serializes back to a six-field FEN string.
    pub fn to_fen(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FenParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.board[(rank * 8 + file) as usize] {
                    Some((piece, color)) => {
                        if empty > 0 {
                            write!(f, "{empty}")?;
                            empty = 0;
                        }
                        write!(f, "{}", piece.to_fen_char(color))?;
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                write!(f, "{empty}")?;
            }
            if rank > 0 {
                f.write_str("/")?;
            }
        }

        let side = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        write!(f, " {} {} ", side, self.castling)?;
        match self.en_passant {
            Some(sq) => write!(f, "{sq}")?,
            None => f.write_str("-")?,
        }
        write!(f, " {} {}", self.halfmove_clock, self.fullmove_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_startpos() {
        let fen = FenParser::parse(FenParser::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, CastlingRights::ALL);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.board[Square::E1.index()], Some((Piece::King, Color::White)));
        assert_eq!(fen.board[Square::D8.index()], Some((Piece::Queen, Color::Black)));
        assert_eq!(fen.board[Square::A1.offset(8).index()], Some((Piece::Pawn, Color::White)));
        assert_eq!(fen.board[27], None);
    }

    #[test]
    fn roundtrip() {
        for original in [
            FenParser::STARTPOS,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 12 40",
        ] {
            let parsed = FenParser::parse(original).unwrap();
            assert_eq!(parsed.to_fen(), original);
        }
    }

    #[test]
    fn clocks_are_optional() {
        let fen = FenParser::parse("4k3/8/8/8/3P4/8/8/4K3 b Kq d3").unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.en_passant, Square::from_algebraic("d3"));
        assert_eq!(fen.to_fen(), "4k3/8/8/8/3P4/8/8/4K3 b Kq d3 0 1");
    }

    #[test]
    fn rejects_bad_fields() {
        assert!(matches!(
            FenParser::parse("invalid"),
            Err(FenError::InvalidPartCount(1))
        ));
        assert!(matches!(
            FenParser::parse("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
            Err(FenError::InvalidActiveColor(_))
        ));
        assert!(matches!(
            FenParser::parse("4k3/8/8/8/8/8/8/4K3 w XYZ - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            FenParser::parse("4k3/8/8/8/8/8/8/4K3 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            FenParser::parse("4k3/8/8/8/8/8/8/4K3 w - - abc 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            FenParser::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 xyz"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn rejects_bad_placement() {
        for bad in [
            "8/8/8/8/8/8/8 w - - 0 1",
            "4k3/8/8/8/8/8/8/4K2X w - - 0 1",
            "4k3/8/8/8/8/8/8/4K4 w - - 0 1",
            "4k3/8/8/8/8/8/8/4K2 w - - 0 1",
        ] {
            assert!(
                matches!(FenParser::parse(bad), Err(FenError::InvalidPiecePlacement(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn rejects_pawns_on_back_ranks() {
        for bad in [
            "4k3/8/8/8/8/8/8/p3K3 b - - 0 1",
            "P3k3/8/8/8/8/8/8/4K3 w - - 0 1",
        ] {
            assert!(
                matches!(FenParser::parse(bad), Err(FenError::InvalidPiecePlacement(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn en_passant_target_must_follow_a_double_push() {
        for bad in [
            // rank 3 target with white to move
            "4k3/8/8/8/8/8/3P4/4K3 w - e3 0 1",
            // rank 6 target with black to move
            "4k3/8/8/3pP3/8/8/8/4K3 b - d6 0 1",
            // no pawn in front of the target
            "4k3/8/8/4P3/8/8/8/4K3 w - d6 0 1",
            // our own pawn in front of the target
            "4k3/8/8/3PP3/8/8/8/4K3 w - d6 0 1",
            // occupied target
            "4k3/8/3n4/3pP3/8/8/8/4K3 w - d6 0 1",
        ] {
            assert!(
                matches!(FenParser::parse(bad), Err(FenError::InvalidEnPassantSquare(_))),
                "{bad}"
            );
        }

        let ok = FenParser::parse("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        assert_eq!(ok.en_passant, Square::from_algebraic("d6"));
    }

    #[test]
    fn requires_one_king_each() {
        assert_eq!(
            FenParser::parse("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::KingCount(Color::Black, 0))
        );
        assert_eq!(
            FenParser::parse("4k3/8/8/8/8/8/8/3KK3 w - - 0 1"),
            Err(FenError::KingCount(Color::White, 2))
        );
    }

    #[test]
    fn error_messages_carry_input() {
        let err = FenError::InvalidActiveColor("x".to_string());
        assert!(err.to_string().contains("'x'"));
        let err = FenError::KingCount(Color::White, 2);
        assert_eq!(err.to_string(), "white must have exactly one king, found 2");
    }

    fn placement() -> impl Strategy<Value = [Option<(Piece, Color)>; 64]> {
        let occupant = prop_oneof![
            4 => Just(None),
            1 => (0usize..5, any::<bool>()).prop_map(|(piece, white)| {
                let color = if white { Color::White } else { Color::Black };
                Some((Piece::ALL[piece], color))
            }),
        ];
        (
            proptest::collection::vec(occupant, 64),
            0usize..64,
            0usize..64,
        )
            .prop_filter("kings need distinct squares", |(_, white, black)| white != black)
            .prop_map(|(squares, white_king, black_king)| {
                let mut board = [None; 64];
                for (index, occupant) in squares.into_iter().enumerate() {
                    let back_rank = index < 8 || index >= 56;
                    board[index] = match occupant {
                        Some((Piece::Pawn, _)) if back_rank => None,
                        other => other,
                    };
                }
                board[white_king] = Some((Piece::King, Color::White));
                board[black_king] = Some((Piece::King, Color::Black));
                board
            })
    }

    proptest! {
        #[test]
        fn serialized_positions_parse_back(
            board in placement(),
            white_to_move in any::<bool>(),
            castling in 0u8..16,
            halfmove_clock in 0u32..100,
            fullmove_number in 1u32..300,
        ) {
            let fen = FenParser {
                board,
                side_to_move: if white_to_move { Color::White } else { Color::Black },
                castling: CastlingRights::from_bits(castling),
                en_passant: None,
                halfmove_clock,
                fullmove_number,
            };
            let text = fen.to_fen();
            prop_assert_eq!(FenParser::parse(&text), Ok(fen));
        }

        #[test]
        fn arbitrary_text_parses_or_errors(
            text in "[1-8pnbrqkPNBRQK]{1,8}(/[1-8pnbrqkPNBRQK]{1,8}){7} [wb] (-|K?Q?k?q?) (-|[a-h][1-8])"
        ) {
            if let Ok(parsed) = FenParser::parse(&text) {
                prop_assert_eq!(FenParser::parse(&parsed.to_fen()), Ok(parsed.clone()));
                if let Some(target) = parsed.en_passant {
                    let behind = target.offset(parsed.side_to_move.opposite().forward());
                    prop_assert_eq!(
                        parsed.board[behind.index()],
                        Some((Piece::Pawn, parsed.side_to_move.opposite()))
                    );
                }
            }
        }
    }
}
