//! Packed move values.

use crate::{Piece, Square};
use std::fmt;

/// What kind of move a [`Move`] is. Stored in the top four bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    Normal = 0,
    EnPassant = 1,
    DoublePush = 2,
    CastleShort = 3,
    CastleLong = 4,
    PromoteKnight = 5,
    PromoteBishop = 6,
    PromoteRook = 7,
    PromoteQueen = 8,
}

impl MoveFlag {
    const fn from_bits(bits: u8) -> MoveFlag {
        match bits {
            1 => MoveFlag::EnPassant,
            2 => MoveFlag::DoublePush,
            3 => MoveFlag::CastleShort,
            4 => MoveFlag::CastleLong,
            5 => MoveFlag::PromoteKnight,
            6 => MoveFlag::PromoteBishop,
            7 => MoveFlag::PromoteRook,
            8 => MoveFlag::PromoteQueen,
            _ => MoveFlag::Normal,
        }
    }

    /// Flag for promoting to `piece`. Non-promotable pieces map to `Normal`.
    #[inline]
    pub const fn promotion(piece: Piece) -> MoveFlag {
        match piece {
            Piece::Knight => MoveFlag::PromoteKnight,
            Piece::Bishop => MoveFlag::PromoteBishop,
            Piece::Rook => MoveFlag::PromoteRook,
            Piece::Queen => MoveFlag::PromoteQueen,
            _ => MoveFlag::Normal,
        }
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self {
            MoveFlag::PromoteKnight => Some(Piece::Knight),
            MoveFlag::PromoteBishop => Some(Piece::Bishop),
            MoveFlag::PromoteRook => Some(Piece::Rook),
            MoveFlag::PromoteQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self as u8 >= MoveFlag::PromoteKnight as u8
    }

    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self, MoveFlag::CastleShort | MoveFlag::CastleLong)
    }
}

/// A move packed into 16 bits: `from | to << 6 | flag << 12`.
///
/// A `Move` carries no piece information; it only makes sense together with
/// the position it was generated from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u16);

impl Move {
    /// Placeholder for "no move". Never produced by move generation (a1 to a1).
    pub const NULL: Move = Move(0);

    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u16) | ((to.index() as u16) << 6) | ((flag as u16) << 12))
    }

    #[inline]
    pub const fn normal(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlag::Normal)
    }

    /// Rebuilds a move from its packed form, e.g. out of a hash table slot.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Move(raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::from_index_unchecked((self.0 & 0x3F) as u8)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::from_index_unchecked(((self.0 >> 6) & 0x3F) as u8)
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        MoveFlag::from_bits((self.0 >> 12) as u8)
    }

    #[inline]
    pub const fn promotion(self) -> Option<Piece> {
        self.flag().promotion_piece()
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Coordinate notation, e.g. "e2e4" or "e7e8q".
    pub fn to_uci(self) -> String {
        self.to_string()
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({}, {:?})", self, self.flag())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0000");
        }
        write!(f, "{}{}", self.from(), self.to())?;
        if let Some(piece) = self.promotion() {
            write!(f, "{}", piece.letter())?;
        }
        Ok(())
    }
}
