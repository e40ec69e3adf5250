//! Castling-rights bit set.

use crate::{Color, Square};
use std::fmt;

/// Four castling-right bits: white short, white long, black short, black long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_SHORT: u8 = 1;
    pub const WHITE_LONG: u8 = 2;
    pub const BLACK_SHORT: u8 = 4;
    pub const BLACK_LONG: u8 = 8;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(15);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        CastlingRights(bits & 15)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn has(self, right: u8) -> bool {
        self.0 & right != 0
    }

    #[inline]
    pub fn set(&mut self, right: u8) {
        self.0 |= right & 15;
    }

    #[inline]
    pub fn remove(&mut self, rights: u8) {
        self.0 &= !rights;
    }

    #[inline]
    pub const fn short_right(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_SHORT,
            Color::Black => Self::BLACK_SHORT,
        }
    }

    #[inline]
    pub const fn long_right(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_LONG,
            Color::Black => Self::BLACK_LONG,
        }
    }

    /// Rights that are lost when a piece leaves or lands on `sq`.
    #[inline]
    pub const fn lost_by_touching(sq: Square) -> u8 {
        match sq.index() {
            0 => Self::WHITE_LONG,
            4 => Self::WHITE_SHORT | Self::WHITE_LONG,
            7 => Self::WHITE_SHORT,
            56 => Self::BLACK_LONG,
            60 => Self::BLACK_SHORT | Self::BLACK_LONG,
            63 => Self::BLACK_SHORT,
            _ => 0,
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("-");
        }
        let letters = [
            (Self::WHITE_SHORT, 'K'),
            (Self::WHITE_LONG, 'Q'),
            (Self::BLACK_SHORT, 'k'),
            (Self::BLACK_LONG, 'q'),
        ];
        for (bit, letter) in letters {
            if self.has(bit) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}
