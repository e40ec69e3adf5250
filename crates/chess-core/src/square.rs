//! Board coordinates.

use std::fmt;

/// A file (column), a to h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum File {
    A = 0,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl File {
    pub const ALL: [File; 8] = [
        File::A,
        File::B,
        File::C,
        File::D,
        File::E,
        File::F,
        File::G,
        File::H,
    ];

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Parses 'a'..='h' (case-insensitive).
    #[inline]
    pub const fn from_char(c: char) -> Option<Self> {
        let c = c.to_ascii_lowercase();
        if c >= 'a' && c <= 'h' {
            Self::from_index(c as u8 - b'a')
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn to_char(self) -> char {
        (b'a' + self as u8) as char
    }
}

/// A rank (row), 1 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rank {
    R1 = 0,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::R1,
        Rank::R2,
        Rank::R3,
        Rank::R4,
        Rank::R5,
        Rank::R6,
        Rank::R7,
        Rank::R8,
    ];

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Parses '1'..='8'.
    #[inline]
    pub const fn from_char(c: char) -> Option<Self> {
        if c >= '1' && c <= '8' {
            Self::from_index(c as u8 - b'1')
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn to_char(self) -> char {
        (b'1' + self as u8) as char
    }
}

/// One of the 64 squares, little-endian rank-file order (a1 = 0, h1 = 7, h8 = 63).
///
/// A `Square` always holds an index below 64. "No square" is expressed with
/// `Option<Square>`, never with a reserved index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Builds a square from its file and rank.
    #[inline]
    pub const fn new(file: File, rank: Rank) -> Self {
        Square(rank.index() * 8 + file.index())
    }

    /// Builds a square from an index, rejecting anything above 63.
    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Square(index))
        } else {
            None
        }
    }

    /// Builds a square from an index the caller knows to be in range.
    ///
    /// Out-of-range input is wrapped onto the board in release builds and
    /// trips a debug assertion otherwise.
    #[inline]
    pub const fn from_index_unchecked(index: u8) -> Self {
        debug_assert!(index < 64);
        Square(index & 63)
    }

    /// Builds a square from zero-based file and rank coordinates.
    #[inline]
    pub const fn from_coords(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Square(rank * 8 + file))
        } else {
            None
        }
    }

    /// Parses coordinate notation such as "e4".
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file = File::from_char(chars.next()?)?;
        let rank = Rank::from_char(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Square::new(file, rank))
    }

    /// Index 0-63, usable directly for table lookups.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Zero-based file (0 = a).
    #[inline]
    pub const fn file_index(self) -> u8 {
        self.0 & 7
    }

    /// Zero-based rank (0 = rank 1).
    #[inline]
    pub const fn rank_index(self) -> u8 {
        self.0 >> 3
    }

    #[inline]
    pub const fn file(self) -> File {
        File::ALL[(self.0 & 7) as usize]
    }

    #[inline]
    pub const fn rank(self) -> Rank {
        Rank::ALL[(self.0 >> 3) as usize]
    }

    /// Shifts by a raw index delta. The caller guarantees the result stays on the board.
    #[inline]
    pub const fn offset(self, delta: i8) -> Self {
        Square::from_index_unchecked((self.0 as i8 + delta) as u8)
    }

    /// Single-bit mask of this square.
    #[inline]
    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// Mirrors the square vertically (a1 <-> a8).
    #[inline]
    pub const fn flip_rank(self) -> Self {
        Square(self.0 ^ 56)
    }

    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file().to_char(), self.rank().to_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates() {
        let e4 = Square::new(File::E, Rank::R4);
        assert_eq!(e4.index(), 28);
        assert_eq!(e4.file(), File::E);
        assert_eq!(e4.rank(), Rank::R4);
        assert_eq!(e4.file_index(), 4);
        assert_eq!(e4.rank_index(), 3);
        assert_eq!(Square::from_coords(4, 3), Some(e4));
        assert_eq!(Square::from_coords(8, 0), None);
    }

    #[test]
    fn algebraic_parsing() {
        assert_eq!(Square::from_algebraic("a1"), Some(Square::A1));
        assert_eq!(Square::from_algebraic("h8"), Some(Square::H8));
        assert_eq!(Square::from_algebraic("E2").map(|s| s.index()), Some(12));
        assert_eq!(Square::from_algebraic("i1"), None);
        assert_eq!(Square::from_algebraic("a9"), None);
        assert_eq!(Square::from_algebraic("a10"), None);
        assert_eq!(Square::from_algebraic(""), None);
    }

    #[test]
    fn display_and_bits() {
        assert_eq!(Square::G1.to_string(), "g1");
        assert_eq!(Square::A8.bit(), 1 << 56);
        assert_eq!(Square::E1.flip_rank(), Square::E8);
        assert_eq!(Square::E1.offset(8).to_string(), "e2");
        assert_eq!(format!("{:?}", Square::C8), "Square(c8)");
    }

    #[test]
    fn index_bound() {
        assert!(Square::from_index(63).is_some());
        assert!(Square::from_index(64).is_none());
    }
}
