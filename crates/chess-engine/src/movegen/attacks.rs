//! Leaper attack tables and square-to-square geometry.
//!
//! Everything here is computed at compile time. Sliding attacks live in
//! [`super::magics`] and are re-exported.

use crate::Bitboard;
use chess_core::{Color, Piece, Square};

pub use super::magics::{bishop_attacks, queen_attacks, rook_attacks};

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const KNIGHT_ATTACKS: [Bitboard; 64] = leaper_table(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; 64] = leaper_table(&KING_DELTAS);
const PAWN_ATTACKS: [[Bitboard; 64]; 2] = [
    leaper_table(&[(-1, 1), (1, 1)]),
    leaper_table(&[(-1, -1), (1, -1)]),
];

/// `(BETWEEN, LINE)` indexed `[a][b]`. BETWEEN holds the squares strictly
/// between two aligned squares; LINE holds the full edge-to-edge line through
/// them. Both are empty for unaligned pairs.
static GEOMETRY: ([[Bitboard; 64]; 64], [[Bitboard; 64]; 64]) = geometry_tables();

#[inline]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index()]
}

#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index()]
}

/// Squares a `color` pawn on `sq` attacks.
#[inline]
pub fn pawn_attacks(sq: Square, color: Color) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index()]
}

#[inline]
pub fn between(a: Square, b: Square) -> Bitboard {
    GEOMETRY.0[a.index()][b.index()]
}

#[inline]
pub fn line(a: Square, b: Square) -> Bitboard {
    GEOMETRY.1[a.index()][b.index()]
}

/// Attack set of a non-pawn piece on `sq` with the given occupancy.
#[inline]
pub fn piece_attacks(piece: Piece, sq: Square, occupied: Bitboard) -> Bitboard {
    match piece {
        Piece::Knight => knight_attacks(sq),
        Piece::Bishop => bishop_attacks(sq, occupied),
        Piece::Rook => rook_attacks(sq, occupied),
        Piece::Queen => queen_attacks(sq, occupied),
        Piece::King => king_attacks(sq),
        Piece::Pawn => Bitboard::EMPTY,
    }
}

const fn on_board(file: i8, rank: i8) -> bool {
    file >= 0 && file < 8 && rank >= 0 && rank < 8
}

const fn leaper_table(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let file = (sq % 8) as i8;
        let rank = (sq / 8) as i8;
        let mut bits = 0u64;
        let mut i = 0;
        while i < deltas.len() {
            let (df, dr) = deltas[i];
            if on_board(file + df, rank + dr) {
                bits |= 1u64 << ((rank + dr) * 8 + file + df);
            }
            i += 1;
        }
        table[sq] = Bitboard(bits);
        sq += 1;
    }
    table
}

const fn geometry_tables() -> ([[Bitboard; 64]; 64], [[Bitboard; 64]; 64]) {
    let mut between = [[Bitboard::EMPTY; 64]; 64];
    let mut line = [[Bitboard::EMPTY; 64]; 64];

    let mut from = 0;
    while from < 64 {
        let file = (from % 8) as i8;
        let rank = (from / 8) as i8;
        let mut dir = 0;
        while dir < 8 {
            let (df, dr) = KING_DELTAS[dir];

            // Full line through `from` along this axis, both directions.
            let mut axis = 1u64 << from;
            let mut sign = -1i8;
            while sign <= 1 {
                let (mut f, mut r) = (file + df * sign, rank + dr * sign);
                while on_board(f, r) {
                    axis |= 1u64 << (r * 8 + f);
                    f += df * sign;
                    r += dr * sign;
                }
                sign += 2;
            }

            let mut passed = 0u64;
            let (mut f, mut r) = (file + df, rank + dr);
            while on_board(f, r) {
                let to = (r * 8 + f) as usize;
                between[from][to] = Bitboard(passed);
                line[from][to] = Bitboard(axis);
                passed |= 1u64 << to;
                f += df;
                r += dr;
            }
            dir += 1;
        }
        from += 1;
    }

    (between, line)
}
