//! Static evaluation.
//!
//! The searcher only sees the [`Evaluator`] trait. [`MaterialEvaluator`] is the
//! default: material plus piece-square tables, scored in centipawns.

use crate::Position;
use chess_core::{Color, Piece, Square};

/// Scores a position in centipawns from the side to move's point of view.
///
/// Scores must stay well inside `±MATE_THRESHOLD`.
pub trait Evaluator {
    fn evaluate(&self, position: &Position) -> i32;
}

impl<F> Evaluator for F
where
    F: Fn(&Position) -> i32,
{
    fn evaluate(&self, position: &Position) -> i32 {
        self(position)
    }
}

// Piece-square tables, laid out as the board is drawn from white's side:
// the first row is rank 8.
#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
     0,  0,   0,   0,   0,   0,  0,  0,
    50, 50,  50,  50,  50,  50, 50, 50,
    10, 10,  20,  30,  30,  20, 10, 10,
     5,  5,  10,  25,  25,  10,  5,  5,
     0,  0,   0,  20,  20,   0,  0,  0,
     5, -5, -10,   0,   0, -10, -5,  5,
     5, 10,  10, -20, -20,  10, 10,  5,
     0,  0,   0,   0,   0,   0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -20, -10, -10, -5, -5, -10, -10, -20,
    -10,   0,   0,  0,  0,   0,   0, -10,
    -10,   0,   5,  5,  5,   5,   0, -10,
     -5,   0,   5,  5,  5,   5,   0,  -5,
      0,   0,   5,  5,  5,   5,   0,  -5,
    -10,   5,   5,  5,  5,   5,   0, -10,
    -10,   0,   5,  0,  0,   0,   0, -10,
    -20, -10, -10, -5, -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_PST: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

const fn table(piece: Piece) -> &'static [i32; 64] {
    match piece {
        Piece::Pawn => &PAWN_PST,
        Piece::Knight => &KNIGHT_PST,
        Piece::Bishop => &BISHOP_PST,
        Piece::Rook => &ROOK_PST,
        Piece::Queen => &QUEEN_PST,
        Piece::King => &KING_PST,
    }
}

/// Material value; the king is priceless and scores only its table.
const fn material(piece: Piece) -> i32 {
    match piece {
        Piece::King => 0,
        _ => piece.value(),
    }
}

/// Table slot for a piece of `color` on `sq`.
#[inline]
fn pst_index(sq: Square, color: Color) -> usize {
    match color {
        Color::White => sq.flip_rank().index(),
        Color::Black => sq.index(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialEvaluator;

impl MaterialEvaluator {
    /// Score from white's point of view.
    pub fn white_score(&self, position: &Position) -> i32 {
        let mut score = 0;
        for color in Color::BOTH {
            let sign = match color {
                Color::White => 1,
                Color::Black => -1,
            };
            for piece in Piece::ALL {
                let pst = table(piece);
                for sq in position.pieces(piece, color) {
                    score += sign * (material(piece) + pst[pst_index(sq, color)]);
                }
            }
        }
        score
    }
}

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, position: &Position) -> i32 {
        let score = self.white_score(position);
        match position.side_to_move() {
            Color::White => score,
            Color::Black => -score,
        }
    }
}
