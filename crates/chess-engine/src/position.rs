//! Mutable board state with reversible move application.
//!
//! A [`Position`] keeps the twelve piece bitboards, the per-color occupancy
//! and a square-indexed mailbox in lockstep. [`Position::make_move`] and
//! [`Position::undo_move`] form a strict LIFO pair: undo pops the record the
//! matching make pushed and restores the hash from a saved stack instead of
//! recomputing it.

use crate::movegen::{self, attacks};
use crate::zobrist::ZOBRIST;
use crate::Bitboard;
use chess_core::{CastlingRights, Color, FenError, FenParser, Move, MoveFlag, Piece, Square};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Why a coordinate move string could not be applied to a position.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveParseError {
    #[error("malformed move string '{0}'")]
    Malformed(String),

    #[error("illegal move '{0}' in this position")]
    Illegal(String),
}

/// Everything make_move overwrites that cannot be derived from the move itself.
#[derive(Debug, Clone, Copy)]
struct Undo {
    mv: Move,
    moved: Piece,
    captured: Option<Piece>,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
}

#[derive(Clone)]
pub struct Position {
    /// `[color][piece]`
    pieces: [[Bitboard; 6]; 2],
    by_color: [Bitboard; 2],
    mailbox: [Option<(Piece, Color)>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Half-moves since the start of the game.
    ply: u32,
    hash: u64,
    undo_stack: Vec<Undo>,
    hash_stack: Vec<u64>,
    repetitions: HashMap<u64, u32>,
    in_check: Cell<Option<bool>>,
}

impl Position {
    /// Position with no pieces. Only useful as a starting point for [`Position::put`].
    fn empty() -> Self {
        Position {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            by_color: [Bitboard::EMPTY; 2],
            mailbox: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            ply: 0,
            hash: 0,
            undo_stack: Vec::with_capacity(256),
            hash_stack: Vec::with_capacity(256),
            repetitions: HashMap::new(),
            in_check: Cell::new(None),
        }
    }

    pub fn startpos() -> Self {
        Self::from_fen(FenParser::STARTPOS).expect("STARTPOS is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parsed = FenParser::parse(fen)?;
        let mut position = Position::empty();

        for (index, occupant) in parsed.board.iter().enumerate() {
            if let Some((piece, color)) = *occupant {
                position.put(Square::from_index_unchecked(index as u8), piece, color);
            }
        }
        position.side_to_move = parsed.side_to_move;
        position.castling = parsed.castling;
        position.en_passant = parsed.en_passant;
        position.halfmove_clock = parsed.halfmove_clock;
        position.fullmove_number = parsed.fullmove_number.max(1);
        position.ply = (position.fullmove_number - 1) * 2 + parsed.side_to_move.index() as u32;
        position.hash = position.compute_hash();
        position.repetitions.insert(position.hash, 1);

        Ok(position)
    }

    pub fn to_fen(&self) -> String {
        FenParser {
            board: self.mailbox,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
        .to_fen()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline]
    pub fn ply(&self) -> u32 {
        self.ply
    }

    /// Incrementally maintained Zobrist hash.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Number of moves that can currently be undone.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.undo_stack.len()
    }

    #[inline]
    pub fn pieces(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// Pieces of one kind, both colors.
    #[inline]
    pub fn pieces_of_kind(&self, piece: Piece) -> Bitboard {
        self.pieces[0][piece.index()] | self.pieces[1][piece.index()]
    }

    #[inline]
    pub fn occupied_by(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.by_color[0] | self.by_color[1]
    }

    #[inline]
    pub fn empty_squares(&self) -> Bitboard {
        !self.occupied()
    }

    /// Bishops and queens of `color`.
    #[inline]
    pub fn diagonal_sliders(&self, color: Color) -> Bitboard {
        let own = &self.pieces[color.index()];
        own[Piece::Bishop.index()] | own[Piece::Queen.index()]
    }

    /// Rooks and queens of `color`.
    #[inline]
    pub fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        let own = &self.pieces[color.index()];
        own[Piece::Rook.index()] | own[Piece::Queen.index()]
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        self.mailbox[sq.index()]
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        // One king per side is enforced when the position is built.
        self.pieces(Piece::King, color)
            .lsb()
            .unwrap_or(Square::from_index_unchecked(0))
    }

    /// Pieces of either color attacking `sq`, given an occupancy.
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        let white = &self.pieces[Color::White.index()];
        let black = &self.pieces[Color::Black.index()];
        (attacks::pawn_attacks(sq, Color::Black) & white[Piece::Pawn.index()])
            | (attacks::pawn_attacks(sq, Color::White) & black[Piece::Pawn.index()])
            | (attacks::knight_attacks(sq) & self.pieces_of_kind(Piece::Knight))
            | (attacks::king_attacks(sq) & self.pieces_of_kind(Piece::King))
            | (attacks::bishop_attacks(sq, occupied)
                & (self.diagonal_sliders(Color::White) | self.diagonal_sliders(Color::Black)))
            | (attacks::rook_attacks(sq, occupied)
                & (self.orthogonal_sliders(Color::White) | self.orthogonal_sliders(Color::Black)))
    }

    #[inline]
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        (self.attackers_to(sq, self.occupied()) & self.occupied_by(by)).is_not_empty()
    }

    /// Whether the side to move is in check. Cached until the next make/undo.
    pub fn is_in_check(&self) -> bool {
        if let Some(cached) = self.in_check.get() {
            return cached;
        }
        let us = self.side_to_move;
        let check = self.is_square_attacked(self.king_square(us), !us);
        self.in_check.set(Some(check));
        check
    }

    /// Lets move generation publish the check status it already computed.
    #[inline]
    pub(crate) fn cache_check(&self, in_check: bool) {
        self.in_check.set(Some(in_check));
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_in_check() && movegen::legal_moves(self).is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_in_check() && movegen::legal_moves(self).is_empty()
    }

    /// How many times the current position has occurred, including now.
    pub fn repetition_count(&self) -> u32 {
        self.repetitions.get(&self.hash).copied().unwrap_or(0)
    }

    pub fn is_threefold_repetition(&self) -> bool {
        self.repetition_count() >= 3
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Draw by repetition or the fifty-move rule, without generating moves.
    #[inline]
    pub fn is_rule_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.is_threefold_repetition()
    }

    pub fn is_draw(&self) -> bool {
        self.is_rule_draw() || self.is_stalemate()
    }

    /// Resolves a coordinate string such as "e2e4" or "a7a8q" against the legal moves.
    pub fn parse_move(&self, text: &str) -> Result<Move, MoveParseError> {
        let malformed = || MoveParseError::Malformed(text.to_string());
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(malformed());
        }
        let from = Square::from_algebraic(&text[0..2]).ok_or_else(malformed)?;
        let to = Square::from_algebraic(&text[2..4]).ok_or_else(malformed)?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match Piece::from_fen_char(c) {
                Some((piece, _)) if Piece::PROMOTIONS.contains(&piece) => Some(piece),
                _ => return Err(malformed()),
            },
        };

        movegen::legal_moves(self)
            .iter()
            .copied()
            .find(|m| m.from() == from && m.to() == to && m.promotion() == promotion)
            .ok_or_else(|| MoveParseError::Illegal(text.to_string()))
    }

    /// Applies a move produced by move generation for this exact position.
    ///
    /// Passing any other move leaves the position in an unspecified state;
    /// legality is not re-checked here.
    pub fn make_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let them = !us;
        let (from, to, flag) = (mv.from(), mv.to(), mv.flag());
        let Some((moved, _)) = self.mailbox[from.index()] else {
            unreachable!("make_move {mv} from an empty square");
        };

        self.hash_stack.push(self.hash);
        let mut undo = Undo {
            mv,
            moved,
            captured: None,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
        };

        let mut hash = self.hash ^ ZOBRIST.en_passant(self.en_passant);
        self.en_passant = None;

        if flag == MoveFlag::EnPassant {
            let victim = to.offset(-us.forward());
            self.remove(victim, Piece::Pawn, them);
            hash ^= ZOBRIST.piece(Piece::Pawn, them, victim);
            undo.captured = Some(Piece::Pawn);
        } else if let Some((victim, _)) = self.mailbox[to.index()] {
            self.remove(to, victim, them);
            hash ^= ZOBRIST.piece(victim, them, to);
            undo.captured = Some(victim);
        }

        let placed = mv.promotion().unwrap_or(moved);
        self.remove(from, moved, us);
        self.put(to, placed, us);
        hash ^= ZOBRIST.piece(moved, us, from) ^ ZOBRIST.piece(placed, us, to);

        if let Some((rook_from, rook_to)) = castle_rook_squares(flag, to) {
            self.remove(rook_from, Piece::Rook, us);
            self.put(rook_to, Piece::Rook, us);
            hash ^= ZOBRIST.piece(Piece::Rook, us, rook_from) ^ ZOBRIST.piece(Piece::Rook, us, rook_to);
        }

        let old_rights = self.castling;
        self.castling
            .remove(CastlingRights::lost_by_touching(from) | CastlingRights::lost_by_touching(to));
        hash ^= ZOBRIST.castling(old_rights) ^ ZOBRIST.castling(self.castling);

        if flag == MoveFlag::DoublePush {
            self.en_passant = Some(from.offset(us.forward()));
            hash ^= ZOBRIST.en_passant(self.en_passant);
        }

        if moved == Piece::Pawn || undo.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if us == Color::Black {
            self.fullmove_number += 1;
        }
        self.ply += 1;
        self.side_to_move = them;
        hash ^= ZOBRIST.side();

        self.hash = hash;
        *self.repetitions.entry(hash).or_insert(0) += 1;
        self.undo_stack.push(undo);
        self.in_check.set(None);

        debug_assert_eq!(self.hash, self.compute_hash(), "hash drift after {mv}");
    }

    /// Reverts the most recent [`Position::make_move`], which must have been `mv`.
    pub fn undo_move(&mut self, mv: Move) {
        let Some(undo) = self.undo_stack.pop() else {
            debug_assert!(false, "undo_move {mv} with empty history");
            return;
        };
        debug_assert_eq!(undo.mv, mv, "undo out of order");

        if let Some(count) = self.repetitions.get_mut(&self.hash) {
            *count -= 1;
            if *count == 0 {
                self.repetitions.remove(&self.hash);
            }
        }

        let them = self.side_to_move;
        let us = !them;
        let (from, to, flag) = (undo.mv.from(), undo.mv.to(), undo.mv.flag());

        if let Some((rook_from, rook_to)) = castle_rook_squares(flag, to) {
            self.remove(rook_to, Piece::Rook, us);
            self.put(rook_from, Piece::Rook, us);
        }

        let placed = undo.mv.promotion().unwrap_or(undo.moved);
        self.remove(to, placed, us);
        self.put(from, undo.moved, us);

        if let Some(victim) = undo.captured {
            let victim_sq = if flag == MoveFlag::EnPassant {
                to.offset(-us.forward())
            } else {
                to
            };
            self.put(victim_sq, victim, them);
        }

        self.side_to_move = us;
        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }
        self.ply -= 1;
        self.hash = self.hash_stack.pop().unwrap_or_else(|| self.compute_hash());
        self.in_check.set(None);
    }

    /// Hash of the current state computed from scratch.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0;
        for (index, occupant) in self.mailbox.iter().enumerate() {
            if let Some((piece, color)) = *occupant {
                hash ^= ZOBRIST.piece(piece, color, Square::from_index_unchecked(index as u8));
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.side();
        }
        hash ^ ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant)
    }

    #[inline]
    fn put(&mut self, sq: Square, piece: Piece, color: Color) {
        debug_assert!(self.mailbox[sq.index()].is_none(), "{sq} already occupied");
        self.pieces[color.index()][piece.index()].set(sq);
        self.by_color[color.index()].set(sq);
        self.mailbox[sq.index()] = Some((piece, color));
    }

    #[inline]
    fn remove(&mut self, sq: Square, piece: Piece, color: Color) {
        debug_assert_eq!(self.mailbox[sq.index()], Some((piece, color)));
        self.pieces[color.index()][piece.index()].clear(sq);
        self.by_color[color.index()].clear(sq);
        self.mailbox[sq.index()] = None;
    }
}

/// Rook relocation for a castling move landing the king on `king_to`.
#[inline]
fn castle_rook_squares(flag: MoveFlag, king_to: Square) -> Option<(Square, Square)> {
    match flag {
        MoveFlag::CastleShort => Some((king_to.offset(1), king_to.offset(-1))),
        MoveFlag::CastleLong => Some((king_to.offset(-2), king_to.offset(1))),
        _ => None,
    }
}

/// Compares board state only: placement, side to move, rights, en passant,
/// clocks and hash. Undo history and repetition counts are ignored.
impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.by_color == other.by_color
            && self.mailbox == other.mailbox
            && self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
            && self.ply == other.ply
            && self.hash == other.hash
    }
}

impl Eq for Position {}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}
