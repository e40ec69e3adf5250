//! Legal move generation.
//!
//! One [`analyze`] pass per node computes the enemy attack set, the checking
//! pieces and the pin rays; every generator below filters against that
//! result instead of trying moves and testing for check afterwards. The only
//! exception is en passant, which removes two pieces from a line at once and
//! gets a full king-safety recheck.

pub mod attacks;
pub mod magics;
pub mod perft;

use crate::{Bitboard, Position};
use chess_core::{CastlingRights, Color, Move, MoveFlag, Piece, Square};

pub use attacks::{
    between, bishop_attacks, king_attacks, knight_attacks, line, pawn_attacks, queen_attacks,
    rook_attacks,
};
pub use magics::slider_attacks;

/// Fixed-capacity move buffer. Lives on the caller's stack; generation never allocates.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    /// No legal chess position has more than 218 moves.
    pub const MAX_MOVES: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [Move::NULL; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, m: Move) {
        debug_assert!(self.len < Self::MAX_MOVES);
        self.moves[self.len] = m;
        self.len += 1;
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Move] {
        &mut self.moves[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    pub fn contains(&self, m: Move) -> bool {
        self.as_slice().contains(&m)
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Move;

    #[inline]
    fn index(&self, index: usize) -> &Move {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Check and pin information for the side to move.
#[derive(Debug, Clone, Copy)]
pub struct Analysis {
    pub king: Square,
    /// Squares the opponent attacks, computed with our king lifted off the board.
    pub enemy_attacks: Bitboard,
    pub checkers: Bitboard,
    /// Destinations that resolve a single check: the checker plus any squares
    /// between it and the king. Full board when not in check.
    pub check_mask: Bitboard,
    /// Union of rook/queen pin rays (pinner inclusive, king exclusive).
    pub orthogonal_pins: Bitboard,
    /// Union of bishop/queen pin rays.
    pub diagonal_pins: Bitboard,
}

impl Analysis {
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers.is_not_empty()
    }

    #[inline]
    pub fn double_check(&self) -> bool {
        self.checkers.has_many()
    }

    /// Where a piece on `from` may go without uncovering its king.
    #[inline]
    pub fn pin_mask(&self, from: Square) -> Bitboard {
        if self.orthogonal_pins.contains(from) {
            self.orthogonal_pins & line(self.king, from)
        } else if self.diagonal_pins.contains(from) {
            self.diagonal_pins & line(self.king, from)
        } else {
            Bitboard::FULL
        }
    }
}

/// Runs the per-node attack, check and pin analysis for the side to move.
pub fn analyze(pos: &Position) -> Analysis {
    let us = pos.side_to_move();
    let them = !us;
    let king = pos.king_square(us);
    let occupied = pos.occupied();
    let ours = pos.occupied_by(us);
    let theirs = pos.occupied_by(them);

    // Sliders see through our king so squares behind it stay attacked.
    let xray = occupied.without(king);
    let mut enemy_attacks = pos.pieces(Piece::Pawn, them).pawn_attacks(them)
        | king_attacks(pos.king_square(them));
    for sq in pos.pieces(Piece::Knight, them) {
        enemy_attacks |= knight_attacks(sq);
    }
    for sq in pos.diagonal_sliders(them) {
        enemy_attacks |= bishop_attacks(sq, xray);
    }
    for sq in pos.orthogonal_sliders(them) {
        enemy_attacks |= rook_attacks(sq, xray);
    }

    let diagonal_snipers = bishop_attacks(king, theirs) & pos.diagonal_sliders(them);
    let orthogonal_snipers = rook_attacks(king, theirs) & pos.orthogonal_sliders(them);

    let mut checkers = (pawn_attacks(king, us) & pos.pieces(Piece::Pawn, them))
        | (knight_attacks(king) & pos.pieces(Piece::Knight, them));
    let mut check_mask = checkers;
    let mut orthogonal_pins = Bitboard::EMPTY;
    let mut diagonal_pins = Bitboard::EMPTY;

    for (snipers, pins) in [
        (orthogonal_snipers, &mut orthogonal_pins),
        (diagonal_snipers, &mut diagonal_pins),
    ] {
        for sniper in snipers {
            let ray = between(king, sniper);
            let blockers = ray & occupied;
            if blockers.is_empty() {
                checkers.set(sniper);
                check_mask |= ray.with(sniper);
            } else if !blockers.has_many() && (blockers & ours).is_not_empty() {
                *pins |= ray.with(sniper);
            }
        }
    }

    if checkers.is_empty() {
        check_mask = Bitboard::FULL;
    }

    pos.cache_check(checkers.is_not_empty());

    Analysis {
        king,
        enemy_attacks,
        checkers,
        check_mask,
        orthogonal_pins,
        diagonal_pins,
    }
}

/// Fills `list` with every legal move.
///
/// With `captures_only` and the side to move not in check, only captures
/// (en passant included) are produced, king captures among them. In check,
/// all evasions are produced regardless.
pub fn generate_moves(pos: &Position, captures_only: bool, list: &mut MoveList) {
    list.clear();
    let a = analyze(pos);
    let us = pos.side_to_move();
    let them = !us;
    let ours = pos.occupied_by(us);
    let theirs = pos.occupied_by(them);
    let quiet_allowed = !captures_only || a.in_check();

    let king_targets = if quiet_allowed { !ours } else { theirs };
    for to in king_attacks(a.king) & king_targets & !a.enemy_attacks {
        list.push(Move::normal(a.king, to));
    }

    if a.double_check() {
        return;
    }

    let targets = a.check_mask & if quiet_allowed { !ours } else { theirs };

    generate_pawn_moves(pos, &a, quiet_allowed, list);

    let occupied = pos.occupied();
    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        for from in pos.pieces(piece, us) {
            let dests = attacks::piece_attacks(piece, from, occupied) & targets & a.pin_mask(from);
            for to in dests {
                list.push(Move::normal(from, to));
            }
        }
    }

    if quiet_allowed && !a.in_check() {
        generate_castling(pos, &a, list);
    }
}

/// Convenience wrapper returning a fresh list of all legal moves.
pub fn legal_moves(pos: &Position) -> MoveList {
    let mut list = MoveList::new();
    generate_moves(pos, false, &mut list);
    list
}

fn push_pawn_move(list: &mut MoveList, from: Square, to: Square, promotes: bool) {
    if promotes {
        for piece in Piece::PROMOTIONS {
            list.push(Move::new(from, to, MoveFlag::promotion(piece)));
        }
    } else {
        list.push(Move::normal(from, to));
    }
}

fn generate_pawn_moves(pos: &Position, a: &Analysis, quiet_allowed: bool, list: &mut MoveList) {
    let us = pos.side_to_move();
    let them = !us;
    let empty = pos.empty_squares();
    let theirs = pos.occupied_by(them);
    let forward = us.forward();
    let promotion_rank = us.promotion_rank();

    for from in pos.pieces(Piece::Pawn, us) {
        let allowed = a.check_mask & a.pin_mask(from);

        if quiet_allowed {
            let one = from.offset(forward);
            if empty.contains(one) {
                if allowed.contains(one) {
                    push_pawn_move(list, from, one, one.rank_index() == promotion_rank);
                }
                if from.rank_index() == us.pawn_rank() {
                    let two = one.offset(forward);
                    if empty.contains(two) && allowed.contains(two) {
                        list.push(Move::new(from, two, MoveFlag::DoublePush));
                    }
                }
            }
        }

        for to in pawn_attacks(from, us) & theirs & allowed {
            push_pawn_move(list, from, to, to.rank_index() == promotion_rank);
        }

        if let Some(target) = pos.en_passant() {
            if pawn_attacks(from, us).contains(target) && en_passant_is_legal(pos, a, from, target) {
                list.push(Move::new(from, target, MoveFlag::EnPassant));
            }
        }
    }
}

/// En passant vacates two squares on possibly the same line as the king, which
/// pin masks cannot express, so the resulting slider attacks are recomputed.
fn en_passant_is_legal(pos: &Position, a: &Analysis, from: Square, target: Square) -> bool {
    let us = pos.side_to_move();
    let them = !us;
    // Target rank must sit strictly inside the board, as any genuine one does.
    if target.rank_index() == 0 || target.rank_index() == 7 {
        return false;
    }
    let victim = target.offset(-us.forward());
    if !a.check_mask.contains(target) && !a.check_mask.contains(victim) {
        return false;
    }
    let occupied = pos.occupied().without(from).without(victim).with(target);
    let diagonal = bishop_attacks(a.king, occupied) & pos.diagonal_sliders(them);
    let orthogonal = rook_attacks(a.king, occupied) & pos.orthogonal_sliders(them);
    (diagonal | orthogonal).is_empty()
}

fn generate_castling(pos: &Position, a: &Analysis, list: &mut MoveList) {
    let us = pos.side_to_move();
    let rights = pos.castling();
    let home = us.home_rank() * 8;
    let at = |file: u8| Square::from_index_unchecked(home + file);
    let king_from = at(4);
    if a.king != king_from {
        return;
    }
    let occupied = pos.occupied();
    let rooks = pos.pieces(Piece::Rook, us);

    let clear = |files: &[u8]| files.iter().all(|&f| !occupied.contains(at(f)));
    let safe = |files: &[u8]| files.iter().all(|&f| !a.enemy_attacks.contains(at(f)));

    if rights.has(CastlingRights::short_right(us))
        && rooks.contains(at(7))
        && clear(&[5, 6])
        && safe(&[5, 6])
    {
        list.push(Move::new(king_from, at(6), MoveFlag::CastleShort));
    }
    if rights.has(CastlingRights::long_right(us))
        && rooks.contains(at(0))
        && clear(&[1, 2, 3])
        && safe(&[2, 3])
    {
        list.push(Move::new(king_from, at(2), MoveFlag::CastleLong));
    }
}

/// Whether `color`'s king is currently attacked. Independent of the cached flag.
pub fn is_king_attacked(pos: &Position, color: Color) -> bool {
    pos.is_square_attacked(pos.king_square(color), !color)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn uci(list: &MoveList) -> Vec<String> {
        let mut out: Vec<String> = list.iter().map(|m| m.to_uci()).collect();
        out.sort();
        out
    }

    #[test]
    fn startpos_has_twenty_moves() {
        let moves = legal_moves(&Position::startpos());
        assert_eq!(moves.len(), 20);
        let doubles = moves.iter().filter(|m| m.flag() == MoveFlag::DoublePush).count();
        assert_eq!(doubles, 8);
    }

    #[test]
    fn pinned_rook_stays_on_its_axis() {
        // Rook e4 pinned by the rook on e8 against the king on e1.
        let p = pos("4r1k1/8/8/8/4R3/8/8/4K3 w - - 0 1");
        let a = analyze(&p);
        assert!(a.orthogonal_pins.contains(sq("e4")));
        let rook_moves: Vec<Move> = legal_moves(&p)
            .iter()
            .copied()
            .filter(|m| m.from() == sq("e4"))
            .collect();
        assert!(!rook_moves.is_empty());
        assert!(rook_moves.iter().all(|m| m.to().file_index() == 4));
        assert!(rook_moves.iter().any(|m| m.to() == sq("e8")));
    }

    #[test]
    fn pinned_knight_cannot_move() {
        let p = pos("4k3/8/8/b7/8/8/3N4/4K3 w - - 0 1");
        assert!(legal_moves(&p).iter().all(|m| m.from() != sq("d2")));
    }

    #[test]
    fn two_pins_on_different_axes() {
        // Bishop d2 pinned diagonally by a5, rook e3 pinned on the file by e8.
        let p = pos("k3r3/8/8/b7/8/4R3/3B4/4K3 w - - 0 1");
        let a = analyze(&p);
        assert!(a.diagonal_pins.contains(sq("d2")));
        assert!(a.orthogonal_pins.contains(sq("e3")));
        let moves = legal_moves(&p);
        for m in moves.iter() {
            if m.from() == sq("d2") {
                assert!(line(sq("e1"), sq("a5")).contains(m.to()), "{m}");
            }
            if m.from() == sq("e3") {
                assert_eq!(m.to().file_index(), 4, "{m}");
            }
        }
        assert!(moves.iter().any(|m| m.from() == sq("d2") && m.to() == sq("a5")));
        assert!(moves.iter().any(|m| m.from() == sq("e3") && m.to() == sq("e8")));
    }

    #[test]
    fn double_check_allows_only_king_moves() {
        // Knight f3 and rook e8 both check the king on e1.
        let p = pos("k3r3/8/8/8/8/5n2/8/Q3K3 w - - 0 1");
        let a = analyze(&p);
        assert!(a.double_check());
        let moves = legal_moves(&p);
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.from() == sq("e1")));
    }

    #[test]
    fn single_check_must_be_resolved() {
        // Rook e8 checks; blocks on e2..e7, capture on e8, or king steps aside.
        let p = pos("k3r3/8/8/8/8/8/3B4/4K3 w - - 0 1");
        let moves = legal_moves(&p);
        for m in moves.iter().filter(|m| m.from() != sq("e1")) {
            assert_eq!(m.to().file_index(), 4, "{m}");
        }
        assert!(moves.contains(Move::normal(sq("d2"), sq("e3"))));
        assert!(p.is_in_check());
    }

    #[test]
    fn king_cannot_step_along_the_checking_ray() {
        let p = pos("k3r3/8/8/8/8/8/8/4K3 w - - 0 1");
        let moves = uci(&legal_moves(&p));
        assert!(!moves.contains(&"e1e2".to_string()));
        assert_eq!(moves, vec!["e1d1", "e1d2", "e1f1", "e1f2"]);
    }

    #[test]
    fn castling_rules() {
        let p = pos("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let moves = legal_moves(&p);
        assert!(moves.contains(Move::new(Square::E1, Square::G1, MoveFlag::CastleShort)));
        assert!(moves.contains(Move::new(Square::E1, Square::C1, MoveFlag::CastleLong)));

        // f1 attacked by the rook on f8: no short castle.
        let p = pos("r3kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        let moves = legal_moves(&p);
        assert!(!moves.iter().any(|m| m.flag() == MoveFlag::CastleShort));
        assert!(moves.iter().any(|m| m.flag() == MoveFlag::CastleLong));

        // b1 attacked only: long castling is still legal.
        let p = pos("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1");
        assert!(legal_moves(&p).iter().any(|m| m.flag() == MoveFlag::CastleLong));

        // b1 occupied: long castling is not.
        let p = pos("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1");
        assert!(!legal_moves(&p).iter().any(|m| m.flag() == MoveFlag::CastleLong));

        // No castling out of check.
        let p = pos("4k3/8/8/8/8/8/4r3/R3K2R w KQ - 0 1");
        assert!(!legal_moves(&p).iter().any(|m| m.flag().is_castle()));

        // Right set but rook missing.
        let p = pos("4k3/8/8/8/8/8/8/4K3 w KQ - 0 1");
        assert!(!legal_moves(&p).iter().any(|m| m.flag().is_castle()));
    }

    #[test]
    fn en_passant_capture() {
        let p = pos("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        let moves = legal_moves(&p);
        assert!(moves.contains(Move::new(sq("e5"), sq("f6"), MoveFlag::EnPassant)));
        assert!(!moves.iter().any(|m| m.to() == sq("d6") && m.flag() == MoveFlag::EnPassant));
    }

    #[test]
    fn en_passant_discovering_rank_check_is_illegal() {
        // Capturing e5xd6 would clear both pawns off rank 5 and expose the king to the rook.
        let p = pos("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1");
        assert!(!legal_moves(&p).iter().any(|m| m.flag() == MoveFlag::EnPassant));
    }

    #[test]
    fn en_passant_can_capture_a_checking_pawn() {
        // d7-d5 gave check to the king on e4; exd6 removes the checker.
        let p = pos("8/8/8/3pP3/4K3/8/8/7k w - d6 0 1");
        assert!(p.is_in_check());
        assert!(legal_moves(&p).contains(Move::new(sq("e5"), sq("d6"), MoveFlag::EnPassant)));
    }

    #[test]
    fn promotions_emit_four_moves() {
        let p = pos("8/P7/8/8/8/8/8/k6K w - - 0 1");
        let promos: Vec<Move> = legal_moves(&p).iter().copied().filter(|m| m.promotion().is_some()).collect();
        assert_eq!(promos.len(), 4);
    }

    #[test]
    fn captures_only_mode() {
        let p = pos("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let mut list = MoveList::new();
        generate_moves(&p, true, &mut list);
        assert_eq!(list.len(), 8);
        assert!(list.iter().all(|m| p.piece_at(m.to()).is_some()));

        // In check every evasion is generated, quiet or not.
        let p = pos("k3r3/8/8/8/8/8/3B4/4K3 w - - 0 1");
        let mut evasions = MoveList::new();
        generate_moves(&p, true, &mut evasions);
        assert_eq!(uci(&evasions), uci(&legal_moves(&p)));

        // En passant counts as a capture.
        let p = pos("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        let mut list = MoveList::new();
        generate_moves(&p, true, &mut list);
        assert!(list.iter().any(|m| m.flag() == MoveFlag::EnPassant));
    }

    #[test]
    fn analysis_caches_check() {
        let p = pos("k3r3/8/8/8/8/8/8/4K3 w - - 0 1");
        let a = analyze(&p);
        assert!(a.in_check());
        assert_eq!(a.checkers, Bitboard::from_square(sq("e8")));
        assert!(a.check_mask.contains(sq("e5")));
        assert!(!a.check_mask.contains(sq("e1")));
        assert!(p.is_in_check());
        assert!(is_king_attacked(&p, Color::White));
        assert!(!is_king_attacked(&p, Color::Black));
    }

    #[test]
    fn king_may_not_capture_defended_piece() {
        let p = pos("k7/8/8/8/8/8/3q4/3rK3 w - - 0 1");
        // Rook d1 and queen d2 defend each other; every flight square is covered.
        let moves = uci(&legal_moves(&p));
        assert!(!moves.contains(&"e1d1".to_string()));
        assert!(!moves.contains(&"e1d2".to_string()));
        assert!(p.is_checkmate());
    }
}
