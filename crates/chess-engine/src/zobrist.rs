//! Zobrist keys.
//!
//! A position hash is the XOR of one key per (piece, color, square) occupant,
//! the side key when black is to move, one key for the castling-rights
//! combination and one key for the en passant file when a target is set.
//! Every term can be toggled independently, which is what makes incremental
//! updates in make/undo possible.

use chess_core::{CastlingRights, Color, Piece, Square};

pub struct ZobristKeys {
    pieces: [[[u64; 64]; 2]; 6],
    black_to_move: u64,
    /// One key per full 4-bit rights value, pre-combined from four base keys.
    castling: [u64; 16],
    en_passant: [u64; 8],
}

/// xorshift64 step, usable in const context.
const fn next_key(state: u64) -> u64 {
    let mut x = state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

impl ZobristKeys {
    /// Generates every key from a fixed seed, so hashes are stable across runs.
    pub const fn new() -> Self {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;

        let mut pieces = [[[0u64; 64]; 2]; 6];
        let mut p = 0;
        while p < 6 {
            let mut c = 0;
            while c < 2 {
                let mut s = 0;
                while s < 64 {
                    state = next_key(state);
                    pieces[p][c][s] = state;
                    s += 1;
                }
                c += 1;
            }
            p += 1;
        }

        state = next_key(state);
        let black_to_move = state;

        let mut base = [0u64; 4];
        let mut i = 0;
        while i < 4 {
            state = next_key(state);
            base[i] = state;
            i += 1;
        }
        let mut castling = [0u64; 16];
        let mut rights = 0;
        while rights < 16 {
            let mut key = 0u64;
            let mut bit = 0;
            while bit < 4 {
                if rights & (1 << bit) != 0 {
                    key ^= base[bit];
                }
                bit += 1;
            }
            castling[rights] = key;
            rights += 1;
        }

        let mut en_passant = [0u64; 8];
        let mut f = 0;
        while f < 8 {
            state = next_key(state);
            en_passant[f] = state;
            f += 1;
        }

        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    pub const fn piece(&self, piece: Piece, color: Color, sq: Square) -> u64 {
        self.pieces[piece.index()][color.index()][sq.index()]
    }

    #[inline]
    pub const fn side(&self) -> u64 {
        self.black_to_move
    }

    #[inline]
    pub const fn castling(&self, rights: CastlingRights) -> u64 {
        self.castling[rights.bits() as usize]
    }

    /// Key for an en passant target; only the file matters.
    #[inline]
    pub const fn en_passant(&self, target: Option<Square>) -> u64 {
        match target {
            Some(sq) => self.en_passant[sq.file_index() as usize],
            None => 0,
        }
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new()
    }
}

pub static ZOBRIST: ZobristKeys = ZobristKeys::new();
