//! Bitboard chess engine core.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit square sets with shift and iteration helpers
//! - [`Position`] - board state with reversible make/undo and Zobrist hashing
//! - [`movegen`] - magic-bitboard attack tables and fully legal move generation
//! - [`perft`] / [`perft_divide`] - leaf counting for move generator validation
//! - [`search`] - iterative-deepening alpha-beta search and the threaded [`Engine`]
//!
//! # Example
//!
//! ```
//! use chess_engine::{legal_moves, perft, Position};
//!
//! let mut position = Position::startpos();
//! assert_eq!(legal_moves(&position).len(), 20);
//!
//! let e4 = position.parse_move("e2e4").unwrap();
//! position.make_move(e4);
//! assert_eq!(perft(&mut position, 2), 400);
//! position.undo_move(e4);
//! assert_eq!(position, Position::startpos());
//! ```

mod bitboard;
pub mod movegen;
mod position;
pub mod search;
mod zobrist;

pub use bitboard::Bitboard;
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{
    analyze, bishop_attacks, generate_moves, is_king_attacked, king_attacks, knight_attacks,
    legal_moves, pawn_attacks, queen_attacks, rook_attacks, Analysis, MoveList,
};
pub use position::{MoveParseError, Position};
pub use search::{
    ConfigError, Engine, EngineConfig, Evaluator, MaterialEvaluator, SearchLimits, SearchReport,
    Searcher,
};
