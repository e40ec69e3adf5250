//! Core value types for the engine.
//!
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`Move`] and [`MoveFlag`] for the packed 16-bit move
//! - [`CastlingRights`] bit set
//! - FEN field parsing and serialization via [`FenParser`]

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{FenError, FenParser};
pub use mov::{Move, MoveFlag};
pub use piece::Piece;
pub use square::{File, Rank, Square};
