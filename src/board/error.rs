//! Error types for board operations.
//!
//! Parsing problems and structural invariant violations are reported at
//! load time; the search itself never returns an error.

use std::fmt;

/// Error type for FEN parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// FEN string has too few fields (needs at least 4)
    TooFewFields { found: usize },
    /// Invalid piece character in the position field
    InvalidPiece { ch: char },
    /// Invalid castling character
    InvalidCastling { ch: char },
    /// Invalid side to move (must be 'w' or 'b')
    InvalidSideToMove { found: String },
    /// Invalid en passant square
    InvalidEnPassant { found: String },
    /// A rank does not describe exactly 8 files
    BadRank { rank: usize },
    /// The position field does not describe exactly 8 ranks
    BadRankCount { found: usize },
    /// Invalid halfmove or fullmove counter
    InvalidCounter { found: String },
    /// The described position violates a structural invariant
    Position(PositionError),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::TooFewFields { found } => {
                write!(f, "FEN must have at least 4 fields, found {found}")
            }
            FenError::InvalidPiece { ch } => write!(f, "invalid piece character '{ch}' in FEN"),
            FenError::InvalidCastling { ch } => write!(f, "invalid castling character '{ch}'"),
            FenError::InvalidSideToMove { found } => {
                write!(f, "invalid side to move '{found}', expected 'w' or 'b'")
            }
            FenError::InvalidEnPassant { found } => {
                write!(f, "invalid en passant square '{found}'")
            }
            FenError::BadRank { rank } => write!(f, "rank {rank} does not describe 8 files"),
            FenError::BadRankCount { found } => {
                write!(f, "FEN position must have 8 ranks, found {found}")
            }
            FenError::InvalidCounter { found } => write!(f, "invalid move counter '{found}'"),
            FenError::Position(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FenError {}

impl From<PositionError> for FenError {
    fn from(err: PositionError) -> Self {
        FenError::Position(err)
    }
}

/// A structural invariant violation in a loaded position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// A side does not have exactly one king
    BadKingCount { white: u32, black: u32 },
    /// The castling field names a rook that is not on the board
    MissingCastlingRook { square: String },
    /// The side not to move is already in check
    OpponentInCheck,
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::BadKingCount { white, black } => {
                write!(
                    f,
                    "each side needs exactly one king (white {white}, black {black})"
                )
            }
            PositionError::MissingCastlingRook { square } => {
                write!(f, "castling field names {square} but no rook is there")
            }
            PositionError::OpponentInCheck => {
                write!(f, "the side not to move is in check")
            }
        }
    }
}

impl std::error::Error for PositionError {}

/// Error type for UCI move parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    /// Move string has invalid length (must be 4-5 characters)
    InvalidLength { len: usize },
    /// Invalid square notation in move
    InvalidSquare { notation: String },
    /// Invalid promotion piece
    InvalidPromotion { ch: char },
    /// Move is not legal in the current position
    IllegalMove { notation: String },
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::InvalidLength { len } => {
                write!(f, "move must be 4-5 characters, found {len}")
            }
            MoveParseError::InvalidSquare { notation } => {
                write!(f, "invalid square notation in '{notation}'")
            }
            MoveParseError::InvalidPromotion { ch } => {
                write!(f, "invalid promotion piece '{ch}'")
            }
            MoveParseError::IllegalMove { notation } => write!(f, "illegal move '{notation}'"),
        }
    }
}

impl std::error::Error for MoveParseError {}

/// Error type for square parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    /// Invalid algebraic notation
    InvalidNotation { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::InvalidNotation { notation } => {
                write!(f, "invalid square notation '{notation}'")
            }
        }
    }
}

impl std::error::Error for SquareError {}
