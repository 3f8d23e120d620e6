//! FEN parsing and formatting.
//!
//! Accepts the standard 6-field format, including Shredder and X-FEN
//! castling notation (file letters A..H / a..h) for Chess960 positions.
//! The en passant field is sanitized on load: a target with no legal
//! capture is silently cleared so equal positions always hash equally.

use std::fmt;

use super::error::{FenError, PositionError};
use super::position::Position;
use super::types::{Color, Piece, Square, Wing};

/// The classical starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {
    /// The classical starting position.
    #[must_use]
    pub fn startpos() -> Position {
        Position::from_fen(START_FEN).unwrap_or_else(|_| unreachable!("start FEN is valid"))
    }

    /// Parse a FEN string into a position.
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::TooFewFields {
                found: fields.len(),
            });
        }

        let mut pos = Position::empty();

        // Field 1: piece placement, rank 8 first
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadRankCount { found: ranks.len() });
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file += skip as usize;
                } else {
                    let piece =
                        Piece::from_char(ch).ok_or(FenError::InvalidPiece { ch })?;
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(FenError::BadRank { rank: rank + 1 });
                    }
                    pos.set_piece(color, piece, Square::new(rank, file));
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::BadRank { rank: rank + 1 });
            }
        }

        let white_kings = pos.pieces(Color::White, Piece::King).count();
        let black_kings = pos.pieces(Color::Black, Piece::King).count();
        if white_kings != 1 || black_kings != 1 {
            return Err(PositionError::BadKingCount {
                white: white_kings,
                black: black_kings,
            }
            .into());
        }

        // Field 2: side to move
        pos.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        // Field 3: castling availability (KQkq, Shredder/X-FEN letters, or -)
        if fields[2] != "-" {
            for ch in fields[2].chars() {
                parse_castling_char(&mut pos, ch)?;
            }
        }

        // Field 4: en passant target, sanitized against actual legality
        if fields[3] != "-" {
            let ep: Square = fields[3].parse().map_err(|_| FenError::InvalidEnPassant {
                found: fields[3].to_string(),
            })?;
            if ep.rank() != 2 && ep.rank() != 5 {
                return Err(FenError::InvalidEnPassant {
                    found: fields[3].to_string(),
                });
            }
            if pos.en_passant_legal(ep) {
                pos.en_passant = Some(ep);
            }
        }

        // Fields 5 and 6: halfmove clock and fullmove number, optional
        pos.halfmove_clock = match fields.get(4) {
            Some(s) => s.parse().map_err(|_| FenError::InvalidCounter {
                found: (*s).to_string(),
            })?,
            None => 0,
        };
        pos.fullmove_number = match fields.get(5) {
            Some(s) => s.parse().map_err(|_| FenError::InvalidCounter {
                found: (*s).to_string(),
            })?,
            None => 1,
        };

        pos.refresh_keys();
        pos.update_masks();

        if pos.is_square_attacked(
            pos.king_square(pos.side_to_move.opponent()),
            pos.side_to_move,
        ) {
            return Err(PositionError::OpponentInCheck.into());
        }

        Ok(pos)
    }

    /// Format the position as a FEN string.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            fen.push(char::from_digit(empty, 10).unwrap_or('0'));
                            empty = 0;
                        }
                        fen.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from_digit(empty, 10).unwrap_or('0'));
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side_to_move == Color::White {
            'w'
        } else {
            'b'
        });

        fen.push(' ');
        if self.castling_rights().is_empty() {
            fen.push('-');
        } else {
            for color in [Color::White, Color::Black] {
                for wing in [Wing::King, Wing::Queen] {
                    if let Some(rook) = self.castling_rights().rook(color, wing) {
                        fen.push(castling_char(color, wing, rook));
                    }
                }
            }
        }

        fen.push(' ');
        match self.en_passant_target() {
            Some(ep) => fen.push_str(&ep.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(
            " {} {}",
            self.halfmove_clock(),
            self.fullmove_number()
        ));
        fen
    }
}

/// Render one castling right: classical corners print as K/Q letters, any
/// other rook square prints Shredder style as its file letter.
fn castling_char(color: Color, wing: Wing, rook: Square) -> char {
    let classical = match wing {
        Wing::King => rook.file() == 7,
        Wing::Queen => rook.file() == 0,
    };
    let ch = if classical {
        match wing {
            Wing::King => 'k',
            Wing::Queen => 'q',
        }
    } else {
        (b'a' + rook.file() as u8) as char
    };
    if color == Color::White {
        ch.to_ascii_uppercase()
    } else {
        ch
    }
}

fn parse_castling_char(pos: &mut Position, ch: char) -> Result<(), FenError> {
    let color = if ch.is_ascii_uppercase() {
        Color::White
    } else {
        Color::Black
    };
    let rank = color.back_rank();
    let king_file = pos.king_square(color).file();
    let rooks = pos.pieces(color, Piece::Rook);

    let (wing, rook) = match ch.to_ascii_lowercase() {
        'k' => {
            // Outermost rook on the king's right
            let mut found = None;
            for file in (king_file + 1..8).rev() {
                let sq = Square::new(rank, file);
                if rooks.contains(sq) {
                    found = Some(sq);
                    break;
                }
            }
            (Wing::King, found)
        }
        'q' => {
            // Outermost rook on the king's left
            let mut found = None;
            for file in 0..king_file {
                let sq = Square::new(rank, file);
                if rooks.contains(sq) {
                    found = Some(sq);
                    break;
                }
            }
            (Wing::Queen, found)
        }
        file_ch @ 'a'..='h' => {
            let file = file_ch as usize - 'a' as usize;
            let sq = Square::new(rank, file);
            let wing = if file > king_file {
                Wing::King
            } else {
                Wing::Queen
            };
            (wing, rooks.contains(sq).then_some(sq))
        }
        _ => return Err(FenError::InvalidCastling { ch }),
    };

    let rook = rook.ok_or_else(|| PositionError::MissingCastlingRook {
        square: format!("{ch}"),
    })?;
    pos.castling.grant(color, wing, rook);
    Ok(())
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => write!(f, " {}", piece.to_fen_char(color))?,
                    None => write!(f, " .")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "   a b c d e f g h")?;
        write!(f, "{}", self.to_fen())
    }
}
