//! Position representation with incremental updates.
//!
//! A `Position` is a self-contained snapshot: mailbox plus per-color and
//! per-kind bitboards, castling rights as rook squares, en passant target,
//! move counters, and the full set of incrementally maintained Zobrist keys
//! (main, pawn, non-pawn per color, major, minor). Checkers, pin rays and
//! the opponent threat map are computed once per position.
//!
//! Positions are copy-made: `make_move` derives a child from its parent
//! without mutating it, which is what lets the board keep a plain stack.

use super::attack_tables::{
    between, bishop_attacks, king_attacks, knight_attacks, line, pawn_attacks, queen_attacks,
    rook_attacks,
};
use super::types::{Bitboard, CastlingRights, Color, Move, Piece, Square, Wing};
use super::zobrist::ZOBRIST;

#[derive(Clone)]
pub struct Position {
    pub(crate) mailbox: [Option<(Color, Piece)>; 64],
    pub(crate) pieces: [[Bitboard; 6]; 2],
    pub(crate) occupied: [Bitboard; 2],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u16,
    pub(crate) fullmove_number: u16,
    /// True when this position was produced by a null move.
    pub(crate) from_null: bool,
    /// Piece captured by the move that produced this position.
    pub(crate) captured: Option<Piece>,
    pub(crate) key: u64,
    pub(crate) pawn_key: u64,
    pub(crate) nonpawn_keys: [u64; 2],
    pub(crate) major_key: u64,
    pub(crate) minor_key: u64,
    /// Enemy pieces currently attacking our king.
    pub(crate) checkers: Bitboard,
    /// Rays (blocker and slider included) of diagonal pins against our king.
    pub(crate) diagonal_pins: Bitboard,
    /// Rays (blocker and slider included) of orthogonal pins against our king.
    pub(crate) orthogonal_pins: Bitboard,
    /// Every square attacked by the opponent, computed with full occupancy.
    pub(crate) threats: Bitboard,
}

impl Position {
    /// An empty board, white to move. Only useful as a FEN-loading base.
    #[must_use]
    pub(crate) fn empty() -> Self {
        Position {
            mailbox: [None; 64],
            pieces: [[Bitboard::empty(); 6]; 2],
            occupied: [Bitboard::empty(); 2],
            side_to_move: Color::White,
            castling: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            from_null: false,
            captured: None,
            key: 0,
            pawn_key: 0,
            nonpawn_keys: [0; 2],
            major_key: 0,
            minor_key: 0,
            checkers: Bitboard::empty(),
            diagonal_pins: Bitboard::empty(),
            orthogonal_pins: Bitboard::empty(),
            threats: Bitboard::empty(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.mailbox[sq.as_index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupancy(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupancy_all(&self) -> Bitboard {
        self.occupied[0] | self.occupied[1]
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    #[must_use]
    pub fn en_passant_target(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    #[inline]
    #[must_use]
    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    #[must_use]
    pub(crate) fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    #[must_use]
    pub(crate) fn nonpawn_key(&self, color: Color) -> u64 {
        self.nonpawn_keys[color.index()]
    }

    #[inline]
    #[must_use]
    pub(crate) fn major_key(&self) -> u64 {
        self.major_key
    }

    #[inline]
    #[must_use]
    pub(crate) fn minor_key(&self) -> u64 {
        self.minor_key
    }

    /// The king square of `color`. Positions always hold exactly one king
    /// per side once loaded.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        let kings = self.pieces[color.index()][Piece::King.index()];
        debug_assert!(kings.is_not_empty(), "position without a {color:?} king");
        Square::from_index(kings.0.trailing_zeros() as usize & 63)
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.checkers.is_not_empty()
    }

    /// True when this position was produced by a null move.
    #[inline]
    #[must_use]
    pub fn from_null(&self) -> bool {
        self.from_null
    }

    /// True when `color` still has anything beyond pawns and the king.
    #[inline]
    #[must_use]
    pub(crate) fn has_non_pawn_material(&self, color: Color) -> bool {
        let c = color.index();
        (self.occupied[c]
            ^ self.pieces[c][Piece::Pawn.index()]
            ^ self.pieces[c][Piece::King.index()])
        .is_not_empty()
    }

    /// Total number of pieces on the board (NNUE output-bucket selector).
    #[inline]
    #[must_use]
    pub(crate) fn piece_count(&self) -> u32 {
        self.occupancy_all().count()
    }

    // ------------------------------------------------------------------
    // Attack queries
    // ------------------------------------------------------------------

    /// All pieces of either color attacking `sq` under the given occupancy.
    /// Pieces outside `occ` are treated as absent.
    #[must_use]
    pub(crate) fn attackers_to(&self, sq: Square, occ: Bitboard) -> Bitboard {
        let white = self.pieces[0];
        let black = self.pieces[1];
        let pawn_idx = Piece::Pawn.index();
        let knight_idx = Piece::Knight.index();
        let bishop_idx = Piece::Bishop.index();
        let rook_idx = Piece::Rook.index();
        let queen_idx = Piece::Queen.index();
        let king_idx = Piece::King.index();

        let diag = (white[bishop_idx] | black[bishop_idx] | white[queen_idx] | black[queen_idx]) & occ;
        let ortho = (white[rook_idx] | black[rook_idx] | white[queen_idx] | black[queen_idx]) & occ;

        (pawn_attacks(Color::Black, sq) & white[pawn_idx] & occ)
            | (pawn_attacks(Color::White, sq) & black[pawn_idx] & occ)
            | (knight_attacks(sq) & (white[knight_idx] | black[knight_idx]) & occ)
            | (king_attacks(sq) & (white[king_idx] | black[king_idx]) & occ)
            | (bishop_attacks(sq, occ) & diag)
            | (rook_attacks(sq, occ) & ortho)
    }

    /// True when `by` attacks `sq` under the given occupancy. Pieces outside
    /// `occ` neither attack nor block.
    #[must_use]
    pub(crate) fn square_attacked_by(&self, sq: Square, by: Color, occ: Bitboard) -> bool {
        let them = &self.pieces[by.index()];

        if (pawn_attacks(by.opponent(), sq) & them[Piece::Pawn.index()] & occ).is_not_empty() {
            return true;
        }
        if (knight_attacks(sq) & them[Piece::Knight.index()] & occ).is_not_empty() {
            return true;
        }
        if (king_attacks(sq) & them[Piece::King.index()] & occ).is_not_empty() {
            return true;
        }
        let diag = (them[Piece::Bishop.index()] | them[Piece::Queen.index()]) & occ;
        if diag.is_not_empty() && (bishop_attacks(sq, occ) & diag).is_not_empty() {
            return true;
        }
        let ortho = (them[Piece::Rook.index()] | them[Piece::Queen.index()]) & occ;
        ortho.is_not_empty() && (rook_attacks(sq, occ) & ortho).is_not_empty()
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        self.square_attacked_by(sq, by, self.occupancy_all())
    }

    /// Union of every square `color` attacks, with full occupancy.
    #[inline]
    #[must_use]
    pub(crate) fn attacks_by(&self, color: Color) -> Bitboard {
        self.attacks_by_occ(color, self.occupancy_all())
    }

    /// Union of every square `color` attacks under an explicit occupancy.
    /// Move generation passes the occupancy with our king removed so the
    /// king cannot step backwards along a checking ray.
    #[must_use]
    pub(crate) fn attacks_by_occ(&self, color: Color, occ: Bitboard) -> Bitboard {
        let c = color.index();
        let mut attacks = Bitboard::empty();

        let pawns = self.pieces[c][Piece::Pawn.index()];
        attacks |= pawns.forward_west(color) | pawns.forward_east(color);

        for sq in self.pieces[c][Piece::Knight.index()] {
            attacks |= knight_attacks(sq);
        }
        for sq in self.pieces[c][Piece::Bishop.index()] | self.pieces[c][Piece::Queen.index()] {
            attacks |= bishop_attacks(sq, occ);
        }
        for sq in self.pieces[c][Piece::Rook.index()] | self.pieces[c][Piece::Queen.index()] {
            attacks |= rook_attacks(sq, occ);
        }
        attacks |= king_attacks(self.king_square(color));
        attacks
    }

    /// Recompute checkers, pin rays, and the opponent threat map. Called
    /// once whenever a position is created or mutated wholesale.
    pub(crate) fn update_masks(&mut self) {
        let us = self.side_to_move;
        let them = us.opponent();
        let ksq = self.king_square(us);
        let occ = self.occupancy_all();
        let our_occ = self.occupancy(us);
        let their_occ = self.occupancy(them);

        self.checkers = self.attackers_to(ksq, occ) & their_occ;
        self.threats = self.attacks_by(them);

        self.diagonal_pins = Bitboard::empty();
        self.orthogonal_pins = Bitboard::empty();

        let t = them.index();
        let diag_sliders =
            self.pieces[t][Piece::Bishop.index()] | self.pieces[t][Piece::Queen.index()];
        let ortho_sliders =
            self.pieces[t][Piece::Rook.index()] | self.pieces[t][Piece::Queen.index()];

        // Sliders that would hit our king if our own pieces were lifted off
        let diag_snipers = bishop_attacks(ksq, their_occ) & diag_sliders;
        let ortho_snipers = rook_attacks(ksq, their_occ) & ortho_sliders;

        for sniper in diag_snipers {
            let blockers = between(ksq, sniper) & occ;
            if blockers.count() == 1 && (blockers & our_occ).is_not_empty() {
                self.diagonal_pins |= blockers | Bitboard::from_square(sniper);
            }
        }
        for sniper in ortho_snipers {
            let blockers = between(ksq, sniper) & occ;
            if blockers.count() == 1 && (blockers & our_occ).is_not_empty() {
                self.orthogonal_pins |= blockers | Bitboard::from_square(sniper);
            }
        }
    }

    /// The pin ray a piece on `sq` is confined to, or the full board when
    /// the piece is not pinned.
    #[inline]
    #[must_use]
    pub(crate) fn pin_ray(&self, sq: Square) -> Bitboard {
        if (self.diagonal_pins | self.orthogonal_pins).contains(sq) {
            line(self.king_square(self.side_to_move), sq)
        } else {
            Bitboard::full()
        }
    }

    // ------------------------------------------------------------------
    // Piece placement (key-maintaining)
    // ------------------------------------------------------------------

    pub(crate) fn set_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        let c = color.index();
        self.pieces[c][piece.index()].set(sq);
        self.occupied[c].set(sq);
        self.mailbox[sq.as_index()] = Some((color, piece));
        self.toggle_keys(color, piece, sq);
    }

    pub(crate) fn remove_piece(&mut self, sq: Square) -> (Color, Piece) {
        let (color, piece) = self.mailbox[sq.as_index()]
            .take()
            .unwrap_or_else(|| unreachable!("remove_piece on empty square {sq}"));
        let c = color.index();
        self.pieces[c][piece.index()].clear(sq);
        self.occupied[c].clear(sq);
        self.toggle_keys(color, piece, sq);
        (color, piece)
    }

    fn toggle_keys(&mut self, color: Color, piece: Piece, sq: Square) {
        let key = ZOBRIST.piece_keys[color.index()][piece.index()][sq.as_index()];
        self.key ^= key;
        match piece {
            Piece::Pawn => self.pawn_key ^= key,
            Piece::Knight | Piece::Bishop => {
                self.minor_key ^= key;
                self.nonpawn_keys[color.index()] ^= key;
            }
            Piece::Rook | Piece::Queen => {
                self.major_key ^= key;
                self.nonpawn_keys[color.index()] ^= key;
            }
            Piece::King => self.nonpawn_keys[color.index()] ^= key,
        }
    }

    /// Full recomputation of every key, used on load and by tests that
    /// cross-check incremental updates.
    #[must_use]
    pub(crate) fn recomputed_keys(&self) -> (u64, u64, [u64; 2], u64, u64) {
        let mut key = 0u64;
        let mut pawn_key = 0u64;
        let mut nonpawn = [0u64; 2];
        let mut major = 0u64;
        let mut minor = 0u64;

        for idx in 0..64 {
            if let Some((color, piece)) = self.mailbox[idx] {
                let k = ZOBRIST.piece_keys[color.index()][piece.index()][idx];
                key ^= k;
                match piece {
                    Piece::Pawn => pawn_key ^= k,
                    Piece::Knight | Piece::Bishop => {
                        minor ^= k;
                        nonpawn[color.index()] ^= k;
                    }
                    Piece::Rook | Piece::Queen => {
                        major ^= k;
                        nonpawn[color.index()] ^= k;
                    }
                    Piece::King => nonpawn[color.index()] ^= k,
                }
            }
        }

        if self.side_to_move == Color::Black {
            key ^= ZOBRIST.side_to_move_key;
        }
        key ^= ZOBRIST.castling_keys[self.castling.mask()];
        if let Some(ep) = self.en_passant {
            key ^= ZOBRIST.en_passant_keys[ep.file()];
        }

        (key, pawn_key, nonpawn, major, minor)
    }

    /// Reset the cached keys from a full recomputation (FEN loading).
    pub(crate) fn refresh_keys(&mut self) {
        let (key, pawn, nonpawn, major, minor) = self.recomputed_keys();
        self.key = key;
        self.pawn_key = pawn;
        self.nonpawn_keys = nonpawn;
        self.major_key = major;
        self.minor_key = minor;
    }

    // ------------------------------------------------------------------
    // Move making
    // ------------------------------------------------------------------

    /// Derive the child position reached by `mv`, which must be legal here.
    ///
    /// Captures remove the victim first (with the en passant offset where
    /// needed), castling relocates king and rook from the rook-square
    /// encoding, a double push sets the en passant target only when a legal
    /// capture exists, and rights anchored on touched squares are revoked.
    /// All keys are maintained incrementally.
    #[must_use]
    pub fn make_move(&self, mv: Move) -> Position {
        let mut child = self.clone();
        let us = self.side_to_move;
        let them = us.opponent();
        let from = mv.from();
        let to = mv.to();

        // Strip state-dependent key terms; they are re-added once the new
        // state is known.
        child.key ^= ZOBRIST.castling_keys[child.castling.mask()];
        if let Some(ep) = child.en_passant {
            child.key ^= ZOBRIST.en_passant_keys[ep.file()];
        }
        child.en_passant = None;
        child.from_null = false;
        child.captured = None;

        let (_, moving) = self.mailbox[from.as_index()]
            .unwrap_or_else(|| unreachable!("no piece to move on {from}"));

        let mut reset_clock = moving == Piece::Pawn;

        if mv.is_capture() {
            let victim_sq = if mv.is_en_passant() {
                Square::new(from.rank(), to.file())
            } else {
                to
            };
            let (_, victim) = child.remove_piece(victim_sq);
            child.captured = Some(victim);
            child.castling.revoke_square(victim_sq);
            reset_clock = true;
        }

        if mv.is_castling() {
            let wing = if mv.is_castle_kingside() {
                Wing::King
            } else {
                Wing::Queen
            };
            let rook_from = to;
            let king_dest = Square::new(us.back_rank(), wing.king_file());
            let rook_dest = Square::new(us.back_rank(), wing.rook_file());
            child.remove_piece(from);
            child.remove_piece(rook_from);
            child.set_piece(us, Piece::King, king_dest);
            child.set_piece(us, Piece::Rook, rook_dest);
            child.castling.revoke_all(us);
        } else {
            child.remove_piece(from);
            let placed = mv.promotion_piece().unwrap_or(moving);
            child.set_piece(us, placed, to);

            match moving {
                Piece::King => child.castling.revoke_all(us),
                Piece::Rook => child.castling.revoke_square(from),
                _ => {}
            }

            if mv.is_double_pawn_push() {
                let ep = Square::new((from.rank() + to.rank()) / 2, from.file());
                // The target only counts if somebody can actually take it
                child.side_to_move = them;
                if child.en_passant_legal(ep) {
                    child.en_passant = Some(ep);
                }
                child.side_to_move = us;
            }
        }

        child.key ^= ZOBRIST.castling_keys[child.castling.mask()];
        if let Some(ep) = child.en_passant {
            child.key ^= ZOBRIST.en_passant_keys[ep.file()];
        }

        child.halfmove_clock = if reset_clock {
            0
        } else {
            self.halfmove_clock + 1
        };
        if us == Color::Black {
            child.fullmove_number += 1;
        }
        child.side_to_move = them;
        child.key ^= ZOBRIST.side_to_move_key;

        child.update_masks();
        child
    }

    /// Derive the child reached by passing. Only the side to move and the
    /// en passant state change.
    #[must_use]
    pub fn make_null(&self) -> Position {
        let mut child = self.clone();
        if let Some(ep) = child.en_passant {
            child.key ^= ZOBRIST.en_passant_keys[ep.file()];
            child.en_passant = None;
        }
        child.side_to_move = self.side_to_move.opponent();
        child.key ^= ZOBRIST.side_to_move_key;
        child.halfmove_clock += 1;
        child.from_null = true;
        child.captured = None;
        child.update_masks();
        child
    }

    /// True when the side to move has a legal en passant capture onto `ep`.
    /// Each candidate capture is simulated to catch discovered checks and
    /// the horizontal two-pawn pin.
    #[must_use]
    pub(crate) fn en_passant_legal(&self, ep: Square) -> bool {
        let us = self.side_to_move;
        let victim_rank = match us {
            Color::White => ep.rank().wrapping_sub(1),
            Color::Black => ep.rank() + 1,
        };
        if victim_rank >= 8 {
            return false;
        }
        let victim_sq = Square::new(victim_rank, ep.file());
        if self.piece_at(victim_sq) != Some((us.opponent(), Piece::Pawn)) {
            return false;
        }

        let candidates =
            pawn_attacks(us.opponent(), ep) & self.pieces[us.index()][Piece::Pawn.index()];
        let ksq = self.king_square(us);

        for from in candidates {
            let occ = (self.occupancy_all()
                ^ Bitboard::from_square(from)
                ^ Bitboard::from_square(victim_sq))
                | Bitboard::from_square(ep);
            if !self.square_attacked_by(ksq, us.opponent(), occ) {
                return true;
            }
        }
        false
    }

    /// Legal castling rook squares for the side to move, per wing, after
    /// every Chess960 safety check. `None` entries are unavailable.
    #[must_use]
    pub fn can_castle(&self) -> (Option<Square>, Option<Square>) {
        (
            self.castle_rook_checked(Wing::King),
            self.castle_rook_checked(Wing::Queen),
        )
    }

    fn castle_rook_checked(&self, wing: Wing) -> Option<Square> {
        if self.in_check() {
            return None;
        }
        let us = self.side_to_move;
        let rook = self.castling.rook(us, wing)?;
        let king = self.king_square(us);
        let rank = us.back_rank();
        let king_dest = Square::new(rank, wing.king_file());
        let rook_dest = Square::new(rank, wing.rook_file());

        // Both movers leave the occupancy while the paths are tested
        let occ = self.occupancy_all()
            ^ Bitboard::from_square(king)
            ^ Bitboard::from_square(rook);

        let king_path = between(king, king_dest) | Bitboard::from_square(king_dest);
        if (king_path & occ).is_not_empty() {
            return None;
        }
        let rook_path = between(rook, rook_dest) | Bitboard::from_square(rook_dest);
        if (rook_path & occ).is_not_empty() {
            return None;
        }

        // The king may not cross or land on an attacked square. The test
        // runs with king and rook lifted off: the rook's departure can
        // uncover a slider onto the path, which the precomputed threat map
        // would miss.
        for sq in king_path {
            if self.square_attacked_by(sq, us.opponent(), occ) {
                return None;
            }
        }
        Some(rook)
    }

    /// Attacks of one piece kind from `sq` (pawns excluded: their pushes
    /// are not attacks).
    #[must_use]
    pub(crate) fn piece_attacks(piece: Piece, sq: Square, occ: Bitboard) -> Bitboard {
        match piece {
            Piece::Knight => knight_attacks(sq),
            Piece::Bishop => bishop_attacks(sq, occ),
            Piece::Rook => rook_attacks(sq, occ),
            Piece::Queen => queen_attacks(sq, occ),
            Piece::King => king_attacks(sq),
            Piece::Pawn => Bitboard::empty(),
        }
    }
}
