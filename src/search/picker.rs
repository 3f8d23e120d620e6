//! Staged move picker.
//!
//! Yields moves in the order the search wants to try them without sorting
//! everything up front: hash move first, then winning captures by
//! MVV + capture history (SEE-losing ones deferred), killers and the
//! counter move, remaining quiets by quiet + continuation history, and the
//! deferred bad captures last. Each stage is generated only when reached,
//! so a hash-move cutoff never pays for move generation.
//!
//! The quiescence picker stops after the winning captures.

use crate::board::{Move, Piece, Position, ScoredMoveList};
use crate::history::{History, PieceTo};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TtMove,
    GenCaptures,
    GoodCaptures,
    GenQuiets,
    Killer1,
    Killer2,
    Counter,
    Quiets,
    BadCaptures,
    Done,
}

/// Continuation-history context: the (piece, to) of the moves played 1, 2,
/// and 4 plies ago, where known.
pub(crate) type ContContext = [Option<PieceTo>; 3];

pub(crate) struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    captures: ScoredMoveList,
    capture_idx: usize,
    bad_captures: ScoredMoveList,
    bad_idx: usize,
    quiets: ScoredMoveList,
    quiet_idx: usize,
    skip_quiets: bool,
    quiescence: bool,
}

impl MovePicker {
    /// Main-search picker. `tt_move` must already be verified legal (or
    /// null); killers and counter are verified by membership in the quiet
    /// list when their stage comes up.
    pub(crate) fn new(tt_move: Move, killers: [Move; 2], counter: Move) -> MovePicker {
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers,
            counter,
            captures: ScoredMoveList::new(),
            capture_idx: 0,
            bad_captures: ScoredMoveList::new(),
            bad_idx: 0,
            quiets: ScoredMoveList::new(),
            quiet_idx: 0,
            skip_quiets: false,
            quiescence: false,
        }
    }

    /// Quiescence picker: hash move (if tactical), then winning captures.
    pub(crate) fn new_quiescence(tt_move: Move) -> MovePicker {
        let tt_move = if tt_move.is_tactical() { tt_move } else { Move::null() };
        MovePicker {
            quiescence: true,
            ..MovePicker::new(tt_move, [Move::null(); 2], Move::null())
        }
    }

    /// Stop yielding quiet moves (late-move or futility pruning decided
    /// the rest of the quiets cannot matter).
    pub(crate) fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    pub(crate) fn next(
        &mut self,
        pos: &Position,
        history: &History,
        conts: &ContContext,
    ) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenCaptures;
                    if !self.tt_move.is_null() {
                        return Some(self.tt_move);
                    }
                }

                Stage::GenCaptures => {
                    for mv in &pos.tactical_moves() {
                        if *mv == self.tt_move {
                            continue;
                        }
                        self.captures.push(*mv, capture_score(pos, history, *mv));
                    }
                    self.stage = Stage::GoodCaptures;
                }

                Stage::GoodCaptures => {
                    if let Some(scored) = self.captures.pick_best(self.capture_idx) {
                        self.capture_idx += 1;
                        if pos.see_ge(scored.mv, 0) {
                            return Some(scored.mv);
                        }
                        self.bad_captures.push(scored.mv, scored.score);
                        continue;
                    }
                    self.stage = if self.quiescence {
                        Stage::Done
                    } else {
                        Stage::GenQuiets
                    };
                }

                Stage::GenQuiets => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    for mv in &pos.legal_moves() {
                        if !mv.is_quiet() || *mv == self.tt_move {
                            continue;
                        }
                        self.quiets.push(*mv, quiet_score(pos, history, conts, *mv));
                    }
                    self.stage = Stage::Killer1;
                }

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    let killer = self.killers[0];
                    if self.extract_quiet(killer) {
                        return Some(killer);
                    }
                }

                Stage::Killer2 => {
                    self.stage = Stage::Counter;
                    let killer = self.killers[1];
                    if self.extract_quiet(killer) {
                        return Some(killer);
                    }
                }

                Stage::Counter => {
                    self.stage = Stage::Quiets;
                    let counter = self.counter;
                    if self.extract_quiet(counter) {
                        return Some(counter);
                    }
                }

                Stage::Quiets => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    if let Some(scored) = self.quiets.pick_best(self.quiet_idx) {
                        self.quiet_idx += 1;
                        return Some(scored.mv);
                    }
                    self.stage = Stage::BadCaptures;
                }

                Stage::BadCaptures => {
                    if let Some(scored) = self.bad_captures.pick_best(self.bad_idx) {
                        self.bad_idx += 1;
                        return Some(scored.mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    /// Remove `mv` from the pending quiets, returning whether it was still
    /// there. Guarantees killers/counter are yielded exactly once and only
    /// when actually legal.
    fn extract_quiet(&mut self, mv: Move) -> bool {
        if mv.is_null() {
            return false;
        }
        let slice = self.quiets.as_mut_slice();
        for i in self.quiet_idx..slice.len() {
            if slice[i].mv == mv {
                slice.swap(i, self.quiet_idx);
                self.quiet_idx += 1;
                return true;
            }
        }
        false
    }
}

fn capture_score(pos: &Position, history: &History, mv: Move) -> i32 {
    let victim = if mv.is_en_passant() {
        Piece::Pawn
    } else {
        pos.piece_at(mv.to()).map_or(Piece::Pawn, |(_, piece)| piece)
    };
    let moving = pos.piece_at(mv.from()).map_or(Piece::Pawn, |(_, piece)| piece);
    let promo_bonus = mv.promotion_piece().map_or(0, Piece::value);
    victim.value() * 16 + promo_bonus + history.capture.score(moving, mv.to(), victim)
}

fn quiet_score(pos: &Position, history: &History, conts: &ContContext, mv: Move) -> i32 {
    let stm = pos.side_to_move();
    let mut score = history.quiet.score(stm, pos.threats, mv);
    if let Some((color, piece)) = pos.piece_at(mv.from()) {
        let cur = PieceTo {
            color,
            piece,
            to: mv.to(),
        };
        for (i, prev) in conts.iter().enumerate() {
            if let Some(prev) = prev {
                score += history.continuation[i].score(*prev, cur);
            }
        }
    }
    score
}
