//! Move making and state-update tests.

use crate::board::{Board, Color, Piece, Position, Square, Wing};

fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

fn play(pos: &Position, uci: &str) -> Position {
    let mv = pos
        .legal_moves()
        .iter()
        .copied()
        .find(|m| m.to_uci(false) == uci)
        .unwrap_or_else(|| panic!("{uci} is not legal in {pos:?}"));
    pos.make_move(mv)
}

#[test]
fn simple_push_updates_everything() {
    let pos = Position::startpos();
    let child = play(&pos, "e2e4");
    assert_eq!(child.piece_at(sq("e2")), None);
    assert_eq!(child.piece_at(sq("e4")), Some((Color::White, Piece::Pawn)));
    assert_eq!(child.side_to_move(), Color::Black);
    assert_eq!(child.halfmove_clock(), 0);
    assert_eq!(child.fullmove_number(), 1);
    // e2e4 offers no capturable en passant for black
    assert_eq!(child.en_passant_target(), None);
}

#[test]
fn halfmove_clock_counts_and_resets() {
    let mut pos = Position::startpos();
    pos = play(&pos, "g1f3");
    assert_eq!(pos.halfmove_clock(), 1);
    pos = play(&pos, "b8c6");
    assert_eq!(pos.halfmove_clock(), 2);
    assert_eq!(pos.fullmove_number(), 2);
    pos = play(&pos, "e2e4");
    assert_eq!(pos.halfmove_clock(), 0);
}

#[test]
fn capture_removes_the_victim_first() {
    let pos = Position::from_fen("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1").unwrap();
    let child = play(&pos, "e4d5");
    assert_eq!(child.piece_at(sq("d5")), Some((Color::White, Piece::Pawn)));
    assert_eq!(child.pieces(Color::Black, Piece::Queen).count(), 0);
    assert_eq!(child.captured, Some(Piece::Queen));
}

#[test]
fn en_passant_capture_removes_the_offset_pawn() {
    let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
    let child = play(&pos, "e5d6");
    assert_eq!(child.piece_at(sq("d6")), Some((Color::White, Piece::Pawn)));
    assert_eq!(child.piece_at(sq("d5")), None);
    assert_eq!(child.pieces(Color::Black, Piece::Pawn).count(), 0);
}

#[test]
fn promotions_swap_the_piece() {
    let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    for (uci, piece) in [
        ("a7a8q", Piece::Queen),
        ("a7a8r", Piece::Rook),
        ("a7a8b", Piece::Bishop),
        ("a7a8n", Piece::Knight),
    ] {
        let child = play(&pos, uci);
        assert_eq!(child.piece_at(sq("a8")), Some((Color::White, piece)));
        assert_eq!(child.pieces(Color::White, Piece::Pawn).count(), 0);
    }
}

#[test]
fn castling_places_king_and_rook() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let short = play(&pos, "e1g1");
    assert_eq!(short.piece_at(sq("g1")), Some((Color::White, Piece::King)));
    assert_eq!(short.piece_at(sq("f1")), Some((Color::White, Piece::Rook)));
    assert_eq!(short.piece_at(sq("e1")), None);
    assert_eq!(short.piece_at(sq("h1")), None);

    let long = play(&pos, "e1c1");
    assert_eq!(long.piece_at(sq("c1")), Some((Color::White, Piece::King)));
    assert_eq!(long.piece_at(sq("d1")), Some((Color::White, Piece::Rook)));
}

#[test]
fn king_move_revokes_both_rights_to_the_sentinel() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let child = play(&pos, "e1e2");
    let rights = child.castling_rights();
    assert_eq!(rights.rook(Color::White, Wing::King), None);
    assert_eq!(rights.rook(Color::White, Wing::Queen), None);
    // Black is untouched
    assert_eq!(rights.rook(Color::Black, Wing::King), Some(sq("h8")));
    assert_eq!(rights.rook(Color::Black, Wing::Queen), Some(sq("a8")));
}

#[test]
fn rook_moves_and_captures_revoke_one_right() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();

    let child = play(&pos, "h1h8");
    let rights = child.castling_rights();
    // Our h-rook left its square, and it captured black's h-rook
    assert_eq!(rights.rook(Color::White, Wing::King), None);
    assert_eq!(rights.rook(Color::White, Wing::Queen), Some(sq("a1")));
    assert_eq!(rights.rook(Color::Black, Wing::King), None);
    assert_eq!(rights.rook(Color::Black, Wing::Queen), Some(sq("a8")));
}

#[test]
fn double_push_sets_ep_only_when_capturable() {
    // Black pawn on d4 can take e.p. after e2e4
    let pos = Position::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1").unwrap();
    let child = play(&pos, "e2e4");
    assert_eq!(child.en_passant_target(), Some(sq("e3")));

    // Without the d4 pawn there is nothing to capture with
    let pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    let child = play(&pos, "e2e4");
    assert_eq!(child.en_passant_target(), None);
}

#[test]
fn null_move_flips_side_and_clears_ep() {
    let pos = Position::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1").unwrap();
    let child = play(&pos, "e2e4");
    assert!(child.en_passant_target().is_some());

    let null = child.make_null();
    assert_eq!(null.side_to_move(), Color::White);
    assert_eq!(null.en_passant_target(), None);
    assert!(null.from_null());
    assert_eq!(null.occupancy_all(), child.occupancy_all());
}

#[test]
fn board_stack_pushes_and_pops() {
    let mut board = Board::new();
    let root_hash = board.hash();
    board.push_uci("e2e4").unwrap();
    board.push_uci("e7e5").unwrap();
    assert_eq!(board.game_ply(), 2);
    board.unmake_move();
    board.unmake_move();
    assert_eq!(board.game_ply(), 0);
    assert_eq!(board.hash(), root_hash);
}

#[test]
fn uci_parse_rejects_garbage() {
    let board = Board::new();
    assert!(board.parse_uci_move("e2e5").is_err());
    assert!(board.parse_uci_move("e9e4").is_err());
    assert!(board.parse_uci_move("e2").is_err());
    assert!(board.parse_uci_move("e2e4x").is_err());
    assert!(board.parse_uci_move("e2e4").is_ok());
}

#[test]
fn threats_and_pins_are_maintained() {
    // White knight on d5 is not pinned; the e4 one is
    let pos = Position::from_fen("4r3/8/8/8/4N3/8/8/4K3 w - - 0 1").unwrap();
    assert!(pos.orthogonal_pins.contains(sq("e4")));
    assert!(pos.orthogonal_pins.contains(sq("e8")));
    assert!(!pos.in_check());
    // The rook's file shows up in the threat map
    assert!(pos.threats.contains(sq("e7")));
}

#[test]
fn checkers_track_the_attacker() {
    let pos = Position::from_fen("4k3/8/8/8/8/5n2/8/4K3 w - - 0 1").unwrap();
    assert!(pos.in_check());
    assert!(pos.checkers.contains(sq("f3")));
    assert_eq!(pos.checkers.count(), 1);
}
