//! FEN parsing and formatting tests.

use crate::board::{Color, FenError, Piece, Position, Square, Wing, START_FEN};

#[test]
fn startpos_round_trips() {
    let pos = Position::startpos();
    assert_eq!(pos.to_fen(), START_FEN);
    assert_eq!(pos.side_to_move(), Color::White);
    assert_eq!(pos.fullmove_number(), 1);
    assert_eq!(pos.halfmove_clock(), 0);
}

#[test]
fn corpus_round_trips() {
    let fens = [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "4k3/8/8/8/8/8/8/4K2R w K - 0 1",
        "8/8/8/8/8/8/6k1/4K2R w K - 0 1",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        "8/Pk6/8/8/8/8/6Kp/8 b - - 0 1",
    ];
    for fen in fens {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen, "round trip failed");
    }
}

#[test]
fn missing_counters_default() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
    assert_eq!(pos.halfmove_clock(), 0);
    assert_eq!(pos.fullmove_number(), 1);
}

#[test]
fn illegal_ep_target_is_cleared() {
    // e3 is syntactically fine but no black pawn can capture there
    let pos =
        Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
    assert_eq!(pos.en_passant_target(), None);
    // Normalization drops it from the output too
    assert!(pos.to_fen().contains(" b KQkq - "));
}

#[test]
fn legal_ep_target_is_kept() {
    let pos =
        Position::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PP1/RNBQKBNR b KQkq e3 0 2").unwrap();
    assert_eq!(pos.en_passant_target(), Some("e3".parse().unwrap()));
}

#[test]
fn shredder_castling_letters() {
    let pos =
        Position::from_fen("1rk1r3/pppppppp/8/8/8/8/PPPPPPPP/1RK1R3 w EBeb - 0 1").unwrap();
    let rights = pos.castling_rights();
    assert_eq!(rights.rook(Color::White, Wing::King), Some("e1".parse().unwrap()));
    assert_eq!(rights.rook(Color::White, Wing::Queen), Some("b1".parse().unwrap()));
    assert_eq!(rights.rook(Color::Black, Wing::King), Some("e8".parse().unwrap()));
    assert_eq!(rights.rook(Color::Black, Wing::Queen), Some("b8".parse().unwrap()));
    // Non-corner rooks render Shredder style
    let fen = pos.to_fen();
    assert!(fen.contains(" EBeb "), "got {fen}");
}

#[test]
fn xfen_kq_maps_to_outermost_rooks() {
    // King on d1 with rooks a1 and g1: K means the g-rook, Q the a-rook
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/R2K2R1 w KQ - 0 1").unwrap();
    let rights = pos.castling_rights();
    assert_eq!(rights.rook(Color::White, Wing::King), Some("g1".parse().unwrap()));
    assert_eq!(rights.rook(Color::White, Wing::Queen), Some("a1".parse().unwrap()));
}

#[test]
fn rejects_malformed_fens() {
    assert!(matches!(
        Position::from_fen("only three fields"),
        Err(FenError::TooFewFields { .. }) | Err(FenError::BadRankCount { .. })
    ));
    assert!(Position::from_fen("8/8/8/8/8/8/8 w - - 0 1").is_err());
    assert!(Position::from_fen("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
    assert!(Position::from_fen("x7/8/8/8/8/8/8/8 w - - 0 1").is_err());
    assert!(Position::from_fen(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"
    )
    .is_err());
}

#[test]
fn rejects_structural_violations() {
    // No white king
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/8 w - - 0 1").is_err());
    // Two black kings
    assert!(Position::from_fen("4k1k1/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
    // Castling field without the rook
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 w K - 0 1").is_err());
    // The side not to move is in check
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/r3K3 b - - 0 1").is_err());
}

#[test]
fn piece_placement_is_read_correctly() {
    let pos = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    assert_eq!(
        pos.piece_at("a5".parse::<Square>().unwrap()),
        Some((Color::White, Piece::King))
    );
    assert_eq!(
        pos.piece_at("h5".parse::<Square>().unwrap()),
        Some((Color::Black, Piece::Rook))
    );
    assert_eq!(pos.piece_at("e4".parse::<Square>().unwrap()), None);
}
