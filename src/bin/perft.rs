//! Perft / divide tool for move-generator debugging.
//!
//! Usage: `perft [depth] [fen...]` - defaults to depth 5 from the
//! starting position.

use std::time::Instant;

use mimir::board::Board;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let depth: usize = args
        .first()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(5);
    let board = if args.len() > 1 {
        let fen = args[1..].join(" ");
        match Board::from_fen(&fen) {
            Ok(board) => board,
            Err(err) => {
                eprintln!("bad FEN: {err}");
                std::process::exit(1);
            }
        }
    } else {
        Board::new()
    };

    println!("perft {depth} of {:?}", board.position());
    let start = Instant::now();
    let mut total = 0u64;
    for (mv, nodes) in board.perft_divide(depth) {
        println!("  {}: {nodes}", mv.to_uci(false));
        total += nodes;
    }
    let elapsed = start.elapsed();
    let nps = total as f64 / elapsed.as_secs_f64().max(1e-9);
    println!("total {total} in {elapsed:?} ({nps:.0} nps)");
}
