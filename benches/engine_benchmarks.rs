//! Benchmarks for move generation, evaluation, and search.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mimir::board::Board;
use mimir::nnue::Network;
use mimir::search::{LimitKind, SearchManager};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    let startpos = Board::new();
    for depth in 1..=4 {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| startpos.perft(black_box(depth)));
        });
    }

    let kiwipete = Board::from_fen(KIWIPETE).unwrap();
    for depth in 1..=3 {
        group.bench_with_input(BenchmarkId::new("kiwipete", depth), &depth, |b, &depth| {
            b.iter(|| kiwipete.perft(black_box(depth)));
        });
    }

    group.finish();
}

fn bench_movegen(c: &mut Criterion) {
    let mut group = c.benchmark_group("movegen");

    let startpos = Board::new();
    group.bench_function("startpos", |b| b.iter(|| black_box(startpos.legal_moves())));

    let kiwipete = Board::from_fen(KIWIPETE).unwrap();
    group.bench_function("kiwipete", |b| b.iter(|| black_box(kiwipete.legal_moves())));
    group.bench_function("kiwipete_tactical", |b| {
        b.iter(|| black_box(kiwipete.tactical_moves()));
    });

    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");
    let network = Arc::new(Network::zeroed());

    let mut board = Board::from_fen(KIWIPETE).unwrap();
    board.set_network(Arc::clone(&network));
    group.bench_function("incremental", |b| {
        let moves: Vec<_> = board.legal_moves().iter().copied().take(8).collect();
        b.iter(|| {
            for &mv in &moves {
                board.make_move(mv);
                black_box(board.evaluate());
                board.unmake_move();
            }
        });
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for depth in [4usize, 6] {
        group.bench_with_input(BenchmarkId::new("startpos", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut manager =
                    SearchManager::new(Board::new(), Arc::new(Network::zeroed()), 16);
                manager.add_limit(LimitKind::Depth(depth));
                black_box(manager.search(true, false))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_perft, bench_movegen, bench_eval, bench_search);
criterion_main!(benches);
