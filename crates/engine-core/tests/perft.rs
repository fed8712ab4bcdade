//! Published perft counts are the ground truth for move generation.

use engine_core::board::{perft, Board};

fn run(fen: &str, depth: u32, expected: u64) {
    let board: Board = fen.parse().unwrap();
    assert_eq!(perft(&board, depth), expected, "perft({depth}) of {fen}");
}

#[test]
fn startpos_depth_5() {
    run("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 5, 4_865_609);
}

#[test]
fn kiwipete_depth_4() {
    run("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", 4, 4_085_603);
}

#[test]
fn endgame_depth_5() {
    run("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 5, 674_624);
}

#[test]
fn promotion_heavy_depth_4() {
    run("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1", 4, 422_333);
}

#[test]
fn mirrored_talkchess_depth_3() {
    run("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8", 3, 62_379);
}

#[test]
fn steven_edwards_depth_3() {
    run(
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        3,
        89_890,
    );
}
