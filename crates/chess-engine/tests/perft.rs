//! Perft reference counts.
//!
//! The deeper counts take minutes in a debug build. Run them with:
//! `cargo test --release -p chess-engine --test perft -- --ignored`

use chess_engine::{perft, perft_divide, Position};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_4_MIRRORED: &str =
    "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
const POSITION_6: &str =
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

fn check(fen: &str, expected: &[u64]) {
    let mut position = Position::from_fen(fen).unwrap();
    for (depth, &nodes) in (1..).zip(expected) {
        assert_eq!(perft(&mut position, depth), nodes, "{fen} at depth {depth}");
    }
    assert_eq!(position, Position::from_fen(fen).unwrap());
    assert_eq!(position.hash(), position.compute_hash());
}

#[test]
fn startpos() {
    check(STARTPOS, &[20, 400, 8_902, 197_281]);
}

#[test]
fn kiwipete() {
    check(KIWIPETE, &[48, 2_039, 97_862]);
}

#[test]
fn position_3() {
    check(POSITION_3, &[14, 191, 2_812, 43_238]);
}

#[test]
fn position_4() {
    check(POSITION_4, &[6, 264, 9_467]);
}

#[test]
fn position_4_mirrored() {
    check(POSITION_4_MIRRORED, &[6, 264, 9_467]);
}

#[test]
fn position_5() {
    check(POSITION_5, &[44, 1_486, 62_379]);
}

#[test]
fn position_6() {
    check(POSITION_6, &[46, 2_079, 89_890]);
}

#[test]
fn kiwipete_divide() {
    let mut position = Position::from_fen(KIWIPETE).unwrap();
    let divided = perft_divide(&mut position, 2);
    assert_eq!(divided.len(), 48);
    assert_eq!(divided.iter().map(|(_, n)| n).sum::<u64>(), 2_039);

    let castle = divided.iter().find(|(mv, _)| mv.to_uci() == "e1g1").unwrap();
    assert_eq!(castle.1, 43);
}

#[test]
#[ignore]
fn startpos_depth_5() {
    let mut position = Position::startpos();
    assert_eq!(perft(&mut position, 5), 4_865_609);
}

#[test]
#[ignore]
fn startpos_depth_6() {
    let mut position = Position::startpos();
    assert_eq!(perft(&mut position, 6), 119_060_324);
}

#[test]
#[ignore]
fn kiwipete_depth_4() {
    let mut position = Position::from_fen(KIWIPETE).unwrap();
    assert_eq!(perft(&mut position, 4), 4_085_603);
}

#[test]
#[ignore]
fn position_3_depth_5() {
    let mut position = Position::from_fen(POSITION_3).unwrap();
    assert_eq!(perft(&mut position, 5), 674_624);
}

#[test]
#[ignore]
fn position_4_depth_4() {
    let mut position = Position::from_fen(POSITION_4).unwrap();
    assert_eq!(perft(&mut position, 4), 422_333);
}

#[test]
#[ignore]
fn position_5_depth_4() {
    let mut position = Position::from_fen(POSITION_5).unwrap();
    assert_eq!(perft(&mut position, 4), 2_103_487);
}
