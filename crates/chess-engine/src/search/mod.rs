//! Iterative-deepening alpha-beta search.
//!
//! A [`Searcher`] owns everything one search episode mutates: the
//! transposition table, the move orderer and the node counter. The position
//! is borrowed mutably and walked with make/undo. Cancellation is a shared
//! flag polled every `check_interval` nodes; an iteration that sees it is
//! thrown away and the previous iteration's move stands.

mod config;
mod engine;
mod eval;
mod ordering;
mod tt;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use eval::{Evaluator, MaterialEvaluator};
pub use ordering::MoveOrderer;
pub use tt::{Bound, Entry, TranspositionTable};

use crate::movegen::{generate_moves, MoveList};
use crate::Position;
use chess_core::Move;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deepest ply the search will ever visit, quiescence included.
pub const MAX_PLY: usize = 128;
/// Score of being mated at the root. Mated `n` plies in scores `-MATE + n`.
pub const MATE: i32 = 1_000_000;
/// Any score at least this large in magnitude is a forced mate.
pub const MATE_THRESHOLD: i32 = MATE - MAX_PLY as i32;
pub const DRAW: i32 = 0;
const INFINITY: i32 = MATE + 1;

pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Plies until mate for a mate score, positive when the side to move mates.
pub fn mate_distance(score: i32) -> Option<i32> {
    if score >= MATE_THRESHOLD {
        Some(MATE - score)
    } else if score <= -MATE_THRESHOLD {
        Some(-(MATE + score))
    } else {
        None
    }
}

/// When to stop an episode. Unset fields fall back to the engine config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: Option<u32>,
    pub time_budget: Option<Duration>,
}

impl SearchLimits {
    pub fn depth(depth: u32) -> Self {
        SearchLimits {
            max_depth: Some(depth),
            time_budget: None,
        }
    }

    pub fn movetime(budget: Duration) -> Self {
        SearchLimits {
            max_depth: None,
            time_budget: Some(budget),
        }
    }

    /// Runs until stopped or the config's depth limit is reached.
    pub fn infinite() -> Self {
        SearchLimits::default()
    }
}

/// Outcome of one search episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    /// `None` only when the root has no legal moves.
    pub best_move: Option<Move>,
    /// Score of `best_move` from the side to move's point of view.
    pub score: i32,
    /// Deepest iteration that completed.
    pub depth: u32,
    pub nodes: u64,
    pub elapsed: Duration,
    /// False when a stop request or the time budget cut the episode short.
    pub completed: bool,
}

pub struct Searcher<E = MaterialEvaluator> {
    config: EngineConfig,
    evaluator: E,
    tt: TranspositionTable,
    orderer: MoveOrderer,
    stop: Arc<AtomicBool>,
    deadline: Option<Instant>,
    nodes: u64,
    stopped: bool,
    root_best: Move,
}

impl<E: Evaluator> Searcher<E> {
    pub fn new(config: EngineConfig, evaluator: E, stop: Arc<AtomicBool>) -> Self {
        Searcher {
            tt: TranspositionTable::new(config.hash_entries),
            orderer: MoveOrderer::new(),
            config,
            evaluator,
            stop,
            deadline: None,
            nodes: 0,
            stopped: false,
            root_best: Move::NULL,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the configuration, reallocating the table if its size changed.
    pub fn set_config(&mut self, config: EngineConfig) {
        if config.hash_entries != self.tt.len() {
            self.tt = TranspositionTable::new(config.hash_entries);
        }
        self.config = config;
    }

    pub fn transposition_table(&self) -> &TranspositionTable {
        &self.tt
    }

    /// The flag this searcher polls. Setting it stops the current episode.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Runs one episode from `position` and returns the deepest finished result.
    ///
    /// The position is restored before returning.
    pub fn search(&mut self, position: &mut Position, limits: &SearchLimits) -> SearchReport {
        let start = Instant::now();
        self.deadline = limits.time_budget.map(|budget| start + budget);
        self.nodes = 0;
        self.stopped = false;
        self.tt.clear();
        self.orderer.clear();

        let max_depth = limits
            .max_depth
            .map_or(self.config.depth_limit(), |depth| {
                depth.min(self.config.depth_limit())
            })
            .max(1);

        let mut root_moves = MoveList::new();
        generate_moves(position, false, &mut root_moves);

        let mut report = SearchReport {
            best_move: root_moves.iter().next().copied(),
            score: DRAW,
            depth: 0,
            nodes: 0,
            elapsed: Duration::ZERO,
            completed: true,
        };

        if root_moves.is_empty() {
            if position.is_in_check() {
                report.score = -MATE;
            }
            report.elapsed = start.elapsed();
            tracing::info!(fen = %position.to_fen(), "no legal moves at root");
            return report;
        }

        for depth in 1..=max_depth {
            self.root_best = Move::NULL;
            let score = self.negamax(position, depth, -INFINITY, INFINITY, 0);

            if self.stopped || self.root_best.is_null() {
                report.completed = false;
                tracing::debug!(depth, nodes = self.nodes, "iteration cancelled, result discarded");
                break;
            }

            report.best_move = Some(self.root_best);
            report.score = score;
            report.depth = depth;
            tracing::debug!(
                depth,
                score,
                nodes = self.nodes,
                best_move = %self.root_best,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "iteration complete"
            );

            if mate_distance(score).is_some_and(|plies| plies.unsigned_abs() <= depth) {
                break;
            }
        }

        report.nodes = self.nodes;
        report.elapsed = start.elapsed();
        tracing::info!(
            best_move = ?report.best_move.map(|mv| mv.to_uci()),
            score = report.score,
            depth = report.depth,
            nodes = report.nodes,
            completed = report.completed,
            "search finished"
        );
        report
    }

    /// Polls the stop flag and the clock every `check_interval` nodes.
    #[inline]
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.nodes % self.config.check_interval.max(1) == 0 {
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                self.stop.store(true, Ordering::Relaxed);
            }
            self.stopped = self.stop.load(Ordering::Relaxed);
        }
        self.stopped
    }

    fn negamax(&mut self, pos: &mut Position, depth: u32, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        self.nodes += 1;
        let root = ply == 0;

        if !root && pos.is_rule_draw() {
            return DRAW;
        }
        if ply >= MAX_PLY {
            return self.evaluator.evaluate(pos);
        }

        let original_alpha = alpha;
        let mut hash_move = Move::NULL;
        if let Some(entry) = self.tt.probe(pos.hash(), ply) {
            hash_move = entry.best_move;
            if !root && entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => return entry.score,
                    Bound::Lower if entry.score >= beta => return entry.score,
                    Bound::Upper if entry.score <= alpha => return entry.score,
                    _ => {}
                }
            }
        }

        let mut moves = MoveList::new();
        generate_moves(pos, false, &mut moves);
        if moves.is_empty() {
            return if pos.is_in_check() { -MATE + ply as i32 } else { DRAW };
        }

        if depth == 0 {
            return self.quiescence(pos, alpha, beta, ply);
        }

        self.orderer.order(pos, &mut moves, hash_move, ply);

        let mut best_score = -INFINITY;
        let mut best_move = Move::NULL;
        for &mv in moves.iter() {
            if self.should_stop() {
                break;
            }

            pos.make_move(mv);
            let score = -self.negamax(pos, depth - 1, -beta, -alpha, ply + 1);
            pos.undo_move(mv);

            if self.stopped {
                break;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                if root {
                    self.root_best = mv;
                }
                if score > alpha {
                    alpha = score;
                }
            }

            if alpha >= beta {
                self.orderer.record_cutoff(pos, mv, depth, ply);
                break;
            }
        }

        if self.stopped {
            return DRAW;
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(pos.hash(), depth, best_score, bound, best_move, ply);
        best_score
    }

    /// Captures-only search from a leaf. When in check every evasion is tried
    /// and there is no stand-pat.
    fn quiescence(&mut self, pos: &mut Position, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        if !self.config.quiescence || ply >= MAX_PLY {
            return self.evaluator.evaluate(pos);
        }

        let in_check = pos.is_in_check();
        let mut best_score = -INFINITY;
        if !in_check {
            best_score = self.evaluator.evaluate(pos);
            if best_score >= beta {
                return best_score;
            }
            alpha = alpha.max(best_score);
        }

        let mut moves = MoveList::new();
        generate_moves(pos, true, &mut moves);
        if moves.is_empty() && in_check {
            return -MATE + ply as i32;
        }
        self.orderer.order(pos, &mut moves, Move::NULL, ply);

        for &mv in moves.iter() {
            if self.should_stop() {
                break;
            }

            pos.make_move(mv);
            self.nodes += 1;
            let score = -self.quiescence(pos, -beta, -alpha, ply + 1);
            pos.undo_move(mv);

            if self.stopped {
                break;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                }
            }
            if alpha >= beta {
                break;
            }
        }

        if self.stopped {
            return DRAW;
        }
        best_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::legal_moves;

    fn searcher<E: Evaluator>(config: EngineConfig, evaluator: E) -> Searcher<E> {
        Searcher::new(config, evaluator, Arc::new(AtomicBool::new(false)))
    }

    fn plain_config() -> EngineConfig {
        EngineConfig {
            hash_entries: 0,
            quiescence: false,
            ..EngineConfig::default()
        }
    }

    /// Full-width negamax with the same terminal rules and no pruning.
    fn minimax<E: Evaluator>(pos: &mut Position, evaluator: &E, depth: u32, ply: usize) -> i32 {
        if ply > 0 && pos.is_rule_draw() {
            return DRAW;
        }
        let moves = legal_moves(pos);
        if moves.is_empty() {
            return if pos.is_in_check() { -MATE + ply as i32 } else { DRAW };
        }
        if depth == 0 {
            return evaluator.evaluate(pos);
        }
        let mut best = -INFINITY;
        for &mv in moves.iter() {
            pos.make_move(mv);
            best = best.max(-minimax(pos, evaluator, depth - 1, ply + 1));
            pos.undo_move(mv);
        }
        best
    }

    const MINIMAX_FENS: [&str; 4] = [
            "4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1",
            "r3k3/8/8/8/8/8/5q2/R3K2R w KQq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
    ];

    fn assert_matches_minimax(config: EngineConfig) {
        for fen in MINIMAX_FENS {
            for depth in 1..=3 {
                let mut pos = Position::from_fen(fen).unwrap();
                let expected = minimax(&mut pos, &MaterialEvaluator, depth, 0);
                let report = searcher(config.clone(), MaterialEvaluator)
                    .search(&mut pos, &SearchLimits::depth(depth));
                assert_eq!(report.score, expected, "{fen} at depth {depth}");
                assert_eq!(pos, Position::from_fen(fen).unwrap());
            }
        }
    }

    #[test]
    fn alpha_beta_matches_minimax() {
        assert_matches_minimax(plain_config());
    }

    #[test]
    fn table_bounds_keep_minimax_scores() {
        assert_matches_minimax(EngineConfig {
            hash_entries: 1 << 12,
            ..plain_config()
        });
    }

    #[test]
    fn finds_mate_in_one() {
        let mut pos = Position::from_fen("k7/8/1K6/8/8/8/8/7Q w - - 0 1").unwrap();
        let report = searcher(EngineConfig::default(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(4));
        assert_eq!(report.score, MATE - 1);
        assert_eq!(mate_distance(report.score), Some(1));
        assert_eq!(report.depth, 1);
        pos.make_move(report.best_move.unwrap());
        assert!(pos.is_checkmate());
    }

    #[test]
    fn back_rank_mate_found_through_the_table() {
        let mut pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1").unwrap();
        let mut s = searcher(EngineConfig::default(), MaterialEvaluator);
        let report = s.search(&mut pos, &SearchLimits::depth(3));
        assert_eq!(report.best_move.unwrap().to_uci(), "d1d8");
        assert_eq!(report.score, MATE - 1);
        assert!(s.transposition_table().filled() > 0);
    }

    #[test]
    fn wins_hanging_queen() {
        let mut pos = Position::from_fen("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let report = searcher(EngineConfig::default(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(2));
        assert_eq!(report.best_move.unwrap().to_uci(), "e4d5");
        assert!(report.completed);
        assert_eq!(report.depth, 2);
    }

    #[test]
    fn quiescence_sees_the_recapture() {
        // Taking the defended pawn with the queen loses the queen.
        let mut pos = Position::from_fen("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1").unwrap();
        let report = searcher(EngineConfig::default(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(1));
        assert_ne!(report.best_move.unwrap().to_uci(), "d2d5");
    }

    #[test]
    fn checkmated_root_reports_no_move() {
        let mut pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").unwrap();
        let report = searcher(EngineConfig::default(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(3));
        assert_eq!(report.best_move, None);
        assert_eq!(report.score, -MATE);
    }

    #[test]
    fn stalemated_root_scores_zero() {
        let mut pos = Position::from_fen("k7/2Q5/1K6/8/8/8/8/8 b - - 0 1").unwrap();
        let report = searcher(EngineConfig::default(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(3));
        assert_eq!(report.best_move, None);
        assert_eq!(report.score, DRAW);
    }

    #[test]
    fn pre_set_stop_falls_back_to_a_legal_move() {
        let stop = Arc::new(AtomicBool::new(true));
        let config = EngineConfig {
            check_interval: 1,
            ..EngineConfig::default()
        };
        let mut s = Searcher::new(config, MaterialEvaluator, stop);
        let mut pos = Position::startpos();
        let report = s.search(&mut pos, &SearchLimits::depth(5));
        assert!(!report.completed);
        assert_eq!(report.depth, 0);
        let mv = report.best_move.unwrap();
        assert!(legal_moves(&pos).contains(mv));
    }

    #[test]
    fn expired_budget_keeps_last_completed_iteration() {
        let config = EngineConfig {
            check_interval: 64,
            ..EngineConfig::default()
        };
        let mut s = searcher(config, MaterialEvaluator);
        let mut pos = Position::startpos();
        // Build the attack tables before the clock starts.
        assert_eq!(legal_moves(&pos).len(), 20);
        let report = s.search(&mut pos, &SearchLimits::movetime(Duration::from_millis(50)));
        assert!(!report.completed);
        assert!(report.depth >= 1);
        assert!(legal_moves(&pos).contains(report.best_move.unwrap()));
        assert!(s.stop_flag().load(Ordering::Relaxed));
    }

    #[test]
    fn losing_side_steers_into_threefold_repetition() {
        let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/4K1N1 w - - 0 1").unwrap();
        for uci in ["g1f3", "e8d8", "f3g1", "d8e8", "g1f3", "e8d8", "f3g1"] {
            let mv = pos.parse_move(uci).unwrap();
            pos.make_move(mv);
        }
        // Black is a knight down; d8e8 repeats the start position a third time.
        let report = searcher(plain_config(), MaterialEvaluator)
            .search(&mut pos, &SearchLimits::depth(1));
        assert_eq!(report.best_move.unwrap().to_uci(), "d8e8");
        assert_eq!(report.score, DRAW);
    }

    #[test]
    fn mate_distance_reads_both_signs() {
        assert_eq!(mate_distance(MATE - 3), Some(3));
        assert_eq!(mate_distance(-MATE + 4), Some(-4));
        assert_eq!(mate_distance(250), None);
        assert!(is_mate_score(-MATE + 10));
    }

    #[test]
    fn config_swap_resizes_table() {
        let mut s = searcher(plain_config(), MaterialEvaluator);
        assert!(s.transposition_table().is_empty());
        s.set_config(EngineConfig {
            hash_entries: 1024,
            ..plain_config()
        });
        assert_eq!(s.transposition_table().len(), 1024);
        assert_eq!(s.config().hash_entries, 1024);
    }
}
